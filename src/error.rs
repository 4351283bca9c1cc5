use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes of the platform store's own error domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorCode {
    Unknown,
    ClientInvalid,
    PaymentCancelled,
    PaymentInvalid,
    PaymentNotAllowed,
    StoreProductNotAvailable,
    CloudServicePermissionDenied,
    CloudServiceNetworkConnectionFailed,
    CloudServiceRevoked,
}

/// Error detail reported by the platform for a failed transaction or restore.
///
/// `code` is `None` when the error originates outside the store's error domain
/// (networking, OS, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct PlatformError {
    pub code: Option<StoreErrorCode>,
    pub message: String,
}

impl PlatformError {
    pub fn store(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

/// Public error taxonomy of the purchase API.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("product lookup returned no products")]
    #[diagnostic(code(iap::empty_products))]
    EmptyProducts,

    #[error("product not allowed: {}", product_ids.join(", "))]
    #[diagnostic(
        code(iap::invalid_product),
        help("add the identifier to `allowed_product_ids` or drop the filter")
    )]
    InvalidProduct { product_ids: Vec<String> },

    #[error("payments are not allowed on this device")]
    #[diagnostic(code(iap::payment_not_allowed))]
    PaymentNotAllowed,

    #[error("payment cancelled")]
    #[diagnostic(code(iap::payment_cancelled))]
    PaymentCancelled,

    #[error("product is not available in the store")]
    #[diagnostic(code(iap::store_product_not_available))]
    StoreProductNotAvailable,

    #[error("the store reported an internal fault")]
    #[diagnostic(code(iap::store_trouble))]
    StoreTrouble,

    #[error("platform error: {0}")]
    #[diagnostic(code(iap::platform))]
    Platform(#[source] PlatformError),

    #[error("unknown error")]
    #[diagnostic(code(iap::unknown))]
    Unknown,
}

impl PurchaseError {
    /// Maps the platform's error detail onto the public taxonomy.
    pub fn from_platform(error: Option<&PlatformError>) -> Self {
        let Some(error) = error else {
            return PurchaseError::Unknown;
        };
        match error.code {
            Some(StoreErrorCode::PaymentNotAllowed) => PurchaseError::PaymentNotAllowed,
            Some(StoreErrorCode::PaymentCancelled) => PurchaseError::PaymentCancelled,
            Some(StoreErrorCode::StoreProductNotAvailable) => {
                PurchaseError::StoreProductNotAvailable
            }
            Some(StoreErrorCode::Unknown) => PurchaseError::StoreTrouble,
            _ => PurchaseError::Platform(error.clone()),
        }
    }

    pub fn invalid_product(product_id: impl Into<String>) -> Self {
        PurchaseError::InvalidProduct {
            product_ids: vec![product_id.into()],
        }
    }
}

impl From<PlatformError> for PurchaseError {
    fn from(error: PlatformError) -> Self {
        PurchaseError::from_platform(Some(&error))
    }
}

/// Errors raised while loading a [`crate::config::ProviderConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PurchaseError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_codes_map_to_taxonomy() {
        let map = |code| PurchaseError::from(PlatformError::store(code, "x"));

        assert_eq!(
            map(StoreErrorCode::PaymentNotAllowed),
            PurchaseError::PaymentNotAllowed
        );
        assert_eq!(
            map(StoreErrorCode::PaymentCancelled),
            PurchaseError::PaymentCancelled
        );
        assert_eq!(
            map(StoreErrorCode::StoreProductNotAvailable),
            PurchaseError::StoreProductNotAvailable
        );
        assert_eq!(map(StoreErrorCode::Unknown), PurchaseError::StoreTrouble);
    }

    #[test]
    fn test_other_errors_are_wrapped() {
        let foreign = PlatformError::other("network down");
        assert_eq!(
            PurchaseError::from_platform(Some(&foreign)),
            PurchaseError::Platform(foreign.clone())
        );

        let unmapped = PlatformError::store(StoreErrorCode::ClientInvalid, "client");
        assert_eq!(
            PurchaseError::from_platform(Some(&unmapped)),
            PurchaseError::Platform(unmapped.clone())
        );
    }

    #[test]
    fn test_missing_detail_is_unknown() {
        assert_eq!(PurchaseError::from_platform(None), PurchaseError::Unknown);
    }

    #[test]
    fn test_invalid_product_equality_uses_ids() {
        assert_eq!(
            PurchaseError::invalid_product("a"),
            PurchaseError::InvalidProduct {
                product_ids: vec!["a".to_string()]
            }
        );
        assert_ne!(
            PurchaseError::invalid_product("a"),
            PurchaseError::invalid_product("b")
        );
        assert_ne!(PurchaseError::PaymentNotAllowed, PurchaseError::PaymentCancelled);
    }

    #[test]
    fn test_display_and_code() {
        let err = PurchaseError::invalid_product("gems_100");
        assert_eq!(err.to_string(), "product not allowed: gems_100");
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("iap::invalid_product")
        );
    }
}
