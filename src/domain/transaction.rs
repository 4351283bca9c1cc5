use super::product::Product;
use crate::error::{PlatformError, PurchaseError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Purchasing,
    Purchased,
    Failed,
    Restored,
    Deferred,
    /// A state reported by the platform that this version does not know.
    #[serde(other)]
    Unrecognized,
}

/// A request to buy a product, as handed to the platform queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub product_identifier: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub application_username: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Payment {
    pub fn new(product_identifier: impl Into<String>) -> Self {
        Self {
            product_identifier: product_identifier.into(),
            quantity: default_quantity(),
            application_username: None,
        }
    }
}

impl From<&Product> for Payment {
    fn from(product: &Product) -> Self {
        Payment::new(product.product_identifier.clone())
    }
}

/// Read-only snapshot of a platform transaction.
///
/// A new state for the same transaction arrives as a new snapshot; records are
/// never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_identifier: String,
    pub state: TransactionState,
    pub payment: Payment,
    #[serde(default)]
    pub original: Option<Box<PaymentTransaction>>,
    #[serde(default)]
    pub error: Option<PlatformError>,
}

impl PaymentTransaction {
    pub fn new(
        transaction_identifier: impl Into<String>,
        state: TransactionState,
        payment: Payment,
    ) -> Self {
        Self {
            transaction_identifier: transaction_identifier.into(),
            state,
            payment,
            original: None,
            error: None,
        }
    }

    pub fn with_original(mut self, original: PaymentTransaction) -> Self {
        self.original = Some(Box::new(original));
        self
    }

    pub fn with_error(mut self, error: PlatformError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn product_identifier(&self) -> &str {
        &self.payment.product_identifier
    }

    /// `Err` with the mapped platform detail for failed transactions,
    /// `Ok(self)` for every other state.
    pub fn into_result(self) -> Result<PaymentTransaction, PurchaseError> {
        match self.state {
            TransactionState::Failed => Err(PurchaseError::from_platform(self.error.as_ref())),
            _ => Ok(self),
        }
    }
}

impl PartialEq for PaymentTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.transaction_identifier == other.transaction_identifier && self.state == other.state
    }
}

impl Eq for PaymentTransaction {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorCode;

    #[test]
    fn test_equality_uses_identifier_and_state() {
        let a = PaymentTransaction::new("T1", TransactionState::Purchased, Payment::new("P1"));
        let b = PaymentTransaction::new("T1", TransactionState::Purchased, Payment::new("P2"));
        let c = PaymentTransaction::new("T2", TransactionState::Purchased, Payment::new("P1"));
        let d = PaymentTransaction::new("T1", TransactionState::Restored, Payment::new("P1"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_unknown_state_deserializes_as_unrecognized() {
        let json = r#"{
            "transaction_identifier": "T1",
            "state": "refunded",
            "payment": { "product_identifier": "P1" }
        }"#;
        let tx: PaymentTransaction = serde_json::from_str(json).unwrap();

        assert_eq!(tx.state, TransactionState::Unrecognized);
        assert_eq!(tx.payment.quantity, 1);
        assert!(tx.original.is_none());
    }

    #[test]
    fn test_failed_into_result_maps_error() {
        let tx = PaymentTransaction::new("T1", TransactionState::Failed, Payment::new("P1"))
            .with_error(PlatformError::store(StoreErrorCode::PaymentCancelled, "cancel"));
        assert_eq!(tx.into_result(), Err(PurchaseError::PaymentCancelled));

        let bare = PaymentTransaction::new("T2", TransactionState::Failed, Payment::new("P1"));
        assert_eq!(bare.into_result(), Err(PurchaseError::Unknown));
    }

    #[test]
    fn test_restored_keeps_original_link() {
        let original = PaymentTransaction::new("T0", TransactionState::Purchased, Payment::new("P1"));
        let restored = PaymentTransaction::new("T1", TransactionState::Restored, Payment::new("P1"))
            .with_original(original.clone());

        let result = restored.into_result().unwrap();
        assert_eq!(result.original.as_deref(), Some(&original));
    }
}
