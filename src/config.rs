use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Settings for a [`crate::application::provider::PaymentProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Finish purchased and restored transactions as soon as they arrive.
    ///
    /// When `false`, the application must call `finish` once it has delivered
    /// the content. Failed transactions are always finished immediately.
    pub complete_immediately: bool,

    /// When set, payments and updates for any other product are rejected.
    pub allowed_product_ids: Option<BTreeSet<String>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            complete_immediately: true,
            allowed_product_ids: None,
        }
    }
}

impl ProviderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_complete_immediately(mut self, complete_immediately: bool) -> Self {
        self.complete_immediately = complete_immediately;
        self
    }

    pub fn with_allowed_product_ids<I, S>(mut self, product_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_product_ids = Some(product_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Returns `true` if `product_id` passes the allowed-product filter.
    pub fn allows(&self, product_id: &str) -> bool {
        self.allowed_product_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_json_str("{}").unwrap();
        assert!(config.complete_immediately);
        assert!(config.allowed_product_ids.is_none());
        assert!(config.allows("anything"));
    }

    #[test]
    fn test_allowed_product_filter() {
        let config = ProviderConfig::default().with_allowed_product_ids(["gems_100", "pro"]);
        assert!(config.allows("pro"));
        assert!(!config.allows("gems_500"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"complete_immediately": false, "allowed_product_ids": ["pro"]}}"#
        )
        .unwrap();

        let config = ProviderConfig::from_path(file.path()).unwrap();
        assert!(!config.complete_immediately);
        assert!(config.allows("pro"));
        assert!(!config.allows("gems_100"));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = ProviderConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProviderConfig::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
