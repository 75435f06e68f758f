//! Service provider directory: who credentials can be spent at.
//!
//! Loaded from configuration, read-only afterwards, so it needs no lock.

use std::collections::BTreeMap;

use crate::config::ClientConfig;
use crate::error::{WalletError, WalletResult};

/// Provider id -> ledger address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceProviderDirectory {
    providers: BTreeMap<String, String>,
}

impl ServiceProviderDirectory {
    pub fn new(providers: BTreeMap<String, String>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.service_providers.clone())
    }

    /// The address registered for `provider_id`.
    pub fn resolve(&self, provider_id: &str) -> WalletResult<&str> {
        self.providers
            .get(provider_id)
            .map(String::as_str)
            .ok_or_else(|| WalletError::UnknownProvider(provider_id.to_string()))
    }

    /// Provider ids in sorted order, as offered to the user.
    pub fn ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn directory() -> ServiceProviderDirectory {
        let mut map = BTreeMap::new();
        map.insert("sp2".to_string(), "0xbeef".to_string());
        map.insert("sp1".to_string(), "0xcafe".to_string());
        ServiceProviderDirectory::new(map)
    }

    #[test]
    fn resolves_known_provider() {
        assert_eq!(directory().resolve("sp1").unwrap(), "0xcafe");
    }

    #[test]
    fn unknown_provider_is_classified() {
        let err = directory().resolve("sp9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownProvider);
    }

    #[test]
    fn ids_are_sorted() {
        assert_eq!(directory().ids(), vec!["sp1", "sp2"]);
    }
}
