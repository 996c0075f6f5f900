use anyhow::{Context, Result};
use keyring::Entry;

use super::tokens::{TokenKey, TokenStore};

const SERVICE_NAME: &str = "cinedex";

/// Tokens in the OS keychain, one entry per key.
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service name, e.g. one per backend
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: TokenKey) -> Result<Entry> {
        Entry::new(&self.service, key.as_str()).context("Failed to create keyring entry")
    }
}

/// A missing entry reads as no token
fn found(result: keyring::Result<String>) -> Result<Option<String>> {
    match result {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to retrieve token from keychain"),
    }
}

/// Deleting a missing entry succeeds, so clearing twice is fine
fn deleted(result: keyring::Result<()>) -> Result<()> {
    match result {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Failed to delete token from keychain"),
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>> {
        found(self.entry(key)?.get_password())
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn remove(&self, key: TokenKey) -> Result<()> {
        deleted(self.entry(key)?.delete_credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name() {
        assert_eq!(KeyringTokenStore::new().service(), "cinedex");
        assert_eq!(KeyringTokenStore::with_service("cinedex-staging").service(), "cinedex-staging");
    }

    #[test]
    fn test_missing_entry_is_no_token() {
        assert_eq!(found(Ok("A1".to_string())).unwrap().as_deref(), Some("A1"));
        assert!(found(Err(keyring::Error::NoEntry)).unwrap().is_none());

        let err = found(Err(keyring::Error::Invalid("user".into(), "empty".into()))).unwrap_err();
        assert!(err.to_string().contains("Failed to retrieve token"));
    }

    #[test]
    fn test_deleting_missing_entry_succeeds() {
        assert!(deleted(Ok(())).is_ok());
        assert!(deleted(Err(keyring::Error::NoEntry)).is_ok());
        assert!(deleted(Err(keyring::Error::Invalid("user".into(), "empty".into()))).is_err());
    }
}
