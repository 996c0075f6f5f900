//! Application configuration management.
//!
//! Configuration is stored at `~/.config/cinedex/config.json` (or the
//! platform equivalent). Every field is optional; missing fields fall back
//! to the defaults below. `CINEDEX_API_URL` and `CINEDEX_TOKEN_BACKEND`
//! override the file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ReqwestTransport, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{
    FileTokenStore, KeyringTokenStore, Session, SessionOptions, TokenStore,
    DEFAULT_RENEWAL_TIMEOUT_SECS,
};

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "cinedex";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when neither the file nor the environment names one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

const ENV_API_URL: &str = "CINEDEX_API_URL";
const ENV_TOKEN_BACKEND: &str = "CINEDEX_TOKEN_BACKEND";

/// Where the credential pair is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
}

impl FromStr for TokenBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(TokenBackend::File),
            "keyring" | "keychain" => Ok(TokenBackend::Keyring),
            _ => Err(format!("Unknown token backend: {}", s)),
        }
    }
}

impl fmt::Display for TokenBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenBackend::File => write!(f, "file"),
            TokenBackend::Keyring => write!(f, "keyring"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_backend: Option<TokenBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `CINEDEX_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = Some(url);
        }
        if let Some(backend) = lookup(ENV_TOKEN_BACKEND).filter(|v| !v.trim().is_empty()) {
            let backend = backend
                .parse::<TokenBackend>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_TOKEN_BACKEND))?;
            self.token_backend = Some(backend);
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn token_backend(&self) -> TokenBackend {
        self.token_backend.unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn renewal_timeout(&self) -> Duration {
        Duration::from_secs(self.renewal_timeout_secs.unwrap_or(DEFAULT_RENEWAL_TIMEOUT_SECS))
    }

    /// Directory holding the file backend's tokens
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_backend() {
            TokenBackend::File => Arc::new(FileTokenStore::in_dir(&self.data_dir()?)),
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()),
        };
        Ok(store)
    }

    /// Session wired to the configured backend and token store.
    /// Call `initialize()` on it before use.
    pub fn build_session(&self) -> Result<Session> {
        let transport = ReqwestTransport::new(self.api_base_url(), self.request_timeout())
            .context("Failed to build HTTP client")?;
        let options = SessionOptions {
            renewal_timeout: self.renewal_timeout(),
            ..SessionOptions::default()
        };
        Ok(Session::new(Arc::new(transport), self.token_store()?, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:8000");
        assert_eq!(config.token_backend(), TokenBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.renewal_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file() {
        let config: Config =
            serde_json::from_str(r#"{"token_backend": "keyring", "last_username": "agnes"}"#).unwrap();
        assert_eq!(config.token_backend(), TokenBackend::Keyring);
        assert_eq!(config.last_username.as_deref(), Some("agnes"));
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);

        // unset fields stay out of the file
        let saved = serde_json::to_string(&Config::default()).unwrap();
        assert_eq!(saved, "{}");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config {
            api_base_url: Some("http://file.example".to_string()),
            ..Config::default()
        };
        config
            .apply_overrides(|key| match key {
                "CINEDEX_API_URL" => Some("https://api.example".to_string()),
                "CINEDEX_TOKEN_BACKEND" => Some("Keychain".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api_base_url(), "https://api.example");
        assert_eq!(config.token_backend(), TokenBackend::Keyring);

        let mut untouched = Config::default();
        untouched.apply_overrides(|_| Some(String::new())).unwrap();
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn test_invalid_backend_is_an_error() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(|key| (key == "CINEDEX_TOKEN_BACKEND").then(|| "sqlite".to_string()))
            .is_err());
    }

    #[test]
    fn test_data_dir_is_app_scoped() {
        // the file store adds its own file name inside this directory
        if let Ok(dir) = Config::default().data_dir() {
            assert!(dir.ends_with(APP_NAME));
            assert_eq!(FileTokenStore::in_dir(&dir).path().parent(), Some(dir.as_path()));
        }
    }

    #[test]
    fn test_build_session_uses_renewal_timeout() {
        let config = Config {
            renewal_timeout_secs: Some(2),
            token_backend: Some(TokenBackend::Keyring),
            ..Config::default()
        };
        assert_eq!(config.renewal_timeout(), Duration::from_secs(2));
        assert!(config.build_session().is_ok());
    }
}
