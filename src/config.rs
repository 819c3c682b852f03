//! Shop-floor configuration loaded from `shopfloor.toml`.
//!
//! [`ShopfloorConfig`] holds every tunable parameter. Missing keys fall back
//! to defaults. `SHOPFLOOR_BACKEND_URL` and `SHOPFLOOR_API_KEY` take
//! precedence over the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ShopfloorError;
use crate::roles::Role;

pub const DEFAULT_CONFIG_FILE: &str = "shopfloor.toml";
pub const BACKEND_URL_VAR: &str = "SHOPFLOOR_BACKEND_URL";
pub const API_KEY_VAR: &str = "SHOPFLOOR_API_KEY";

/// Top-level configuration loaded from `shopfloor.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopfloorConfig {
    /// Base URL of the row store, without the `/rest/v1` suffix.
    #[serde(default)]
    pub backend_url: String,

    /// Key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Role of the signed-in user.
    #[serde(default = "default_role")]
    pub role: String,

    /// Interval between revision checks of the polling change feed.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds allowed to open a connection to the row store.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds allowed for a whole row store request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Default role: "Usuario".
fn default_role() -> String {
    Role::Usuario.as_str().to_string()
}

// Default poll interval: 2000ms.
fn default_poll_interval_ms() -> u64 {
    2000
}

// Default connect timeout: 10s.
fn default_connect_timeout_secs() -> u64 {
    10
}

// Default request timeout: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ShopfloorConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            api_key: String::new(),
            role: default_role(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ShopfloorConfig {
    /// Loads `shopfloor.toml` from the working directory, or defaults when it
    /// does not exist.
    pub fn load() -> Result<Self, ShopfloorError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        let config = if path.exists() {
            Self::read(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env(|name| std::env::var(name).ok()))
    }

    /// Loads an explicitly named file. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ShopfloorError> {
        let config = Self::read(path)?;
        Ok(config.with_env(|name| std::env::var(name).ok()))
    }

    fn read(path: &Path) -> Result<Self, ShopfloorError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<ShopfloorConfig>(&contents)?)
    }

    /// Applies environment overrides looked up through `lookup`. Empty values
    /// are ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BACKEND_URL_VAR)
            && !url.is_empty()
        {
            self.backend_url = url;
        }
        if let Some(key) = lookup(API_KEY_VAR)
            && !key.is_empty()
        {
            self.api_key = key;
        }
        self
    }

    pub fn role(&self) -> Result<Role, ShopfloorError> {
        self.role
            .parse()
            .map_err(|e: crate::roles::UnknownRole| ShopfloorError::Config(e.to_string()))
    }

    /// Fails unless a backend URL is configured.
    pub fn require_backend(&self) -> Result<&str, ShopfloorError> {
        if self.backend_url.trim().is_empty() {
            return Err(ShopfloorError::Config(format!(
                "no backend URL; set backend_url in {DEFAULT_CONFIG_FILE} or {BACKEND_URL_VAR}"
            )));
        }
        Ok(self.backend_url.trim())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
