//! Broker credentials from the process environment.
//!
//! A `.env` file in the working directory is loaded first when present;
//! variables already set in the environment take precedence over it.

use crate::domain::error::CrosstraderError;

pub const API_KEY_VAR: &str = "API_KEY";
pub const API_SECRET_VAR: &str = "API_SECRET";
pub const BASE_URL_VAR: &str = "BASE_URL";
pub const DATA_URL_VAR: &str = "DATA_URL";

pub const DEFAULT_DATA_URL: &str = "https://data.alpaca.markets";

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
    pub base_url: String,
    pub data_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("data_url", &self.data_url)
            .finish()
    }
}

impl Credentials {
    /// Load from the environment after reading `.env` if one exists.
    pub fn from_env() -> Result<Self, CrosstraderError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Unset and blank values are both missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CrosstraderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| CrosstraderError::MissingCredential {
                name: name.to_string(),
            })
        };

        Ok(Credentials {
            key_id: require(API_KEY_VAR)?,
            secret: require(API_SECRET_VAR)?,
            base_url: require(BASE_URL_VAR)?.trim_end_matches('/').to_string(),
            data_url: get(DATA_URL_VAR)
                .unwrap_or_else(|| DEFAULT_DATA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}
