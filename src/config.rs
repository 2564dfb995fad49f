//! Connection settings from environment variables.
//!
//! Call `dotenvy::dotenv()` before [`ConnectionSettings::from_env`] to pick up
//! a `.env` file.

use crate::dialect::Dialect;
use crate::model::{ModelProperties, PROPERTY_DRIVER, PROPERTY_PASSWORD, PROPERTY_URL, PROPERTY_USER};

pub const ENV_DIALECT: &str = "ERDESIGN_DIALECT";
pub const ENV_DRIVER: &str = "ERDESIGN_DRIVER";
pub const ENV_URL: &str = "ERDESIGN_URL";
pub const ENV_USER: &str = "ERDESIGN_USER";
pub const ENV_PASSWORD: &str = "ERDESIGN_PASSWORD";
pub const ENV_LOG: &str = "RUST_LOG";

/// Driver used when none is configured.
pub const DEFAULT_DRIVER: &str = "ddl";

/// Log filter directive: `RUST_LOG` when set, else `debug` or `info`.
pub fn log_directive(lookup: impl Fn(&str) -> Option<String>, verbose: bool) -> String {
    lookup(ENV_LOG)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub dialect: Option<Dialect>,
    pub driver: Option<String>,
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let dialect = get(ENV_DIALECT).and_then(|d| {
            let parsed = Dialect::from_str(&d);
            if parsed.is_none() {
                tracing::warn!(value = %d, "unknown {ENV_DIALECT} ignored");
            }
            parsed
        });

        Self {
            dialect,
            driver: get(ENV_DRIVER),
            url: get(ENV_URL),
            user: get(ENV_USER),
            password: get(ENV_PASSWORD),
        }
    }

    pub fn driver_or_default(&self) -> &str {
        self.driver.as_deref().unwrap_or(DEFAULT_DRIVER)
    }

    /// Write the connection into a model's properties. Unset values leave
    /// the existing properties alone.
    pub fn apply_to(&self, properties: &mut ModelProperties) {
        properties.set(PROPERTY_DRIVER, self.driver_or_default());
        for (key, value) in [
            (PROPERTY_URL, &self.url),
            (PROPERTY_USER, &self.user),
            (PROPERTY_PASSWORD, &self.password),
        ] {
            if let Some(value) = value {
                properties.set(key, value.as_str());
            }
        }
    }
}
