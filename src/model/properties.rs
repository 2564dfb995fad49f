//! Connection metadata stored with a model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const PROPERTY_DRIVER: &str = "DRIVER";
pub const PROPERTY_URL: &str = "URL";
pub const PROPERTY_USER: &str = "USER";
pub const PROPERTY_PASSWORD: &str = "PASSWORD";

/// String properties of a model. Unknown keys are kept but ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelProperties {
    values: IndexMap<String, String>,
}

impl ModelProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value or the empty string.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Entry of a host application's connection history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecentlyUsedConnection {
    pub dialect: String,
    pub url: String,
    pub user: String,
}

impl std::fmt::Display for RecentlyUsedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} - {}", self.dialect, self.url, self.user)
    }
}
