//! Store configuration.
//!
//! # Responsibility
//! - Hold the settings that shape physical storage names and connection behavior.
//! - Validate settings before any connection is opened.
//!
//! # Invariants
//! - `collection_prefix` is a plain identifier, so physical collection names are
//!   safe to quote as SQLite identifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_COLLECTION_PREFIX: &str = "apos";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("collection prefix regex must compile")
});

#[derive(Debug)]
pub enum ConfigError {
    InvalidPrefix(String),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPrefix(prefix) => write!(
                f,
                "invalid collection prefix `{prefix}`; expected a letter followed by letters, digits or `_`"
            ),
            Self::Parse(err) => write!(f, "invalid store config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPrefix(_) => None,
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for opening and provisioning the document store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Prepended to each logical collection name: `apos` + `Pages`.
    pub collection_prefix: String,
    /// How long a call waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a JSON config document. Missing keys take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PREFIX_RE.is_match(&self.collection_prefix) {
            return Err(ConfigError::InvalidPrefix(self.collection_prefix.clone()));
        }
        Ok(())
    }

    /// Returns the physical collection name for a logical one, e.g.
    /// `pages` -> `aposPages`.
    pub fn physical_name(&self, logical: &str) -> String {
        let mut chars = logical.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        format!("{}{}", self.collection_prefix, capitalized)
    }
}
