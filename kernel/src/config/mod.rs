// Connector Configuration
//
// Settings that bind an adapter instance to a store endpoint and
// namespace. Loaded from JSON; every field has a default.

use serde::{Deserialize, Serialize};

use crate::document::{DEFAULT_ID_FIELD, DEFAULT_TIMESTAMP_FIELD};
use crate::store::IndexName;

mod endpoint;

pub use endpoint::{Endpoint, DEFAULT_PORT};

/// CAS attempts made by a single update before giving up.
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 100;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: &'static str,
    },

    #[error("config is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// `host`, `host:port` or `host:port/namespace`.
    pub endpoint: String,
    pub namespace: String,
    pub unique_key: String,
    pub timestamp_field: String,
    pub max_cas_retries: u32,
    pub index: IndexName,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost".into(),
            namespace: DEFAULT_NAMESPACE.into(),
            unique_key: DEFAULT_ID_FIELD.into(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.into(),
            max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
            index: IndexName::default(),
        }
    }
}

impl ConnectorConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("unique_key", &self.unique_key),
            ("timestamp_field", &self.timestamp_field),
            ("index.design_document", &self.index.design_document),
            ("index.view", &self.index.view),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidSetting {
                    field,
                    reason: "must not be empty",
                });
            }
        }

        if self.max_cas_retries == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "max_cas_retries",
                reason: "must allow at least one attempt",
            });
        }

        self.endpoint().map(|_| ())
    }

    /// Resolve the endpoint string against the configured namespace.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.endpoint, &self.namespace)
    }
}
