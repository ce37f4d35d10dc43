//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Knobs for [`crate::ExpressionEvaluator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// When false every property keeps its keyframed value.
    pub enabled: bool,
    /// Fail the whole script on the first statement error instead of dropping the statement.
    pub strict: bool,
    /// Maximum number of memoized scripts. The cache is flushed when it fills up.
    pub cache_capacity: usize,
    /// Emit a `trace!` event for every executed top-level statement.
    pub trace_statements: bool,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
            cache_capacity: 256,
            trace_statements: false,
        }
    }
}

impl ExpressionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ExpressionConfig::from_json_str(r#"{ "strict": true }"#).unwrap();
        assert!(config.strict);
        assert!(config.enabled);
        assert_eq!(config.cache_capacity, 256);
        assert!(!config.trace_statements);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let err = ExpressionConfig::from_json_str(r#"{ "strict": "yes" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
