//! Controller configuration.
//!
//! # Example
//!
//! ```
//! use lattice_bind::{ConsistencyPolicy, ControllerConfig};
//!
//! let config = ControllerConfig::from_toml_str(r#"
//!     consistency = "latest_only"
//!     clear_error_on_success = false
//! "#).unwrap();
//!
//! assert_eq!(config.consistency, ConsistencyPolicy::LatestOnly);
//! assert!(!config.clear_error_on_success);
//! ```

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::{BindError, Result};

/// How completions of superseded primary queries are treated.
///
/// Neither policy cancels an in-flight request; they only decide whether its
/// result may still be written once a newer request has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// Every completion writes state; the last one to arrive wins.
    #[default]
    LastWriteWins,
    /// Only the most recently issued request may write state.
    LatestOnly,
}

/// Configuration for a [`DataController`](crate::DataController).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Treatment of superseded primary query completions.
    pub consistency: ConsistencyPolicy,
    /// Whether a successful primary query clears a previous error.
    pub clear_error_on_success: bool,
    /// Runtime used to drive request tasks. Defaults to the runtime current
    /// at the time a request is issued.
    #[serde(skip)]
    pub runtime: Option<Handle>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            consistency: ConsistencyPolicy::LastWriteWins,
            clear_error_on_success: true,
            runtime: None,
        }
    }
}

impl ControllerConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Set the consistency policy.
    pub fn with_consistency(mut self, consistency: ConsistencyPolicy) -> Self {
        self.consistency = consistency;
        self
    }

    /// Set whether success clears a previous error.
    pub fn with_clear_error_on_success(mut self, clear: bool) -> Self {
        self.clear_error_on_success = clear;
        self
    }

    /// Use a specific runtime for request tasks.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// The runtime to spawn request tasks on.
    pub(crate) fn runtime_handle(&self) -> Result<Handle> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| BindError::NoRuntime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.consistency, ConsistencyPolicy::LastWriteWins);
        assert!(config.clear_error_on_success);
        assert!(config.runtime.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config.consistency, ConsistencyPolicy::LastWriteWins);
        assert!(config.clear_error_on_success);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ControllerConfig::from_toml_str("consistency = \"sometimes\"").unwrap_err();
        assert!(matches!(err, BindError::Config(_)));
    }

    #[test]
    fn test_no_runtime_outside_tokio() {
        let config = ControllerConfig::default();
        assert_eq!(config.runtime_handle().unwrap_err(), BindError::NoRuntime);
    }
}
