use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::RetryOptions;

/// Engine configuration loaded at startup.
///
/// Establishes the configuration contract for embedding applications. Values
/// are plain serde data so they can be hydrated from TOML/JSON files or
/// environment variables by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterConfig {
    /// Directory path of the scheduling namespace within the store.
    pub namespace: Vec<String>,
    /// Bounds on the transaction retry loop.
    pub retry: RetryConfig,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            namespace: vec!["scheduling".into()],
            retry: RetryConfig::default(),
        }
    }
}

impl RosterConfig {
    /// The namespace path in the borrowed form the store contract expects.
    pub fn namespace_path(&self) -> Vec<&str> {
        self.namespace.iter().map(String::as_str).collect()
    }
}

/// Retry bounds in config form; see [`RetryOptions`] for the runtime shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub retry_limit: u32,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryOptions::default();
        Self {
            retry_limit: defaults.retry_limit,
            timeout_ms: defaults.timeout.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn options(&self) -> RetryOptions {
        RetryOptions {
            retry_limit: self.retry_limit,
            timeout: Duration::from_millis(self.timeout_ms),
            deadline: None,
        }
    }
}
