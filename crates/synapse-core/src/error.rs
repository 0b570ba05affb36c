//! Error types for the mitigation core
//!
//! Lookup failures and configuration errors are kept apart so callers can
//! map them to different outcomes (404 vs. fatal startup error).

use thiserror::Error;

/// Main error type for mitigation operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// A component identifier is not tracked
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// A policy gate identifier is not configured
    #[error("Unknown gate: {0}")]
    UnknownGate(String),

    /// Invalid configuration detected at setup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A shared state lock was poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// File access error
    #[error("I/O error: {0}")]
    Io(String),
}

impl CoreError {
    /// Create an unknown component error
    pub fn unknown_component(id: impl Into<String>) -> Self {
        CoreError::UnknownComponent(id.into())
    }

    /// Create an unknown gate error
    pub fn unknown_gate(id: impl Into<String>) -> Self {
        CoreError::UnknownGate(id.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::Config(msg.into())
    }

    /// Create a lock error from a poisoned guard
    pub fn lock<E: std::fmt::Display>(err: E) -> Self {
        CoreError::LockPoisoned(format!("Failed to acquire lock: {}", err))
    }

    /// Whether the error refers to an identifier the caller supplied
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownComponent(_) | CoreError::UnknownGate(_)
        )
    }

    /// Whether the error comes from configuration loading or validation
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CoreError::Config(_) | CoreError::Parse(_) | CoreError::Io(_)
        )
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::Parse(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Parse(format!("TOML error: {}", err))
    }
}

/// Result type alias for mitigation operations
pub type Result<T> = std::result::Result<T, CoreError>;
