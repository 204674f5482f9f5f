//! Error types for modkit-core

use thiserror::Error;

/// Result type alias using modkit-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for modkit
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Module not present in the catalog
    #[error("Unknown module: {namespace}")]
    UnknownModule { namespace: String },

    /// No catalog module owns the given package path
    #[error("No module in the catalog uses package {path}")]
    UnknownPackage { path: String },

    /// Module registered twice
    #[error("Module registered more than once: {namespace}")]
    DuplicateModule { namespace: String },

    /// Prerequisite cycle in the catalog
    #[error("Circular prerequisite detected: {cycle}")]
    CircularPrerequisite { cycle: String },

    /// Compiler symbol that cannot be written as a define
    #[error("Invalid compiler symbol: {symbol:?}")]
    InvalidSymbol { symbol: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unknown module error
    pub fn unknown_module(namespace: impl Into<String>) -> Self {
        Self::UnknownModule {
            namespace: namespace.into(),
        }
    }

    /// Create an unknown package error
    pub fn unknown_package(path: impl Into<String>) -> Self {
        Self::UnknownPackage { path: path.into() }
    }

    /// Create a duplicate module error
    pub fn duplicate_module(namespace: impl Into<String>) -> Self {
        Self::DuplicateModule {
            namespace: namespace.into(),
        }
    }

    /// Create a circular prerequisite error
    pub fn circular_prerequisite(cycle: impl Into<String>) -> Self {
        Self::CircularPrerequisite {
            cycle: cycle.into(),
        }
    }

    /// Create an invalid symbol error
    pub fn invalid_symbol(symbol: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            symbol: symbol.into(),
        }
    }
}
