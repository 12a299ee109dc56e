// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbebenchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to spawn command '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Template error: {0}")]
    Template(String),

    /// A background sampler observed its stop signal. Expected during
    /// shutdown; callers suppress it.
    #[error("sampler stopped")]
    Stopped,

    /// The run was interrupted. Jobs finished before the interrupt are kept.
    #[error("interrupted")]
    Interrupted,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbebenchError {
    /// True for the cooperative-cancellation outcome of a sampler loop.
    pub fn is_stopped(&self) -> bool {
        matches!(self, ProbebenchError::Stopped)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ProbebenchError::Interrupted)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProbebenchError>;
