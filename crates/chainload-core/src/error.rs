//! Error types for Chainload core operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for configuration handling
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fatal configuration errors, raised before a run starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Workflow names a step that has no API definition
    #[error("Workflow step '{0}' has no API definition")]
    MissingStep(String),

    /// Workflow contains no steps
    #[error("Workflow is empty")]
    EmptyWorkflow,

    /// Concurrency must be at least one worker
    #[error("Concurrency must be greater than zero")]
    ZeroConcurrency,

    /// Base URL does not parse as an absolute URL
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// HTTP method not understood
    #[error("Step '{step}' uses an invalid HTTP method '{method}'")]
    InvalidMethod { step: String, method: String },

    /// Configuration source could not be read or decoded
    #[error("Failed to load {source_name}: {reason}")]
    Load { source_name: String, reason: String },
}

impl ConfigError {
    /// Shorthand for a load failure on a named source
    pub fn load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Coarse classification of a failed step, used as the error histogram key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// TCP/TLS connection could not be established
    Connect,
    /// Per-request timeout elapsed
    Timeout,
    /// Request could not be built or sent
    Request,
    /// Response body could not be read
    Body,
    /// Response body is not valid JSON
    Parse,
}

impl ErrorKind {
    /// Stable label for reports and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect_error",
            Self::Timeout => "timeout",
            Self::Request => "request_error",
            Self::Body => "body_error",
            Self::Parse => "parse_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
