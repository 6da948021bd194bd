//! Error types for the patchboard runtime.
//!
//! Patch application is fail-soft: an individual patch that cannot be
//! applied is logged and skipped while the rest of the batch continues. These types carry enough context for that logging and for
//! the structured error bodies the agent surface returns.

use thiserror::Error;

/// Errors raised while applying a single patch.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("path '{path}' does not resolve: {reason}")]
    Addressing { path: String, reason: String },

    #[error("value at '{path}' failed validation: {reason}")]
    Shape { path: String, reason: String },

    #[error("template '{expr}' could not be expanded: {reason}")]
    Template { expr: String, reason: String },
}

impl PatchError {
    pub fn addressing(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Addressing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Shape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the instance store and the agent surface.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("unknown instance '{instance}'")]
    UnknownInstance { instance: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the external API action executor.
#[derive(Error, Debug)]
pub enum ApiCallError {
    #[error("request to '{url}' timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("request to '{url}' failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },
}
