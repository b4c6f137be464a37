//! Resource and command error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the resource layer
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Command `{command}` did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Descriptor field missing: {0}")]
    MissingField(String),

    #[error("Unexpected reply for {field}: {reply}")]
    UnexpectedReply { field: String, reply: String },

    #[error("Login timed out: {0}")]
    LoginTimeout(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Remote access failed: {0}")]
    Remote(String),

    #[error("VM is not alive: {0}")]
    VmDead(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
