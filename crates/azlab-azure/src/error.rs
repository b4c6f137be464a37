//! Azure CLI error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("azure CLI not found. Please install: npm install -g azure-cli")]
    CliNotFound,

    #[error("Not logged in: {0}")]
    NotLoggedIn(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] azlab_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, AzureError>;
