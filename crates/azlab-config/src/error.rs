use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Test parameter file not found. Looked in:\n\
        - current directory: azlab.local.yaml, azlab.yaml\n\
        - ./.azlab/ directory\n\
        - ~/.config/azlab/azlab.yaml\n\
        Set AZLAB_PARAMS to point at a file directly"
    )]
    ParamsFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value in {path}: {field} {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
