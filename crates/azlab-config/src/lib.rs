//! Test parameter discovery and loading for azlab

pub mod error;
pub mod params;

pub use error::*;
pub use params::*;

use std::path::{Path, PathBuf};

/// Environment variable naming a parameter file directly
pub const PARAMS_ENV: &str = "AZLAB_PARAMS";

/// Environment variable overriding the session log directory
pub const LOG_DIR_ENV: &str = "AZLAB_LOG_DIR";

/// azlab's config directory (`~/.config/azlab`), created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("azlab");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the test parameter file.
///
/// Search order:
/// 1. `AZLAB_PARAMS`
/// 2. current directory: azlab.local.yaml, azlab.yaml
/// 3. the same names under ./.azlab/
/// 4. ~/.config/azlab/azlab.yaml
pub fn find_params_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(PARAMS_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let candidates = ["azlab.local.yaml", "azlab.yaml"];

    for filename in &candidates {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".azlab");
    if project_dir.is_dir() {
        for filename in &candidates {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("azlab").join("azlab.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ParamsFileNotFound)
}

pub fn load_params(path: &Path) -> Result<TestParams> {
    let content = std::fs::read_to_string(path)?;
    let params: TestParams = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(field) = params.timeouts.invalid_field() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            field,
            reason: "must be at least 1 second",
        });
    }
    Ok(params)
}

/// Locate and load the parameter file
pub fn discover_params() -> Result<(PathBuf, TestParams)> {
    let path = find_params_file()?;
    let params = load_params(&path)?;
    Ok((path, params))
}

/// Where session and transfer logs go (`AZLAB_LOG_DIR`, else the cache dir)
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("azlab")
        .join("logs")
}
