//! Resource lifecycle contract

use crate::descriptor::Descriptor;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Default time limit for lifecycle commands
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

/// Exit status of a lifecycle command (0 = success)
pub type ExitStatus = i32;

/// Cloud management model a resource is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Service management (classic) model
    Asm,
    /// Resource manager model
    Arm,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Asm => write!(f, "asm"),
            Mode::Arm => write!(f, "arm"),
        }
    }
}

impl FromStr for Mode {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asm" => Ok(Mode::Asm),
            "arm" => Ok(Mode::Arm),
            other => Err(CloudError::InvalidConfig(format!(
                "unknown mode '{}', expected asm or arm",
                other
            ))),
        }
    }
}

/// Lifecycle operations shared by every manageable cloud resource
///
/// Exit statuses are returned as-is; a non-zero status is not an error at
/// this layer. Errors are reserved for failures to run the command at all.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource name
    fn name(&self) -> &str;

    /// Management model fixed at construction
    fn mode(&self) -> Mode;

    /// Last observed snapshot
    fn descriptor(&self) -> &Descriptor;

    /// Whether the resource is not provably absent.
    ///
    /// Only the exact "not found" text reply counts as absence; any other
    /// reply, structured or not, is treated as existence.
    async fn exists(&self) -> Result<bool>;

    /// Create the resource unless it already exists.
    ///
    /// Returns `None` when nothing was issued because the resource exists.
    async fn create(&mut self, options: &[String]) -> Result<Option<ExitStatus>>;

    /// Replace the descriptor, re-reading it when `params` is `None`
    async fn refresh(&mut self, params: Option<Descriptor>) -> Result<()>;

    /// Delete the resource; `timeout` bounds the single command
    async fn delete(&mut self, timeout: Duration) -> Result<ExitStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("ASM".parse::<Mode>().unwrap(), Mode::Asm);
        assert_eq!(" arm ".parse::<Mode>().unwrap(), Mode::Arm);
        assert!("classic".parse::<Mode>().is_err());
        assert_eq!(Mode::Arm.to_string(), "arm");
    }

    #[test]
    fn test_mode_serde() {
        let mode: Mode = serde_json::from_str("\"asm\"").unwrap();
        assert_eq!(mode, Mode::Asm);
        assert_eq!(serde_json::to_string(&Mode::Arm).unwrap(), "\"arm\"");
    }
}
