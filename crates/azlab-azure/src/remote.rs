//! Remote shell and file transfer seam
//!
//! VMs never talk SSH themselves; they build a [`SessionRequest`] or
//! [`TransferRequest`] and hand it to a [`RemoteAccess`] implementation.
//! Connection and timeout errors from the implementation propagate
//! unchanged.

use async_trait::async_trait;
use azlab_cloud::Result;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shell client settings used for every guest login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell protocol ("ssh")
    pub client: String,

    /// Regex matching the guest shell prompt
    pub prompt: String,

    pub linesep: String,

    /// Command printing the previous command's exit status
    pub status_test_command: String,

    /// File transfer protocol ("scp")
    pub file_transfer_client: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            client: "ssh".to_string(),
            prompt: r"[#$]\s*$".to_string(),
            linesep: "\n".to_string(),
            status_test_command: "echo $?".to_string(),
            file_transfer_client: "scp".to_string(),
        }
    }
}

/// Everything needed to open one shell session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub client: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub prompt: String,
    pub linesep: String,
    pub status_test_command: String,
    pub timeout: Duration,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local to guest
    To,
    /// Guest to local
    From,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDirection::To => write!(f, "to"),
            TransferDirection::From => write!(f, "from"),
        }
    }
}

/// One file copy between the local host and a guest
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub client: String,
    pub direction: TransferDirection,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Bandwidth cap in KiB/s
    pub rate_limit: Option<u64>,
    pub timeout: Duration,
    pub log_file: PathBuf,
}

/// An open guest shell
#[async_trait]
pub trait ShellSession: Send + Sync {
    /// Run `command`, returning its exit status and output
    async fn cmd_status_output(&mut self, command: &str, timeout: Duration)
    -> Result<(i32, String)>;

    /// Run `command` and return only its output
    async fn cmd_output(&mut self, command: &str, timeout: Duration) -> Result<String> {
        Ok(self.cmd_status_output(command, timeout).await?.1)
    }

    fn set_status_test_command(&mut self, command: &str);

    async fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Opens shells and copies files to guests
#[async_trait]
pub trait RemoteAccess: Send + Sync {
    async fn open_session(&self, request: &SessionRequest) -> Result<Box<dyn ShellSession>>;

    async fn copy_to(&self, request: &TransferRequest) -> Result<()>;

    async fn copy_from(&self, request: &TransferRequest) -> Result<()>;
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect()
}

/// `session-<name>-<rand4>.log` under `dir`
pub fn session_log_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("session-{}-{}.log", name, random_suffix()))
}

/// `transfer-<name>-to|from-<address>-<rand4>.log` under `dir`
pub fn transfer_log_path(
    dir: &Path,
    name: &str,
    direction: TransferDirection,
    address: &str,
) -> PathBuf {
    dir.join(format!(
        "transfer-{}-{}-{}-{}.log",
        name,
        direction,
        address,
        random_suffix()
    ))
}
