//! Test parameter file schema
//!
//! ```yaml
//! azure:
//!   username: tester@example.com
//!   password: secret
//!   mode: asm
//! vm:
//!   name: vm-test-1
//!   size: Small
//!   image: wala68-20160414
//!   location: East US
//!   username: azureuser
//!   password: Secret123!
//! timeouts:
//!   restart: 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParams {
    pub azure: AzureParams,
    pub vm: VmParams,
    pub shell: ShellParams,
    pub timeouts: Timeouts,
    pub storage: StorageParams,
}

/// Subscription login and CLI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureParams {
    pub username: String,
    pub password: String,
    /// "asm" or "arm"
    pub mode: String,
    /// CLI executable
    pub program: String,
    /// Profile directory for the CLI's login state
    pub config_dir: Option<PathBuf>,
}

impl Default for AzureParams {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            mode: "asm".to_string(),
            program: "azure".to_string(),
            config_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmParams {
    pub name: String,
    pub size: String,
    pub image: String,
    pub location: Option<String>,
    pub dns_name: Option<String>,
    pub username: String,
    pub password: String,
    pub resource_group: Option<String>,
    pub os_type: Option<String>,
    pub ssh_port: Option<u16>,
}

/// Guest shell settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellParams {
    pub client: String,
    pub prompt: String,
    pub linesep: String,
    pub status_test_command: String,
    pub file_transfer_client: String,
}

impl Default for ShellParams {
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

/// Time limits in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub default: u64,
    pub login: u64,
    pub copy_files: u64,
    pub restart: u64,
    pub delete: u64,
    pub blob_copy: u64,
    pub poll_interval: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: 240,
            login: 30,
            copy_files: 600,
            restart: 240,
            delete: 240,
            blob_copy: 240,
            poll_interval: 10,
        }
    }
}

impl Timeouts {
    /// First field that cannot be used as a time limit
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.poll_interval == 0 {
            Some("timeouts.poll_interval")
        } else {
            None
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default)
    }

    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login)
    }

    pub fn copy_files(&self) -> Duration {
        Duration::from_secs(self.copy_files)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_secs(self.restart)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }

    pub fn blob_copy(&self) -> Duration {
        Duration::from_secs(self.blob_copy)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Storage targets for container/blob tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageParams {
    pub account: Option<String>,
    pub account_type: Option<String>,
    pub location: Option<String>,
    pub connection_string: Option<String>,
    pub container: Option<String>,
    pub blob: Option<String>,
    pub dest_connection_string: Option<String>,
    pub dest_container: Option<String>,
    pub dest_blob: Option<String>,
}
