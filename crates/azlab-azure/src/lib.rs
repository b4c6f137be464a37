//! Azure CLI backed resources for azlab
//!
//! This crate drives the `azure` cross-platform CLI to manage VMs, OS
//! images and storage for lifecycle tests, in either management mode (ASM
//! or ARM).
//!
//! # Features
//!
//! - VM lifecycle: create, start, shutdown, restart, capture, delete
//! - Guest shells and file transfer over SSH/SCP
//! - Storage accounts, containers and blobs, including async blob copy
//!
//! # Requirements
//!
//! - `azure` CLI must be installed (`npm install -g azure-cli`)
//!
//! # Example
//!
//! ```ignore
//! use azlab_azure::{AuthSession, AzureCli, VirtualMachine, VmSpec};
//! use azlab_cloud::{Mode, Resource};
//!
//! let auth = AuthSession::new(AzureCli::process(Mode::Asm), "user@example.com");
//! auth.login("password", PROMPT_TIMEOUT).await?;
//!
//! let mut vm = VirtualMachine::new(&auth, VmSpec::new("vm-test-1", "Small"));
//! vm.create(&[]).await?;
//! vm.start().await?;
//! ```

pub mod auth;
pub mod cli;
pub mod error;
pub mod expect;
pub mod image;
pub mod remote;
pub mod ssh;
pub mod storage;
pub mod vm;
pub mod vocab;

pub use auth::{AuthSession, PROMPT_TIMEOUT};
pub use cli::AzureCli;
pub use error::{AzureError, Result};
pub use image::{ImageSpec, VmImage};
pub use remote::{
    RemoteAccess, SessionRequest, ShellConfig, ShellSession, TransferDirection, TransferRequest,
};
pub use ssh::Ssh2Access;
pub use storage::{
    AccountInfo, AccountSpec, Blob, BlobCopyRequest, BlobInfo, COPY_TIMEOUT, Container,
    ContainerInfo, CopyProgress, CopyState, CopyStatus, StorageAccount, StorageCredentials,
};
pub use vm::{
    COPY_FILES_TIMEOUT, DELETE_TIMEOUT, DataDisk, Endpoint, LOGIN_TIMEOUT, PowerState,
    RESTART_TIMEOUT, SelinuxMode, VirtualMachine, VmInfo,
};
pub use vocab::{ArmVocabulary, AsmVocabulary, CaptureParams, DiskParams, Vocabulary, VmSpec};
