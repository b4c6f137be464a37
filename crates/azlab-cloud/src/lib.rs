//! azlab cloud resource core
//!
//! This crate provides the mode-independent half of azlab: how a cloud
//! resource is described, how commands against it are run, and how
//! long-running operations are waited on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   azlab CLI                      │
//! │          (azlab vm / blob / lifecycle)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 azlab-azure                      │
//! │  VirtualMachine · Blob · Container · Account     │
//! │  AsmVocabulary / ArmVocabulary · AuthSession     │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 azlab-cloud                      │
//! │  ┌──────────────┐ ┌────────────┐ ┌────────────┐ │
//! │  │ trait        │ │ Descriptor │ │ Operation  │ │
//! │  │ Resource     │ │            │ │ Poller     │ │
//! │  └──────────────┘ └────────────┘ └────────────┘ │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │ trait CommandRunner  (ProcessRunner)     │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod descriptor;
pub mod error;
pub mod poll;
pub mod resource;
pub mod runner;

// Re-exports
pub use descriptor::Descriptor;
pub use error::{CloudError, Result};
pub use poll::{
    Backoff, DEFAULT_POLL_INTERVAL, OperationPoller, PENDING_STATUS, PollOutcome, SUCCESS_STATUS,
    StatusQuery,
};
pub use resource::{DEFAULT_TIMEOUT, ExitStatus, Mode, Resource};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner, Reply};
