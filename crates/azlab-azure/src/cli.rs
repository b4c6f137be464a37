//! azure CLI handle
//!
//! [`AzureCli`] binds a [`CommandRunner`] to a management mode and the
//! profile the CLI keeps its login state in. Every resource is constructed
//! from one, so tests with different credentials never share login state.

use crate::error::{AzureError, Result};
use crate::vocab::{ArmVocabulary, AsmVocabulary, Vocabulary};
use azlab_cloud::{
    CommandOutput, CommandRunner, DEFAULT_TIMEOUT, Invocation, Mode, ProcessRunner,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Default executable name
pub const AZURE_PROGRAM: &str = "azure";

/// Environment variable the CLI reads its profile directory from
const CONFIG_DIR_ENV: &str = "AZURE_CONFIG_DIR";

/// Mode-bound handle on the azure CLI
#[derive(Clone)]
pub struct AzureCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    base_args: Vec<String>,
    mode: Mode,
    config_dir: Option<PathBuf>,
    default_timeout: Duration,
}

impl std::fmt::Debug for AzureCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCli")
            .field("program", &self.program)
            .field("base_args", &self.base_args)
            .field("mode", &self.mode)
            .field("config_dir", &self.config_dir)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl AzureCli {
    pub fn new(runner: Arc<dyn CommandRunner>, mode: Mode) -> Self {
        Self {
            runner,
            program: AZURE_PROGRAM.to_string(),
            base_args: Vec::new(),
            mode,
            config_dir: None,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Handle that runs the CLI as local child processes
    pub fn process(mode: Mode) -> Self {
        Self::new(Arc::new(ProcessRunner::new()), mode)
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before every subcommand (`sh fake-azure.sh ...`)
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Keep login state in a dedicated profile directory
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Command vocabulary for the bound mode
    pub fn vocabulary(&self) -> Arc<dyn Vocabulary> {
        match self.mode {
            Mode::Asm => Arc::new(AsmVocabulary),
            Mode::Arm => Arc::new(ArmVocabulary),
        }
    }

    /// Base invocation every command starts from
    pub fn command(&self) -> Invocation {
        let inv = Invocation::new(self.program.clone()).args(self.base_args.iter().cloned());
        match &self.config_dir {
            Some(dir) => inv.env(CONFIG_DIR_ENV, dir.display().to_string()),
            None => inv,
        }
    }

    /// Run an invocation, applying the default time limit when it has none
    pub async fn run(&self, invocation: Invocation) -> azlab_cloud::Result<CommandOutput> {
        let invocation = match invocation.time_limit() {
            Some(_) => invocation,
            None => invocation.timeout(self.default_timeout),
        };
        self.runner.run(&invocation).await
    }

    /// Run an invocation and fail on a non-zero exit status
    pub async fn run_checked(&self, invocation: Invocation) -> azlab_cloud::Result<CommandOutput> {
        self.run(invocation).await?.check()
    }

    /// Check that the CLI executable is on PATH
    pub async fn check_installed(&self) -> Result<()> {
        let which = Command::new("which").arg(&self.program).output().await?;

        if !which.status.success() {
            return Err(AzureError::CliNotFound);
        }
        Ok(())
    }
}
