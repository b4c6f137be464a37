//! Virtual machine resource
//!
//! One [`VirtualMachine`] type serves both management models; the mode of
//! the CLI handle it is built from selects the [`Vocabulary`] used for every
//! command.

use crate::auth::AuthSession;
use crate::cli::AzureCli;
use crate::remote::{
    RemoteAccess, SessionRequest, ShellConfig, ShellSession, TransferDirection, TransferRequest,
    session_log_path, transfer_log_path,
};
use crate::ssh::Ssh2Access;
use crate::vocab::{CaptureParams, DiskParams, Vocabulary, VmSpec};
use async_trait::async_trait;
use azlab_cloud::{
    CloudError, CommandOutput, DEFAULT_TIMEOUT, Descriptor, ExitStatus, Invocation, Mode,
    Resource, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const COPY_FILES_TIMEOUT: Duration = Duration::from_secs(600);
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(240);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(240);

/// Power/provisioning state as reported by show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Provisioning,
    Running,
    Stopping,
    Stopped,
    Deallocating,
    Deallocated,
    Deleting,
    Unknown,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PowerState::Provisioning => "provisioning",
            PowerState::Running => "running",
            PowerState::Stopping => "stopping",
            PowerState::Stopped => "stopped",
            PowerState::Deallocating => "deallocating",
            PowerState::Deallocated => "deallocated",
            PowerState::Deleting => "deleting",
            PowerState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// An endpoint from `Network.Endpoints`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub name: String,
    pub port: Option<u16>,
    #[serde(rename = "localPort")]
    pub local_port: Option<u16>,
    pub protocol: Option<String>,
}

/// A data disk from `DataDisks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDisk {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "logicalUnitNumber", default)]
    pub lun: u32,
    #[serde(rename = "logicalDiskSizeInGB")]
    pub size_gb: Option<u64>,
    #[serde(rename = "hostCaching")]
    pub host_caching: Option<String>,
    #[serde(rename = "mediaLink")]
    pub media_link: Option<String>,
}

/// Typed view over a VM descriptor
#[derive(Debug, Clone, Copy)]
pub struct VmInfo<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> VmInfo<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.descriptor
            .get_str("VMName")
            .or_else(|| self.descriptor.get_str("name"))
    }

    pub fn dns_name(&self) -> Option<&'a str> {
        self.descriptor.get_str("DNSName")
    }

    pub fn location(&self) -> Option<&'a str> {
        self.descriptor
            .get_str("Location")
            .or_else(|| self.descriptor.get_str("location"))
    }

    pub fn size(&self) -> Option<&'a str> {
        self.descriptor
            .get_str("InstanceSize")
            .or_else(|| self.descriptor.get_str("hardwareProfile.vmSize"))
    }

    pub fn image(&self) -> Option<&'a str> {
        self.descriptor.get_str("Image")
    }

    /// `VirtualIPAddresses[0].address`
    pub fn public_address(&self) -> Result<&'a str> {
        self.descriptor.require_str("VirtualIPAddresses.0.address")
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.descriptor
            .get("Network.Endpoints")
            .unwrap_or_default()
    }

    pub fn data_disks(&self) -> Vec<DataDisk> {
        self.descriptor.get("DataDisks").unwrap_or_default()
    }
}

/// SELinux mode of a guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelinuxMode {
    Enforcing,
    Permissive,
    Disabled,
}

impl std::fmt::Display for SelinuxMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelinuxMode::Enforcing => write!(f, "Enforcing"),
            SelinuxMode::Permissive => write!(f, "Permissive"),
            SelinuxMode::Disabled => write!(f, "Disabled"),
        }
    }
}

impl FromStr for SelinuxMode {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Enforcing" | "1" => Ok(SelinuxMode::Enforcing),
            "Permissive" | "0" => Ok(SelinuxMode::Permissive),
            "Disabled" => Ok(SelinuxMode::Disabled),
            other => Err(CloudError::UnexpectedReply {
                field: "getenforce".to_string(),
                reply: other.to_string(),
            }),
        }
    }
}

/// A cloud VM and the guest sessions opened to it
pub struct VirtualMachine {
    spec: VmSpec,
    cli: AzureCli,
    vocab: Arc<dyn Vocabulary>,
    descriptor: Descriptor,
    remote: Arc<dyn RemoteAccess>,
    shell: ShellConfig,
    log_dir: PathBuf,
    sessions: Vec<Box<dyn ShellSession>>,
}

impl std::fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("spec", &self.spec)
            .field("mode", &self.cli.mode())
            .field("descriptor", &self.descriptor)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl VirtualMachine {
    /// Bind a VM to an authenticated session
    pub fn new(auth: &AuthSession, spec: VmSpec) -> Self {
        Self::with_cli(auth.cli().clone(), spec)
    }

    pub fn with_cli(cli: AzureCli, spec: VmSpec) -> Self {
        tracing::info!("Azure VM '{}' ({})", spec.name, cli.mode());
        Self {
            vocab: cli.vocabulary(),
            spec,
            cli,
            descriptor: Descriptor::empty(),
            remote: Arc::new(Ssh2Access::new()),
            shell: ShellConfig::default(),
            log_dir: std::env::temp_dir().join("azlab"),
            sessions: Vec::new(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteAccess>) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_shell_config(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Seed the descriptor instead of reading it with show
    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn spec(&self) -> &VmSpec {
        &self.spec
    }

    pub fn info(&self) -> VmInfo<'_> {
        VmInfo::new(&self.descriptor)
    }

    /// Sessions opened by [`login`](Self::login), oldest first
    pub fn sessions(&self) -> &[Box<dyn ShellSession>] {
        &self.sessions
    }

    async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        self.cli.run(invocation).await
    }

    async fn show(&self) -> Result<CommandOutput> {
        self.run(self.vocab.vm_show(self.cli.command(), &self.spec))
            .await
    }

    pub async fn start(&self) -> Result<ExitStatus> {
        tracing::info!("Starting VM {}", self.spec.name);
        let output = self
            .run(self.vocab.vm_start(self.cli.command(), &self.spec))
            .await?;
        Ok(output.status)
    }

    pub async fn shutdown(&self) -> Result<ExitStatus> {
        tracing::info!("Shutting down VM {}", self.spec.name);
        let output = self
            .run(self.vocab.vm_shutdown(self.cli.command(), &self.spec))
            .await?;
        Ok(output.status)
    }

    /// Restart the VM; `timeout` bounds the restart command
    pub async fn restart(&self, timeout: Duration) -> Result<ExitStatus> {
        tracing::info!("Restarting VM {}", self.spec.name);
        let output = self
            .run(
                self.vocab
                    .vm_restart(self.cli.command(), &self.spec)
                    .timeout(timeout),
            )
            .await?;
        Ok(output.status)
    }

    /// Capture the VM into the OS image `image`
    pub async fn capture(
        &self,
        image: &str,
        params: &CaptureParams,
        timeout: Duration,
    ) -> Result<ExitStatus> {
        tracing::info!("Capturing VM {} as {}", self.spec.name, image);
        let output = self
            .run(
                self.vocab
                    .vm_capture(self.cli.command(), &self.spec, image, params)
                    .timeout(timeout),
            )
            .await?;
        Ok(output.status)
    }

    /// Attach a new empty data disk of `size_gb`
    pub async fn disk_attach_new(&self, size_gb: u32, params: &DiskParams) -> Result<ExitStatus> {
        tracing::info!("Attaching {}GB disk to VM {}", size_gb, self.spec.name);
        let output = self
            .run(
                self.vocab
                    .vm_disk_attach_new(self.cli.command(), &self.spec, size_gb, params),
            )
            .await?;
        Ok(output.status)
    }

    pub fn data_disks(&self) -> Vec<DataDisk> {
        self.info().data_disks()
    }

    pub fn public_address(&self) -> Result<String> {
        self.info().public_address().map(str::to_string)
    }

    pub fn management_port(&self) -> Result<u16> {
        self.vocab.management_port(&self.spec, &self.descriptor)
    }

    /// State recorded in the current descriptor
    pub fn power_state(&self) -> PowerState {
        self.vocab.power_state(&self.descriptor)
    }

    async fn refreshed_state(&mut self) -> Result<PowerState> {
        self.refresh(None).await?;
        Ok(self.power_state())
    }

    pub async fn is_running(&mut self) -> Result<bool> {
        Ok(self.refreshed_state().await? == PowerState::Running)
    }

    pub async fn is_stopped(&mut self) -> Result<bool> {
        Ok(self.refreshed_state().await? == PowerState::Stopped)
    }

    pub async fn is_deallocated(&mut self) -> Result<bool> {
        Ok(self.refreshed_state().await? == PowerState::Deallocated)
    }

    /// Fail with [`CloudError::VmDead`] unless the VM is running
    pub async fn verify_alive(&mut self) -> Result<()> {
        match self.refreshed_state().await? {
            PowerState::Running => Ok(()),
            state => Err(CloudError::VmDead(format!(
                "{} is {}",
                self.spec.name, state
            ))),
        }
    }

    /// Open a new guest shell and record it.
    ///
    /// `username`/`password` default to the VM's guest credentials.
    pub async fn login(
        &mut self,
        timeout: Duration,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<&mut dyn ShellSession> {
        let request = SessionRequest {
            client: self.shell.client.clone(),
            address: self.public_address()?,
            port: self.management_port()?,
            username: username.unwrap_or(self.spec.username.as_str()).to_string(),
            password: password.unwrap_or(self.spec.password.as_str()).to_string(),
            prompt: self.shell.prompt.clone(),
            linesep: self.shell.linesep.clone(),
            status_test_command: self.shell.status_test_command.clone(),
            timeout,
            log_file: session_log_path(&self.log_dir, &self.spec.name),
        };
        tracing::debug!(
            "Login {}@{}:{} (log {})",
            request.username,
            request.address,
            request.port,
            request.log_file.display()
        );

        let mut session = self.remote.open_session(&request).await?;
        session.set_status_test_command(&self.shell.status_test_command);
        self.sessions.push(session);

        let last = self.sessions.len() - 1;
        Ok(self.sessions[last].as_mut())
    }

    /// Latest open session, logging in when there is none
    async fn active_session(&mut self) -> Result<&mut dyn ShellSession> {
        match self.sessions.iter().rposition(|s| !s.is_closed()) {
            Some(i) => Ok(self.sessions[i].as_mut()),
            None => self.login(LOGIN_TIMEOUT, None, None).await,
        }
    }

    /// Close every recorded session
    pub async fn close_sessions(&mut self) -> Result<()> {
        for session in self.sessions.iter_mut().filter(|s| !s.is_closed()) {
            session.close().await?;
        }
        Ok(())
    }

    pub async fn getenforce(&mut self) -> Result<SelinuxMode> {
        let output = self
            .active_session()
            .await?
            .cmd_output("getenforce", DEFAULT_TIMEOUT)
            .await?;
        output.trim().parse()
    }

    /// Switch SELinux between enforcing and permissive
    pub async fn setenforce(&mut self, mode: SelinuxMode) -> Result<()> {
        let flag = match mode {
            SelinuxMode::Enforcing => "1",
            SelinuxMode::Permissive => "0",
            SelinuxMode::Disabled => {
                return Err(CloudError::InvalidConfig(
                    "SELinux cannot be disabled at runtime".to_string(),
                ));
            }
        };
        let command = format!("setenforce {}", flag);
        let (status, output) = self
            .active_session()
            .await?
            .cmd_status_output(&command, DEFAULT_TIMEOUT)
            .await?;
        if status != 0 {
            return Err(CloudError::CommandFailed {
                command,
                status,
                stderr: output,
            });
        }
        Ok(())
    }

    fn transfer(
        &self,
        direction: TransferDirection,
        local: &Path,
        remote: &str,
        rate_limit: Option<u64>,
        timeout: Duration,
    ) -> Result<TransferRequest> {
        let address = self.public_address()?;
        Ok(TransferRequest {
            client: self.shell.file_transfer_client.clone(),
            direction,
            log_file: transfer_log_path(&self.log_dir, &self.spec.name, direction, &address),
            address,
            port: self.management_port()?,
            username: self.spec.username.clone(),
            password: self.spec.password.clone(),
            local_path: local.to_path_buf(),
            remote_path: remote.to_string(),
            rate_limit,
            timeout,
        })
    }

    /// Send a local file to the guest
    pub async fn copy_files_to(
        &self,
        local: &Path,
        remote: &str,
        rate_limit: Option<u64>,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("sending file(s) to '{}'", self.spec.name);
        let request = self.transfer(TransferDirection::To, local, remote, rate_limit, timeout)?;
        self.remote.copy_to(&request).await
    }

    /// Fetch a guest file to the local host
    pub async fn copy_files_from(
        &self,
        remote: &str,
        local: &Path,
        rate_limit: Option<u64>,
        timeout: Duration,
    ) -> Result<()> {
        tracing::info!("receiving file(s) from '{}'", self.spec.name);
        let request = self.transfer(TransferDirection::From, local, remote, rate_limit, timeout)?;
        self.remote.copy_from(&request).await
    }
}

#[async_trait]
impl Resource for VirtualMachine {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn mode(&self) -> Mode {
        self.vocab.mode()
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    async fn exists(&self) -> Result<bool> {
        let output = self.show().await?;
        Ok(!output.stdout.is_sentinel(self.vocab.not_found()))
    }

    async fn create(&mut self, options: &[String]) -> Result<Option<ExitStatus>> {
        if self.exists().await? {
            tracing::info!("VM {} already exists", self.spec.name);
            return Ok(None);
        }
        tracing::info!("Creating VM {}", self.spec.name);
        let output = self
            .run(self.vocab.vm_create(self.cli.command(), &self.spec, options))
            .await?;
        Ok(Some(output.status))
    }

    async fn refresh(&mut self, params: Option<Descriptor>) -> Result<()> {
        self.descriptor = match params {
            Some(descriptor) => descriptor,
            None => Descriptor::from_reply(&self.show().await?.stdout),
        };
        Ok(())
    }

    async fn delete(&mut self, timeout: Duration) -> Result<ExitStatus> {
        tracing::info!("Deleting VM {}", self.spec.name);
        let output = self
            .run(
                self.vocab
                    .vm_delete(self.cli.command(), &self.spec)
                    .timeout(timeout),
            )
            .await?;
        Ok(output.status)
    }
}
