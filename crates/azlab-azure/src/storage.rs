//! Storage account, container and blob resources
//!
//! Storage commands address their target with a connection string (or a
//! SAS token) rather than the CLI's login state. A blob copy is started with
//! one command and completes asynchronously; [`Blob::copy`] polls the copy
//! status of the destination until it settles or the timeout passes.

use crate::auth::AuthSession;
use crate::cli::AzureCli;
use async_trait::async_trait;
use azlab_cloud::{
    CommandOutput, Descriptor, ExitStatus, Invocation, Mode, OperationPoller,
    PollOutcome, Resource, Result, StatusQuery,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time limit for a blob copy to finish
pub const COPY_TIMEOUT: Duration = Duration::from_secs(240);

/// Fragments storage commands print when the target is missing
const MISSING_MARKERS: [&str; 3] = ["doesn't exist", "does not exist", "not found"];

/// A failed show whose output says the target is missing.
///
/// Anything else, including other failures, counts as existence.
fn reports_missing(output: &CommandOutput) -> bool {
    if output.success() {
        return false;
    }
    let text = format!(
        "{} {}",
        output.stdout.text().unwrap_or_default(),
        output.stderr
    )
    .to_lowercase();
    MISSING_MARKERS.iter().any(|m| text.contains(m))
}

/// How storage commands authenticate against the account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageCredentials {
    pub connection_string: Option<String>,
    pub sas: Option<String>,
}

impl StorageCredentials {
    pub fn connection_string(value: impl Into<String>) -> Self {
        Self {
            connection_string: Some(value.into()),
            sas: None,
        }
    }

    fn apply(&self, invocation: Invocation) -> Invocation {
        invocation
            .secret_opt("--sas", self.sas.as_deref())
            .secret_opt("--connection-string", self.connection_string.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Storage account
// ---------------------------------------------------------------------------

/// Parameters a storage account is created from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSpec {
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub affinity_group: Option<String>,
    pub location: Option<String>,
    /// Replication type, e.g. "LRS" (ASM) or sku name "Standard_LRS" (ARM)
    pub account_type: Option<String>,
    /// Resource group (ARM only)
    pub resource_group: Option<String>,
}

/// Typed view over a storage account descriptor
#[derive(Debug, Clone, Copy)]
pub struct AccountInfo<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> AccountInfo<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> Result<&'a str> {
        self.descriptor.require_str("name")
    }

    pub fn location(&self) -> Option<&'a str> {
        self.descriptor
            .get_str("properties.location")
            .or_else(|| self.descriptor.get_str("location"))
    }

    pub fn account_type(&self) -> Option<&'a str> {
        self.descriptor
            .get_str("properties.accountType")
            .or_else(|| self.descriptor.get_str("sku.name"))
    }

    pub fn status(&self) -> Option<&'a str> {
        self.descriptor.get_str("properties.status")
    }

    /// Service endpoints (blob, queue, table, file)
    pub fn endpoints(&self) -> Vec<String> {
        self.descriptor
            .get("properties.endpoints")
            .unwrap_or_default()
    }
}

/// A storage account with its keys and connection string
#[derive(Debug, Clone)]
pub struct StorageAccount {
    spec: AccountSpec,
    cli: AzureCli,
    descriptor: Descriptor,
    keys: Descriptor,
    connection_string: Option<String>,
}

impl StorageAccount {
    pub fn new(auth: &AuthSession, spec: AccountSpec) -> Self {
        Self::with_cli(auth.cli().clone(), spec)
    }

    pub fn with_cli(cli: AzureCli, spec: AccountSpec) -> Self {
        tracing::info!("Azure Storage Account '{}'", spec.name);
        Self {
            spec,
            cli,
            descriptor: Descriptor::empty(),
            keys: Descriptor::empty(),
            connection_string: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn spec(&self) -> &AccountSpec {
        &self.spec
    }

    pub fn info(&self) -> AccountInfo<'_> {
        AccountInfo::new(&self.descriptor)
    }

    /// Keys read by the last full refresh
    pub fn keys(&self) -> &Descriptor {
        &self.keys
    }

    /// Connection string read by the last full refresh
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// Credentials for containers and blobs in this account
    pub fn credentials(&self) -> Option<StorageCredentials> {
        self.connection_string
            .as_ref()
            .map(StorageCredentials::connection_string)
    }

    fn command(&self, verb: &[&str]) -> Invocation {
        let inv = self
            .cli
            .command()
            .args(["storage", "account"])
            .args(verb.iter().copied());
        match self.cli.mode() {
            Mode::Arm => inv.opt("--resource-group", self.spec.resource_group.as_deref()),
            Mode::Asm => inv,
        }
    }

    /// Whether the account name is already taken
    pub async fn check_exists(&self) -> Result<bool> {
        let value = self
            .cli
            .run_checked(
                self.cli
                    .command()
                    .args(["storage", "account", "check", self.spec.name.as_str()])
                    .json(),
            )
            .await?
            .into_structured("storage account check")?;
        Ok(Descriptor::new(value).get_bool("nameAvailable") == Some(false))
    }

    pub async fn show(&self) -> Result<Descriptor> {
        let output = self
            .cli
            .run(self.command(&["show", self.spec.name.as_str()]).json())
            .await?;
        Ok(Descriptor::from_reply(&output.stdout))
    }

    pub async fn keys_list(&self) -> Result<Descriptor> {
        let value = self
            .cli
            .run_checked(self.command(&["keys", "list", self.spec.name.as_str()]).json())
            .await?
            .into_structured("storage account keys list")?;
        Ok(Descriptor::new(value))
    }

    pub async fn connection_string_show(&self) -> Result<String> {
        let value = self
            .cli
            .run_checked(
                self.command(&["connectionstring", "show", self.spec.name.as_str()])
                    .json(),
            )
            .await?
            .into_structured("storage account connectionstring show")?;
        Descriptor::new(value)
            .require_str("string")
            .map(str::to_string)
    }
}

#[async_trait]
impl Resource for StorageAccount {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn mode(&self) -> Mode {
        self.cli.mode()
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    async fn exists(&self) -> Result<bool> {
        self.check_exists().await
    }

    async fn create(&mut self, options: &[String]) -> Result<Option<ExitStatus>> {
        if self.exists().await? {
            tracing::info!("Storage account {} already exists", self.spec.name);
            return Ok(None);
        }
        let inv = self
            .command(&["create", self.spec.name.as_str()])
            .opt("--label", self.spec.label.as_deref())
            .opt("--description", self.spec.description.as_deref())
            .opt("--affinity-group", self.spec.affinity_group.as_deref())
            .opt("--location", self.spec.location.as_deref());
        let inv = match self.cli.mode() {
            Mode::Asm => inv.opt("--type", self.spec.account_type.as_deref()),
            Mode::Arm => inv
                .opt("--sku-name", self.spec.account_type.as_deref())
                .opt("--kind", Some("Storage")),
        };
        let output = self.cli.run(inv.args(options.iter().cloned())).await?;
        Ok(Some(output.status))
    }

    async fn refresh(&mut self, params: Option<Descriptor>) -> Result<()> {
        match params {
            Some(descriptor) => self.descriptor = descriptor,
            None => {
                self.descriptor = self.show().await?;
                self.keys = self.keys_list().await?;
                self.connection_string = Some(self.connection_string_show().await?);
            }
        }
        Ok(())
    }

    async fn delete(&mut self, timeout: Duration) -> Result<ExitStatus> {
        tracing::info!("Deleting storage account {}", self.spec.name);
        let output = self
            .cli
            .run(
                self.command(&["delete", self.spec.name.as_str()])
                    .arg("--quiet")
                    .timeout(timeout),
            )
            .await?;
        Ok(output.status)
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Typed view over a container descriptor
#[derive(Debug, Clone, Copy)]
pub struct ContainerInfo<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> ContainerInfo<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> Result<&'a str> {
        self.descriptor.require_str("name")
    }

    pub fn public_access_level(&self) -> Option<&'a str> {
        self.descriptor.get_str("publicAccessLevel")
    }

    pub fn lease_state(&self) -> Option<&'a str> {
        self.descriptor.get_str("leaseState")
    }
}

/// A blob container
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    cli: AzureCli,
    credentials: StorageCredentials,
    permission: Option<String>,
    descriptor: Descriptor,
}

impl Container {
    pub fn new(cli: AzureCli, name: impl Into<String>, credentials: StorageCredentials) -> Self {
        let name = name.into();
        tracing::info!("Azure Storage Container '{}'", name);
        Self {
            name,
            cli,
            credentials,
            permission: None,
            descriptor: Descriptor::empty(),
        }
    }

    /// Construct and read the descriptor with show
    pub async fn open(
        cli: AzureCli,
        name: impl Into<String>,
        credentials: StorageCredentials,
    ) -> Result<Self> {
        let mut container = Self::new(cli, name, credentials);
        container.refresh(None).await?;
        Ok(container)
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Public access level used on create ("Off", "Blob", "Container")
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn credentials(&self) -> &StorageCredentials {
        &self.credentials
    }

    pub fn info(&self) -> ContainerInfo<'_> {
        ContainerInfo::new(&self.descriptor)
    }

    fn command(&self, verb: &str) -> Invocation {
        let inv = self
            .cli
            .command()
            .args(["storage", "container", verb, "--container", self.name.as_str()]);
        self.credentials.apply(inv)
    }

    async fn show_output(&self) -> Result<CommandOutput> {
        self.cli.run(self.command("show").json()).await
    }

    pub async fn show(&self) -> Result<Descriptor> {
        Ok(Descriptor::from_reply(&self.show_output().await?.stdout))
    }

    /// Open a handle on a blob in this container
    pub fn blob(&self, name: impl Into<String>) -> Blob {
        Blob::new(
            self.cli.clone(),
            name,
            self.name.clone(),
            self.credentials.clone(),
        )
    }
}

#[async_trait]
impl Resource for Container {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        self.cli.mode()
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    async fn exists(&self) -> Result<bool> {
        Ok(!reports_missing(&self.show_output().await?))
    }

    async fn create(&mut self, options: &[String]) -> Result<Option<ExitStatus>> {
        if self.exists().await? {
            tracing::info!("Container {} already exists", self.name);
            return Ok(None);
        }
        let inv = self
            .command("create")
            .opt("--permission", self.permission.as_deref())
            .args(options.iter().cloned());
        Ok(Some(self.cli.run(inv).await?.status))
    }

    async fn refresh(&mut self, params: Option<Descriptor>) -> Result<()> {
        self.descriptor = match params {
            Some(descriptor) => descriptor,
            None => self.show().await?,
        };
        Ok(())
    }

    async fn delete(&mut self, timeout: Duration) -> Result<ExitStatus> {
        tracing::info!("Deleting container {}", self.name);
        let output = self
            .cli
            .run(self.command("delete").arg("--quiet").timeout(timeout))
            .await?;
        Ok(output.status)
    }
}

// ---------------------------------------------------------------------------
// Blob and copy
// ---------------------------------------------------------------------------

/// Copy status reported in `copyStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyStatus {
    Queued,
    Pending,
    Success,
    Aborted,
    Failed,
    Other(String),
}

impl CopyStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => CopyStatus::Queued,
            "pending" => CopyStatus::Pending,
            "success" => CopyStatus::Success,
            "aborted" => CopyStatus::Aborted,
            "failed" => CopyStatus::Failed,
            _ => CopyStatus::Other(s.trim().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CopyStatus::Success | CopyStatus::Aborted | CopyStatus::Failed
        )
    }

    /// Position in queued -> pending -> terminal
    fn rank(&self) -> u8 {
        match self {
            CopyStatus::Other(_) => 0,
            CopyStatus::Queued => 1,
            CopyStatus::Pending => 2,
            CopyStatus::Success | CopyStatus::Aborted | CopyStatus::Failed => 3,
        }
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyStatus::Queued => write!(f, "queued"),
            CopyStatus::Pending => write!(f, "pending"),
            CopyStatus::Success => write!(f, "success"),
            CopyStatus::Aborted => write!(f, "aborted"),
            CopyStatus::Failed => write!(f, "failed"),
            CopyStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// `copyProgress` as bytes copied / total bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyProgress {
    pub done: u64,
    pub total: u64,
}

impl CopyProgress {
    pub fn parse(s: &str) -> Option<Self> {
        let (done, total) = s.trim().split_once('/')?;
        Some(Self {
            done: done.trim().parse().ok()?,
            total: total.trim().parse().ok()?,
        })
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.done as f64 / self.total as f64
    }
}

/// Latest snapshot of a blob copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyState {
    pub status: CopyStatus,
    pub progress: Option<CopyProgress>,
    pub completion_time: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl CopyState {
    fn started() -> Self {
        Self {
            status: CopyStatus::Queued,
            progress: None,
            completion_time: None,
            observed_at: Utc::now(),
        }
    }

    /// Take `observed` unless it would move the copy backwards
    pub fn advance(&mut self, observed: &BlobInfo<'_>) -> bool {
        let status = observed
            .copy_status()
            .map(CopyStatus::parse)
            .unwrap_or(CopyStatus::Other(String::new()));
        let forward = status.rank() > self.status.rank()
            || (status.rank() == self.status.rank() && !self.status.is_terminal());
        if !forward {
            tracing::warn!("Ignoring copy status {} after {}", status, self.status);
            return false;
        }
        self.status = status;
        self.progress = observed.copy_progress();
        self.completion_time = observed.copy_completion_time().map(str::to_string);
        self.observed_at = Utc::now();
        true
    }
}

/// Typed view over a blob descriptor
#[derive(Debug, Clone, Copy)]
pub struct BlobInfo<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> BlobInfo<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    pub fn container(&self) -> Option<&'a str> {
        self.descriptor.get_str("container")
    }

    pub fn blob(&self) -> Option<&'a str> {
        self.descriptor.get_str("blob")
    }

    pub fn blob_type(&self) -> Option<&'a str> {
        self.descriptor.get_str("blobType")
    }

    pub fn content_length(&self) -> Result<u64> {
        self.descriptor.require_u64("contentLength")
    }

    pub fn copy_status(&self) -> Option<&'a str> {
        self.descriptor.get_str("copyStatus")
    }

    pub fn copy_progress(&self) -> Option<CopyProgress> {
        self.descriptor
            .get_str("copyProgress")
            .and_then(CopyProgress::parse)
    }

    pub fn copy_completion_time(&self) -> Option<&'a str> {
        self.descriptor.get_str("copyCompletionTime")
    }

    pub fn copy_source(&self) -> Option<&'a str> {
        self.descriptor.get_str("copySource")
    }
}

/// Where a blob copy reads from and writes to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobCopyRequest {
    pub source_uri: Option<String>,
    pub source_sas: Option<String>,
    pub source_container: Option<String>,
    pub source_blob: Option<String>,
    /// Connection string of the source account
    pub connection_string: Option<String>,
    pub dest_connection_string: Option<String>,
    pub dest_account_name: Option<String>,
    pub dest_sas: Option<String>,
    pub dest_container: Option<String>,
    pub dest_blob: Option<String>,
}

impl BlobCopyRequest {
    /// Copy into `container`/`blob` of the account behind `connection_string`
    pub fn to_blob(
        connection_string: impl Into<String>,
        container: impl Into<String>,
        blob: impl Into<String>,
    ) -> Self {
        Self {
            dest_connection_string: Some(connection_string.into()),
            dest_container: Some(container.into()),
            dest_blob: Some(blob.into()),
            ..Default::default()
        }
    }

    fn start(&self, base: Invocation, options: &[String]) -> Invocation {
        base.args(["storage", "blob", "copy", "start"])
            .args(options.iter().cloned())
            .secret_opt("--source-sas", self.source_sas.as_deref())
            .opt("--source-uri", self.source_uri.as_deref())
            .opt("--source-container", self.source_container.as_deref())
            .opt("--source-blob", self.source_blob.as_deref())
            .secret_opt(
                "--dest-connection-string",
                self.dest_connection_string.as_deref(),
            )
            .secret_opt("--dest-sas", self.dest_sas.as_deref())
            .opt("--dest-container", self.dest_container.as_deref())
            .opt("--dest-blob", self.dest_blob.as_deref())
            .secret_opt("--connection-string", self.connection_string.as_deref())
    }

    fn show(&self, base: Invocation) -> Invocation {
        base.args(["storage", "blob", "copy", "show"])
            .opt("--account-name", self.dest_account_name.as_deref())
            .opt("--container", self.dest_container.as_deref())
            .opt("--blob", self.dest_blob.as_deref())
            .secret_opt("--sas", self.dest_sas.as_deref())
            .secret_opt("--connection-string", self.dest_connection_string.as_deref())
            .json()
    }
}

/// Reads the destination's copy status and folds it into a [`CopyState`]
struct CopyStatusQuery<'a> {
    cli: &'a AzureCli,
    show: Invocation,
    state: CopyState,
}

#[async_trait]
impl StatusQuery for CopyStatusQuery<'_> {
    async fn status(&mut self) -> Result<String> {
        let value = self
            .cli
            .run_checked(self.show.clone())
            .await?
            .into_structured("storage blob copy show")?;
        let descriptor = Descriptor::new(value);
        let status = descriptor.require_str("copyStatus")?.to_string();
        self.state.advance(&BlobInfo::new(&descriptor));
        Ok(status)
    }
}

/// A blob in a container
#[derive(Debug, Clone)]
pub struct Blob {
    name: String,
    container: String,
    cli: AzureCli,
    credentials: StorageCredentials,
    descriptor: Descriptor,
    copy_state: Option<CopyState>,
}

impl Blob {
    pub fn new(
        cli: AzureCli,
        name: impl Into<String>,
        container: impl Into<String>,
        credentials: StorageCredentials,
    ) -> Self {
        let name = name.into();
        tracing::info!("Azure Storage Blob '{}'", name);
        Self {
            name,
            container: container.into(),
            cli,
            credentials,
            descriptor: Descriptor::empty(),
            copy_state: None,
        }
    }

    /// Construct and read the descriptor with show
    pub async fn open(
        cli: AzureCli,
        name: impl Into<String>,
        container: impl Into<String>,
        credentials: StorageCredentials,
    ) -> Result<Self> {
        let mut blob = Self::new(cli, name, container, credentials);
        blob.refresh(None).await?;
        Ok(blob)
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn info(&self) -> BlobInfo<'_> {
        BlobInfo::new(&self.descriptor)
    }

    /// State of the most recent [`copy`](Self::copy)
    pub fn copy_state(&self) -> Option<&CopyState> {
        self.copy_state.as_ref()
    }

    fn command(&self, verb: &str) -> Invocation {
        let inv = self.cli.command().args([
            "storage",
            "blob",
            verb,
            "--container",
            self.container.as_str(),
            "--blob",
            self.name.as_str(),
        ]);
        self.credentials.apply(inv)
    }

    async fn show_output(&self) -> Result<CommandOutput> {
        self.cli.run(self.command("show").json()).await
    }

    pub async fn show(&self) -> Result<Descriptor> {
        Ok(Descriptor::from_reply(&self.show_output().await?.stdout))
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(!reports_missing(&self.show_output().await?))
    }

    pub async fn refresh(&mut self, params: Option<Descriptor>) -> Result<()> {
        self.descriptor = match params {
            Some(descriptor) => descriptor,
            None => self.show().await?,
        };
        Ok(())
    }

    pub async fn delete(&self, timeout: Duration) -> Result<ExitStatus> {
        tracing::info!("Deleting blob {}/{}", self.container, self.name);
        let output = self
            .cli
            .run(self.command("delete").arg("--quiet").timeout(timeout))
            .await?;
        Ok(output.status)
    }

    /// Copy this blob to the destination in `request` and wait up to
    /// `timeout` for the copy to succeed, polling every 10 seconds.
    pub async fn copy(
        &mut self,
        request: BlobCopyRequest,
        options: &[String],
        timeout: Duration,
    ) -> Result<PollOutcome> {
        self.copy_with(request, options, &OperationPoller::new(timeout))
            .await
    }

    /// [`copy`](Self::copy) with a custom poller
    pub async fn copy_with(
        &mut self,
        mut request: BlobCopyRequest,
        options: &[String],
        poller: &OperationPoller,
    ) -> Result<PollOutcome> {
        let info = self.info();
        request.source_container = Some(info.container().unwrap_or(self.container.as_str()).to_string());
        request.source_blob = Some(info.blob().unwrap_or(self.name.as_str()).to_string());
        if request.connection_string.is_none() {
            request.connection_string = self.credentials.connection_string.clone();
        }

        tracing::info!(
            "Copying blob {}/{} to {}/{}",
            self.container,
            self.name,
            request.dest_container.as_deref().unwrap_or("-"),
            request.dest_blob.as_deref().unwrap_or("-")
        );
        self.cli
            .run_checked(request.start(self.cli.command(), options))
            .await?;

        let mut query = CopyStatusQuery {
            cli: &self.cli,
            show: request.show(self.cli.command()),
            state: CopyState::started(),
        };
        let outcome = poller.poll(&mut query).await;
        let state = query.state;
        self.copy_state = Some(state);

        let outcome = outcome?;
        tracing::info!("Blob copy finished polling: {}", outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azlab_cloud::Reply;
    use serde_json::json;

    fn blob_descriptor(status: &str, progress: &str) -> Descriptor {
        Descriptor::new(json!({
            "container": "vhds",
            "blob": "wala68.vhd",
            "contentLength": "8589935104",
            "blobType": "PageBlob",
            "copyStatus": status,
            "copyProgress": progress,
            "copyCompletionTime": "Tue, 12 Apr 2016 03:29:29 GMT"
        }))
    }

    #[test]
    fn test_blob_info() {
        let d = blob_descriptor("success", "8589935104/8589935104");
        let info = BlobInfo::new(&d);
        assert_eq!(info.container(), Some("vhds"));
        assert_eq!(info.content_length().unwrap(), 8_589_935_104);
        assert_eq!(info.copy_progress().unwrap().fraction(), 1.0);
        assert_eq!(
            info.copy_completion_time(),
            Some("Tue, 12 Apr 2016 03:29:29 GMT")
        );
    }

    #[test]
    fn test_copy_progress_parse() {
        assert_eq!(
            CopyProgress::parse("512/2048"),
            Some(CopyProgress { done: 512, total: 2048 })
        );
        assert_eq!(CopyProgress::parse("512/2048").unwrap().fraction(), 0.25);
        assert_eq!(CopyProgress::parse("unknown"), None);
    }

    #[test]
    fn test_copy_state_never_regresses() {
        let mut state = CopyState::started();

        assert!(state.advance(&BlobInfo::new(&blob_descriptor("pending", "1/4"))));
        assert!(state.advance(&BlobInfo::new(&blob_descriptor("pending", "2/4"))));
        assert_eq!(state.progress, Some(CopyProgress { done: 2, total: 4 }));

        assert!(state.advance(&BlobInfo::new(&blob_descriptor("success", "4/4"))));
        assert!(!state.advance(&BlobInfo::new(&blob_descriptor("pending", "1/4"))));
        assert_eq!(state.status, CopyStatus::Success);
        assert_eq!(state.progress, Some(CopyProgress { done: 4, total: 4 }));
    }

    #[test]
    fn test_reports_missing() {
        let output = |status, stderr: &str| CommandOutput {
            command: "azure storage container show".into(),
            status,
            stdout: Reply::Text(String::new()),
            stderr: stderr.into(),
        };
        assert!(reports_missing(&output(1, "error:   Container vhds doesn't exist")));
        assert!(!reports_missing(&output(1, "error:   Server failed to authenticate")));
        assert!(!reports_missing(&output(0, "")));
    }

    #[test]
    fn test_copy_commands_mask_secrets() {
        let mut request = BlobCopyRequest::to_blob(
            "DefaultEndpointsProtocol=https;AccountName=dst;AccountKey=abc",
            "vhds",
            "copy.vhd",
        );
        request.source_container = Some("vhds".into());
        request.source_blob = Some("wala68.vhd".into());

        let start = request.start(Invocation::new("azure"), &["--quiet".to_string()]);
        assert_eq!(&start.arguments()[..5], &["storage", "blob", "copy", "start", "--quiet"]);
        assert!(!start.command_line().contains("AccountKey"));

        let show = request.show(Invocation::new("azure"));
        assert!(show.wants_json());
        assert!(
            show.arguments()
                .windows(2)
                .any(|w| w == ["--blob", "copy.vhd"])
        );
    }

    #[test]
    fn test_copy_status_parse() {
        assert_eq!(CopyStatus::parse("Pending"), CopyStatus::Pending);
        assert!(CopyStatus::parse("failed").is_terminal());
        assert_eq!(
            CopyStatus::parse("weird"),
            CopyStatus::Other("weird".to_string())
        );
    }
}
