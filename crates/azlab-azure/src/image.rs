//! OS image resource
//!
//! Mostly used to verify and clean up after [`VirtualMachine::capture`].
//!
//! [`VirtualMachine::capture`]: crate::vm::VirtualMachine::capture

use crate::auth::AuthSession;
use crate::cli::AzureCli;
use async_trait::async_trait;
use azlab_cloud::{CommandOutput, Descriptor, ExitStatus, Invocation, Mode, Resource, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters an image is registered from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSpec {
    pub name: String,
    /// VHD the image is registered from
    pub blob_url: Option<String>,
    /// "Linux" or "Windows"
    pub os: Option<String>,
    pub location: Option<String>,
    pub label: Option<String>,
    /// Also delete the backing VHD on delete
    pub blob_delete: bool,
}

/// A named OS image
#[derive(Debug, Clone)]
pub struct VmImage {
    spec: ImageSpec,
    cli: AzureCli,
    descriptor: Descriptor,
}

impl VmImage {
    pub fn new(auth: &AuthSession, spec: ImageSpec) -> Self {
        Self::with_cli(auth.cli().clone(), spec)
    }

    pub fn with_cli(cli: AzureCli, spec: ImageSpec) -> Self {
        Self {
            spec,
            cli,
            descriptor: Descriptor::empty(),
        }
    }

    fn command(&self, verb: &str) -> Invocation {
        self.cli
            .command()
            .args(["vm", "image", verb, self.spec.name.as_str()])
    }

    async fn show_output(&self) -> Result<CommandOutput> {
        self.cli.run(self.command("show").json()).await
    }

    pub async fn show(&self) -> Result<Descriptor> {
        Ok(Descriptor::from_reply(&self.show_output().await?.stdout))
    }

    pub fn os(&self) -> Option<&str> {
        self.descriptor.get_str("operatingSystemType")
    }

    pub fn media_link(&self) -> Option<&str> {
        self.descriptor.get_str("mediaLinkUri")
    }
}

#[async_trait]
impl Resource for VmImage {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn mode(&self) -> Mode {
        self.cli.mode()
    }

    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Image show has no "not found" text, so a failed or unstructured show
    /// is the absence signal here.
    async fn exists(&self) -> Result<bool> {
        let output = self.show_output().await?;
        Ok(output.success() && output.stdout.structured().is_some_and(|v| !v.is_null()))
    }

    async fn create(&mut self, options: &[String]) -> Result<Option<ExitStatus>> {
        if self.exists().await? {
            tracing::info!("Image {} already exists", self.spec.name);
            return Ok(None);
        }
        let inv = self
            .command("create")
            .opt("--blob-url", self.spec.blob_url.as_deref())
            .opt("--os", self.spec.os.as_deref())
            .opt("--location", self.spec.location.as_deref())
            .opt("--label", self.spec.label.as_deref())
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
        tracing::info!("Deleting image {}", self.spec.name);
        let inv = self
            .command("delete")
            .switch("--blob-delete", self.spec.blob_delete)
            .timeout(timeout);
        Ok(self.cli.run(inv).await?.status)
    }
}
