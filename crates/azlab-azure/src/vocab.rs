//! Per-mode command vocabularies
//!
//! ASM and ARM expose the same VM capabilities under different command
//! shapes. A [`Vocabulary`] turns a capability into the concrete argument
//! list for one mode; the resource types never branch on mode themselves.

use crate::vm::{PowerState, VmInfo};
use azlab_cloud::{CloudError, Descriptor, Invocation, Mode, Result};
use serde::{Deserialize, Serialize};

/// Reply the CLI prints when a VM show finds nothing
pub const VM_NOT_FOUND: &str = "No VMs found";

/// Default SSH port
pub const SSH_PORT: u16 = 22;

/// Parameters a VM is created from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSpec {
    /// VM name
    pub name: String,

    /// Size class (e.g. "Small", "Standard_A1")
    pub size: String,

    /// OS image name (ASM) or image URN (ARM)
    pub image: String,

    /// Cloud service DNS name (ASM); defaults to the VM name
    pub dns_name: Option<String>,

    pub location: Option<String>,

    /// Guest administrator account
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    /// Resource group (ARM only)
    pub resource_group: Option<String>,

    /// Guest OS type (ARM only, "Linux" when unset)
    pub os_type: Option<String>,

    /// Public SSH port
    pub ssh_port: Option<u16>,
}

impl VmSpec {
    pub fn new(name: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            ..Default::default()
        }
    }

    pub fn dns_name(&self) -> &str {
        self.dns_name.as_deref().unwrap_or(&self.name)
    }

    fn resource_group(&self) -> &str {
        self.resource_group.as_deref().unwrap_or(&self.name)
    }
}

/// Options for capturing a VM into an image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureParams {
    pub label: Option<String>,

    /// "Generalized" or "Specialized" (ASM)
    pub os_state: Option<String>,

    /// Delete the VM after capturing (ASM)
    pub delete: bool,

    /// Overwrite an existing VHD with the same prefix (ARM)
    pub overwrite: bool,

    /// Write the generated template here (ARM)
    pub template_file: Option<String>,
}

/// Options for attaching a new data disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskParams {
    /// "None", "ReadOnly" or "ReadWrite"
    pub host_caching: Option<String>,

    /// Blob URL of the new VHD
    pub blob_url: Option<String>,
}

/// Mode-specific command shapes for VM operations
pub trait Vocabulary: Send + Sync + std::fmt::Debug {
    fn mode(&self) -> Mode;

    /// Text reply meaning "no such VM"
    fn not_found(&self) -> &str {
        VM_NOT_FOUND
    }

    fn vm_show(&self, base: Invocation, spec: &VmSpec) -> Invocation;

    fn vm_create(&self, base: Invocation, spec: &VmSpec, options: &[String]) -> Invocation;

    fn vm_start(&self, base: Invocation, spec: &VmSpec) -> Invocation;

    fn vm_shutdown(&self, base: Invocation, spec: &VmSpec) -> Invocation;

    fn vm_restart(&self, base: Invocation, spec: &VmSpec) -> Invocation;

    fn vm_delete(&self, base: Invocation, spec: &VmSpec) -> Invocation;

    fn vm_capture(
        &self,
        base: Invocation,
        spec: &VmSpec,
        image: &str,
        params: &CaptureParams,
    ) -> Invocation;

    fn vm_disk_attach_new(
        &self,
        base: Invocation,
        spec: &VmSpec,
        size_gb: u32,
        params: &DiskParams,
    ) -> Invocation;

    /// Port the guest's SSH daemon is reachable on
    fn management_port(&self, spec: &VmSpec, descriptor: &Descriptor) -> Result<u16>;

    /// Classify the descriptor's power/provisioning state
    fn power_state(&self, descriptor: &Descriptor) -> PowerState;
}

/// Service management (classic) vocabulary
#[derive(Debug, Clone, Copy, Default)]
pub struct AsmVocabulary;

impl Vocabulary for AsmVocabulary {
    fn mode(&self) -> Mode {
        Mode::Asm
    }

    fn vm_show(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "show", spec.name.as_str()])
            .opt("--dns-name", spec.dns_name.as_deref())
            .json()
    }

    fn vm_create(&self, base: Invocation, spec: &VmSpec, options: &[String]) -> Invocation {
        base.args(["vm", "create", spec.dns_name(), spec.image.as_str()])
            .opt("--vm-name", Some(&spec.name))
            .opt("--userName", Some(&spec.username))
            .secret_opt("--password", Some(&spec.password))
            .opt("--vm-size", Some(&spec.size))
            .opt("--location", spec.location.as_deref())
            .opt("--ssh", spec.ssh_port.map(|p| p.to_string()))
            .args(options.iter().cloned())
    }

    fn vm_start(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "start", spec.name.as_str()])
            .opt("--dns-name", spec.dns_name.as_deref())
    }

    fn vm_shutdown(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "shutdown", spec.name.as_str()])
            .opt("--dns-name", spec.dns_name.as_deref())
    }

    fn vm_restart(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "restart", spec.name.as_str()])
            .opt("--dns-name", spec.dns_name.as_deref())
    }

    fn vm_delete(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "delete", spec.name.as_str()])
            .opt("--dns-name", spec.dns_name.as_deref())
            .arg("--quiet")
    }

    fn vm_capture(
        &self,
        base: Invocation,
        spec: &VmSpec,
        image: &str,
        params: &CaptureParams,
    ) -> Invocation {
        base.args(["vm", "capture", spec.name.as_str(), image])
            .opt("--dns-name", spec.dns_name.as_deref())
            .opt("--label", params.label.as_deref())
            .opt("--os-state", params.os_state.as_deref())
            .switch("--delete", params.delete)
    }

    fn vm_disk_attach_new(
        &self,
        base: Invocation,
        spec: &VmSpec,
        size_gb: u32,
        params: &DiskParams,
    ) -> Invocation {
        base.args(["vm", "disk", "attach-new", spec.name.as_str()])
            .arg(size_gb.to_string())
            .args(params.blob_url.iter().cloned())
            .opt("--host-caching", params.host_caching.as_deref())
            .opt("--dns-name", spec.dns_name.as_deref())
    }

    fn management_port(&self, _spec: &VmSpec, descriptor: &Descriptor) -> Result<u16> {
        let endpoints = VmInfo::new(descriptor).endpoints();
        endpoints
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case("ssh"))
            .or_else(|| endpoints.iter().find(|e| e.local_port == Some(SSH_PORT)))
            .and_then(|e| e.port)
            .ok_or_else(|| CloudError::MissingField("Network.Endpoints[ssh].port".to_string()))
    }

    fn power_state(&self, descriptor: &Descriptor) -> PowerState {
        match descriptor.get_str("InstanceStatus") {
            Some("ReadyRole") => PowerState::Running,
            Some("StoppedVM") => PowerState::Stopped,
            Some("StoppedDeallocated") => PowerState::Deallocated,
            Some("StoppingVM") | Some("StoppingRole") => PowerState::Stopping,
            Some("DeletingVM") => PowerState::Deleting,
            Some(
                "Provisioning" | "CreatingVM" | "CreatingRole" | "StartingVM" | "StartingRole"
                | "BusyRole" | "RoleStateUnknown",
            ) => PowerState::Provisioning,
            _ => PowerState::Unknown,
        }
    }
}

/// Resource manager vocabulary
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmVocabulary;

impl Vocabulary for ArmVocabulary {
    fn mode(&self) -> Mode {
        Mode::Arm
    }

    fn vm_show(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "show", spec.resource_group(), spec.name.as_str()])
            .json()
    }

    fn vm_create(&self, base: Invocation, spec: &VmSpec, options: &[String]) -> Invocation {
        base.args([
            "vm",
            "create",
            spec.resource_group(),
            spec.name.as_str(),
            spec.location.as_deref().unwrap_or_default(),
            spec.os_type.as_deref().unwrap_or("Linux"),
        ])
        .opt("--image-urn", Some(&spec.image))
        .opt("--admin-username", Some(&spec.username))
        .secret_opt("--admin-password", Some(&spec.password))
        .opt("--vm-size", Some(&spec.size))
        .opt("--public-ip-domain-name", spec.dns_name.as_deref())
        .args(options.iter().cloned())
    }

    fn vm_start(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "start", spec.resource_group(), spec.name.as_str()])
    }

    fn vm_shutdown(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "stop", spec.resource_group(), spec.name.as_str()])
    }

    fn vm_restart(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "restart", spec.resource_group(), spec.name.as_str()])
    }

    fn vm_delete(&self, base: Invocation, spec: &VmSpec) -> Invocation {
        base.args(["vm", "delete", spec.resource_group(), spec.name.as_str()])
            .arg("--quiet")
    }

    fn vm_capture(
        &self,
        base: Invocation,
        spec: &VmSpec,
        image: &str,
        params: &CaptureParams,
    ) -> Invocation {
        base.args(["vm", "capture", spec.resource_group(), spec.name.as_str(), image])
            .opt("--template-file-name", params.template_file.as_deref())
            .switch("--overwrite", params.overwrite)
    }

    fn vm_disk_attach_new(
        &self,
        base: Invocation,
        spec: &VmSpec,
        size_gb: u32,
        params: &DiskParams,
    ) -> Invocation {
        base.args([
            "vm",
            "disk",
            "attach-new",
            spec.resource_group(),
            spec.name.as_str(),
        ])
        .arg(size_gb.to_string())
        .args(params.blob_url.iter().cloned())
        .opt("--host-caching", params.host_caching.as_deref())
    }

    fn management_port(&self, spec: &VmSpec, _descriptor: &Descriptor) -> Result<u16> {
        // ARM VMs expose SSH directly on the public address.
        Ok(spec.ssh_port.unwrap_or(SSH_PORT))
    }

    fn power_state(&self, descriptor: &Descriptor) -> PowerState {
        match descriptor.get_str("powerState") {
            Some("VM running") => PowerState::Running,
            Some("VM stopped") => PowerState::Stopped,
            Some("VM deallocated") => PowerState::Deallocated,
            Some("VM stopping") => PowerState::Stopping,
            Some("VM deallocating") => PowerState::Deallocating,
            Some("VM starting") => PowerState::Provisioning,
            _ => match descriptor.get_str("provisioningState") {
                Some("Creating" | "Updating") => PowerState::Provisioning,
                Some("Deleting") => PowerState::Deleting,
                _ => PowerState::Unknown,
            },
        }
    }
}
