use anyhow::Context as _;
use azlab_azure::{AuthSession, AzureCli, ShellConfig, StorageCredentials, VirtualMachine, VmSpec};
use azlab_cloud::Mode;
use azlab_config::TestParams;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Loaded parameters plus the CLI handle built from them
pub struct Context {
    pub params: TestParams,
    pub cli: AzureCli,
    pub log_dir: PathBuf,
}

impl Context {
    pub fn load(params_path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, params) = match params_path {
            Some(path) => (path.to_path_buf(), azlab_config::load_params(path)?),
            None => azlab_config::discover_params()?,
        };
        println!("{}", format!("params: {}", path.display()).dimmed());
        Self::from_params(params)
    }

    pub fn from_params(params: TestParams) -> anyhow::Result<Self> {
        let mode: Mode = params
            .azure
            .mode
            .parse()
            .context("azure.mode in the parameter file")?;

        let mut cli = AzureCli::process(mode)
            .with_program(params.azure.program.clone())
            .with_default_timeout(params.timeouts.default_timeout());
        if let Some(dir) = &params.azure.config_dir {
            cli = cli.with_config_dir(dir);
        }

        Ok(Self {
            params,
            cli,
            log_dir: azlab_config::log_dir(),
        })
    }

    pub fn auth(&self) -> AuthSession {
        AuthSession::new(self.cli.clone(), self.params.azure.username.clone())
    }

    pub fn vm_spec(&self) -> VmSpec {
        let vm = &self.params.vm;
        VmSpec {
            name: vm.name.clone(),
            size: vm.size.clone(),
            image: vm.image.clone(),
            dns_name: vm.dns_name.clone(),
            location: vm.location.clone(),
            username: vm.username.clone(),
            password: vm.password.clone(),
            resource_group: vm.resource_group.clone(),
            os_type: vm.os_type.clone(),
            ssh_port: vm.ssh_port,
        }
    }

    pub fn shell_config(&self) -> ShellConfig {
        let shell = &self.params.shell;
        ShellConfig {
            client: shell.client.clone(),
            prompt: shell.prompt.clone(),
            linesep: shell.linesep.clone(),
            status_test_command: shell.status_test_command.clone(),
            file_transfer_client: shell.file_transfer_client.clone(),
        }
    }

    pub fn vm(&self) -> anyhow::Result<VirtualMachine> {
        let spec = self.vm_spec();
        if spec.name.is_empty() {
            anyhow::bail!("vm.name is not set in the parameter file");
        }
        Ok(VirtualMachine::with_cli(self.cli.clone(), spec)
            .with_shell_config(self.shell_config())
            .with_log_dir(&self.log_dir))
    }

    pub fn storage_credentials(&self) -> StorageCredentials {
        StorageCredentials {
            connection_string: self.params.storage.connection_string.clone(),
            sas: None,
        }
    }

    /// `name`, or the parameter file's value for it
    pub fn pick(&self, name: Option<String>, fallback: &Option<String>, what: &str) -> anyhow::Result<String> {
        name.or_else(|| fallback.clone())
            .ok_or_else(|| anyhow::anyhow!("no {} given and none in the parameter file", what))
    }
}
