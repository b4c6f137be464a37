mod commands;
mod context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "azlab")]
#[command(about = "VM and storage lifecycle tests on Azure, driven through the azure CLI", long_about = None)]
struct Cli {
    /// Test parameter file (defaults to azlab.local.yaml / azlab.yaml lookup)
    #[arg(short, long, global = true, env = "AZLAB_PARAMS")]
    params: Option<PathBuf>,

    /// Log every CLI command issued
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the subscription
    Login {
        /// Password (defaults to azure.password in the parameter file)
        #[arg(long, env = "AZLAB_AZURE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Seconds to wait for the password prompt
        #[arg(long, default_value = "30")]
        prompt_timeout: u64,
    },
    /// Log out of the subscription
    Logout,
    /// Switch the CLI management mode
    Mode {
        /// asm or arm
        mode: String,
    },
    /// VM operations
    #[command(subcommand)]
    Vm(VmCommands),
    /// Storage container operations
    #[command(subcommand)]
    Container(ContainerCommands),
    /// Storage blob operations
    #[command(subcommand)]
    Blob(BlobCommands),
    /// Run create, start, restart, shutdown, start, delete against the configured VM
    Lifecycle {
        /// Leave the VM in place at the end
        #[arg(long)]
        keep: bool,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum VmCommands {
    /// Create the VM unless it exists
    Create {
        /// Extra options passed to the CLI
        #[arg(last = true)]
        options: Vec<String>,
    },
    /// Print the VM descriptor
    Show,
    /// Report whether the VM exists
    Exists,
    /// Start the VM
    Start,
    /// Shut the VM down
    Shutdown,
    /// Restart the VM
    Restart,
    /// Delete the VM
    Delete,
    /// Capture the VM into an OS image
    Capture {
        /// Target image name
        image: String,
        /// Generalized or Specialized
        #[arg(long)]
        os_state: Option<String>,
        /// Delete the VM after capture
        #[arg(long)]
        delete: bool,
    },
}

#[derive(Subcommand)]
pub enum ContainerCommands {
    /// Create a container
    Create {
        /// Container name (defaults to storage.container)
        name: Option<String>,
        /// Public access level: Off, Blob or Container
        #[arg(long)]
        permission: Option<String>,
    },
    /// Print a container descriptor
    Show { name: Option<String> },
    /// Delete a container
    Delete { name: Option<String> },
}

#[derive(Subcommand)]
pub enum BlobCommands {
    /// Print a blob descriptor
    Show { name: Option<String> },
    /// Copy a blob and wait for the copy to finish
    Copy {
        /// Source blob (defaults to storage.blob)
        name: Option<String>,
        #[arg(long)]
        dest_container: Option<String>,
        #[arg(long)]
        dest_blob: Option<String>,
        /// Seconds to wait for the copy (defaults to timeouts.blob_copy)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Delete a blob
    Delete { name: Option<String> },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Version needs no parameter file
    if matches!(cli.command, Commands::Version) {
        println!("azlab {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = context::Context::load(cli.params.as_deref())?;

    match cli.command {
        Commands::Login {
            password,
            prompt_timeout,
        } => commands::auth::login(&ctx, password, prompt_timeout).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Mode { mode } => commands::auth::mode(&ctx, &mode).await,
        Commands::Vm(cmd) => commands::vm::handle(&ctx, cmd).await,
        Commands::Container(cmd) => commands::storage::handle_container(&ctx, cmd).await,
        Commands::Blob(cmd) => commands::storage::handle_blob(&ctx, cmd).await,
        Commands::Lifecycle { keep } => commands::lifecycle::handle(&ctx, keep).await,
        Commands::Version => Ok(()),
    }
}
