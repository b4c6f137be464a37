use super::report_status;
use crate::context::Context;
use crate::{BlobCommands, ContainerCommands};
use azlab_azure::{Blob, BlobCopyRequest, Container};
use azlab_cloud::{OperationPoller, PollOutcome, Resource};
use colored::Colorize;
use std::time::Duration;

pub async fn handle_container(ctx: &Context, cmd: ContainerCommands) -> anyhow::Result<()> {
    let storage = &ctx.params.storage;
    let credentials = ctx.storage_credentials();

    match cmd {
        ContainerCommands::Create { name, permission } => {
            let name = ctx.pick(name, &storage.container, "container")?;
            let mut container = Container::new(ctx.cli.clone(), &name, credentials);
            if let Some(permission) = permission {
                container = container.with_permission(permission);
            }
            match container.create(&[]).await? {
                Some(status) => report_status(&format!("Created container '{}'", name), status)?,
                None => println!("{}", format!("ℹ Container '{}' already exists", name).dimmed()),
            }
        }
        ContainerCommands::Show { name } => {
            let name = ctx.pick(name, &storage.container, "container")?;
            let container = Container::open(ctx.cli.clone(), &name, credentials).await?;
            println!("{:#}", container.descriptor().value());
        }
        ContainerCommands::Delete { name } => {
            let name = ctx.pick(name, &storage.container, "container")?;
            let mut container = Container::new(ctx.cli.clone(), &name, credentials);
            let status = container.delete(ctx.params.timeouts.delete()).await?;
            report_status(&format!("Deleted container '{}'", name), status)?;
        }
    }
    Ok(())
}

pub async fn handle_blob(ctx: &Context, cmd: BlobCommands) -> anyhow::Result<()> {
    let storage = &ctx.params.storage;
    let container = ctx.pick(None, &storage.container, "container")?;
    let credentials = ctx.storage_credentials();

    match cmd {
        BlobCommands::Show { name } => {
            let name = ctx.pick(name, &storage.blob, "blob")?;
            let blob = Blob::open(ctx.cli.clone(), &name, &container, credentials).await?;
            println!("{:#}", blob.descriptor().value());
        }
        BlobCommands::Copy {
            name,
            dest_container,
            dest_blob,
            timeout,
        } => {
            let name = ctx.pick(name, &storage.blob, "blob")?;
            let mut blob = Blob::open(ctx.cli.clone(), &name, &container, credentials).await?;

            let request = BlobCopyRequest {
                dest_connection_string: storage
                    .dest_connection_string
                    .clone()
                    .or_else(|| storage.connection_string.clone()),
                dest_container: Some(ctx.pick(
                    dest_container,
                    &storage.dest_container,
                    "destination container",
                )?),
                dest_blob: Some(ctx.pick(dest_blob, &storage.dest_blob, "destination blob")?),
                ..Default::default()
            };
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| ctx.params.timeouts.blob_copy());
            let poller = OperationPoller::new(timeout)
                .with_interval(ctx.params.timeouts.poll_interval());

            println!("{}", format!("Copying blob '{}'...", name).yellow());
            let outcome = blob
                .copy_with(request, &[], &poller)
                .await?;
            if let Some(progress) = blob.copy_state().and_then(|state| state.progress) {
                println!("progress: {}/{} bytes", progress.done, progress.total);
            }
            match outcome {
                PollOutcome::Success => {
                    println!("{}", "✓ Blob copy succeeded".green().bold())
                }
                other => {
                    println!("{}", format!("✗ Blob copy did not finish: {}", other).red().bold());
                    anyhow::bail!("blob copy ended as {}", other);
                }
            }
        }
        BlobCommands::Delete { name } => {
            let name = ctx.pick(name, &storage.blob, "blob")?;
            let blob = Blob::new(ctx.cli.clone(), &name, &container, credentials);
            let status = blob.delete(ctx.params.timeouts.delete()).await?;
            report_status(&format!("Deleted blob '{}'", name), status)?;
        }
    }
    Ok(())
}
