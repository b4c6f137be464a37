use super::report_status;
use crate::VmCommands;
use crate::context::Context;
use azlab_azure::CaptureParams;
use azlab_cloud::Resource;
use colored::Colorize;

pub async fn handle(ctx: &Context, cmd: VmCommands) -> anyhow::Result<()> {
    let mut vm = ctx.vm()?;
    let timeouts = &ctx.params.timeouts;
    let name = vm.name().to_string();

    match cmd {
        VmCommands::Create { options } => match vm.create(&options).await? {
            Some(status) => report_status(&format!("Created VM '{}'", name), status)?,
            None => println!("{}", format!("ℹ VM '{}' already exists", name).dimmed()),
        },
        VmCommands::Show => {
            vm.refresh(None).await?;
            println!("{:#}", vm.descriptor().value());
            println!("state: {}", vm.power_state().to_string().cyan());
        }
        VmCommands::Exists => {
            if vm.exists().await? {
                println!("{}", format!("VM '{}' exists", name).green());
            } else {
                println!("{}", format!("VM '{}' not found", name).yellow());
            }
        }
        VmCommands::Start => report_status(&format!("Started VM '{}'", name), vm.start().await?)?,
        VmCommands::Shutdown => {
            report_status(&format!("Shut down VM '{}'", name), vm.shutdown().await?)?
        }
        VmCommands::Restart => report_status(
            &format!("Restarted VM '{}'", name),
            vm.restart(timeouts.restart()).await?,
        )?,
        VmCommands::Delete => report_status(
            &format!("Deleted VM '{}'", name),
            vm.delete(timeouts.delete()).await?,
        )?,
        VmCommands::Capture {
            image,
            os_state,
            delete,
        } => {
            let params = CaptureParams {
                os_state,
                delete,
                ..Default::default()
            };
            let status = vm
                .capture(&image, &params, timeouts.default_timeout())
                .await?;
            report_status(&format!("Captured VM '{}' as '{}'", name, image), status)?
        }
    }
    Ok(())
}

