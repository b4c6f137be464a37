use super::report_status;
use crate::context::Context;
use azlab_cloud::Resource;
use colored::Colorize;

/// create -> start -> restart -> shutdown -> start -> delete
pub async fn handle(ctx: &Context, keep: bool) -> anyhow::Result<()> {
    let mut vm = ctx.vm()?;
    let timeouts = &ctx.params.timeouts;
    let name = vm.name().to_string();

    println!("{}", format!("VM lifecycle for '{}' ({})", name, vm.mode()).bold());

    match vm.create(&[]).await? {
        Some(status) => report_status("create", status)?,
        None => println!("{}", "ℹ already exists, skipping create".dimmed()),
    }
    report_status("start", vm.start().await?)?;
    vm.verify_alive().await?;
    println!("  address: {}", vm.public_address()?.cyan());

    report_status("restart", vm.restart(timeouts.restart()).await?)?;
    report_status("shutdown", vm.shutdown().await?)?;
    report_status("start", vm.start().await?)?;

    if keep {
        println!("{}", format!("ℹ keeping VM '{}'", name).dimmed());
        return Ok(());
    }

    report_status("delete", vm.delete(timeouts.delete()).await?)?;
    if vm.exists().await? {
        anyhow::bail!("VM '{}' still exists after delete", name);
    }
    println!("{}", format!("✓ Lifecycle for '{}' completed", name).green().bold());
    Ok(())
}
