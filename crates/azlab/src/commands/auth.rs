use crate::context::Context;
use azlab_azure::AzureError;
use azlab_cloud::Mode;
use colored::Colorize;
use std::time::Duration;

pub async fn login(ctx: &Context, password: Option<String>, prompt_timeout: u64) -> anyhow::Result<()> {
    ctx.cli.check_installed().await?;
    let auth = ctx.auth();
    let password = password.unwrap_or_else(|| ctx.params.azure.password.clone());
    println!("{}", format!("Logging in as {}...", auth.username()).yellow());

    if !auth
        .login(&password, Duration::from_secs(prompt_timeout))
        .await?
    {
        return Err(AzureError::NotLoggedIn(format!(
            "no password prompt for {}",
            auth.username()
        ))
        .into());
    }
    println!("{}", format!("✓ Logged in as {}", auth.username()).green().bold());
    Ok(())
}

pub async fn logout(ctx: &Context) -> anyhow::Result<()> {
    let auth = ctx.auth();
    auth.logout().await?;
    println!("{}", format!("✓ Logged out {}", auth.username()).green().bold());
    Ok(())
}

pub async fn mode(ctx: &Context, mode: &str) -> anyhow::Result<()> {
    let mode: Mode = mode.parse()?;
    let mut auth = ctx.auth();
    auth.set_mode(mode).await?;
    println!("{}", format!("✓ Mode is now {}", mode).green().bold());
    Ok(())
}
