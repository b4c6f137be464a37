//! Subscription login state
//!
//! [`AuthSession`] owns the CLI handle every resource is built from. The
//! login handshake is the only interactive command the harness runs.

use crate::cli::AzureCli;
use crate::error::Result;
use crate::expect::{ExpectEvent, Interaction};
use azlab_cloud::Mode;
use regex::Regex;
use std::time::Duration;

/// How long to wait for the password prompt by default
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

const PASSWORD_PROMPT: &str = "[pP]assword:";
const SHELL_PROMPT: &str = "[$#>]";

/// An authenticated (or authenticating) CLI identity
#[derive(Debug, Clone)]
pub struct AuthSession {
    cli: AzureCli,
    username: String,
}

impl AuthSession {
    pub fn new(cli: AzureCli, username: impl Into<String>) -> Self {
        Self {
            cli,
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// CLI handle resources should be constructed from
    pub fn cli(&self) -> &AzureCli {
        &self.cli
    }

    /// Run the username/password handshake.
    ///
    /// Returns `false` when no password prompt shows up before
    /// `prompt_timeout`. A rejected password is not detected here.
    pub async fn login(&self, password: &str, prompt_timeout: Duration) -> Result<bool> {
        let password_prompt = Regex::new(PASSWORD_PROMPT)?;
        let shell_prompt = Regex::new(SHELL_PROMPT)?;

        tracing::debug!("Login azure with: {}", self.username);
        let invocation = self.cli.command().args(["login", "-u", self.username.as_str()]);
        let mut interaction = Interaction::spawn(&invocation)?;

        match interaction.expect(&[password_prompt], prompt_timeout).await {
            ExpectEvent::Matched(_) => {}
            event => {
                tracing::warn!("No password prompt for {} ({:?})", self.username, event);
                finish_login(interaction, Duration::from_secs(1)).await;
                return Ok(false);
            }
        }

        interaction.send_line(password).await?;
        let event = interaction.expect(&[shell_prompt], prompt_timeout).await;
        tracing::debug!("After password: {:?}", event);

        finish_login(interaction, prompt_timeout).await;

        tracing::info!("Logged in as {}", self.username);
        Ok(true)
    }

    pub async fn logout(&self) -> Result<()> {
        tracing::debug!("Logout azure with: {}", self.username);
        self.cli
            .run_checked(self.cli.command().args(["logout", "-u", self.username.as_str()]))
            .await?;
        Ok(())
    }

    /// Forget every stored subscription and environment
    pub async fn clear_account(&self, options: &[String]) -> Result<()> {
        self.cli
            .run_checked(
                self.cli
                    .command()
                    .args(["account", "clear", "--quiet"])
                    .args(options.iter().cloned()),
            )
            .await?;
        Ok(())
    }

    /// Switch the CLI's management mode and rebind this session to it
    pub async fn set_mode(&mut self, mode: Mode) -> Result<()> {
        tracing::debug!("Change the azure config mode as {}", mode);
        self.cli
            .run_checked(
                self.cli
                    .command()
                    .args(["config", "mode"])
                    .arg(mode.to_string()),
            )
            .await?;
        self.cli.set_mode(mode);
        Ok(())
    }
}

/// Reap the login process; a failure here does not change the login result
async fn finish_login(interaction: Interaction, timeout: Duration) {
    if let Err(e) = interaction.finish(timeout).await {
        tracing::warn!("Login command did not exit cleanly: {}", e);
    }
}
