//! External command invocation
//!
//! Every cloud operation in azlab is a single run of an external CLI. This
//! module describes such a run ([`Invocation`]), captures what it produced
//! ([`CommandOutput`]) and defines the [`CommandRunner`] seam that resources
//! are written against, so tests can substitute a scripted backend.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const REDACTED: &str = "******";

/// A single command line to be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    redacted: Vec<usize>,
    env: Vec<(String, String)>,
    json: bool,
    timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            redacted: Vec::new(),
            env: Vec::new(),
            json: false,
            timeout: None,
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several positional arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` when a non-empty value is present
    pub fn opt<S: AsRef<str>>(mut self, flag: &str, value: Option<S>) -> Self {
        if let Some(value) = value {
            let value = value.as_ref();
            if !value.is_empty() {
                self.args.push(flag.to_string());
                self.args.push(value.to_string());
            }
        }
        self
    }

    /// Like [`Invocation::opt`], but the value is masked in logs
    pub fn secret_opt<S: AsRef<str>>(mut self, flag: &str, value: Option<S>) -> Self {
        let before = self.args.len();
        self = self.opt(flag, value);
        if self.args.len() > before {
            self.redacted.push(self.args.len() - 1);
        }
        self
    }

    /// Append a bare flag when `on` is set
    pub fn switch(mut self, flag: &str, on: bool) -> Self {
        if on {
            self.args.push(flag.to_string());
        }
        self
    }

    /// Append `flag on|off` when a value is present
    pub fn toggle(self, flag: &str, value: Option<bool>) -> Self {
        let value = value.map(|v| if v { "on" } else { "off" });
        self.opt(flag, value)
    }

    /// Set an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Request a structured (JSON) reply
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Positional arguments as given, without the trailing `--json`
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn wants_json(&self) -> bool {
        self.json
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.timeout
    }

    /// Full argument vector passed to the process
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        if self.json {
            argv.push("--json".to_string());
        }
        argv
    }

    /// Printable command line with secrets masked
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.redacted.contains(&i) {
                parts.push(REDACTED.to_string());
            } else {
                parts.push(arg.clone());
            }
        }
        if self.json {
            parts.push("--json".to_string());
        }
        parts.join(" ")
    }
}

/// Standard output of a command, parsed when possible
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Parsed JSON reply
    Structured(Value),
    /// Free-form text (JSON not requested, command failed, or unparseable)
    Text(String),
}

impl Reply {
    pub fn structured(&self) -> Option<&Value> {
        match self {
            Reply::Structured(v) => Some(v),
            Reply::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Structured(_) => None,
            Reply::Text(t) => Some(t),
        }
    }

    /// True only for a text reply whose trimmed content equals `sentinel`
    pub fn is_sentinel(&self, sentinel: &str) -> bool {
        matches!(self, Reply::Text(t) if t.trim() == sentinel)
    }
}

/// Result of running an [`Invocation`]
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub command: String,
    pub status: i32,
    pub stdout: Reply,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Turn a non-zero exit status into [`CloudError::CommandFailed`]
    pub fn check(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(CloudError::CommandFailed {
                command: self.command,
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// The structured reply, or an error naming what was expected
    pub fn into_structured(self, what: &str) -> Result<Value> {
        match self.stdout {
            Reply::Structured(v) => Ok(v),
            Reply::Text(t) => Err(CloudError::UnexpectedReply {
                field: what.to_string(),
                reply: t.trim().to_string(),
            }),
        }
    }
}

/// Executes invocations against some backend
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs invocations as local child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    default_timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time limit applied to invocations that do not carry their own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let command_line = invocation.command_line();
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.argv());
        cmd.envs(invocation.environment().iter().map(|(k, v)| (k, v)));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {}", command_line);

        let output = match invocation.time_limit().or(self.default_timeout) {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| CloudError::CommandTimeout {
                    command: command_line.clone(),
                    timeout: limit,
                })??,
            None => cmd.output().await?,
        };

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        tracing::debug!("status: {}", status);

        Ok(CommandOutput {
            command: command_line,
            status,
            stdout: parse_reply(stdout, invocation.wants_json() && status == 0),
            stderr,
        })
    }
}

/// Parse stdout as JSON when requested, falling back to text
pub fn parse_reply(stdout: String, json: bool) -> Reply {
    if !json {
        return Reply::Text(stdout);
    }
    match serde_json::from_str::<Value>(&stdout) {
        Ok(value) => Reply::Structured(value),
        Err(e) => {
            tracing::warn!("Reply is not JSON ({}), keeping text", e);
            Reply::Text(stdout)
        }
    }
}
