//! Minimal prompt/response driver for interactive commands
//!
//! Only what the login handshake needs: spawn a command with piped stdio,
//! wait for one of several patterns on its combined output, and write lines
//! to its stdin.

use azlab_cloud::{CloudError, Invocation, Result};
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What an [`Interaction::expect`] call observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectEvent {
    /// Index of the first pattern that matched
    Matched(usize),
    /// Both output streams closed without a match
    Eof,
    Timeout,
}

/// A running interactive command
#[derive(Debug)]
pub struct Interaction {
    command: String,
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<String>,
    buffer: String,
    closed: bool,
}

impl Interaction {
    pub fn spawn(invocation: &Invocation) -> Result<Self> {
        let command = invocation.command_line();
        tracing::debug!("Running (interactive): {}", command);

        let mut child = Command::new(invocation.program())
            .args(invocation.argv())
            .envs(invocation.environment().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(out) = child.stdout.take() {
            tokio::spawn(forward(out, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            tokio::spawn(forward(err, tx));
        }

        Ok(Self {
            command,
            stdin: child.stdin.take(),
            child,
            output: rx,
            buffer: String::new(),
            closed: false,
        })
    }

    /// Wait until the output matches one of `patterns`.
    ///
    /// Output up to the end of the match is consumed.
    pub async fn expect(&mut self, patterns: &[Regex], timeout: Duration) -> ExpectEvent {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((index, end)) = first_match(&self.buffer, patterns) {
                self.buffer.drain(..end);
                return ExpectEvent::Matched(index);
            }
            if self.closed {
                return ExpectEvent::Eof;
            }
            match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => self.buffer.push_str(&chunk),
                Ok(None) => self.closed = true,
                Err(_) => return ExpectEvent::Timeout,
            }
        }
    }

    /// Write `line` followed by a newline to the command's stdin
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            CloudError::Remote(format!("stdin of `{}` is closed", self.command))
        })?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Close stdin and wait for the command to exit, killing it on timeout
    pub async fn finish(mut self, timeout: Duration) -> Result<i32> {
        drop(self.stdin.take());
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(status?.code().unwrap_or(-1)),
            Err(_) => {
                tracing::warn!("`{}` still running, killing it", self.command);
                self.child.kill().await?;
                Err(CloudError::CommandTimeout {
                    command: self.command,
                    timeout,
                })
            }
        }
    }
}

fn first_match(buffer: &str, patterns: &[Regex]) -> Option<(usize, usize)> {
    patterns
        .iter()
        .enumerate()
        .filter_map(|(i, re)| re.find(buffer).map(|m| (i, m.start(), m.end())))
        .min_by_key(|&(_, start, _)| start)
        .map(|(i, _, end)| (i, end))
}

async fn forward<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(String::from_utf8_lossy(&buf[..n]).into_owned()).is_err() {
                    break;
                }
            }
        }
    }
}
