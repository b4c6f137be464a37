//! Scripted CLI backend shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use azlab_azure::{
    AzureCli, RemoteAccess, SessionRequest, ShellSession, TransferRequest,
};
use azlab_cloud::{CommandOutput, CommandRunner, Invocation, Mode, Reply, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: i32,
    pub stdout: Reply,
    pub stderr: String,
}

pub fn json(value: Value) -> Response {
    Response {
        status: 0,
        stdout: Reply::Structured(value),
        stderr: String::new(),
    }
}

pub fn text(status: i32, out: &str) -> Response {
    Response {
        status,
        stdout: Reply::Text(out.to_string()),
        stderr: String::new(),
    }
}

pub fn ok() -> Response {
    text(0, "info:    command OK\n")
}

pub fn failed(status: i32, stderr: &str) -> Response {
    Response {
        status,
        stdout: Reply::Text(String::new()),
        stderr: stderr.to_string(),
    }
}

struct Rule {
    prefix: Vec<String>,
    responses: VecDeque<Response>,
    last: Response,
}

/// Answers invocations by argument prefix; each rule replays its responses
/// in order and then repeats the last one.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, prefix: &[&str], responses: Vec<Response>) {
        let last = responses.last().cloned().unwrap_or_else(ok);
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            responses: responses.into(),
            last,
        });
    }

    /// Replace the responses for an existing prefix
    pub fn reset(&self, prefix: &[&str], responses: Vec<Response>) {
        self.rules
            .lock()
            .unwrap()
            .retain(|r| r.prefix != prefix.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        self.on(prefix, responses);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose arguments start with `prefix`
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|inv| starts_with(inv.arguments(), prefix))
            .count()
    }

    pub fn cli(self: &Arc<Self>, mode: Mode) -> AzureCli {
        AzureCli::new(self.clone(), mode)
    }
}

fn starts_with(args: &[String], prefix: &[impl AsRef<str>]) -> bool {
    args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, p)| a == p.as_ref())
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        let mut rules = self.rules.lock().unwrap();
        let response = rules
            .iter_mut()
            .filter(|r| starts_with(invocation.arguments(), &r.prefix[..]))
            .max_by_key(|r| r.prefix.len())
            .map(|r| r.responses.pop_front().unwrap_or_else(|| r.last.clone()))
            .unwrap_or_else(ok);

        Ok(CommandOutput {
            command: invocation.command_line(),
            status: response.status,
            stdout: response.stdout,
            stderr: response.stderr,
        })
    }
}

/// Guest shell answering from a fixed command table
pub struct FakeShell {
    pub answers: Vec<(String, i32, String)>,
    pub status_test_command: String,
    pub closed: bool,
    pub history: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ShellSession for FakeShell {
    async fn cmd_status_output(
        &mut self,
        command: &str,
        _timeout: Duration,
    ) -> Result<(i32, String)> {
        self.history.lock().unwrap().push(command.to_string());
        Ok(self
            .answers
            .iter()
            .find(|(c, _, _)| c == command)
            .map(|(_, s, o)| (*s, o.clone()))
            .unwrap_or((127, format!("bash: {}: command not found", command))))
    }

    fn set_status_test_command(&mut self, command: &str) {
        self.status_test_command = command.to_string();
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Remote access that hands out [`FakeShell`]s and records requests
#[derive(Default)]
pub struct FakeRemote {
    pub answers: Vec<(String, i32, String)>,
    pub sessions: Mutex<Vec<SessionRequest>>,
    pub transfers: Mutex<Vec<TransferRequest>>,
    pub history: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RemoteAccess for FakeRemote {
    async fn open_session(&self, request: &SessionRequest) -> Result<Box<dyn ShellSession>> {
        self.sessions.lock().unwrap().push(request.clone());
        Ok(Box::new(FakeShell {
            answers: self.answers.clone(),
            status_test_command: String::new(),
            closed: false,
            history: self.history.clone(),
        }))
    }

    async fn copy_to(&self, request: &TransferRequest) -> Result<()> {
        self.transfers.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn copy_from(&self, request: &TransferRequest) -> Result<()> {
        self.transfers.lock().unwrap().push(request.clone());
        Ok(())
    }
}
