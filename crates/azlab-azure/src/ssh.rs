//! SSH/SCP access through libssh2
//!
//! ssh2 is blocking, so every operation runs on the blocking pool and the
//! session state is moved in and out of the worker for each call.

use crate::remote::{RemoteAccess, SessionRequest, ShellSession, TransferRequest};
use async_trait::async_trait;
use azlab_cloud::{CloudError, Result};
use regex::Regex;
use ssh2::{Channel, Session};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

const READ_SLICE_MS: u32 = 500;
const CHUNK_SIZE: usize = 32 * 1024;

/// [`RemoteAccess`] over ssh2
#[derive(Debug, Clone, Default)]
pub struct Ssh2Access;

impl Ssh2Access {
    pub fn new() -> Self {
        Self
    }
}

fn remote_err(context: &str, e: impl std::fmt::Display) -> CloudError {
    CloudError::Remote(format!("{}: {}", context, e))
}

fn connect(
    address: &str,
    port: u16,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<Session> {
    let addr = (address, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| remote_err("resolve", format!("{}:{}", address, port)))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;

    let mut session = Session::new().map_err(|e| remote_err("session", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session
        .handshake()
        .map_err(|e| remote_err("handshake", e))?;
    session
        .userauth_password(username, password)
        .map_err(|e| remote_err("password auth", e))?;
    if !session.authenticated() {
        return Err(remote_err("auth", format!("rejected for {}", username)));
    }
    Ok(session)
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| remote_err("worker", e))?
}

struct ShellState {
    // Dropping the session closes the connection; keep it alive with the channel.
    _session: Session,
    channel: Channel,
    prompt: Regex,
    linesep: String,
    status_test_command: String,
    log: File,
}

impl ShellState {
    fn open(request: SessionRequest) -> Result<Self> {
        let session = connect(
            &request.address,
            request.port,
            &request.username,
            &request.password,
            request.timeout,
        )?;
        let mut channel = session
            .channel_session()
            .map_err(|e| remote_err("channel", e))?;
        channel
            .request_pty("xterm", None, None)
            .map_err(|e| remote_err("pty", e))?;
        channel.shell().map_err(|e| remote_err("shell", e))?;
        session.set_timeout(READ_SLICE_MS);

        let mut state = Self {
            _session: session,
            channel,
            prompt: Regex::new(&request.prompt).map_err(|e| remote_err("prompt", e))?,
            linesep: request.linesep,
            status_test_command: request.status_test_command,
            log: open_log(&request.log_file)?,
        };

        state.read_until_prompt(request.timeout).map_err(|e| match e {
            CloudError::CommandTimeout { .. } => CloudError::LoginTimeout(format!(
                "no shell prompt from {}:{} within {:?}",
                request.address, request.port, request.timeout
            )),
            other => other,
        })?;
        Ok(state)
    }

    fn read_until_prompt(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut out = PromptBuffer::default();
        let mut buf = [0u8; 4096];
        loop {
            if let Some(text) = out.matched(&self.prompt) {
                return Ok(text);
            }
            if Instant::now() >= deadline {
                return Err(CloudError::CommandTimeout {
                    command: "<read until prompt>".to_string(),
                    timeout,
                });
            }
            match self.channel.read(&mut buf) {
                Ok(0) if self.channel.eof() => {
                    return Err(CloudError::PromptNotFound("shell closed".to_string()));
                }
                Ok(0) => {}
                Ok(n) => {
                    self.log.write_all(&buf[..n])?;
                    out.push(&buf[..n]);
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send(&mut self, command: &str) -> Result<()> {
        self.channel.write_all(command.as_bytes())?;
        self.channel.write_all(self.linesep.as_bytes())?;
        self.channel.flush()?;
        Ok(())
    }

    fn run(&mut self, command: &str, timeout: Duration) -> Result<(i32, String)> {
        self.send(command)?;
        let raw = self.read_until_prompt(timeout).map_err(|e| match e {
            CloudError::CommandTimeout { timeout, .. } => CloudError::CommandTimeout {
                command: command.to_string(),
                timeout,
            },
            other => other,
        })?;
        let output = strip_echo_and_prompt(&raw, command, &self.prompt);

        let status_command = self.status_test_command.clone();
        self.send(&status_command)?;
        let raw = self.read_until_prompt(timeout)?;
        let status = strip_echo_and_prompt(&raw, &status_command, &self.prompt);
        let status = parse_status(&status).ok_or_else(|| CloudError::UnexpectedReply {
            field: status_command,
            reply: status,
        })?;

        Ok((status, output))
    }
}

/// Raw shell output, decoded only once a prompt shows up in it
#[derive(Debug, Default)]
struct PromptBuffer {
    bytes: Vec<u8>,
}

impl PromptBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn matched(&self, prompt: &Regex) -> Option<String> {
        // A prompt is ASCII, so a character cut at the end of the buffer
        // cannot hide or fake a match.
        let text = String::from_utf8_lossy(&self.bytes);
        prompt.is_match(&text).then(|| text.into_owned())
    }
}

/// Remove the echoed command line and the trailing prompt from raw output
fn strip_echo_and_prompt(raw: &str, command: &str, prompt: &Regex) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();
    if lines.first().is_some_and(|l| l.contains(command.trim())) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| prompt.is_match(l)) {
        lines.pop();
    }
    lines.join("\n")
}

fn parse_status(text: &str) -> Option<i32> {
    text.lines().rev().find_map(|l| l.trim().parse().ok())
}

/// Interactive shell on a guest
pub struct Ssh2Shell {
    state: Option<ShellState>,
}

impl std::fmt::Debug for Ssh2Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ssh2Shell")
            .field("closed", &self.state.is_none())
            .finish()
    }
}

impl Ssh2Shell {
    fn take(&mut self) -> Result<ShellState> {
        self.state
            .take()
            .ok_or_else(|| CloudError::Remote("session is closed".to_string()))
    }
}

#[async_trait]
impl ShellSession for Ssh2Shell {
    async fn cmd_status_output(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<(i32, String)> {
        tracing::debug!("Sending command: {}", command);
        let mut state = self.take()?;
        let command = command.to_string();
        let (state, result) = tokio::task::spawn_blocking(move || {
            let result = state.run(&command, timeout);
            (state, result)
        })
        .await
        .map_err(|e| remote_err("worker", e))?;
        self.state = Some(state);
        result
    }

    fn set_status_test_command(&mut self, command: &str) {
        if let Some(state) = self.state.as_mut() {
            state.status_test_command = command.to_string();
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut state) = self.state.take() {
            blocking(move || {
                state.channel.send_eof().map_err(|e| remote_err("close", e))?;
                state.channel.close().map_err(|e| remote_err("close", e))?;
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.is_none()
    }
}

fn upload(request: TransferRequest) -> Result<u64> {
    let mut log = open_log(&request.log_file)?;
    let session = connect(
        &request.address,
        request.port,
        &request.username,
        &request.password,
        request.timeout,
    )?;

    let mut local = File::open(&request.local_path)?;
    let size = local.metadata()?.len();
    let remote = remote_target(&request.remote_path, &request.local_path);
    writeln!(
        log,
        "scp {} -> {}@{}:{} ({} bytes)",
        request.local_path.display(),
        request.username,
        request.address,
        remote,
        size
    )?;

    let mut channel = session
        .scp_send(Path::new(&remote), 0o644, size, None)
        .map_err(|e| remote_err("scp send", e))?;

    let started = Instant::now();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = local.read(&mut buf)?;
        if n == 0 {
            break;
        }
        channel.write_all(&buf[..n])?;
        sent += n as u64;
        throttle(started, sent, request.rate_limit);
        if started.elapsed() > request.timeout {
            return Err(CloudError::CommandTimeout {
                command: format!("scp {}", request.local_path.display()),
                timeout: request.timeout,
            });
        }
    }

    channel.send_eof().map_err(|e| remote_err("scp eof", e))?;
    channel.wait_eof().map_err(|e| remote_err("scp eof", e))?;
    channel.close().map_err(|e| remote_err("scp close", e))?;
    channel.wait_close().map_err(|e| remote_err("scp close", e))?;
    writeln!(log, "done: {} bytes in {:?}", sent, started.elapsed())?;
    Ok(sent)
}

fn download(request: TransferRequest) -> Result<u64> {
    let mut log = open_log(&request.log_file)?;
    let session = connect(
        &request.address,
        request.port,
        &request.username,
        &request.password,
        request.timeout,
    )?;

    let (mut channel, stat) = session
        .scp_recv(Path::new(&request.remote_path))
        .map_err(|e| remote_err("scp recv", e))?;
    writeln!(
        log,
        "scp {}@{}:{} -> {} ({} bytes)",
        request.username,
        request.address,
        request.remote_path,
        request.local_path.display(),
        stat.size()
    )?;

    let mut local = File::create(&request.local_path)?;
    let started = Instant::now();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received = 0u64;
    loop {
        let n = channel.read(&mut buf)?;
        if n == 0 {
            break;
        }
        local.write_all(&buf[..n])?;
        received += n as u64;
        throttle(started, received, request.rate_limit);
        if started.elapsed() > request.timeout {
            return Err(CloudError::CommandTimeout {
                command: format!("scp {}", request.remote_path),
                timeout: request.timeout,
            });
        }
    }

    channel.wait_eof().map_err(|e| remote_err("scp eof", e))?;
    writeln!(log, "done: {} bytes in {:?}", received, started.elapsed())?;
    Ok(received)
}

/// Directory targets (`/tmp/`) receive the local file name
fn remote_target(remote: &str, local: &Path) -> String {
    match (remote.ends_with('/'), local.file_name()) {
        (true, Some(name)) => format!("{}{}", remote, name.to_string_lossy()),
        _ => remote.to_string(),
    }
}

/// Sleep so that `bytes` moved since `started` stays under `limit_kib` KiB/s
fn throttle(started: Instant, bytes: u64, limit_kib: Option<u64>) {
    if let Some(delay) = throttle_delay(started.elapsed(), bytes, limit_kib) {
        std::thread::sleep(delay);
    }
}

fn throttle_delay(elapsed: Duration, bytes: u64, limit_kib: Option<u64>) -> Option<Duration> {
    let limit = limit_kib.filter(|l| *l > 0)? * 1024;
    let expected = Duration::from_secs_f64(bytes as f64 / limit as f64);
    expected.checked_sub(elapsed).filter(|d| !d.is_zero())
}

#[async_trait]
impl RemoteAccess for Ssh2Access {
    async fn open_session(&self, request: &SessionRequest) -> Result<Box<dyn ShellSession>> {
        tracing::debug!(
            "Opening {} session to {}@{}:{}",
            request.client,
            request.username,
            request.address,
            request.port
        );
        let request = request.clone();
        let state = blocking(move || ShellState::open(request)).await?;
        Ok(Box::new(Ssh2Shell { state: Some(state) }))
    }

    async fn copy_to(&self, request: &TransferRequest) -> Result<()> {
        tracing::debug!(
            "Copying {} to {}:{}",
            request.local_path.display(),
            request.address,
            request.remote_path
        );
        let request = request.clone();
        let bytes = blocking(move || upload(request)).await?;
        tracing::debug!("Uploaded {} bytes", bytes);
        Ok(())
    }

    async fn copy_from(&self, request: &TransferRequest) -> Result<()> {
        tracing::debug!(
            "Copying {}:{} to {}",
            request.address,
            request.remote_path,
            request.local_path.display()
        );
        let request = request.clone();
        let bytes = blocking(move || download(request)).await?;
        tracing::debug!("Downloaded {} bytes", bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_echo_and_prompt() {
        let prompt = Regex::new(r"[#$]\s*$").unwrap();
        let raw = "getenforce\r\nEnforcing\r\n[azureuser@vm-test-1 ~]$ ";
        assert_eq!(strip_echo_and_prompt(raw, "getenforce", &prompt), "Enforcing");

        let raw = "echo $?\r\n0\r\n[azureuser@vm-test-1 ~]$ ";
        let status = strip_echo_and_prompt(raw, "echo $?", &prompt);
        assert_eq!(parse_status(&status), Some(0));
    }

    #[test]
    fn test_parse_status_garbage() {
        assert_eq!(parse_status("command not found"), None);
        assert_eq!(parse_status("noise\n127"), Some(127));
    }

    #[test]
    fn test_remote_target() {
        let local = Path::new("/tmp/waagent.conf");
        assert_eq!(remote_target("/etc/", local), "/etc/waagent.conf");
        assert_eq!(remote_target("/etc/waagent.conf.new", local), "/etc/waagent.conf.new");
    }

    #[test]
    fn test_throttle_delay() {
        // 2 KiB at 1 KiB/s should take 2s.
        let d = throttle_delay(Duration::from_millis(500), 2048, Some(1));
        assert_eq!(d, Some(Duration::from_millis(1500)));
        assert_eq!(throttle_delay(Duration::from_secs(3), 2048, Some(1)), None);
        assert_eq!(throttle_delay(Duration::ZERO, 2048, None), None);
        assert_eq!(throttle_delay(Duration::ZERO, 2048, Some(0)), None);
    }

    #[test]
    fn test_prompt_buffer_keeps_split_characters() {
        let prompt = Regex::new(r"[#$]\s*$").unwrap();
        let mut out = PromptBuffer::default();
        let text = "ファイル\r\n$ ".as_bytes();

        // Split inside the first three-byte character.
        out.push(&text[..1]);
        assert_eq!(out.matched(&prompt), None);
        out.push(&text[1..5]);
        assert_eq!(out.matched(&prompt), None);
        out.push(&text[5..]);

        let matched = out.matched(&prompt).unwrap();
        assert_eq!(matched, "ファイル\r\n$ ");
        assert!(!matched.contains('\u{FFFD}'));
    }
}
