//! Request/response driver over a steamcmd child's three standard streams.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::pump::{self, STREAM_CAPACITY, StdinLine, Stream};
use crate::tokenizer::{PROMPT, Token};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The command that asks steamcmd to exit.
pub const QUIT_COMMAND: &str = "quit";

/// How long stderr may trail the prompt and still count against the command.
const STDERR_SETTLE: Duration = Duration::from_millis(10);

/// Lines gathered while waiting for one prompt.
///
/// Prompt markers are framing and never appear in `stdout`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl Output {
    /// The stdout lines joined with newlines.
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

/// Owns one steamcmd child process and runs one command at a time against it.
///
/// All operations take `&self`; an internal lock serializes them, so a
/// `SessionIo` can be shared between tasks behind an `Arc`. Dropping it kills
/// the child if [`close`](SessionIo::close) was never called.
pub struct SessionIo {
    inner: Mutex<Inner>,
    pid: Option<u32>,
    command_timeout: Option<Duration>,
    shutdown_grace: Duration,
    shutdown_timeout: Option<Duration>,
}

struct Inner {
    child: Child,
    stdin: mpsc::Sender<StdinLine>,
    stdout: mpsc::Receiver<Token>,
    stderr: mpsc::Receiver<Token>,
    stdout_pump: Option<JoinHandle<io::Result<()>>>,
    stderr_open: bool,
    /// Prompts still owed by commands whose wait timed out.
    owed_prompts: usize,
    closed: bool,
}

impl SessionIo {
    /// Spawn the configured program and wait until it prints its first prompt.
    pub async fn spawn(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut child = Command::new(config.program())
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: config.program().to_path_buf(),
                source,
            })?;
        let pid = child.id();
        info!(program = %config.program().display(), ?pid, "spawned steamcmd");

        let stdin = child.stdin.take().ok_or(SessionError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SessionError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SessionError::Pipe("stderr"))?;

        let (stdin_tx, stdin_rx) = mpsc::channel(1);
        pump::spawn_writer(stdin, stdin_rx);

        let (stdout_tx, stdout_rx) = mpsc::channel(STREAM_CAPACITY);
        let stdout_pump = pump::spawn_reader(stdout, Stream::Stdout, stdout_tx);

        let (stderr_tx, stderr_rx) = mpsc::channel(STREAM_CAPACITY);
        pump::spawn_reader(stderr, Stream::Stderr, stderr_tx);

        let mut inner = Inner {
            child,
            stdin: stdin_tx,
            stdout: stdout_rx,
            stderr: stderr_rx,
            stdout_pump: Some(stdout_pump),
            stderr_open: true,
            owed_prompts: 0,
            closed: false,
        };

        let banner = inner
            .wait_for_suffix(PROMPT, config.startup_timeout())
            .await
            .map_err(|err| SessionError::Startup(Box::new(err)))?;
        debug!(lines = banner.stdout.len(), "steamcmd is ready");

        Ok(Self {
            inner: Mutex::new(inner),
            pid,
            command_timeout: config.command_timeout(),
            shutdown_grace: config.shutdown_grace(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// OS process id of the child, if it was known at spawn time.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Collect output until a stdout token ends with `suffix`.
    ///
    /// Stderr lines are collected alongside but never end the wait.
    pub async fn wait_for_suffix(&self, suffix: &str) -> Result<Output, SessionError> {
        let mut inner = self.lock().await?;
        inner.wait_for_suffix(suffix, self.command_timeout).await
    }

    /// Collect output until the next prompt.
    pub async fn wait_for_prompt(&self) -> Result<Output, SessionError> {
        self.wait_for_suffix(PROMPT).await
    }

    /// Send `command` and return everything it printed before the next prompt.
    ///
    /// Any stderr output fails the command with [`SessionError::Command`];
    /// the stdout gathered alongside it is discarded.
    ///
    /// If an earlier command timed out, its late output and prompt are
    /// skipped before `command` is sent.
    pub async fn exec(&self, command: &str) -> Result<Output, SessionError> {
        let mut inner = self.lock().await?;
        inner.resync(self.command_timeout).await?;
        inner.send(command).await?;

        let output = match inner.wait_for_suffix(PROMPT, self.command_timeout).await {
            Ok(output) => output,
            Err(err) => {
                if matches!(err, SessionError::PromptTimeout { .. }) {
                    inner.owed_prompts += 1;
                }
                return Err(err);
            }
        };

        if !output.stderr.is_empty() {
            return Err(SessionError::Command {
                command: command.to_string(),
                stderr: output.stderr.join("\n"),
            });
        }
        Ok(output)
    }

    /// Send `quit` and wait for the child to exit.
    ///
    /// No prompt is awaited for `quit`. Calling `close` again is a no-op, and
    /// every other operation fails with [`SessionError::Closed`] afterwards.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        info!(pid = ?self.pid, "closing steamcmd session");
        if let Err(err) = inner.send(QUIT_COMMAND).await {
            // The child may already be gone; waiting below still reaps it.
            warn!(error = %err, "failed to send quit");
        }
        tokio::time::sleep(self.shutdown_grace).await;

        let status = match self.shutdown_timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, inner.wait_for_exit()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(?limit, "steamcmd did not exit after quit, killing it");
                        inner.child.kill().await.map_err(SessionError::Wait)?;
                        inner.child.wait().await
                    }
                }
            }
            None => inner.wait_for_exit().await,
        }
        .map_err(SessionError::Wait)?;

        info!(%status, "steamcmd exited");
        Ok(())
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Inner>, SessionError> {
        let inner = self.inner.lock().await;
        if inner.closed {
            return Err(SessionError::Closed);
        }
        Ok(inner)
    }
}

impl Inner {
    /// Discard output up to every prompt owed by timed-out commands.
    async fn resync(&mut self, timeout: Option<Duration>) -> Result<(), SessionError> {
        while self.owed_prompts > 0 {
            let stale = self.wait_for_suffix(PROMPT, timeout).await?;
            self.owed_prompts -= 1;
            debug!(
                stdout = stale.stdout.len(),
                stderr = stale.stderr.len(),
                remaining = self.owed_prompts,
                "skipped output of a timed-out command"
            );
        }
        Ok(())
    }

    /// Queue `text` for stdin and wait until it has been written.
    async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        let (line, written) = StdinLine::new(text);
        self.stdin
            .send(line)
            .await
            .map_err(|_| SessionError::StdinClosed)?;
        written
            .await
            .map_err(|_| SessionError::StdinClosed)?
            .map_err(SessionError::Stdin)
    }

    async fn wait_for_suffix(
        &mut self,
        suffix: &str,
        timeout: Option<Duration>,
    ) -> Result<Output, SessionError> {
        let mut output = Output::default();
        match timeout {
            Some(limit) => {
                let collect = self.collect_until(suffix, &mut output);
                let waited = tokio::time::timeout(limit, collect).await;
                match waited {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(SessionError::PromptTimeout {
                            timeout: limit,
                            partial: output,
                        });
                    }
                }
            }
            None => self.collect_until(suffix, &mut output).await?,
        }
        self.settle_stderr(&mut output).await;
        Ok(output)
    }

    async fn collect_until(
        &mut self,
        suffix: &str,
        output: &mut Output,
    ) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                token = self.stdout.recv() => {
                    let Some(token) = token else {
                        return Err(self.stdout_closed().await);
                    };
                    let done = token.as_str().ends_with(suffix);
                    if let Token::Line(line) = token {
                        output.stdout.push(line);
                    }
                    if done {
                        break;
                    }
                }
                token = self.stderr.recv(), if self.stderr_open => match token {
                    Some(token) => output.stderr.push(token.as_str().to_owned()),
                    None => self.stderr_open = false,
                },
            }
        }

        Ok(())
    }

    /// Collect stderr that was written before the prompt but relayed after it.
    async fn settle_stderr(&mut self, output: &mut Output) {
        while self.stderr_open {
            match tokio::time::timeout(STDERR_SETTLE, self.stderr.recv()).await {
                Ok(Some(token)) => output.stderr.push(token.as_str().to_owned()),
                Ok(None) => self.stderr_open = false,
                Err(_) => break,
            }
        }
    }

    async fn stdout_closed(&mut self) -> SessionError {
        let source = match self.stdout_pump.take() {
            Some(pump) => match pump.await {
                Ok(result) => result.err(),
                Err(join) => Some(io::Error::other(join)),
            },
            None => None,
        };
        SessionError::StreamClosed {
            stream: Stream::Stdout,
            source,
        }
    }

    /// Wait for the child to exit while draining its output so it never
    /// blocks on a full pipe.
    async fn wait_for_exit(&mut self) -> io::Result<ExitStatus> {
        let mut stdout_open = true;
        loop {
            tokio::select! {
                status = self.child.wait() => return status,
                token = self.stdout.recv(), if stdout_open => stdout_open = token.is_some(),
                token = self.stderr.recv(), if self.stderr_open => self.stderr_open = token.is_some(),
            }
        }
    }
}
