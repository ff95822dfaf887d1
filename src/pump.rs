//! Background tasks relaying data between the child's pipes and channels.

use crate::tokenizer::{Token, TokenBuffer};
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of the stdout and stderr token channels.
pub const STREAM_CAPACITY: usize = 100;

/// Which output pipe a reader pump is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// A line queued for the child's stdin, with a slot for the write result.
#[derive(Debug)]
pub struct StdinLine {
    pub text: String,
    pub written: oneshot::Sender<io::Result<()>>,
}

impl StdinLine {
    /// Create a line and the receiver that resolves once it has been written.
    pub fn new(text: impl Into<String>) -> (Self, oneshot::Receiver<io::Result<()>>) {
        let (written, rx) = oneshot::channel();
        let line = Self {
            text: text.into(),
            written,
        };
        (line, rx)
    }
}

/// Spawns a task that tokenizes `reader` and publishes every token on `tx`.
///
/// The task ends at end of stream, when the receiver is dropped, or on a read
/// error, which becomes the task's result.
pub fn spawn_reader<R>(
    mut reader: R,
    stream: Stream,
    tx: mpsc::Sender<Token>,
) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let result = relay(&mut reader, stream, &tx).await;
        if let Err(err) = &result {
            warn!(%stream, error = %err, "failed to read from child");
        }
        result
    })
}

async fn relay<R>(reader: &mut R, stream: Stream, tx: &mpsc::Sender<Token>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut tokens = TokenBuffer::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        let at_eof = n == 0;
        tokens.extend(&chunk[..n]);

        while let Some(token) = tokens.next_token(at_eof) {
            debug!(%stream, token = ?token.as_str(), "received");
            if tx.send(token).await.is_err() {
                return Ok(()); // receiver dropped
            }
        }

        if at_eof {
            if tokens.pending() > 0 {
                debug!(%stream, bytes = tokens.pending(), "discarding unterminated output");
            }
            debug!(%stream, "end of stream");
            return Ok(());
        }
    }
}

/// Spawns a task that writes each queued line plus a newline to `writer`.
///
/// Every write result is reported back through [`StdinLine::written`]. The
/// task stops after a failed write or once all senders are gone; either way
/// `writer` is dropped, closing the child's stdin.
pub fn spawn_writer<W>(mut writer: W, mut rx: mpsc::Receiver<StdinLine>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(StdinLine { text, written }) = rx.recv().await {
            debug!(stream = "stdin", line = %text, "sending");
            let mut bytes = text.into_bytes();
            bytes.push(b'\n');

            let result = write_line(&mut writer, &bytes).await;
            let failed = result.is_err();
            if let Err(err) = &result {
                warn!(error = %err, "failed to write to child stdin");
            }
            // The caller may have given up waiting.
            let _ = written.send(result);
            if failed {
                break;
            }
        }
    })
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
