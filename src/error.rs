//! Errors returned by [`SessionIo`](crate::SessionIo).

use crate::pump::Stream;
use crate::session_io::Output;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a steamcmd child process.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The child process could not be started
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A piped standard stream was not available after spawning
    #[error("failed to create {0} pipe")]
    Pipe(&'static str),

    /// The child never became ready for its first command
    #[error("failed to wait for initial prompt: {0}")]
    Startup(#[source] Box<SessionError>),

    /// The child wrote to stderr while running a command
    #[error("failed to execute command '{command}': {stderr}")]
    Command { command: String, stderr: String },

    /// No prompt arrived before the configured deadline
    #[error("prompt not observed within {timeout:?}")]
    PromptTimeout { timeout: Duration, partial: Output },

    /// An output stream ended before the expected prompt
    #[error("child {stream} closed before the prompt was observed")]
    StreamClosed {
        stream: Stream,
        #[source]
        source: Option<io::Error>,
    },

    /// Writing a command to the child's stdin failed
    #[error("failed to write to child stdin: {0}")]
    Stdin(#[source] io::Error),

    /// The stdin pump has stopped
    #[error("child stdin is closed")]
    StdinClosed,

    /// Waiting for the child to exit failed
    #[error("failed to wait for child exit: {0}")]
    Wait(#[source] io::Error),

    /// The session has already been closed
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// The joined stderr text of a failed command, if this is one.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SessionError::Command { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Whether a deadline expired, either at startup or while running a command.
    pub fn is_timeout(&self) -> bool {
        match self {
            SessionError::PromptTimeout { .. } => true,
            SessionError::Startup(inner) => inner.is_timeout(),
            _ => false,
        }
    }
}
