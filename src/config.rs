//! Process and timing configuration for a steamcmd session.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Location of steamcmd on Debian-style installs.
pub const DEFAULT_PROGRAM: &str = "/usr/games/steamcmd";

/// Environment variable that overrides [`DEFAULT_PROGRAM`] in
/// [`SessionConfig::from_env`].
pub const PROGRAM_ENV: &str = "STEAMCMD_PATH";

/// How a [`SessionIo`](crate::SessionIo) spawns and supervises its child.
///
/// ```
/// use std::time::Duration;
/// use steamcmd_driver::SessionConfig;
///
/// let config = SessionConfig::new("/opt/steamcmd/steamcmd.sh")
///     .with_startup_timeout(Duration::from_secs(120))
///     .with_command_timeout(Duration::from_secs(3600));
/// assert_eq!(config.program().to_str(), Some("/opt/steamcmd/steamcmd.sh"));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    program: PathBuf,
    args: Vec<OsString>,
    startup_timeout: Option<Duration>,
    command_timeout: Option<Duration>,
    shutdown_grace: Duration,
    shutdown_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl SessionConfig {
    /// Run `program` with no arguments and no deadlines.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            startup_timeout: None,
            command_timeout: None,
            shutdown_grace: Duration::from_millis(100),
            shutdown_timeout: None,
        }
    }

    /// Like [`SessionConfig::default`], but honours `STEAMCMD_PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(PROGRAM_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Append one argument for the child process.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments for the child process.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Fail startup if the first prompt takes longer than `timeout`.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Fail any command whose prompt takes longer than `timeout`.
    ///
    /// Leave unset for long downloads; `app_update` can run for hours.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Delay between sending `quit` and waiting for the child to exit.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Kill the child if it has not exited this long after `quit`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout
    }
}
