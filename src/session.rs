//! Domain-level steamcmd operations on top of [`SessionIo`].

use crate::config::SessionConfig;
use crate::script::Script;
use crate::session_io::{Output, SessionIo};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Username used when none is given.
pub const DEFAULT_USERNAME: &str = "anonymous";

fn username_or_default(username: &str) -> String {
    if username.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        username.to_string()
    }
}

/// Creates sessions that share a username and process configuration.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    username: String,
    config: SessionConfig,
}

impl SessionFactory {
    /// A factory for `username` (empty means anonymous) using
    /// [`SessionConfig::from_env`].
    pub fn new(username: impl AsRef<str>) -> Self {
        Self {
            username: username_or_default(username.as_ref()),
            config: SessionConfig::from_env(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Spawn a fresh steamcmd and wrap it in a [`Session`].
    pub async fn create(&self) -> Result<Session> {
        Session::connect(&self.config, &self.username).await
    }
}

/// A steamcmd shell bound to one user.
///
/// Each method formats a steamcmd command and runs it through
/// [`SessionIo::exec`], returning what the command printed.
pub struct Session {
    io: SessionIo,
    username: String,
}

impl Session {
    pub async fn connect(config: &SessionConfig, username: &str) -> Result<Self> {
        let io = SessionIo::spawn(config)
            .await
            .context("failed to create session IO")?;
        Ok(Self {
            io,
            username: username_or_default(username),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The underlying driver, for raw commands.
    pub fn io(&self) -> &SessionIo {
        &self.io
    }

    /// `login <username>`
    pub async fn login(&self) -> Result<Output> {
        info!(username = %self.username, "logging in");
        self.io
            .exec(&format!("login {}", self.username))
            .await
            .context("failed to execute login command")
    }

    /// `force_install_dir <dir>`
    pub async fn force_install_dir(&self, install_dir: impl AsRef<Path>) -> Result<Output> {
        let install_dir = install_dir.as_ref().display().to_string();
        self.io
            .exec(&format!("force_install_dir {install_dir}"))
            .await
            .with_context(|| format!("failed to force install dir {install_dir}"))
    }

    /// `app_update <app_id> [validate]`
    pub async fn app_update(&self, app_id: u32, validate: bool) -> Result<Output> {
        let mut command = format!("app_update {app_id}");
        if validate {
            command.push_str(" validate");
        }
        info!(app_id, validate, "updating app");
        self.io
            .exec(&command)
            .await
            .context("failed to execute app update command")
    }

    /// `workshop_download_item <app_id> <mod_id>`
    pub async fn install_mod(&self, app_id: u32, mod_id: u64) -> Result<Output> {
        info!(app_id, mod_id, "downloading workshop item");
        self.io
            .exec(&format!("workshop_download_item {app_id} {mod_id}"))
            .await
            .context("failed to execute install mod command")
    }

    /// Run every command of `script` in order, stopping at the first failure.
    pub async fn run_script(&self, script: &Script) -> Result<Vec<Output>> {
        let mut outputs = Vec::with_capacity(script.commands().len());
        for (idx, command) in script.commands().iter().enumerate() {
            let output = self
                .io
                .exec(command)
                .await
                .with_context(|| format!("script command {} failed: {}", idx + 1, command))?;
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Ask steamcmd to quit and wait for it to exit.
    pub async fn close(&self) -> Result<()> {
        self.io.close().await.context("failed to close session")
    }
}
