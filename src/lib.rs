//! # steamcmd-driver
//!
//! Drive an interactive `steamcmd` shell as a child process.
//!
//! steamcmd speaks plain text over its standard streams and signals that it
//! is idle by printing a bold `Steam>` prompt. This crate turns that into a
//! request/response API: every command is written to the child's stdin, and
//! everything it prints up to the next prompt comes back as an [`Output`].
//! Anything written to stderr in that window fails the command.
//!
//! ## Quick start
//!
//! ```no_run
//! use steamcmd_driver::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::connect(&SessionConfig::from_env(), "anonymous").await?;
//!     session.login().await?;
//!     session.force_install_dir("/srv/cs2").await?;
//!     let output = session.app_update(730, true).await?;
//!     println!("{}", output.stdout_text());
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Raw commands
//!
//! [`SessionIo`] is the low-level driver. It can be shared between tasks; an
//! internal lock keeps one command in flight at a time.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use steamcmd_driver::{SessionConfig, SessionIo};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SessionConfig::from_env().with_command_timeout(Duration::from_secs(30));
//!     let io = Arc::new(SessionIo::spawn(&config).await?);
//!     let output = io.exec("app_status 740").await?;
//!     for line in &output.stdout {
//!         println!("{line}");
//!     }
//!     io.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Runscripts
//!
//! steamcmd runscript files can be parsed with [`parse_str`] or
//! [`parse_file`] and replayed through [`Session::run_script`].

pub mod config;
pub mod error;
pub mod pump;
pub mod script;
pub mod session;
pub mod session_io;
pub mod tokenizer;

pub use config::SessionConfig;
pub use error::SessionError;
pub use script::{Script, parse_file, parse_str};
pub use session::{DEFAULT_USERNAME, Session, SessionFactory};
pub use session_io::{Output, SessionIo};
pub use tokenizer::{PROMPT, Token};
