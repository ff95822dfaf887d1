use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use steamcmd_driver::config::DEFAULT_PROGRAM;
use steamcmd_driver::script::parse_duration;
use steamcmd_driver::{Output, Session, SessionConfig, parse_file};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `steamcmd_driver=debug`.
const LOG_ENV: &str = "STEAMCMD_DRIVER_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "steamcmd-driver",
    about = "Run steamcmd commands through an interactive steamcmd session",
    version
)]
struct Args {
    /// Path to the steamcmd executable
    #[arg(long, env = "STEAMCMD_PATH", default_value = DEFAULT_PROGRAM)]
    steamcmd: PathBuf,

    /// Extra argument for the steamcmd executable (repeatable)
    #[arg(long = "steamcmd-arg", allow_hyphen_values = true)]
    steamcmd_args: Vec<String>,

    /// Steam account to log in with
    #[arg(short, long, default_value = "")]
    username: String,

    /// Per-command deadline, e.g. `30s` or `500ms`
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Deadline for the first prompt after launch
    #[arg(long, value_parser = parse_duration)]
    startup_timeout: Option<Duration>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Log in and exit
    Login,

    /// Install or update an app
    AppUpdate {
        app_id: u32,

        /// Verify all installed files
        #[arg(long)]
        validate: bool,

        /// Directory to install into
        #[arg(long)]
        install_dir: Option<PathBuf>,
    },

    /// Download a workshop item
    InstallMod {
        app_id: u32,
        mod_id: u64,

        /// Directory to install into
        #[arg(long)]
        install_dir: Option<PathBuf>,
    },

    /// Run raw steamcmd commands without logging in
    Exec {
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Run a steamcmd runscript file
    Script { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = SessionConfig::new(&args.steamcmd).with_args(&args.steamcmd_args);
    if let Some(timeout) = args.timeout {
        config = config.with_command_timeout(timeout);
    }
    if let Some(timeout) = args.startup_timeout {
        config = config.with_startup_timeout(timeout);
    }

    let session = Session::connect(&config, &args.username)
        .await
        .with_context(|| format!("failed to start {}", args.steamcmd.display()))?;

    let result = run(&session, args.command).await;
    let closed = session.close().await;
    result?;
    closed
}

async fn run(session: &Session, action: Action) -> Result<()> {
    match action {
        Action::Login => print_output(&session.login().await?),
        Action::AppUpdate {
            app_id,
            validate,
            install_dir,
        } => {
            if let Some(dir) = install_dir {
                print_output(&session.force_install_dir(dir).await?);
            }
            print_output(&session.login().await?);
            print_output(&session.app_update(app_id, validate).await?);
        }
        Action::InstallMod {
            app_id,
            mod_id,
            install_dir,
        } => {
            if let Some(dir) = install_dir {
                print_output(&session.force_install_dir(dir).await?);
            }
            print_output(&session.login().await?);
            print_output(&session.install_mod(app_id, mod_id).await?);
        }
        Action::Exec { commands } => {
            for command in commands {
                let output = session
                    .io()
                    .exec(&command)
                    .await
                    .with_context(|| format!("failed to run '{command}'"))?;
                print_output(&output);
            }
        }
        Action::Script { path } => {
            let script = parse_file(&path)
                .with_context(|| format!("failed to parse script file: {}", path.display()))?;
            for output in session.run_script(&script).await? {
                print_output(&output);
            }
        }
    }
    Ok(())
}

fn print_output(output: &Output) {
    for line in &output.stdout {
        println!("{line}");
    }
}

/// Log to stderr so command output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
