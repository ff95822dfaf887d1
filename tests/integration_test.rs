use std::fs;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use steamcmd_driver::{Session, SessionConfig, SessionError, SessionFactory, SessionIo};

/// A tiny stand-in for steamcmd: prints a banner and the bold prompt, then
/// answers a handful of commands. `$1`, when given, is a file that records
/// the `quit` command.
const STUB: &str = r#"
prompt() { printf '\033[1m\nSteam>\033[0m'; }
printf 'Redirecting stderr to stderr.txt\n'
prompt
while IFS= read -r line; do
  case "$line" in
    "login anonymous") printf 'Logging in...\n' ;;
    "app_update 12345") printf 'ERROR: invalid appid\n' >&2; sleep 0.2 ;;
    warn) printf 'WARNING: low disk space\n' >&2 ;;
    slow) sleep 1; printf 'late\n' ;;
    "echo "*) printf '%s\n' "${line#echo }" ;;
    multi) printf 'one\ntwo\n'; printf 'three' ;;
    hang) sleep 5; continue ;;
    crash) exit 3 ;;
    quit) [ -n "$1" ] && printf '%s\n' "$line" > "$1"; exit 0 ;;
  esac
  prompt
done
"#;

/// Like `STUB`, but ignores `quit`.
const STUBBORN_STUB: &str = r#"
printf '\033[1m\nSteam>\033[0m'
while IFS= read -r line; do :; done
sleep 30
"#;

fn stub_config() -> SessionConfig {
    SessionConfig::new("sh")
        .arg("-c")
        .arg(STUB)
        .with_startup_timeout(Duration::from_secs(5))
        .with_command_timeout(Duration::from_secs(5))
}

fn driver() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_steamcmd-driver"));
    cmd.arg("--steamcmd")
        .arg("sh")
        .arg("--steamcmd-arg=-c")
        .arg(format!("--steamcmd-arg={STUB}"))
        .arg("--timeout")
        .arg("5s")
        .env_remove("STEAMCMD_PATH");
    cmd
}

#[tokio::test]
async fn test_exec_collects_stdout_until_prompt() {
    let io = SessionIo::spawn(&stub_config()).await.unwrap();

    let output = io.exec("echo Connecting anonymously").await.unwrap();
    assert_eq!(output.stdout, vec!["Connecting anonymously".to_string()]);
    assert!(output.stderr.is_empty());

    let output = io.exec("multi").await.unwrap();
    assert_eq!(output.stdout, vec!["one", "two", "three"]);

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_exec_fails_on_stderr() {
    let io = SessionIo::spawn(&stub_config()).await.unwrap();

    let err = io.exec("app_update 12345").await.err().unwrap();
    assert_eq!(err.stderr(), Some("ERROR: invalid appid"));

    // The session stays usable after a failed command.
    let output = io.exec("echo still here").await.unwrap();
    assert_eq!(output.stdout, vec!["still here"]);

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_exec_fails_on_stderr_right_before_prompt() {
    let io = SessionIo::spawn(&stub_config()).await.unwrap();

    let err = io.exec("warn").await.err().unwrap();
    assert_eq!(err.stderr(), Some("WARNING: low disk space"));

    let output = io.exec("echo ok").await.unwrap();
    assert_eq!(output.stdout, vec!["ok"]);

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_suffix_stops_at_matching_line() {
    let config = SessionConfig::new("sh")
        .arg("-c")
        .arg(r"printf '\033[1m\nSteam>\033[0m'; sleep 0.2; printf 'Loading Steam API...OK\n\033[1m\nSteam>\033[0m'; sleep 5")
        .with_command_timeout(Duration::from_secs(5));
    let io = SessionIo::spawn(&config).await.unwrap();

    let output = io.wait_for_suffix("...OK").await.unwrap();
    assert_eq!(output.stdout, vec!["Loading Steam API...OK"]);

    let output = io.wait_for_prompt().await.unwrap();
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn test_exec_times_out_without_prompt() {
    let config = stub_config().with_command_timeout(Duration::from_millis(300));
    let io = SessionIo::spawn(&config).await.unwrap();

    let err = io.exec("hang").await.err().unwrap();
    assert!(err.is_timeout(), "got: {err}");
}

#[tokio::test]
async fn test_exec_after_timeout_skips_late_output() {
    let config = stub_config().with_command_timeout(Duration::from_millis(300));
    let io = SessionIo::spawn(&config).await.unwrap();

    let err = io.exec("slow").await.err().unwrap();
    assert!(err.is_timeout(), "got: {err}");

    // Let the late line and its prompt arrive before the next command.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let output = io.exec("echo next").await.unwrap();
    assert_eq!(output.stdout, vec!["next"]);
    let output = io.exec("echo third").await.unwrap();
    assert_eq!(output.stdout, vec!["third"]);

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_exec_reports_child_exit() {
    let io = SessionIo::spawn(&stub_config()).await.unwrap();

    let err = io.exec("crash").await.err().unwrap();
    assert!(
        matches!(err, SessionError::StreamClosed { .. }),
        "got: {err}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exec_is_serialized() {
    let io = Arc::new(SessionIo::spawn(&stub_config()).await.unwrap());

    let mut tasks = Vec::new();
    for task in 0..4 {
        let io = Arc::clone(&io);
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                let text = format!("task{task}-{i}");
                let output = io.exec(&format!("echo {text}")).await.unwrap();
                assert_eq!(output.stdout, vec![text]);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_close_sends_quit_without_waiting_for_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mark = dir.path().join("quit.txt");
    let config = stub_config().arg("stub").arg(&mark);
    let io = SessionIo::spawn(&config).await.unwrap();

    io.close().await.unwrap();
    assert_eq!(fs::read_to_string(&mark).unwrap(), "quit\n");

    // Closing twice is harmless; everything else is refused.
    io.close().await.unwrap();
    assert!(matches!(
        io.exec("echo late").await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn test_close_kills_unresponsive_child() {
    let config = SessionConfig::new("sh")
        .arg("-c")
        .arg(STUBBORN_STUB)
        .with_shutdown_grace(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_millis(300));
    let io = SessionIo::spawn(&config).await.unwrap();

    io.close().await.unwrap();
}

#[tokio::test]
async fn test_session_login() {
    let session = Session::connect(&stub_config(), "").await.unwrap();
    assert_eq!(session.username(), "anonymous");

    let output = session.login().await.unwrap();
    assert_eq!(output.stdout, vec!["Logging in..."]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_factory_creates_sessions() {
    let factory = SessionFactory::new("").with_config(stub_config());
    let session = factory.create().await.unwrap();
    assert_eq!(session.username(), "anonymous");
    assert!(session.io().id().is_some());

    let output = session.login().await.unwrap();
    assert_eq!(output.stdout, vec!["Logging in..."]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_session_app_update_failure() {
    let session = Session::connect(&stub_config(), "anonymous").await.unwrap();

    let err = session.app_update(12345, false).await.err().unwrap();
    let message = format!("{err:#}");
    assert!(message.contains("app update"), "got: {message}");
    assert!(message.contains("ERROR: invalid appid"), "got: {message}");
    assert_eq!(
        err.downcast_ref::<SessionError>().and_then(SessionError::stderr),
        Some("ERROR: invalid appid")
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_session_run_script() {
    let session = Session::connect(&stub_config(), "anonymous").await.unwrap();
    let script = steamcmd_driver::parse_str(
        "// warm up\nlogin anonymous\n# build #2\necho done #2\nquit\necho never\n",
    )
    .unwrap();

    let outputs = session.run_script(&script).await.unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].stdout, vec!["Logging in..."]);
    assert_eq!(outputs[1].stdout, vec!["done #2"]);

    session.close().await.unwrap();
}

#[test]
fn test_cli_exec() {
    let output = driver()
        .arg("exec")
        .arg("echo hello")
        .arg("echo world")
        .output()
        .expect("Failed to execute steamcmd-driver");

    assert!(
        output.status.success(),
        "steamcmd-driver failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\nworld\n");
}

#[test]
fn test_cli_app_update_failure() {
    let output = driver()
        .arg("app-update")
        .arg("12345")
        .output()
        .expect("Failed to execute steamcmd-driver");

    assert!(!output.status.success(), "app-update should fail");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Logging in..."), "got: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid appid"), "got: {stderr}");
}

#[test]
fn test_cli_script() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("update.txt");
    fs::write(&script_path, "login anonymous\n# comment\necho ready\nquit\n").unwrap();

    let output = driver()
        .arg("script")
        .arg(&script_path)
        .output()
        .expect("Failed to execute steamcmd-driver");

    assert!(
        output.status.success(),
        "steamcmd-driver failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Logging in...\nready\n"
    );
}

#[test]
fn test_cli_invalid_timeout() {
    let output = driver()
        .arg("--startup-timeout")
        .arg("5minutes")
        .arg("login")
        .output()
        .expect("Failed to execute steamcmd-driver");

    assert!(!output.status.success());
}
