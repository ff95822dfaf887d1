//! Parser for steamcmd runscript files.
//!
//! A runscript holds one steamcmd command per line. The top-level entry points
//! are [`parse_str`] and [`parse_file`].

use anyhow::{Context as _, Result, anyhow};
use std::path::Path;
use std::time::Duration;

/// An ordered list of steamcmd commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    commands: Vec<String>,
}

impl Script {
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Parse a runscript from a string slice.
///
/// Empty lines and lines starting with `#` or `//` are ignored. Every other
/// line is passed to steamcmd verbatim, `#` included. A `quit` line ends the
/// script; anything after it is ignored, since closing the session is left to
/// the caller.
///
/// # Example
///
/// ```
/// use steamcmd_driver::parse_str;
///
/// let script = parse_str("// dedicated server\nlogin anonymous\napp_update 740 validate\nquit\n").unwrap();
/// assert_eq!(script.commands(), ["login anonymous", "app_update 740 validate"]);
/// ```
pub fn parse_str(content: &str) -> Result<Script> {
    let mut commands = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        commands.push(line.to_string());
    }
    Ok(Script { commands })
}

/// Parse a runscript from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
///
/// # Example
///
/// ```no_run
/// use steamcmd_driver::parse_file;
///
/// let script = parse_file("update_csgo.txt").unwrap();
/// ```
pub fn parse_file(path: impl AsRef<Path>) -> Result<Script> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script file: {}", path.display()))?;
    parse_str(&content)
}

/// Parse a duration string: `1s`, `500ms`, `1.5s`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(ms_str) = s.strip_suffix("ms") {
        let ms: u64 = ms_str
            .trim()
            .parse()
            .context("invalid milliseconds value")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(s_str) = s.strip_suffix('s') {
        let secs: f64 = s_str.trim().parse().context("invalid seconds value")?;
        Duration::try_from_secs_f64(secs).context("invalid seconds value")
    } else {
        Err(anyhow!("duration must end with 's' or 'ms', got: {}", s))
    }
}
