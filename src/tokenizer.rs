//! Splits the raw byte stream of a steamcmd pipe into lines and prompt markers.
//!
//! steamcmd never frames its output. Ordinary output is newline-terminated,
//! and whenever the shell becomes idle it prints [`PROMPT`]: a bold escape,
//! a newline, the literal `Steam>` and a reset escape, with no trailing
//! newline. [`next_token`] decides where the next token ends; [`TokenBuffer`]
//! applies it to a buffer that grows as bytes arrive from the pipe.

/// The exact byte sequence steamcmd prints when it is ready for input.
pub const PROMPT: &str = "\x1b[1m\nSteam>\x1b[0m";

/// One unit of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Text up to, but not including, a newline or the start of a prompt.
    Line(String),
    /// A complete [`PROMPT`] marker.
    Prompt,
}

impl Token {
    /// The line text, or the marker verbatim for [`Token::Prompt`].
    pub fn as_str(&self) -> &str {
        match self {
            Token::Line(line) => line,
            Token::Prompt => PROMPT,
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, Token::Prompt)
    }
}

/// Decide whether `data` starts with a complete token.
///
/// Returns how many bytes to consume and the token, or `(0, None)` when more
/// data is needed. The boundary is whichever of the first newline and the
/// first full prompt marker starts earlier:
///
/// - a marker at offset 0 is consumed whole and returned as [`Token::Prompt`];
/// - a marker later in the buffer with no newline before it ends the current
///   line without being consumed, so the next call yields the marker;
/// - otherwise the line runs up to the newline, which is consumed but not
///   returned.
///
/// A buffer with neither a newline nor a marker never yields a token, even at
/// end of stream, so an unterminated final line is dropped. Before end of
/// stream, a tail that could still grow into a marker starting ahead of the
/// newline holds the decision back, which keeps the result independent of
/// how the bytes were chunked.
///
/// ```
/// use steamcmd_driver::tokenizer::{next_token, Token, PROMPT};
///
/// assert_eq!(
///     next_token(b"Loading Steam API...OK\n", false),
///     (23, Some(Token::Line("Loading Steam API...OK".into())))
/// );
/// assert_eq!(next_token(PROMPT.as_bytes(), false), (PROMPT.len(), Some(Token::Prompt)));
/// assert_eq!(next_token(b"partial", true), (0, None));
/// ```
pub fn next_token(data: &[u8], at_eof: bool) -> (usize, Option<Token>) {
    let marker = PROMPT.as_bytes();
    let newline = data.iter().position(|&b| b == b'\n');
    let prompt = find(data, marker);

    match (newline, prompt) {
        (None, None) => (0, None),
        (_, Some(0)) => (marker.len(), Some(Token::Prompt)),
        (Some(nl), Some(start)) if nl < start => split_line(data, nl, at_eof),
        (_, Some(start)) => (start, Some(line(&data[..start]))),
        (Some(nl), None) => split_line(data, nl, at_eof),
    }
}

fn split_line(data: &[u8], nl: usize, at_eof: bool) -> (usize, Option<Token>) {
    if !at_eof && partial_prompt(data).is_some_and(|start| start < nl) {
        return (0, None);
    }
    (nl + 1, Some(line(&data[..nl])))
}

fn line(bytes: &[u8]) -> Token {
    Token::Line(String::from_utf8_lossy(bytes).into_owned())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Earliest offset whose suffix is a strict, non-empty prefix of the marker.
fn partial_prompt(data: &[u8]) -> Option<usize> {
    let marker = PROMPT.as_bytes();
    let from = data.len().saturating_sub(marker.len() - 1);
    (from..data.len()).find(|&start| marker.starts_with(&data[start..]))
}

/// A streaming buffer that hands out tokens as soon as they are complete.
#[derive(Debug, Default)]
pub struct TokenBuffer {
    data: Vec<u8>,
}

impl TokenBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Take the next complete token, consuming its bytes.
    pub fn next_token(&mut self, at_eof: bool) -> Option<Token> {
        let (consumed, token) = next_token(&self.data, at_eof);
        self.data.drain(..consumed);
        token
    }

    /// Bytes received but not yet part of any token.
    pub fn pending(&self) -> usize {
        self.data.len()
    }
}
