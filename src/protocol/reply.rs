//! Module `reply`
//!
//! Delimits and decodes one server reply at a time from the control
//! connection. A reply is complete only once a terminated final line
//! has been seen; a peer close mid-reply is a framing error, never a
//! short reply, because callers branch on the leading status code.

use std::io::Read;

use crate::error::{FtpError, FtpResult};
use crate::protocol::codes;

/// One decoded control-channel reply: a 3-digit status code plus the
/// full reply text (terminator stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    /// Parses a reply line of the form `DDD text` (or `DDD-text` for
    /// the first line of a multi-line reply).
    fn parse(line: &str) -> FtpResult<Self> {
        let code = line
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .filter(|code| (100..600).contains(code))
            .ok_or_else(|| FtpError::Framing(format!("reply has no status code: {:?}", line)))?;

        // A fourth character, when present, must be the space or dash
        // separator; anything else means the leading digits were not a code.
        match line.as_bytes().get(3) {
            None | Some(b' ') | Some(b'-') => Ok(Reply {
                code,
                text: line.to_string(),
            }),
            Some(_) => Err(FtpError::Framing(format!(
                "reply has no status code: {:?}",
                line
            ))),
        }
    }

    /// Whether this reply signals a locked/unavailable remote resource.
    pub fn is_resource_locked(&self) -> bool {
        codes::is_resource_locked(self.code)
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Buffers raw bytes from a reply source and yields each complete
/// reply exactly once.
pub struct ReplyReader<R: Read> {
    source: R,
    buf: Vec<u8>,
}

impl<R: Read> ReplyReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: Vec::new(),
        }
    }

    /// Blocks until one complete reply is available and returns it.
    ///
    /// Multi-line replies (`DDD-` continuation lines up to the `DDD `
    /// final line) are collected into a single `Reply` whose text
    /// joins the lines with `\n`.
    pub fn read_reply(&mut self) -> FtpResult<Reply> {
        let first = self.read_line()?;
        let reply = Reply::parse(&first)?;

        if first.as_bytes().get(3) != Some(&b'-') {
            return Ok(reply);
        }

        // Multi-line reply: accumulate until a line opens with the
        // same code followed by a space.
        let code_digits = first[..3].to_string();
        let mut text = first;
        loop {
            let line = self.read_line()?;
            let is_final =
                line.starts_with(&code_digits) && line.as_bytes().get(3) == Some(&b' ');
            text.push('\n');
            text.push_str(&line);
            if is_final {
                return Ok(Reply {
                    code: reply.code,
                    text,
                });
            }
        }
    }

    /// Reads one terminated line, stripping the trailing CRLF (or
    /// bare LF). Peer close with pending bytes is a framing error;
    /// peer close between replies is a connection error.
    fn read_line(&mut self) -> FtpResult<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop(); // '\n'
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return String::from_utf8(line)
                    .map_err(|_| FtpError::Framing("reply is not valid UTF-8".to_string()));
            }

            let mut chunk = [0u8; 4096];
            let n = self.source.read(&mut chunk).map_err(FtpError::Connection)?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Err(FtpError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "control connection closed by server",
                    )));
                }
                let partial = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                return Err(FtpError::Framing(format!(
                    "connection closed mid-reply: {:?}",
                    partial
                )));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}
