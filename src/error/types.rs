//! Error types
//!
//! Defines domain-specific error types for each failure class of the
//! FTP client. Connection and framing failures end the session; every
//! other class aborts the current operation and leaves the control
//! channel usable for the next command.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Mode negotiation errors (PASV/PORT)
#[derive(Debug)]
pub enum NegotiationError {
    /// A transfer was requested before PASV or PORT negotiated a mode.
    ModeNotSet,
    /// The server rejected the negotiation command.
    Rejected {
        command: &'static str,
        code: u16,
        text: String,
    },
    /// The PASV reply carried no parsable `h1,h2,h3,h4,p1,p2` tuple.
    MalformedPasvReply(String),
    /// Binding the active-mode listener failed.
    BindFailed(SocketAddr, io::Error),
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::ModeNotSet => {
                write!(f, "No transfer mode negotiated (send PASV or PORT first)")
            }
            NegotiationError::Rejected {
                command,
                code,
                text,
            } => {
                write!(f, "{} rejected with {}: {}", command, code, text)
            }
            NegotiationError::MalformedPasvReply(text) => {
                write!(f, "Malformed PASV reply: {}", text)
            }
            NegotiationError::BindFailed(addr, e) => {
                write!(f, "Failed to bind data listener on {}: {}", addr, e)
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

/// General FTP client error that encompasses all failure classes
#[derive(Debug)]
pub enum FtpError {
    /// Control connection refused, reset or closed. Fatal to the session.
    Connection(io::Error),
    /// A reply could not be delimited or decoded. Fatal to the session.
    Framing(String),
    /// Unexpected reply code for the attempted operation.
    Protocol { code: u16, text: String },
    /// PASV/PORT negotiation failed.
    Negotiation(NegotiationError),
    /// 450-class reply: the remote resource is locked or unavailable.
    ResourceLocked { code: u16, text: String },
    /// Data connection not established within the deadline.
    Timeout(Duration),
    /// Local file open/seek/read/write failure.
    LocalIo(io::Error),
}

impl FtpError {
    /// Whether the session is unusable after this error.
    ///
    /// Only control-connection loss and undecodable replies end the
    /// session; all other failures abort the current operation only.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FtpError::Connection(_) | FtpError::Framing(_))
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpError::Connection(e) => write!(f, "Control connection error: {}", e),
            FtpError::Framing(msg) => write!(f, "Reply framing error: {}", msg),
            FtpError::Protocol { code, text } => {
                write!(f, "Unexpected reply {}: {}", code, text)
            }
            FtpError::Negotiation(e) => write!(f, "Negotiation error: {}", e),
            FtpError::ResourceLocked { code, text } => {
                write!(f, "Remote resource unavailable ({}): {}", code, text)
            }
            FtpError::Timeout(d) => {
                write!(f, "No data connection within {} seconds", d.as_secs())
            }
            FtpError::LocalIo(e) => write!(f, "Local file error: {}", e),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<NegotiationError> for FtpError {
    fn from(error: NegotiationError) -> Self {
        FtpError::Negotiation(error)
    }
}

/// Result alias used throughout the crate
pub type FtpResult<T> = Result<T, FtpError>;
