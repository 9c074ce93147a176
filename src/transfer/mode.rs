//! Transfer modes
//!
//! The negotiated mode for the next data connection, carrying its
//! endpoint as the variant payload: a pre-bound listener in active
//! mode, the server's advertised address in passive mode. The tagged
//! representation makes "both modes at once" unrepresentable.

use std::net::{SocketAddr, TcpListener};

/// Data-connection mode for the next transfer.
///
/// Exactly one variant holds at a time; successful PASV/PORT
/// negotiation replaces the previous value wholesale, and every
/// transfer resets it to `None` on the way out.
#[derive(Debug)]
pub enum SessionMode {
    /// No mode negotiated; transfers are refused.
    None,
    /// Active (PORT) mode: we listen, the server connects to us.
    Active(TcpListener),
    /// Passive (PASV) mode: the server listens at this endpoint.
    Passive(SocketAddr),
}

impl SessionMode {
    pub fn is_none(&self) -> bool {
        matches!(self, SessionMode::None)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionMode::Active(_))
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, SessionMode::Passive(_))
    }

    /// Takes the mode out, leaving `None` behind. Transfers consume
    /// the mode through this so stale endpoints never leak into the
    /// next transfer.
    pub fn take(&mut self) -> SessionMode {
        std::mem::replace(self, SessionMode::None)
    }
}
