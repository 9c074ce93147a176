//! Module `data_channel`
//!
//! Produces the connected transfer socket for one transfer attempt:
//! accepts on the pre-bound listener in active mode, connects out to
//! the advertised endpoint in passive mode. Both paths observe one
//! bounded deadline; an unresponsive peer yields a timeout error, not
//! a hung session. The stream is used for exactly one transfer and
//! never reused.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{FtpError, FtpResult, NegotiationError};
use crate::transfer::SessionMode;

const INITIAL_POLL_MS: u64 = 50;
const MAX_POLL_MS: u64 = 400;

/// Opens the data connection for the given mode within `timeout`.
///
/// Consumes the mode: in active mode the listener is dropped once the
/// server's connection is accepted (or the wait gives up).
pub fn open_data_stream(mode: SessionMode, timeout: Duration) -> FtpResult<TcpStream> {
    match mode {
        SessionMode::None => Err(NegotiationError::ModeNotSet.into()),
        SessionMode::Active(listener) => accept_from_server(listener, timeout),
        SessionMode::Passive(addr) => {
            debug!("connecting to server data endpoint {}", addr);
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    info!("data connection established to {}", addr);
                    Ok(stream)
                }
                Err(e) => {
                    warn!("data connection to {} failed: {}", addr, e);
                    Err(FtpError::Timeout(timeout))
                }
            }
        }
    }
}

/// Waits for the server to connect to our active-mode listener,
/// polling with backoff until the deadline.
fn accept_from_server(listener: TcpListener, timeout: Duration) -> FtpResult<TcpStream> {
    listener
        .set_nonblocking(true)
        .map_err(FtpError::Connection)?;

    let deadline = Instant::now() + timeout;
    let mut delay = INITIAL_POLL_MS;

    loop {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                info!("data connection accepted from {}", peer_addr);
                stream.set_nonblocking(false).map_err(FtpError::Connection)?;
                return Ok(stream);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    warn!("no data connection within {:?}", timeout);
                    return Err(FtpError::Timeout(timeout));
                }
                thread::sleep(remaining.min(Duration::from_millis(delay)));
                delay = (delay * 2).min(MAX_POLL_MS);
            }
            Err(e) => return Err(FtpError::Connection(e)),
        }
    }
}
