//! Mode negotiation
//!
//! Issues PASV/PORT on the control channel and produces the session
//! mode for the next transfer. Failure leaves the caller's mode
//! untouched: a new mode is only ever returned whole, never a
//! partially parsed endpoint.

use log::info;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};

use crate::control::ControlChannel;
use crate::error::{FtpResult, NegotiationError};
use crate::protocol::codes;
use crate::transfer::SessionMode;

/// Parses the six decimal fields `h1,h2,h3,h4,p1,p2` into an IPv4
/// endpoint (`h1.h2.h3.h4`, port `p1*256 + p2`). `None` when any field
/// is missing, non-numeric or out of the octet range.
pub fn parse_host_port_fields(fields: &str) -> Option<SocketAddrV4> {
    let parts: Vec<&str> = fields.split(',').map(str::trim).collect();
    if parts.len() != 6 {
        return None;
    }

    let mut octets = [0u8; 4];
    for (octet, part) in octets.iter_mut().zip(&parts[..4]) {
        *octet = part.parse().ok()?;
    }
    let p1 = parts[4].parse::<u8>().ok()? as u16;
    let p2 = parts[5].parse::<u8>().ok()? as u16;

    Some(SocketAddrV4::new(Ipv4Addr::from(octets), p1 * 256 + p2))
}

/// Extracts the endpoint tuple from a 227 reply's parenthesized body.
pub fn parse_pasv_endpoint(text: &str) -> Result<SocketAddrV4, NegotiationError> {
    let open = text.rfind('(');
    let close = text.rfind(')');
    let tuple = match (open, close) {
        (Some(open), Some(close)) if open < close => &text[open + 1..close],
        _ => return Err(NegotiationError::MalformedPasvReply(text.to_string())),
    };
    parse_host_port_fields(tuple)
        .ok_or_else(|| NegotiationError::MalformedPasvReply(text.to_string()))
}

/// Formats a local endpoint as the `PORT` argument
/// (`h1,h2,h3,h4,p1,p2` with p1 = port div 256, p2 = port mod 256).
pub fn format_port_fields(addr: &SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port / 256, port % 256)
}

/// Sends `PASV` and parses the server's advertised data endpoint.
/// Requires reply code 227.
pub fn enter_passive(ctrl: &mut ControlChannel) -> FtpResult<SessionMode> {
    let reply = ctrl.exchange("PASV")?;
    if reply.code != codes::ENTERING_PASSIVE {
        return Err(NegotiationError::Rejected {
            command: "PASV",
            code: reply.code,
            text: reply.text,
        }
        .into());
    }

    let endpoint = parse_pasv_endpoint(&reply.text)?;
    info!("passive mode: server data endpoint {}", endpoint);
    Ok(SessionMode::Passive(SocketAddr::V4(endpoint)))
}

/// Binds and listens on `addr:port`, then sends the matching `PORT`
/// command. Requires reply code 200.
///
/// Binding happens before the command goes out so the server can
/// connect the instant it replies; the reverse order races the peer's
/// connect attempt. Port 0 asks the OS for a free port; the command
/// advertises whatever was actually bound. On rejection the listener
/// is dropped (closed) with the error.
pub fn enter_active(ctrl: &mut ControlChannel, addr: Ipv4Addr, port: u16) -> FtpResult<SessionMode> {
    let requested = SocketAddrV4::new(addr, port);
    let listener = TcpListener::bind(requested)
        .map_err(|e| NegotiationError::BindFailed(SocketAddr::V4(requested), e))?;
    let bound_port = listener
        .local_addr()
        .map_err(|e| NegotiationError::BindFailed(SocketAddr::V4(requested), e))?
        .port();
    let bound = SocketAddrV4::new(addr, bound_port);

    let reply = ctrl.exchange(&format!("PORT {}", format_port_fields(&bound)))?;
    if reply.code != codes::COMMAND_OK {
        return Err(NegotiationError::Rejected {
            command: "PORT",
            code: reply.code,
            text: reply.text,
        }
        .into());
    }

    info!("active mode: listening on {}", bound);
    Ok(SessionMode::Active(listener))
}
