//! Module `control`
//!
//! Owns the FTP control connection: sends command lines and reads
//! delimited replies, one outstanding command/reply pair at a time.
//! Every wire line is mirrored to an optional caller-supplied trace
//! sink so front-ends can render the conversation.

use log::debug;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{FtpError, FtpResult};
use crate::protocol::{Reply, ReplyReader};

/// Direction of a traced wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// Wire-level observer injected by the shell.
pub trait TraceSink: Send {
    fn line(&mut self, direction: Direction, text: &str);
}

/// The persistent command/reply connection to the server.
pub struct ControlChannel {
    stream: TcpStream,
    reader: ReplyReader<TcpStream>,
    trace: Option<Box<dyn TraceSink>>,
}

impl ControlChannel {
    /// Opens a TCP connection to the server. The greeting is NOT
    /// consumed here; the session reads it once tracing is attached.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> FtpResult<Self> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(FtpError::Connection)?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let reader =
                        ReplyReader::new(stream.try_clone().map_err(FtpError::Connection)?);
                    debug!("control connection established to {}", addr);
                    return Ok(Self {
                        stream,
                        reader,
                        trace: None,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(FtpError::Connection(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {}:{}", host, port),
            )
        })))
    }

    /// Installs the wire trace sink. Lines sent and received from this
    /// point on are mirrored to it.
    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Appends CRLF and writes the command line in one syscall-sized
    /// write.
    pub fn send_command(&mut self, line: &str) -> FtpResult<()> {
        let wire = format!("{}\r\n", line);
        self.stream
            .write_all(wire.as_bytes())
            .map_err(FtpError::Connection)?;
        self.stream.flush().map_err(FtpError::Connection)?;
        debug!("--> {}", line);
        if let Some(sink) = self.trace.as_mut() {
            sink.line(Direction::Sent, line);
        }
        Ok(())
    }

    /// Blocks until one complete reply is available.
    pub fn read_reply(&mut self) -> FtpResult<Reply> {
        let reply = self.reader.read_reply()?;
        debug!("<-- {}", reply.text);
        if let Some(sink) = self.trace.as_mut() {
            sink.line(Direction::Received, &reply.text);
        }
        Ok(reply)
    }

    /// One command/reply exchange.
    pub fn exchange(&mut self, line: &str) -> FtpResult<Reply> {
        self.send_command(line)?;
        self.read_reply()
    }
}
