//! Module `session`
//!
//! The one object front-ends talk to. Composes the control channel,
//! mode negotiation and the transfer engine into the FTP operations a
//! shell exposes: login, raw command passthrough, PASV/PORT, LIST and
//! the four transfer forms. The control channel is strictly
//! sequential; one command/reply pair is in flight at a time.

use log::{info, warn};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::control::{ControlChannel, TraceSink};
use crate::error::{FtpError, FtpResult};
use crate::protocol::{Reply, codes};
use crate::transfer::{SessionMode, TransferEngine, negotiate};

/// One FTP session over one control connection.
pub struct Session {
    ctrl: ControlChannel,
    mode: SessionMode,
    greeting: Reply,
    data_timeout: Duration,
    buffer_size: usize,
}

impl Session {
    /// Opens the control connection and consumes the server greeting.
    pub fn connect(config: &ClientConfig) -> FtpResult<Self> {
        Self::connect_with_trace(config, None)
    }

    /// Like [`Session::connect`], with a wire trace sink installed
    /// before the greeting is read so the shell sees every line.
    pub fn connect_with_trace(
        config: &ClientConfig,
        trace: Option<Box<dyn TraceSink>>,
    ) -> FtpResult<Self> {
        let mut ctrl = ControlChannel::connect(&config.host, config.port, config.connect_timeout())?;
        if let Some(sink) = trace {
            ctrl.set_trace(sink);
        }

        let greeting = ctrl.read_reply()?;
        if greeting.code != codes::SERVICE_READY {
            warn!("unexpected greeting: {}", greeting.text);
        }
        info!("connected to {}:{}", config.host, config.port);

        Ok(Self {
            ctrl,
            mode: SessionMode::None,
            greeting,
            data_timeout: config.data_timeout(),
            buffer_size: config.buffer_size,
        })
    }

    /// The greeting received when the control connection opened.
    pub fn greeting(&self) -> &Reply {
        &self.greeting
    }

    /// The currently negotiated transfer mode.
    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// USER/PASS login. Requires 331 to USER and 230 to PASS; any
    /// other code fails the login and nothing further is attempted.
    pub fn login(&mut self, user: &str, pass: &str) -> FtpResult<()> {
        let reply = self.ctrl.exchange(&format!("USER {}", user))?;
        if reply.code != codes::PASSWORD_REQUIRED {
            return Err(FtpError::Protocol {
                code: reply.code,
                text: reply.text,
            });
        }

        let reply = self.ctrl.exchange(&format!("PASS {}", pass))?;
        if reply.code != codes::LOGIN_SUCCESS {
            return Err(FtpError::Protocol {
                code: reply.code,
                text: reply.text,
            });
        }

        info!("logged in as {}", user);
        Ok(())
    }

    /// Sends a raw command line and returns its reply. For everything
    /// without bespoke handling: TYPE, SYST, NOOP, PWD, CWD, ...
    pub fn execute(&mut self, raw: &str) -> FtpResult<Reply> {
        self.ctrl.exchange(raw)
    }

    /// Negotiates passive mode, replacing any previously negotiated
    /// endpoint. On failure the previous mode is kept.
    pub fn enter_passive(&mut self) -> FtpResult<()> {
        self.mode = negotiate::enter_passive(&mut self.ctrl)?;
        Ok(())
    }

    /// Binds `addr:port` and negotiates active mode, replacing any
    /// previously negotiated endpoint. Port 0 picks a free port.
    pub fn enter_active(&mut self, addr: Ipv4Addr, port: u16) -> FtpResult<()> {
        self.mode = negotiate::enter_active(&mut self.ctrl, addr, port)?;
        Ok(())
    }

    /// LIST: returns the decoded listing lines with any leading
    /// "total" summary line filtered out.
    ///
    /// Listing is read-only, so this is the one operation that
    /// auto-enters passive mode when none is negotiated; transfers
    /// always require an explicit PASV/PORT first.
    pub fn list(&mut self, directory: Option<&str>) -> FtpResult<Vec<String>> {
        if self.mode.is_none() {
            self.enter_passive()?;
        }
        let mode = self.mode.take();

        let command = match directory {
            Some(dir) => format!("LIST {}", dir),
            None => "LIST".to_string(),
        };

        let data_timeout = self.data_timeout;
        let buffer_size = self.buffer_size;
        let raw = TransferEngine::new(&mut self.ctrl, data_timeout, buffer_size)
            .read_to_buffer(mode, &command)?;
        let text = String::from_utf8_lossy(&raw);

        let mut lines: Vec<String> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if lines.first().is_some_and(|line| line.starts_with("total")) {
            lines.remove(0);
        }
        Ok(lines)
    }

    /// Downloads `remote` into `local`, truncating any existing file.
    pub fn retrieve(
        &mut self,
        remote: &str,
        local: &Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        self.download(remote, local, false, progress)
    }

    /// Downloads `remote` into `local`, resuming after any bytes the
    /// local file already holds.
    pub fn retrieve_resumable(
        &mut self,
        remote: &str,
        local: &Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        self.download(remote, local, true, progress)
    }

    /// Uploads `local` as `remote` from the beginning.
    pub fn store(
        &mut self,
        local: &Path,
        remote: &str,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        self.upload(local, remote, false, progress)
    }

    /// Uploads `local` as `remote`, resuming after the bytes the
    /// server already reports via SIZE.
    pub fn store_resumable(
        &mut self,
        local: &Path,
        remote: &str,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        self.upload(local, remote, true, progress)
    }

    /// Sends QUIT and returns the farewell reply. The control socket
    /// closes when the session drops.
    pub fn quit(&mut self) -> FtpResult<Reply> {
        self.ctrl.exchange("QUIT")
    }

    fn download(
        &mut self,
        remote: &str,
        local: &Path,
        resume: bool,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        // Taking the mode here resets it on every exit path.
        let mode = self.mode.take();
        let data_timeout = self.data_timeout;
        let buffer_size = self.buffer_size;
        TransferEngine::new(&mut self.ctrl, data_timeout, buffer_size)
            .download(mode, remote, local, resume, progress)
    }

    fn upload(
        &mut self,
        local: &Path,
        remote: &str,
        resume: bool,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        let mode = self.mode.take();
        let data_timeout = self.data_timeout;
        let buffer_size = self.buffer_size;
        TransferEngine::new(&mut self.ctrl, data_timeout, buffer_size)
            .upload(mode, local, remote, resume, progress)
    }
}
