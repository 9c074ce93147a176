//! Module `engine`
//!
//! Drives one RETR/STOR transfer over a freshly opened data
//! connection: resolves the resume offset via REST/SIZE, streams
//! fixed-size chunks, reports progress after every chunk, then closes
//! the data socket and reads the closing reply. The engine owns the
//! negotiated mode for the duration of the transfer, so the mode is
//! spent on every exit path — the next transfer must renegotiate.

use log::{info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use crate::control::ControlChannel;
use crate::error::{FtpError, FtpResult, NegotiationError};
use crate::protocol::{Reply, codes};
use crate::transfer::{SessionMode, data_channel};

/// One engine instance per transfer attempt.
pub struct TransferEngine<'a> {
    ctrl: &'a mut ControlChannel,
    data_timeout: Duration,
    buffer_size: usize,
}

impl<'a> TransferEngine<'a> {
    pub fn new(ctrl: &'a mut ControlChannel, data_timeout: Duration, buffer_size: usize) -> Self {
        Self {
            ctrl,
            data_timeout,
            buffer_size,
        }
    }

    /// Downloads `remote` into `local`. With `resume`, transfer starts
    /// at the size of the existing local file (REST) and `SIZE` is
    /// queried for the progress total; without it the file is
    /// truncated and the total reported as 0 (unknown).
    ///
    /// Returns the total bytes present locally when the stream ends.
    pub fn download(
        &mut self,
        mode: SessionMode,
        remote: &str,
        local: &Path,
        resume: bool,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        if mode.is_none() {
            return Err(NegotiationError::ModeNotSet.into());
        }

        let offset = if resume { local_file_len(local)? } else { 0 };
        let mut total = 0u64;
        if resume {
            // Non-213 degrades to an unknown total rather than aborting;
            // progress then reports 0 for the total.
            total = self.query_size(remote)?;
            if total > 0 && offset >= total {
                if offset > total {
                    warn!(
                        "local file {} is larger than the remote ({} > {} bytes)",
                        local.display(),
                        offset,
                        total
                    );
                }
                info!("nothing to resume: {} of {} bytes present", offset, total);
                return Ok(offset);
            }
        }

        if offset > 0 {
            self.require(&format!("REST {}", offset), codes::RESTART_ACCEPTED)?;
        }

        let opening = self.ctrl.exchange(&format!("RETR {}", remote))?;
        check_opening(opening)?;

        let mut stream = data_channel::open_data_stream(mode, self.data_timeout)?;
        let mut file = if offset > 0 {
            OpenOptions::new().append(true).open(local)
        } else {
            File::create(local)
        }
        .map_err(FtpError::LocalIo)?;

        let mut moved = offset;
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = stream.read(&mut buffer).map_err(FtpError::Connection)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).map_err(FtpError::LocalIo)?;
            moved += n as u64;
            progress(moved, total);
        }
        file.flush().map_err(FtpError::LocalIo)?;
        drop(stream);

        self.finish()?;
        info!("download complete: {} ({} bytes)", remote, moved);
        Ok(moved)
    }

    /// Uploads `local` as `remote`. With `resume`, the server-reported
    /// `SIZE` becomes the starting offset when it is strictly between
    /// 0 and the local size; a reported size at or past the local size
    /// restarts from 0 (never a REST past the data we hold). The local
    /// file size is always known, so progress totals are exact.
    pub fn upload(
        &mut self,
        mode: SessionMode,
        local: &Path,
        remote: &str,
        resume: bool,
        progress: &mut dyn FnMut(u64, u64),
    ) -> FtpResult<u64> {
        if mode.is_none() {
            return Err(NegotiationError::ModeNotSet.into());
        }

        let local_size = fs::metadata(local).map_err(FtpError::LocalIo)?.len();

        let mut offset = 0u64;
        if resume {
            let reported = self.query_size(remote)?;
            if reported > 0 && reported < local_size {
                offset = reported;
            } else if reported >= local_size && reported > 0 {
                warn!(
                    "server reports {} bytes for {} (local {}), restarting from 0",
                    reported, remote, local_size
                );
            }
        }

        if offset > 0 {
            self.require(&format!("REST {}", offset), codes::RESTART_ACCEPTED)?;
        }

        let opening = self.ctrl.exchange(&format!("STOR {}", remote))?;
        check_opening(opening)?;

        let mut stream = data_channel::open_data_stream(mode, self.data_timeout)?;
        let mut file = File::open(local).map_err(FtpError::LocalIo)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).map_err(FtpError::LocalIo)?;
        }

        let mut moved = offset;
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = file.read(&mut buffer).map_err(FtpError::LocalIo)?;
            if n == 0 {
                break;
            }
            stream.write_all(&buffer[..n]).map_err(FtpError::Connection)?;
            moved += n as u64;
            progress(moved, local_size);
        }
        stream.flush().map_err(FtpError::Connection)?;
        drop(stream); // server sees EOF and finalizes

        self.finish()?;
        info!("upload complete: {} ({} bytes)", remote, moved);
        Ok(moved)
    }

    /// Runs a transfer-style command (LIST) whose payload is collected
    /// into memory instead of a file.
    pub fn read_to_buffer(&mut self, mode: SessionMode, command: &str) -> FtpResult<Vec<u8>> {
        if mode.is_none() {
            return Err(NegotiationError::ModeNotSet.into());
        }

        let opening = self.ctrl.exchange(command)?;
        check_opening(opening)?;

        let mut stream = data_channel::open_data_stream(mode, self.data_timeout)?;
        let mut data = Vec::new();
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let n = stream.read(&mut buffer).map_err(FtpError::Connection)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buffer[..n]);
        }
        drop(stream);

        self.finish()?;
        Ok(data)
    }

    /// Sends `SIZE` and parses the reported byte count; 0 when the
    /// server does not support SIZE or the file is unknown to it.
    fn query_size(&mut self, remote: &str) -> FtpResult<u64> {
        let reply = self.ctrl.exchange(&format!("SIZE {}", remote))?;
        if reply.code != codes::FILE_STATUS {
            warn!("SIZE {} not honored: {}", remote, reply.text);
            return Ok(0);
        }
        Ok(reply
            .text
            .split_whitespace()
            .nth(1)
            .and_then(|field| field.parse().ok())
            .unwrap_or(0))
    }

    /// One exchange that must come back with `expected`.
    fn require(&mut self, line: &str, expected: u16) -> FtpResult<Reply> {
        let reply = self.ctrl.exchange(line)?;
        if reply.code != expected {
            return Err(FtpError::Protocol {
                code: reply.code,
                text: reply.text,
            });
        }
        Ok(reply)
    }

    /// Reads the closing reply after the data socket is shut. Servers
    /// vary in final-code strictness, so anything other than 226 is
    /// logged but the transfer stands: the bytes already moved.
    fn finish(&mut self) -> FtpResult<()> {
        let reply = self.ctrl.read_reply()?;
        if reply.code != codes::TRANSFER_COMPLETE {
            warn!("expected 226 transfer complete, server said: {}", reply.text);
        }
        Ok(())
    }
}

/// Checks the reply to RETR/STOR/LIST: 150 and 125 both mean the data
/// connection is (about to be) open. The 450 class is surfaced as its
/// own recoverable error so shells can report a locked resource
/// distinctly.
fn check_opening(reply: Reply) -> FtpResult<()> {
    match reply.code {
        codes::DATA_OPEN | codes::DATA_ALREADY_OPEN => Ok(()),
        code if codes::is_resource_locked(code) => Err(FtpError::ResourceLocked {
            code,
            text: reply.text,
        }),
        code => Err(FtpError::Protocol {
            code,
            text: reply.text,
        }),
    }
}

/// Size of an existing local file; 0 when it does not exist yet.
fn local_file_len(path: &Path) -> FtpResult<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(FtpError::LocalIo(e)),
    }
}
