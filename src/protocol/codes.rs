//! FTP reply codes
//!
//! The subset of RFC 959 status codes this client consumes.

/// Data connection already open; transfer starting
pub const DATA_ALREADY_OPEN: u16 = 125;
/// About to open data connection
pub const DATA_OPEN: u16 = 150;
/// Command okay (PORT accepted)
pub const COMMAND_OK: u16 = 200;
/// File status (SIZE)
pub const FILE_STATUS: u16 = 213;
/// Service ready (greeting)
pub const SERVICE_READY: u16 = 220;
/// Service closing control connection (QUIT)
pub const SERVICE_CLOSING: u16 = 221;
/// Closing data connection; transfer complete
pub const TRANSFER_COMPLETE: u16 = 226;
/// Entering passive mode, with the six-field endpoint tuple
pub const ENTERING_PASSIVE: u16 = 227;
/// User logged in
pub const LOGIN_SUCCESS: u16 = 230;
/// Pathname created (PWD/MKD)
pub const PATHNAME_CREATED: u16 = 257;
/// Username okay, need password
pub const PASSWORD_REQUIRED: u16 = 331;
/// Requested file action pending further information (REST accepted)
pub const RESTART_ACCEPTED: u16 = 350;

/// Whether a code is in the 450 class: the remote resource is locked
/// or temporarily unavailable.
pub fn is_resource_locked(code: u16) -> bool {
    (450..460).contains(&code)
}
