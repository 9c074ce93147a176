//! FTP wire protocol
//!
//! Reply delimiting, decoding and the status codes this client
//! branches on.

pub mod codes;
pub mod reply;

pub use reply::{Reply, ReplyReader};
