//! File transfer
//!
//! Mode negotiation, data-channel establishment and the transfer
//! engine that streams file content over it.

pub mod data_channel;
pub mod engine;
pub mod mode;
pub mod negotiate;

pub use engine::TransferEngine;
pub use mode::SessionMode;
