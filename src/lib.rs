pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transfer;

pub use session::Session;
