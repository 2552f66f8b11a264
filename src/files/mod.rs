//! Static file serving.
//!
//! `streamer` holds the request-level state machine, `transfer` the open
//! file and its offset bookkeeping.

pub mod streamer;
pub mod transfer;

pub use streamer::{SERVER_NAME, TransferEnd, is_not_modified, send_chunks, server_error, stream};
pub use transfer::FileTransfer;
