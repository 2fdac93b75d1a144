//! devlb-net: fixed-record wire protocol
//!
//! Client and daemon exchange fixed-size records over a byte channel, one
//! record per message:
//! - Resource requests carrying a kernel feature vector
//! - Advisory notifications and assignment replies carrying an allocation
//! - Queue-occupancy queries and replies
//! - Clear/stop control records
//!
//! There is no length prefix and no streaming framing; the receiver reads
//! exactly [`record::RECORD_SIZE`] bytes or treats the message as a
//! protocol error.

#![warn(missing_docs)]

pub mod client;
pub mod record;
pub mod transport;

/// Wire protocol error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or truncated record
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for wire operations
pub type Result<T> = std::result::Result<T, Error>;

pub use client::Client;
pub use record::{Message, Record, RECORD_SIZE};
pub use transport::{recv_record, send_record};
