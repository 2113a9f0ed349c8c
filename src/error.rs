//! Error taxonomy for the client core.
//!
//! Connection and bind failures are fatal to session start and surfaced to
//! the caller. Malformed fragments and replies are dropped by the receive
//! paths, counted in the health metrics, and never tear the session down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to control server {addr}: {source}")]
    ConnectionFailure {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind data port {port}: {source}")]
    BindFailure {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("fragment too short: {len} bytes, header needs {}", crate::rtp::HEADER_LEN)]
    MalformedFragment { len: usize },

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("control channel closed")]
    ControlChannelClosed,
}
