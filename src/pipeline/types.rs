//! Core types shared across the receiver pipeline.

use bytes::Bytes;

/// A fully reassembled media frame.
///
/// The timestamp is the frame's identity on the wire and its ordering key in
/// the jitter buffer; the data is the payload concatenation produced by the
/// reassembler, still encoded (decoding is the renderer's concern).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub timestamp: u32,
    pub data: Bytes,
}

impl CompletedFrame {
    /// Size of the frame payload in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
