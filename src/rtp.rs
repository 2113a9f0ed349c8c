//! RTP fragment codec.
//!
//! Fixed 12-byte header in network byte order followed by the raw payload.
//! Only the fields the client core reads are surfaced; header extensions and
//! CSRC lists are not supported.

use crate::error::ClientError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 12;

/// Protocol version carried in the top two bits of the first header byte.
pub const VERSION: u8 = 2;

/// One media fragment as carried by a single datagram.
///
/// The timestamp identifies the frame the fragment belongs to; the sequence
/// number orders fragments within it; the marker flags the last fragment of
/// the frame. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub payload_type: u8,
    pub marker: bool,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Decode a datagram into a packet.
    ///
    /// Fails only when the buffer is shorter than the fixed header; an empty
    /// payload is valid.
    pub fn decode(data: &[u8]) -> Result<Self, ClientError> {
        if data.len() < HEADER_LEN {
            return Err(ClientError::MalformedFragment { len: data.len() });
        }

        let mut buf = data;
        let vpxcc = buf.get_u8();
        let mpt = buf.get_u8();

        Ok(RtpPacket {
            version: vpxcc >> 6,
            payload_type: mpt & 0x7F,
            marker: mpt & 0x80 != 0,
            sequence_number: buf.get_u16(),
            timestamp: buf.get_u32(),
            ssrc: buf.get_u32(),
            payload: Bytes::copy_from_slice(buf),
        })
    }

    /// Encode the packet back into wire bytes.
    ///
    /// The client role never sends media; this exists so tests can build
    /// datagrams the same way a server would.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.version << 6);
        buf.put_u8((self.payload_type & 0x7F) | if self.marker { 0x80 } else { 0 });
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_short_buffer() {
        let err = RtpPacket::decode(&[0u8; HEADER_LEN - 1]).unwrap_err();
        assert!(matches!(err, ClientError::MalformedFragment { len: 11 }));
    }

    #[test]
    fn header_only_datagram_has_empty_payload() {
        let packet = RtpPacket::decode(&[0u8; HEADER_LEN]).unwrap();
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn marker_and_payload_type_share_a_byte() {
        let mut data = vec![VERSION << 6, 0x80 | 26];
        data.extend_from_slice(&7u16.to_be_bytes());
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&9u32.to_be_bytes());
        data.extend_from_slice(b"jpeg");

        let packet = RtpPacket::decode(&data).unwrap();
        assert_eq!(packet.version, VERSION);
        assert!(packet.marker);
        assert_eq!(packet.payload_type, 26);
        assert_eq!(packet.sequence_number, 7);
        assert_eq!(packet.timestamp, 100);
        assert_eq!(packet.ssrc, 9);
        assert_eq!(&packet.payload[..], b"jpeg");
    }

    #[test]
    fn encode_is_symmetric_with_decode() {
        let packet = RtpPacket {
            version: VERSION,
            payload_type: 26,
            marker: false,
            sequence_number: 65535,
            timestamp: 3000,
            ssrc: 42,
            payload: Bytes::from_static(b"payload"),
        };
        assert_eq!(RtpPacket::decode(&packet.encode()).unwrap(), packet);
    }
}
