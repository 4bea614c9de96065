use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel carried in the first word of every data packet and ack.
pub const MAGIC: u32 = 0xBAAD_CAFE;

/// `[magic][seqno]`, both big-endian.
pub const HEADER_LEN: usize = 8;

/// `[magic][ackno]`, no trailing data.
pub const ACK_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("ack must be exactly 8 bytes, got {0}")]
    AckLength(usize),
    #[error("datagram of {0} bytes is shorter than the 8-byte header")]
    Truncated(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub magic: u32,
    /// Sequence Number
    pub seqno: u32,
}

impl Header {
    pub fn new(seqno: u32) -> Self {
        Self {
            magic: MAGIC,
            seqno,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}

/// One chunk of the application stream as it travels to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub header: Header,
    pub payload: Bytes,
}

impl DataPacket {
    pub fn new(seqno: u32, payload: Bytes) -> Self {
        Self {
            header: Header::new(seqno),
            payload,
        }
    }

    pub fn seqno(&self) -> u32 {
        self.header.seqno
    }

    pub fn len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialize into a single datagram. The payload length is implied by the
    /// datagram boundary, so no length field is written.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_u32(self.header.magic);
        buf.put_u32(self.header.seqno);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a data datagram. The magic value is not checked here.
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        if datagram.len() < HEADER_LEN {
            return Err(DecodeError::Truncated(datagram.len()));
        }
        let mut buf = datagram;
        let magic = buf.get_u32();
        let seqno = buf.get_u32();
        Ok(Self {
            header: Header { magic, seqno },
            payload: Bytes::copy_from_slice(buf),
        })
    }
}

/// Per-packet acknowledgment. `ackno` never implies anything about lower
/// sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub magic: u32,
    pub ackno: u32,
}

impl Ack {
    pub fn new(ackno: u32) -> Self {
        Self {
            magic: MAGIC,
            ackno,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ACK_LEN);
        buf.put_u32(self.magic);
        buf.put_u32(self.ackno);
        buf.freeze()
    }

    /// Parse an ack datagram. Rejects anything that is not exactly
    /// [`ACK_LEN`] bytes; leaves the magic check to the caller.
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        if datagram.len() != ACK_LEN {
            return Err(DecodeError::AckLength(datagram.len()));
        }
        let mut buf = datagram;
        Ok(Self {
            magic: buf.get_u32(),
            ackno: buf.get_u32(),
        })
    }
}

pub fn encode(seqno: u32, payload: &[u8]) -> Bytes {
    DataPacket::new(seqno, Bytes::copy_from_slice(payload)).encode()
}

pub fn encode_ack(ackno: u32) -> Bytes {
    Ack::new(ackno).encode()
}

pub fn decode_ack(datagram: &[u8]) -> Result<Ack, DecodeError> {
    Ack::decode(datagram)
}

pub fn decode_data(datagram: &[u8]) -> Result<DataPacket, DecodeError> {
    DataPacket::decode(datagram)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_header_is_big_endian_magic_then_seqno() {
        let bytes = encode(0x0102_0304, b"hi");
        assert_eq!(
            &bytes[..],
            &[0xBA, 0xAD, 0xCA, 0xFE, 0x01, 0x02, 0x03, 0x04, b'h', b'i']
        );
    }

    #[test]
    fn empty_payload_is_header_only() {
        let bytes = encode(7, &[]);
        assert_eq!(bytes.len(), HEADER_LEN);
        let packet = decode_data(&bytes).unwrap();
        assert_eq!(packet.seqno(), 7);
        assert!(packet.is_empty());
    }

    #[test]
    fn decode_data_keeps_payload_and_magic() {
        let mut raw = vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 9];
        raw.extend_from_slice(b"payload");
        let packet = decode_data(&raw).unwrap();
        assert_eq!(packet.header.magic, 0xDEAD_BEEF);
        assert!(!packet.header.is_valid());
        assert_eq!(packet.seqno(), 9);
        assert_eq!(&packet.payload[..], b"payload");
    }

    #[test]
    fn decode_data_rejects_short_datagram() {
        assert_eq!(decode_data(&[0xBA, 0xAD]), Err(DecodeError::Truncated(2)));
    }

    #[test]
    fn ack_layout() {
        let bytes = encode_ack(258);
        assert_eq!(&bytes[..], &[0xBA, 0xAD, 0xCA, 0xFE, 0, 0, 1, 2]);
        let ack = decode_ack(&bytes).unwrap();
        assert!(ack.is_valid());
        assert_eq!(ack.ackno, 258);
    }

    #[test]
    fn ack_with_wrong_length_is_rejected() {
        assert_eq!(decode_ack(&[0; 7]), Err(DecodeError::AckLength(7)));
        assert_eq!(decode_ack(&[0; 9]), Err(DecodeError::AckLength(9)));
        assert_eq!(decode_ack(&[]), Err(DecodeError::AckLength(0)));
    }

    #[test]
    fn ack_decode_does_not_enforce_magic() {
        let ack = decode_ack(&[0, 0, 0, 1, 0, 0, 0, 5]).unwrap();
        assert_eq!(ack.magic, 1);
        assert_eq!(ack.ackno, 5);
        assert!(!ack.is_valid());
    }
}
