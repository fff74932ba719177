//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (kind, sequence number, length,
//!   checksum, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning a
//!   [`PacketError`] for malformed or truncated input.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Kind      |              Sequence Number                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  (seq cont.)  |        Payload Length         |   Checksum    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | (csum cont.)  |              Payload ...                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 9 bytes.
//! kind(1) + seq(4) + payload_len(2) + checksum(2)
//!
//! Bytes after `HEADER_LEN + payload_len` are ignored on decode, so a
//! zero-padded fixed-size buffer decodes to the same packet.

use std::fmt;

use crate::error::PacketError;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 9;

/// Largest payload that fits a single IPv4 UDP datagram with our header.
pub const MAX_WIRE_PAYLOAD: usize = 65_507 - HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_KIND: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_PAYLOAD_LEN: usize = 5;
const OFF_CHECKSUM: usize = 7;

/// Packet type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Cumulative acknowledgement, receiver to sender.
    Ack,
    /// Stream payload, sender to receiver.
    Data,
    /// End of transmission, sender to receiver.
    EotSenderToReceiver,
    /// End-of-transmission reply, receiver to sender.
    EotReceiverToSender,
}

impl PacketKind {
    /// On-wire discriminator byte.
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Ack => 0,
            Self::Data => 1,
            Self::EotSenderToReceiver => 2,
            Self::EotReceiverToSender => 3,
        }
    }

    /// Parse a discriminator byte.
    pub fn from_wire(b: u8) -> Result<Self, PacketError> {
        match b {
            0 => Ok(Self::Ack),
            1 => Ok(Self::Data),
            2 => Ok(Self::EotSenderToReceiver),
            3 => Ok(Self::EotReceiverToSender),
            other => Err(PacketError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ack => "ACK",
            Self::Data => "DATA",
            Self::EotSenderToReceiver => "EOT",
            Self::EotReceiverToSender => "EOT-REPLY",
        };
        f.write_str(name)
    }
}

/// A complete protocol datagram.
///
/// Only [`PacketKind::Data`] packets carry a payload; the constructors make
/// it impossible to build a control packet with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    seq: u32,
    payload: Vec<u8>,
}

impl Packet {
    pub fn data(seq: u32, payload: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Data,
            seq,
            payload,
        }
    }

    /// Cumulative ACK: every packet up to and including `seq` arrived.
    pub fn ack(seq: u32) -> Self {
        Self::control(PacketKind::Ack, seq)
    }

    pub fn eot(seq: u32) -> Self {
        Self::control(PacketKind::EotSenderToReceiver, seq)
    }

    pub fn eot_reply(seq: u32) -> Self {
        Self::control(PacketKind::EotReceiverToSender, seq)
    }

    fn control(kind: PacketKind, seq: u32) -> Self {
        Self {
            kind,
            seq,
            payload: Vec::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Length of the encoded datagram.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let payload_len = self.payload.len();
        if payload_len > MAX_WIRE_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(payload_len));
        }
        let mut buf = vec![0u8; HEADER_LEN + payload_len];

        buf[OFF_KIND] = self.kind.to_wire();
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
            .copy_from_slice(&(payload_len as u16).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        // Checksum field is still zero here.
        let csum = internet_checksum(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());

        Ok(buf)
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the declared payload length runs past the end of `buf`,
    /// - the checksum does not verify,
    /// - the kind byte is unknown, or
    /// - a control packet declares a payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort);
        }

        let payload_len =
            usize::from(u16::from_be_bytes([buf[OFF_PAYLOAD_LEN], buf[OFF_PAYLOAD_LEN + 1]]));
        let available = buf.len() - HEADER_LEN;
        if payload_len > available {
            return Err(PacketError::LengthMismatch {
                declared: payload_len,
                available,
            });
        }
        let frame = &buf[..HEADER_LEN + payload_len];

        let checksum = u16::from_be_bytes([frame[OFF_CHECKSUM], frame[OFF_CHECKSUM + 1]]);
        let mut scratch = frame.to_vec();
        scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        if internet_checksum(&scratch) != checksum {
            return Err(PacketError::ChecksumFailed);
        }

        let kind = PacketKind::from_wire(frame[OFF_KIND])?;
        if kind != PacketKind::Data && payload_len != 0 {
            return Err(PacketError::UnexpectedPayload {
                kind,
                len: payload_len,
            });
        }

        let mut seq_bytes = [0u8; 4];
        seq_bytes.copy_from_slice(&frame[OFF_SEQ..OFF_SEQ + 4]);

        Ok(Self {
            kind,
            seq: u32::from_be_bytes(seq_bytes),
            payload: frame[HEADER_LEN..].to_vec(),
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PacketKind::Data => write!(f, "DATA seq={} len={}", self.seq, self.payload.len()),
            kind => write!(f, "{kind} seq={}", self.seq),
        }
    }
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// The caller must zero any checksum field within `data` first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
    }
    // Odd trailing byte, padded with zero on the right.
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rewrite a header field and fix up the checksum so only that field is
    /// wrong.
    fn patch(mut bytes: Vec<u8>, at: usize, value: &[u8]) -> Vec<u8> {
        bytes[at..at + value.len()].copy_from_slice(value);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
        let csum = internet_checksum(&bytes);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());
        bytes
    }

    #[test]
    fn encode_decode_roundtrip() {
        let pkt = Packet::data(3, b"hello".to_vec());
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded, pkt);
        assert_eq!(decoded.kind(), PacketKind::Data);
        assert_eq!(decoded.seq(), 3);
        assert_eq!(decoded.payload(), b"hello");
    }

    #[test]
    fn control_packets_have_no_payload() {
        for pkt in [Packet::ack(7), Packet::eot(2), Packet::eot_reply(2)] {
            assert!(pkt.payload().is_empty());
            let bytes = pkt.encode().unwrap();
            assert_eq!(bytes.len(), HEADER_LEN);
            assert_eq!(Packet::decode(&bytes).unwrap(), pkt);
        }
    }

    #[test]
    fn kind_discriminators_on_wire() {
        assert_eq!(Packet::ack(0).encode().unwrap()[OFF_KIND], 0);
        assert_eq!(Packet::data(0, vec![]).encode().unwrap()[OFF_KIND], 1);
        assert_eq!(Packet::eot(0).encode().unwrap()[OFF_KIND], 2);
        assert_eq!(Packet::eot_reply(0).encode().unwrap()[OFF_KIND], 3);
    }

    #[test]
    fn encode_sets_correct_payload_len() {
        let bytes = Packet::data(1, b"world".to_vec()).encode().unwrap();
        let len_field = u16::from_be_bytes([bytes[OFF_PAYLOAD_LEN], bytes[OFF_PAYLOAD_LEN + 1]]);
        assert_eq!(len_field, 5);
    }

    #[test]
    fn seq_big_endian_on_wire() {
        let bytes = Packet::ack(0x0102_0304).encode().unwrap();
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 4], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn decode_short_header_returns_error() {
        assert_eq!(Packet::decode(&[]), Err(PacketError::BufferTooShort));
        assert_eq!(
            Packet::decode(&[0u8; HEADER_LEN - 1]),
            Err(PacketError::BufferTooShort)
        );
    }

    #[test]
    fn decode_truncated_payload_returns_error() {
        let mut bytes = Packet::data(0, b"data".to_vec()).encode().unwrap();
        bytes.pop();
        assert_eq!(
            Packet::decode(&bytes),
            Err(PacketError::LengthMismatch {
                declared: 4,
                available: 3
            })
        );
    }

    #[test]
    fn zero_padded_buffer_decodes() {
        let pkt = Packet::data(5, b"abc".to_vec());
        let mut bytes = pkt.encode().unwrap();
        bytes.resize(HEADER_LEN + 30, 0);
        assert_eq!(Packet::decode(&bytes).unwrap(), pkt);
    }

    #[test]
    fn decode_corrupt_byte_returns_checksum_error() {
        let mut bytes = Packet::data(6, b"test".to_vec()).encode().unwrap();
        bytes[HEADER_LEN] ^= 0xff;
        assert_eq!(Packet::decode(&bytes), Err(PacketError::ChecksumFailed));
    }

    #[test]
    fn decode_unknown_kind() {
        let bytes = patch(Packet::ack(1).encode().unwrap(), OFF_KIND, &[9]);
        assert_eq!(Packet::decode(&bytes), Err(PacketError::UnknownKind(9)));
    }

    #[test]
    fn decode_rejects_payload_on_control_packet() {
        let mut bytes = Packet::ack(1).encode().unwrap();
        bytes.push(0xaa);
        let bytes = patch(bytes, OFF_PAYLOAD_LEN, &1u16.to_be_bytes());
        assert_eq!(
            Packet::decode(&bytes),
            Err(PacketError::UnexpectedPayload {
                kind: PacketKind::Ack,
                len: 1
            })
        );
    }

    #[test]
    fn oversized_payload_refused() {
        let pkt = Packet::data(0, vec![0u8; MAX_WIRE_PAYLOAD + 1]);
        assert_eq!(
            pkt.encode(),
            Err(PacketError::PayloadTooLarge(MAX_WIRE_PAYLOAD + 1))
        );
    }

    #[test]
    fn header_len_constant_is_correct() {
        // kind(1) + seq(4) + payload_len(2) + checksum(2) = 9
        assert_eq!(HEADER_LEN, 9);
        assert_eq!(Packet::data(0, vec![1, 2]).wire_len(), 11);
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Packet::data(2, vec![0; 5]).to_string(), "DATA seq=2 len=5");
        assert_eq!(Packet::ack(4).to_string(), "ACK seq=4");
    }
}
