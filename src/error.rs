//! Error types shared across the crate.
//!
//! Errors are split by layer: [`PacketError`] for the codec,
//! [`ChannelError`] for datagram I/O, [`ConfigError`] for protocol
//! constants, and [`SessionError`] for whatever ends a transfer.
//! [`SequenceAnomaly`] is not an error path at all: it describes a packet
//! an engine chose to ignore.

use std::fmt;

use thiserror::Error;

use crate::packet::PacketKind;

/// A datagram that could not be decoded into a [`crate::packet::Packet`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header.
    #[error("buffer too short to contain a header")]
    BufferTooShort,

    /// Discriminator byte does not name a known packet kind.
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),

    /// Declared payload length runs past the end of the buffer.
    #[error("declared payload length {declared} exceeds {available} available bytes")]
    LengthMismatch {
        /// Length claimed by the header.
        declared: usize,
        /// Bytes actually present after the header.
        available: usize,
    },

    /// A control packet claimed a non-empty payload.
    #[error("{kind} packet carries a {len}-byte payload")]
    UnexpectedPayload {
        /// Kind of the offending packet.
        kind: PacketKind,
        /// Declared payload length.
        len: usize,
    },

    /// Checksum did not match the recomputed value.
    #[error("checksum verification failed")]
    ChecksumFailed,

    /// Payload cannot be represented in the 16-bit length field.
    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLarge(usize),
}

/// Errors from the datagram channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Nothing arrived within the receive timeout.
    #[error("receive timed out")]
    Timeout,

    /// A datagram arrived but failed to decode.
    #[error("malformed datagram: {0}")]
    Malformed(#[from] PacketError),

    /// The transport failed irrecoverably.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// `true` for errors that end the session rather than being absorbed by
    /// the retransmission machinery.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Invalid protocol constants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sequence space must hold at least 2 numbers, got {0}")]
    SeqSpaceTooSmall(u32),

    #[error("window size must be at least 1")]
    EmptyWindow,

    /// `W ≤ N − 1` keeps duplicate ACKs distinguishable from fresh ones.
    #[error("window size {window} must be smaller than the sequence space {seq_space}")]
    WindowTooLarge { window: usize, seq_space: u32 },

    #[error("max payload must be between 1 and {max} bytes, got {got}")]
    BadMaxPayload { got: usize, max: usize },

    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,

    /// A chunk handed to the sender does not fit one data packet.
    #[error("chunk {index} is {len} bytes, larger than the {max}-byte payload cap")]
    ChunkTooLarge { index: usize, len: usize, max: usize },
}

/// Why an engine ignored an inbound packet.
///
/// Anomalies never end a session; they are returned in engine outcomes,
/// logged and counted so tests and operators can see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceAnomaly {
    /// Sequence number outside `[0, N)`.
    OutOfSpace { seq: u32 },
    /// Cumulative ACK that neither advances the window nor repeats the last
    /// acknowledged number.
    AckOutsideWindow { ack: u32, base: u32, outstanding: usize },
    /// Packet kind this role never expects in its current state.
    UnexpectedKind { kind: PacketKind },
    /// EOT whose sequence number disagrees with the receiver's expectation.
    EotOutOfOrder { seq: u32, expected: u32 },
    /// Data packet carrying more than the configured payload cap.
    PayloadTooLarge { len: usize, max: usize },
}

impl fmt::Display for SequenceAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSpace { seq } => write!(f, "sequence number {seq} outside the space"),
            Self::AckOutsideWindow {
                ack,
                base,
                outstanding,
            } => write!(
                f,
                "ack {ack} outside window (base={base}, outstanding={outstanding})"
            ),
            Self::UnexpectedKind { kind } => write!(f, "unexpected {kind} packet"),
            Self::EotOutOfOrder { seq, expected } => {
                write!(f, "EOT seq={seq} while expecting {expected}")
            }
            Self::PayloadTooLarge { len, max } => {
                write!(f, "{len}-byte payload exceeds the {max}-byte cap")
            }
        }
    }
}

/// Terminal failure of a sender or receiver session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("fatal channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Writing accepted payload to the output sink failed.
    #[error("output sink error: {0}")]
    Sink(#[source] std::io::Error),

    /// Peer stayed silent for too many consecutive timeouts.
    #[error("gave up after {timeouts} consecutive timeouts")]
    RetriesExhausted { timeouts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_io_is_fatal() {
        let io = ChannelError::Io(std::io::Error::other("boom"));
        assert!(io.is_fatal());
        assert!(!ChannelError::Timeout.is_fatal());
        assert!(!ChannelError::Malformed(PacketError::ChecksumFailed).is_fatal());
    }

    #[test]
    fn anomaly_display_names_the_numbers() {
        let a = SequenceAnomaly::AckOutsideWindow {
            ack: 5,
            base: 1,
            outstanding: 2,
        };
        assert_eq!(a.to_string(), "ack 5 outside window (base=1, outstanding=2)");
    }
}
