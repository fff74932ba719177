//! Session finite-state machine types.
//!
//! Transitions are driven by [`crate::gbn_sender::GbnSender`] and
//! [`crate::gbn_receiver::GbnReceiver`]; this module only names the states.

use std::fmt;

/// Sender-side lifecycle.
///
/// ```text
///  TRANSFERRING ──all data acked, EOT sent──▶ AWAITING_EOT_ACK
///                                                   │
///                         EOT reply (or EOT retries │
///                         exhausted)                ▼
///                                                CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Data packets are being sent and acknowledged.  The retransmission
    /// timer belongs to this state and to `AwaitingEotAck`.
    #[default]
    Transferring,
    /// Every data packet is acknowledged; the EOT is outstanding.
    AwaitingEotAck,
    /// Handshake finished; the endpoint may be released.
    Closed,
}

/// Receiver-side lifecycle.
///
/// ```text
///  RECEIVING ──EOT received, reply sent──▶ CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    Receiving,
    Closed,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transferring => "TRANSFERRING",
            Self::AwaitingEotAck => "AWAITING_EOT_ACK",
            Self::Closed => "CLOSED",
        })
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Receiving => "RECEIVING",
            Self::Closed => "CLOSED",
        })
    }
}
