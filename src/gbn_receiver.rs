//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** data packets are accepted (`seq == expected`).
//! - Out-of-order and duplicate packets are discarded, never buffered, and
//!   answered with a re-ACK of the last accepted sequence number so the
//!   sender learns where the gap is.
//! - Until the first packet has been accepted there is no sequence number
//!   to re-acknowledge, so discards in that phase produce no ACK at all and
//!   the sender's timer recovers the loss.
//! - Data packets larger than the configured payload cap are ignored
//!   without an ACK.
//! - An EOT from the sender closes the receiver and is answered with an EOT
//!   reply.  Duplicate EOTs after closing are answered again.
//!
//! This module only manages state; all channel and sink I/O is the
//! caller's responsibility.

use crate::config::ProtocolConfig;
use crate::error::{ConfigError, SequenceAnomaly};
use crate::packet::{Packet, PacketKind};
use crate::seq::SeqSpace;
use crate::state::ReceiverState;

/// What the caller must do after feeding one packet to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverStep {
    /// Write `payload` to the sink, then send `reply`.
    Deliver { payload: Vec<u8>, reply: Packet },
    /// Packet dropped.  Send `reply` if there is one.
    Discard { reply: Option<Packet> },
    /// End of transmission: send `reply`, close the sink.
    Close { reply: Packet },
    /// Packet ignored entirely.
    Ignored(SequenceAnomaly),
}

impl ReceiverStep {
    /// The packet to send back, if any.
    pub fn reply(&self) -> Option<&Packet> {
        match self {
            Self::Deliver { reply, .. } | Self::Close { reply } => Some(reply),
            Self::Discard { reply } => reply.as_ref(),
            Self::Ignored(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Data packets accepted in order.
    pub accepted: u64,
    /// Data packets dropped as out of order or duplicate.
    pub discarded: u64,
    /// ACKs emitted, re-ACKs included.
    pub acks_sent: u64,
    pub anomalies: u64,
    pub bytes_delivered: u64,
    pub eot_replies: u64,
}

/// Go-Back-N receive-side state for one session.
#[derive(Debug)]
pub struct GbnReceiver {
    seq: SeqSpace,
    max_payload: usize,
    /// Next sequence number that will be accepted.
    expected: u32,
    /// Most recently accepted sequence number; `None` until the first
    /// in-order packet arrives.
    last_accepted: Option<u32>,
    state: ReceiverState,
    stats: ReceiverStats,
}

impl GbnReceiver {
    pub fn new(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            seq: config.seq(),
            max_payload: config.max_payload,
            expected: 0,
            last_accepted: None,
            state: ReceiverState::Receiving,
            stats: ReceiverStats::default(),
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn last_accepted(&self) -> Option<u32> {
        self.last_accepted
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Process one inbound packet.
    pub fn on_packet(&mut self, pkt: Packet) -> ReceiverStep {
        match (self.state, pkt.kind()) {
            (ReceiverState::Receiving, PacketKind::Data) => self.on_data(pkt),
            (_, PacketKind::EotSenderToReceiver) => self.on_eot(pkt.seq()),
            (_, kind) => self.ignore(SequenceAnomaly::UnexpectedKind { kind }),
        }
    }

    fn on_data(&mut self, pkt: Packet) -> ReceiverStep {
        let seq = pkt.seq();
        if !self.seq.contains(seq) {
            return self.ignore(SequenceAnomaly::OutOfSpace { seq });
        }
        let len = pkt.payload().len();
        if len > self.max_payload {
            return self.ignore(SequenceAnomaly::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }

        if seq == self.expected {
            let reply = Packet::ack(self.expected);
            self.last_accepted = Some(self.expected);
            self.expected = self.seq.advance(self.expected);

            let payload = pkt.into_payload();
            self.stats.accepted += 1;
            self.stats.acks_sent += 1;
            self.stats.bytes_delivered += payload.len() as u64;
            return ReceiverStep::Deliver { payload, reply };
        }

        self.stats.discarded += 1;
        let reply = self.last_accepted.map(Packet::ack);
        if reply.is_some() {
            self.stats.acks_sent += 1;
        }
        ReceiverStep::Discard { reply }
    }

    fn on_eot(&mut self, seq: u32) -> ReceiverStep {
        if self.state == ReceiverState::Receiving && seq != self.expected {
            // Still honoured: the sender only sends EOT once everything is
            // acknowledged, so the mismatch is worth reporting but not fatal.
            let anomaly = SequenceAnomaly::EotOutOfOrder {
                seq,
                expected: self.expected,
            };
            self.stats.anomalies += 1;
            log::debug!("[gbn:recv] {anomaly}");
        }
        self.state = ReceiverState::Closed;
        self.stats.eot_replies += 1;
        ReceiverStep::Close {
            reply: Packet::eot_reply(seq),
        }
    }

    fn ignore(&mut self, anomaly: SequenceAnomaly) -> ReceiverStep {
        self.stats.anomalies += 1;
        log::debug!("[gbn:recv] ignoring packet: {anomaly}");
        ReceiverStep::Ignored(anomaly)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
