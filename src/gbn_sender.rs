//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] owns the whole outgoing stream as a list of data packets
//! and a sliding window over it.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets are outstanding at once.
//! - ACKs are **cumulative**: `Ack(s)` means every packet up to and
//!   including sequence number `s` has been accepted.
//! - One retransmission timer covers the whole window.  It is started when
//!   the window goes from empty to non-empty, restarted whenever an ACK
//!   slides the window without emptying it, and stopped when it empties.
//! - On timeout **every** outstanding packet is resent, oldest first.
//! - Once all data is acknowledged an EOT is sent and retransmitted on
//!   timeout until the receiver replies.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.  Window positions are tracked as absolute stream indices
//! and mapped onto the modular sequence space with [`SeqSpace`], so the
//! wrap-around ambiguity only ever appears when interpreting an inbound
//! ACK number.

use crate::config::ProtocolConfig;
use crate::error::{ConfigError, SequenceAnomaly};
use crate::packet::{Packet, PacketKind};
use crate::seq::SeqSpace;
use crate::state::SenderState;
use crate::timer::TimerCommand;

// ---------------------------------------------------------------------------
// Engine outputs
// ---------------------------------------------------------------------------

/// Packets to put on the wire, in order, and what to do with the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub packets: Vec<Packet>,
    pub timer: TimerCommand,
}

impl Transmit {
    fn idle() -> Self {
        Self {
            packets: Vec::new(),
            timer: TimerCommand::Keep,
        }
    }
}

/// Result of feeding one cumulative ACK to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window slid forward by `acked` packets.
    Advanced { acked: usize, window_empty: bool },
    /// Repeat of the last acknowledged number; nothing changed.
    Duplicate,
    /// Stale or out-of-range ACK; nothing changed.
    Ignored(SequenceAnomaly),
}

impl AckOutcome {
    pub fn timer(&self) -> TimerCommand {
        match self {
            Self::Advanced {
                window_empty: true, ..
            } => TimerCommand::Stop,
            Self::Advanced { .. } => TimerCommand::Start,
            Self::Duplicate | Self::Ignored(_) => TimerCommand::Keep,
        }
    }
}

/// Result of dispatching one inbound packet to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderStep {
    Ack(AckOutcome),
    /// The EOT reply arrived; the sender is now closed.
    Closed,
    Ignored(SequenceAnomaly),
}

impl SenderStep {
    pub fn timer(&self) -> TimerCommand {
        match self {
            Self::Ack(outcome) => outcome.timer(),
            Self::Closed => TimerCommand::Stop,
            Self::Ignored(_) => TimerCommand::Keep,
        }
    }
}

/// Counters describing one sender's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// First transmissions of data packets.
    pub data_sent: u64,
    /// Data packets resent after a timeout.
    pub retransmitted: u64,
    /// ACKs that slid the window.
    pub acks_received: u64,
    pub duplicate_acks: u64,
    /// Inbound packets ignored as sequence anomalies.
    pub anomalies: u64,
    pub timeouts: u64,
    /// EOT transmissions, first send included.
    pub eot_sent: u64,
    /// `true` if the sender closed without hearing the EOT reply.
    pub forced_close: bool,
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one session.
///
/// # Window layout
///
/// ```text
///   acked        base              next             total
///  ────────────────┼─────────────────┼────────────────┼
///                  │ <── in flight ─▶│ <── unsent ──▶ │
/// ```
#[derive(Debug)]
pub struct GbnSender {
    seq: SeqSpace,
    window_size: usize,
    eot_retries: u32,

    /// Every data packet of the stream, sequence numbers pre-assigned.
    packets: Vec<Packet>,

    /// Absolute index of the oldest unacknowledged packet.
    base: usize,
    /// Absolute index of the next packet to send for the first time.
    next: usize,

    state: SenderState,
    eot_retransmits: u32,
    consecutive_timeouts: u32,
    stats: SenderStats,
}

impl GbnSender {
    /// Build one data packet per chunk and reset the window to the start of
    /// the stream.
    pub fn new(config: &ProtocolConfig, chunks: Vec<Vec<u8>>) -> Result<Self, ConfigError> {
        config.validate()?;
        let seq = config.seq();

        let mut packets = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            if chunk.len() > config.max_payload {
                return Err(ConfigError::ChunkTooLarge {
                    index,
                    len: chunk.len(),
                    max: config.max_payload,
                });
            }
            packets.push(Packet::data(seq.of_index(index), chunk));
        }

        Ok(Self {
            seq,
            window_size: config.window_size,
            eot_retries: config.eot_retries,
            packets,
            base: 0,
            next: 0,
            state: SenderState::Transferring,
            eot_retransmits: 0,
            consecutive_timeouts: 0,
            stats: SenderStats::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Sequence number of the oldest unacknowledged packet.
    pub fn base(&self) -> u32 {
        self.seq.of_index(self.base)
    }

    /// Sequence number of the next unused slot.
    pub fn next_to_send(&self) -> u32 {
        self.seq.of_index(self.next)
    }

    /// Absolute stream index of the oldest unacknowledged packet.
    pub fn base_index(&self) -> usize {
        self.base
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Packets sent but not yet cumulatively acknowledged.
    pub fn outstanding(&self) -> usize {
        self.next - self.base
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn total_packets(&self) -> usize {
        self.packets.len()
    }

    /// `true` when the window has room and unsent packets remain.
    pub fn can_send(&self) -> bool {
        self.state == SenderState::Transferring
            && self.outstanding() < self.window_size
            && self.next < self.packets.len()
    }

    /// Every chunk has been sent and cumulatively acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base == self.next && self.next == self.packets.len()
    }

    /// Timeouts since the window last made progress.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Transmission
    // -----------------------------------------------------------------------

    /// Whatever the sender should put on the wire next: new data while the
    /// window allows, or the EOT once every data packet is acknowledged.
    pub fn poll_transmit(&mut self) -> Transmit {
        match self.state {
            SenderState::Transferring if self.is_complete() => self.begin_close(),
            SenderState::Transferring => self.fill_window(),
            SenderState::AwaitingEotAck | SenderState::Closed => Transmit::idle(),
        }
    }

    /// Send new packets until the window is full or the stream is exhausted.
    ///
    /// The timer is started only when the first packet enters an empty
    /// window; a window that already holds an unacknowledged packet keeps
    /// its running timer.
    pub fn fill_window(&mut self) -> Transmit {
        let mut out = Transmit::idle();
        if self.state != SenderState::Transferring {
            return out;
        }
        while self.can_send() {
            if self.base == self.next {
                out.timer = TimerCommand::Start;
            }
            out.packets.push(self.packets[self.next].clone());
            self.next += 1;
            self.stats.data_sent += 1;
            debug_assert!(self.outstanding() <= self.window_size);
        }
        out
    }

    /// Leave `Transferring`: emit the EOT carrying the next unused sequence
    /// number and wait for the reply.
    ///
    /// Does nothing unless every data packet is acknowledged.
    pub fn begin_close(&mut self) -> Transmit {
        if self.state != SenderState::Transferring || !self.is_complete() {
            return Transmit::idle();
        }
        self.state = SenderState::AwaitingEotAck;
        self.stats.eot_sent += 1;
        Transmit {
            packets: vec![self.eot_packet()],
            timer: TimerCommand::Start,
        }
    }

    fn eot_packet(&self) -> Packet {
        Packet::eot(self.next_to_send())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Dispatch one inbound packet.
    pub fn on_packet(&mut self, pkt: &Packet) -> SenderStep {
        let step = match (self.state, pkt.kind()) {
            (SenderState::Closed, kind) => {
                SenderStep::Ignored(SequenceAnomaly::UnexpectedKind { kind })
            }
            (_, PacketKind::Ack) => return SenderStep::Ack(self.on_ack(pkt.seq())),
            (SenderState::AwaitingEotAck, PacketKind::EotReceiverToSender) => {
                self.state = SenderState::Closed;
                return SenderStep::Closed;
            }
            (_, kind) => SenderStep::Ignored(SequenceAnomaly::UnexpectedKind { kind }),
        };
        if let SenderStep::Ignored(anomaly) = step {
            self.note_anomaly(anomaly);
        }
        step
    }

    /// Interpret `ack` as a cumulative acknowledgement.
    ///
    /// The ACK advances `base` to `ack + 1` only when that lands inside
    /// `(base, next]`; with `W ≤ N − 1` this is unambiguous.  An ACK equal to
    /// `base − 1` is a duplicate.  Anything else is stale or bogus and
    /// ignored; `base` never moves backward.
    ///
    /// An ACK reordered behind a newer one is only recognised as stale when
    /// it lags by fewer than `N − W` positions.
    pub fn on_ack(&mut self, ack: u32) -> AckOutcome {
        if !self.seq.contains(ack) {
            let anomaly = SequenceAnomaly::OutOfSpace { seq: ack };
            self.note_anomaly(anomaly);
            return AckOutcome::Ignored(anomaly);
        }

        let outstanding = self.outstanding();
        let newly_acked = self.seq.distance_forward(self.base(), self.seq.advance(ack)) as usize;

        if newly_acked == 0 {
            self.stats.duplicate_acks += 1;
            return AckOutcome::Duplicate;
        }
        if newly_acked > outstanding {
            let anomaly = SequenceAnomaly::AckOutsideWindow {
                ack,
                base: self.base(),
                outstanding,
            };
            self.note_anomaly(anomaly);
            return AckOutcome::Ignored(anomaly);
        }

        self.base += newly_acked;
        self.consecutive_timeouts = 0;
        self.stats.acks_received += 1;
        AckOutcome::Advanced {
            acked: newly_acked,
            window_empty: self.base == self.next,
        }
    }

    /// Retransmission timer fired.
    ///
    /// In `Transferring` every packet in `[base, next)` is resent in order.
    /// In `AwaitingEotAck` the EOT is resent, until `eot_retries` is used up
    /// and the sender closes on its own.
    pub fn on_timeout(&mut self) -> Transmit {
        self.stats.timeouts += 1;
        match self.state {
            SenderState::Transferring => {
                if self.base == self.next {
                    return Transmit {
                        packets: Vec::new(),
                        timer: TimerCommand::Stop,
                    };
                }
                self.consecutive_timeouts += 1;
                let packets = self.packets[self.base..self.next].to_vec();
                self.stats.retransmitted += packets.len() as u64;
                Transmit {
                    packets,
                    timer: TimerCommand::Start,
                }
            }
            SenderState::AwaitingEotAck => {
                if self.eot_retransmits >= self.eot_retries {
                    log::warn!(
                        "[gbn:send] EOT not answered after {} retries; force-closing",
                        self.eot_retransmits
                    );
                    self.state = SenderState::Closed;
                    self.stats.forced_close = true;
                    return Transmit {
                        packets: Vec::new(),
                        timer: TimerCommand::Stop,
                    };
                }
                self.eot_retransmits += 1;
                self.stats.eot_sent += 1;
                Transmit {
                    packets: vec![self.eot_packet()],
                    timer: TimerCommand::Start,
                }
            }
            SenderState::Closed => Transmit {
                packets: Vec::new(),
                timer: TimerCommand::Stop,
            },
        }
    }

    fn note_anomaly(&mut self, anomaly: SequenceAnomaly) {
        self.stats.anomalies += 1;
        log::debug!("[gbn:send] ignoring packet: {anomaly}");
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window_size: usize, seq_space: u32) -> ProtocolConfig {
        ProtocolConfig {
            window_size,
            seq_space,
            ..ProtocolConfig::default()
        }
    }

    fn chunks(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8; 3]).collect()
    }

    fn seqs(t: &Transmit) -> Vec<u32> {
        t.packets.iter().map(Packet::seq).collect()
    }

    #[test]
    fn initial_state() {
        let s = GbnSender::new(&config(7, 8), chunks(3)).unwrap();
        assert_eq!(s.base(), 0);
        assert_eq!(s.next_to_send(), 0);
        assert_eq!(s.state(), SenderState::Transferring);
        assert_eq!(s.outstanding(), 0);
        assert!(!s.is_complete());
    }

    #[test]
    fn sequence_numbers_wrap_in_queue_order() {
        let mut s = GbnSender::new(&config(7, 8), chunks(10)).unwrap();
        let t = s.fill_window();
        assert_eq!(seqs(&t), vec![0, 1, 2, 3, 4, 5, 6]);
        s.on_ack(6);
        let t = s.fill_window();
        assert_eq!(seqs(&t), vec![7, 0, 1]);
    }

    #[test]
    fn oversized_chunk_rejected() {
        let err = GbnSender::new(&config(7, 8), vec![vec![0; 31]]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ChunkTooLarge {
                index: 0,
                len: 31,
                max: 30
            }
        );
    }

    #[test]
    fn fill_window_stops_at_window_size() {
        let mut s = GbnSender::new(&config(3, 8), chunks(10)).unwrap();
        let t = s.fill_window();
        assert_eq!(t.packets.len(), 3);
        assert_eq!(t.timer, TimerCommand::Start);
        assert_eq!(s.outstanding(), 3);
        assert!(!s.can_send());

        // Nothing more fits; the timer is left alone.
        let t = s.fill_window();
        assert!(t.packets.is_empty());
        assert_eq!(t.timer, TimerCommand::Keep);
    }

    #[test]
    fn timer_kept_when_window_already_busy() {
        let mut s = GbnSender::new(&config(3, 8), chunks(10)).unwrap();
        s.fill_window();
        // One slot opens but packets 1 and 2 are still outstanding.
        let outcome = s.on_ack(0);
        assert_eq!(
            outcome,
            AckOutcome::Advanced {
                acked: 1,
                window_empty: false
            }
        );
        assert_eq!(outcome.timer(), TimerCommand::Start);
        let t = s.fill_window();
        assert_eq!(seqs(&t), vec![3]);
        assert_eq!(t.timer, TimerCommand::Keep);
    }

    #[test]
    fn timer_started_when_window_refills_from_empty() {
        let mut s = GbnSender::new(&config(2, 8), chunks(4)).unwrap();
        s.fill_window();
        let outcome = s.on_ack(1);
        assert_eq!(outcome.timer(), TimerCommand::Stop);
        let t = s.fill_window();
        assert_eq!(seqs(&t), vec![2, 3]);
        assert_eq!(t.timer, TimerCommand::Start);
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut s = GbnSender::new(&config(7, 8), chunks(5)).unwrap();
        s.fill_window();
        assert_eq!(
            s.on_ack(2),
            AckOutcome::Advanced {
                acked: 3,
                window_empty: false
            }
        );
        assert_eq!(s.base(), 3);
        assert_eq!(s.outstanding(), 2);
    }

    #[test]
    fn duplicate_ack_changes_nothing() {
        let mut s = GbnSender::new(&config(7, 8), chunks(5)).unwrap();
        s.fill_window();
        s.on_ack(1);
        assert_eq!(s.on_ack(1), AckOutcome::Duplicate);
        assert_eq!(s.base(), 2);
        assert_eq!(s.stats().duplicate_acks, 1);
    }

    #[test]
    fn ack_beyond_next_is_ignored() {
        let mut s = GbnSender::new(&config(7, 8), chunks(5)).unwrap();
        s.fill_window(); // 0..=4 outstanding
        let outcome = s.on_ack(6);
        assert!(matches!(
            outcome,
            AckOutcome::Ignored(SequenceAnomaly::AckOutsideWindow { ack: 6, .. })
        ));
        assert_eq!(s.base(), 0);
        assert_eq!(s.stats().anomalies, 1);
    }

    #[test]
    fn ack_outside_space_is_ignored() {
        let mut s = GbnSender::new(&config(7, 8), chunks(5)).unwrap();
        s.fill_window();
        assert_eq!(
            s.on_ack(8),
            AckOutcome::Ignored(SequenceAnomaly::OutOfSpace { seq: 8 })
        );
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn stale_ack_from_previous_wrap_never_retreats() {
        let mut s = GbnSender::new(&config(7, 8), chunks(20)).unwrap();
        s.fill_window(); // 0..=6
        s.on_ack(5); // base = 6
        s.fill_window(); // 6,7,0,1,2,3,4 outstanding
        assert_eq!(s.base(), 6);
        assert_eq!(s.outstanding(), 7);

        // Ack(3) lands six packets past base, inside the window.
        let before = s.base_index();
        s.on_ack(3); // 6,7,0,1,2,3 acked
        assert_eq!(s.base_index(), before + 6);
        assert_eq!(s.base(), 4);

        // A late Ack(2) is behind base: ignored.
        let outcome = s.on_ack(2);
        assert!(matches!(outcome, AckOutcome::Ignored(_)));
        assert_eq!(s.base(), 4);
    }

    #[test]
    fn wraparound_ack_advances_base_to_two() {
        let mut s = GbnSender::new(&config(7, 8), chunks(12)).unwrap();
        s.fill_window(); // 0..=6
        s.on_ack(5); // base = 6
        s.fill_window(); // 6,7,0,1,2,3
        assert_eq!(s.base(), 6);

        let outcome = s.on_ack(1);
        assert_eq!(
            outcome,
            AckOutcome::Advanced {
                acked: 4,
                window_empty: false
            }
        );
        assert_eq!(s.base(), 2);
    }

    #[test]
    fn timeout_resends_whole_window_in_order() {
        let mut s = GbnSender::new(&config(4, 8), chunks(6)).unwrap();
        s.fill_window();
        s.on_ack(0);
        s.fill_window(); // 1,2,3,4 outstanding

        let t = s.on_timeout();
        assert_eq!(seqs(&t), vec![1, 2, 3, 4]);
        assert_eq!(t.timer, TimerCommand::Start);
        assert_eq!(s.stats().retransmitted, 4);
        assert_eq!(s.consecutive_timeouts(), 1);

        // Progress resets the counter.
        s.on_ack(2);
        assert_eq!(s.consecutive_timeouts(), 0);
    }

    #[test]
    fn timeout_with_empty_window_stops_timer() {
        let mut s = GbnSender::new(&config(4, 8), chunks(1)).unwrap();
        let t = s.on_timeout();
        assert!(t.packets.is_empty());
        assert_eq!(t.timer, TimerCommand::Stop);
    }

    #[test]
    fn eot_sent_after_last_ack() {
        let mut s = GbnSender::new(&config(7, 8), chunks(3)).unwrap();
        let t = s.poll_transmit();
        assert_eq!(t.packets.len(), 3);
        assert_eq!(s.begin_close(), Transmit::idle(), "not complete yet");

        s.on_ack(2);
        assert!(s.is_complete());
        let t = s.poll_transmit();
        assert_eq!(t.packets, vec![Packet::eot(3)]);
        assert_eq!(t.timer, TimerCommand::Start);
        assert_eq!(s.state(), SenderState::AwaitingEotAck);

        assert_eq!(s.on_packet(&Packet::eot_reply(3)), SenderStep::Closed);
        assert_eq!(s.state(), SenderState::Closed);
    }

    #[test]
    fn empty_stream_goes_straight_to_eot() {
        let mut s = GbnSender::new(&config(7, 8), Vec::new()).unwrap();
        assert!(s.is_complete());
        let t = s.poll_transmit();
        assert_eq!(t.packets, vec![Packet::eot(0)]);
    }

    #[test]
    fn eot_retransmitted_then_force_closed() {
        let cfg = ProtocolConfig {
            eot_retries: 2,
            ..config(7, 8)
        };
        let mut s = GbnSender::new(&cfg, Vec::new()).unwrap();
        s.poll_transmit();

        assert_eq!(s.on_timeout().packets, vec![Packet::eot(0)]);
        assert_eq!(s.on_timeout().packets, vec![Packet::eot(0)]);
        let t = s.on_timeout();
        assert!(t.packets.is_empty());
        assert_eq!(t.timer, TimerCommand::Stop);
        assert_eq!(s.state(), SenderState::Closed);
        assert!(s.stats().forced_close);
        assert_eq!(s.stats().eot_sent, 3);
    }

    #[test]
    fn eot_reply_during_transfer_is_anomaly() {
        let mut s = GbnSender::new(&config(7, 8), chunks(2)).unwrap();
        s.fill_window();
        let step = s.on_packet(&Packet::eot_reply(0));
        assert_eq!(
            step,
            SenderStep::Ignored(SequenceAnomaly::UnexpectedKind {
                kind: PacketKind::EotReceiverToSender
            })
        );
        assert_eq!(step.timer(), TimerCommand::Keep);
        assert_eq!(s.state(), SenderState::Transferring);
    }

    #[test]
    fn data_packet_at_sender_is_anomaly() {
        let mut s = GbnSender::new(&config(7, 8), chunks(2)).unwrap();
        assert!(matches!(
            s.on_packet(&Packet::data(0, vec![1])),
            SenderStep::Ignored(_)
        ));
    }

    #[test]
    fn late_duplicate_ack_while_awaiting_eot() {
        let mut s = GbnSender::new(&config(7, 8), chunks(2)).unwrap();
        s.poll_transmit();
        s.on_ack(1);
        s.poll_transmit();
        assert_eq!(s.state(), SenderState::AwaitingEotAck);
        assert_eq!(s.on_packet(&Packet::ack(1)), SenderStep::Ack(AckOutcome::Duplicate));
        assert_eq!(s.state(), SenderState::AwaitingEotAck);
    }
}
