//! In-memory lossy network for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate packets.  To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`SimulatedLink::pair`] returns two connected [`SimEndpoint`]s whose
//! sends pass through a configurable fault model:
//!
//! | Fault            | Description                                        |
//! |------------------|----------------------------------------------------|
//! | Packet loss      | Drop a packet with probability `loss_rate`.        |
//! | Scripted loss    | Drop the n-th send (0-based) listed in `drop_sends`.|
//! | Reordering       | Hold a packet back until after the next send.      |
//! | Duplication      | Deliver a packet twice.                            |
//! | Corruption       | Flip one byte; the checksum catches it on receive. |
//!
//! Packets cross the link encoded, so every delivery also exercises the
//! codec.  The RNG is seeded per direction, which makes failures
//! reproducible.

use std::collections::HashSet;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::packet::{Packet, PacketKind};

/// Fault model for one direction of the link.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability that any given packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that a packet is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a packet is held back past the next one.
    pub reorder_rate: f64,
    /// Probability that one byte of the datagram is flipped.
    pub corrupt_rate: f64,
    /// Indices of `send` calls to drop unconditionally.
    pub drop_sends: HashSet<usize>,
    pub seed: u64,
}

impl FaultConfig {
    /// A lossless, in-order link.
    pub fn perfect() -> Self {
        Self::default()
    }

    /// Random loss only.
    pub fn lossy(loss_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            seed,
            ..Self::default()
        }
    }

    /// Drop exactly the listed sends and nothing else.
    pub fn dropping(sends: impl IntoIterator<Item = usize>) -> Self {
        Self {
            drop_sends: sends.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Per-direction counters, kept by the sending endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    sent_by_kind: [u64; 4],
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
    pub corrupted: u64,
    /// Datagrams handed to this endpoint's receiver.
    pub received: u64,
}

impl LinkStats {
    /// Packets of `kind` passed to `send`, dropped ones included.
    pub fn sent(&self, kind: PacketKind) -> u64 {
        self.sent_by_kind[usize::from(kind.to_wire())]
    }

    pub fn sent_total(&self) -> u64 {
        self.sent_by_kind.iter().sum()
    }
}

struct FaultState {
    config: FaultConfig,
    rng: StdRng,
    sends: usize,
    held: Option<Vec<u8>>,
}

impl FaultState {
    fn roll(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen_bool(p.min(1.0))
    }

    /// Apply the fault model to one outgoing datagram and return what
    /// actually goes on the wire, in order.
    fn shape(&mut self, mut bytes: Vec<u8>, stats: &mut LinkStats) -> Vec<Vec<u8>> {
        let index = self.sends;
        self.sends += 1;

        let mut out = Vec::with_capacity(3);
        let loss_rate = self.config.loss_rate;
        if self.config.drop_sends.contains(&index) || self.roll(loss_rate) {
            stats.dropped += 1;
            out.extend(self.held.take());
            return out;
        }

        let corrupt_rate = self.config.corrupt_rate;
        if self.roll(corrupt_rate) && !bytes.is_empty() {
            let at = self.rng.gen_range(0..bytes.len());
            bytes[at] ^= 0xff;
            stats.corrupted += 1;
        }

        let duplicate_rate = self.config.duplicate_rate;
        let duplicate = self.roll(duplicate_rate);
        if duplicate {
            stats.duplicated += 1;
        }

        let reorder_rate = self.config.reorder_rate;
        if self.held.is_none() && self.roll(reorder_rate) {
            stats.reordered += 1;
            if duplicate {
                out.push(bytes.clone());
            }
            self.held = Some(bytes);
            return out;
        }

        if duplicate {
            out.push(bytes.clone());
        }
        out.push(bytes);
        out.extend(self.held.take());
        out
    }
}

/// One end of a [`SimulatedLink`].
pub struct SimEndpoint {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    faults: Mutex<FaultState>,
    stats: Mutex<LinkStats>,
}

impl SimEndpoint {
    /// Snapshot of this endpoint's counters.
    pub fn stats(&self) -> LinkStats {
        self.stats.lock().clone()
    }
}

impl std::fmt::Debug for SimEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEndpoint")
            .field("stats", &*self.stats.lock())
            .finish_non_exhaustive()
    }
}

/// Constructor for a pair of connected in-memory endpoints.
pub struct SimulatedLink;

impl SimulatedLink {
    /// `a_to_b` shapes everything the first endpoint sends, `b_to_a`
    /// everything the second one sends.
    pub fn pair(a_to_b: FaultConfig, b_to_a: FaultConfig) -> (SimEndpoint, SimEndpoint) {
        let (tx_ab, rx_ab) = mpsc::unbounded_channel();
        let (tx_ba, rx_ba) = mpsc::unbounded_channel();
        (
            SimEndpoint::new(tx_ab, rx_ba, a_to_b),
            SimEndpoint::new(tx_ba, rx_ab, b_to_a),
        )
    }
}

impl SimEndpoint {
    fn new(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
        config: FaultConfig,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            faults: Mutex::new(FaultState {
                config,
                rng,
                sends: 0,
                held: None,
            }),
            stats: Mutex::new(LinkStats::default()),
        }
    }
}

impl Channel for SimEndpoint {
    async fn send(&self, packet: &Packet) -> Result<(), ChannelError> {
        let bytes = packet.encode()?;
        let wire = {
            let mut stats = self.stats.lock();
            stats.sent_by_kind[usize::from(packet.kind().to_wire())] += 1;
            self.faults.lock().shape(bytes, &mut stats)
        };
        for datagram in wire {
            // A vanished peer is indistinguishable from loss.
            let _ = self.tx.send(datagram);
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Packet, ChannelError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(bytes) => {
                self.stats.lock().received += 1;
                Ok(Packet::decode(&bytes)?)
            }
            // Peer gone: nothing will ever arrive again, like a silent UDP port.
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn drain(ep: &SimEndpoint) -> Vec<Packet> {
        let mut got = Vec::new();
        while let Ok(p) = ep.recv_timeout(Duration::from_millis(10)).await {
            got.push(p);
        }
        got
    }

    #[tokio::test]
    async fn perfect_link_delivers_in_order() {
        let (a, b) = SimulatedLink::pair(FaultConfig::perfect(), FaultConfig::perfect());
        for seq in 0..3 {
            a.send(&Packet::data(seq, vec![seq as u8])).await.unwrap();
        }
        let got: Vec<u32> = drain(&b).await.iter().map(Packet::seq).collect();
        assert_eq!(got, vec![0, 1, 2]);
        assert_eq!(a.stats().sent(PacketKind::Data), 3);
        assert_eq!(b.stats().received, 3);
    }

    #[tokio::test]
    async fn scripted_drop() {
        let (a, b) = SimulatedLink::pair(FaultConfig::dropping([1]), FaultConfig::perfect());
        for seq in 0..3 {
            a.send(&Packet::ack(seq)).await.unwrap();
        }
        let got: Vec<u32> = drain(&b).await.iter().map(Packet::seq).collect();
        assert_eq!(got, vec![0, 2]);
        assert_eq!(a.stats().dropped, 1);
        assert_eq!(a.stats().sent(PacketKind::Ack), 3);
    }

    #[tokio::test]
    async fn reorder_swaps_adjacent_packets() {
        let faults = FaultConfig {
            reorder_rate: 1.0,
            ..FaultConfig::default()
        };
        let (a, b) = SimulatedLink::pair(faults, FaultConfig::perfect());
        // 0 is held, 1 releases it after itself; 2 is held and never released.
        for seq in 0..3 {
            a.send(&Packet::ack(seq)).await.unwrap();
        }
        let got: Vec<u32> = drain(&b).await.iter().map(Packet::seq).collect();
        assert_eq!(got, vec![1, 0]);
    }

    #[tokio::test]
    async fn duplicates_arrive_twice() {
        let faults = FaultConfig {
            duplicate_rate: 1.0,
            ..FaultConfig::default()
        };
        let (a, b) = SimulatedLink::pair(faults, FaultConfig::perfect());
        a.send(&Packet::ack(4)).await.unwrap();
        assert_eq!(drain(&b).await, vec![Packet::ack(4), Packet::ack(4)]);
    }

    #[tokio::test]
    async fn corruption_surfaces_as_malformed() {
        let faults = FaultConfig {
            corrupt_rate: 1.0,
            ..FaultConfig::default()
        };
        let (a, b) = SimulatedLink::pair(faults, FaultConfig::perfect());
        a.send(&Packet::data(1, b"payload".to_vec())).await.unwrap();
        assert!(matches!(b.recv().await, Err(ChannelError::Malformed(_))));
    }

    #[tokio::test]
    async fn dropped_peer_looks_silent() {
        let (a, b) = SimulatedLink::pair(FaultConfig::perfect(), FaultConfig::perfect());
        drop(b);
        a.send(&Packet::ack(0)).await.unwrap();
        let res = a.recv_timeout(Duration::from_millis(20)).await;
        assert!(matches!(res, Err(ChannelError::Timeout)));
    }
}
