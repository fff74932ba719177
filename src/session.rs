//! Session control loops: one sequential loop per role.
//!
//! # Architecture
//!
//! ```text
//!  chunks ──▶ SenderSession                      ReceiverSession ──▶ sink
//!               ├── GbnSender (window, EOT)        ├── GbnReceiver
//!               ├── RetransmitTimer                │
//!               └── &Channel ◀──── datagrams ────▶ └── &Channel
//! ```
//!
//! Each loop alternates between "send what the engine allows" and "wait for
//! the next datagram".  The channel receive is the only suspension point;
//! for the sender it is bounded by the retransmission timer.  Malformed
//! datagrams are dropped, sequence anomalies are absorbed by the engines,
//! and only fatal channel or sink errors end a session early.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::channel::Channel;
use crate::config::ProtocolConfig;
use crate::error::{ChannelError, SessionError};
use crate::gbn_receiver::{GbnReceiver, ReceiverStats, ReceiverStep};
use crate::gbn_sender::{AckOutcome, GbnSender, SenderStats, SenderStep, Transmit};
use crate::packet::Packet;
use crate::state::{ReceiverState, SenderState};
use crate::timer::RetransmitTimer;

/// Split `data` into chunks of at most `max_payload` bytes, in order.
///
/// Empty input yields no chunks.
pub fn chunk_payload(data: &[u8], max_payload: usize) -> Vec<Vec<u8>> {
    data.chunks(max_payload.max(1)).map(<[u8]>::to_vec).collect()
}

/// Outcome of a completed sender session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub packets: usize,
    pub stats: SenderStats,
}

/// Outcome of a completed receiver session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    pub stats: ReceiverStats,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Drives a [`GbnSender`] over a channel until the handshake closes it.
pub struct SenderSession<'c, C> {
    channel: &'c C,
    sender: GbnSender,
    timer: RetransmitTimer,
    max_consecutive_timeouts: Option<u32>,
}

impl<'c, C: Channel> SenderSession<'c, C> {
    pub fn new(
        channel: &'c C,
        config: &ProtocolConfig,
        chunks: Vec<Vec<u8>>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            channel,
            sender: GbnSender::new(config, chunks)?,
            timer: RetransmitTimer::new(config.timeout),
            max_consecutive_timeouts: config.max_consecutive_timeouts,
        })
    }

    /// Run until the EOT reply arrives (or the EOT retries run out).
    pub async fn run(mut self) -> Result<SenderReport, SessionError> {
        log::info!(
            "[gbn:send] starting: {} packet(s), window={}",
            self.sender.total_packets(),
            self.sender.window_size()
        );

        while self.sender.state() != SenderState::Closed {
            let out = self.sender.poll_transmit();
            self.transmit(out).await?;

            let inbound = match self.timer.remaining() {
                Some(left) => self.channel.recv_timeout(left).await,
                None => self.channel.recv().await,
            };

            match inbound {
                Ok(pkt) => self.on_inbound(&pkt),
                Err(ChannelError::Timeout) => self.on_timeout().await?,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => log::debug!("[gbn:send] dropping datagram: {e}"),
            }
        }

        let stats = self.sender.stats().clone();
        log::info!(
            "[gbn:send] closed: {} data sent, {} retransmitted, {} timeout(s)",
            stats.data_sent,
            stats.retransmitted,
            stats.timeouts
        );
        Ok(SenderReport {
            packets: self.sender.total_packets(),
            stats,
        })
    }

    fn on_inbound(&mut self, pkt: &Packet) {
        let step = self.sender.on_packet(pkt);
        match step {
            SenderStep::Ack(AckOutcome::Advanced { acked, .. }) => {
                log::debug!(
                    "[gbn:send] ← {pkt} (slid {acked}; base={} in_flight={})",
                    self.sender.base(),
                    self.sender.outstanding()
                );
            }
            SenderStep::Ack(AckOutcome::Duplicate) => {
                log::debug!("[gbn:send] ← {pkt} duplicate");
            }
            SenderStep::Closed => log::debug!("[gbn:send] ← {pkt}; closing"),
            SenderStep::Ack(AckOutcome::Ignored(_)) | SenderStep::Ignored(_) => {}
        }
        self.timer.apply(step.timer());
    }

    async fn on_timeout(&mut self) -> Result<(), SessionError> {
        let out = self.sender.on_timeout();
        let timeouts = self.sender.consecutive_timeouts();
        if let Some(limit) = self.max_consecutive_timeouts {
            if timeouts > limit {
                log::warn!("[gbn:send] peer silent for {timeouts} timeouts; giving up");
                return Err(SessionError::RetriesExhausted { timeouts });
            }
        }
        log::debug!(
            "[gbn:send] timeout: retransmitting {} packet(s) from base={}",
            out.packets.len(),
            self.sender.base()
        );
        self.transmit(out).await
    }

    async fn transmit(&mut self, out: Transmit) -> Result<(), SessionError> {
        for pkt in &out.packets {
            self.channel.send(pkt).await?;
            log::debug!("[gbn:send] → {pkt}");
        }
        self.timer.apply(out.timer);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Drives a [`GbnReceiver`] over a channel, writing accepted payloads to a
/// sink, until the sender's EOT arrives.
pub struct ReceiverSession<'c, C, W> {
    channel: &'c C,
    receiver: GbnReceiver,
    sink: W,
    linger: std::time::Duration,
}

impl<'c, C, W> ReceiverSession<'c, C, W>
where
    C: Channel,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(channel: &'c C, config: &ProtocolConfig, sink: W) -> Result<Self, SessionError> {
        Ok(Self {
            channel,
            receiver: GbnReceiver::new(config)?,
            sink,
            linger: config.linger,
        })
    }

    /// Run until the EOT has been answered and the sink closed.
    pub async fn run(mut self) -> Result<ReceiverReport, SessionError> {
        log::info!("[gbn:recv] waiting for data");

        while self.receiver.state() != ReceiverState::Closed {
            let pkt = match self.channel.recv().await {
                Ok(pkt) => pkt,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::debug!("[gbn:recv] dropping datagram: {e}");
                    continue;
                }
            };
            self.on_inbound(pkt).await?;
        }

        self.sink.flush().await.map_err(SessionError::Sink)?;
        self.sink.shutdown().await.map_err(SessionError::Sink)?;
        self.linger().await;

        let stats = self.receiver.stats().clone();
        log::info!(
            "[gbn:recv] closed: {} packet(s), {} byte(s) delivered, {} discarded",
            stats.accepted,
            stats.bytes_delivered,
            stats.discarded
        );
        Ok(ReceiverReport { stats })
    }

    async fn on_inbound(&mut self, pkt: Packet) -> Result<(), SessionError> {
        let desc = pkt.to_string();
        match self.receiver.on_packet(pkt) {
            ReceiverStep::Deliver { payload, reply } => {
                self.sink
                    .write_all(&payload)
                    .await
                    .map_err(SessionError::Sink)?;
                self.channel.send(&reply).await?;
                log::debug!("[gbn:recv] ← {desc} accepted; → {reply}");
            }
            ReceiverStep::Discard { reply } => {
                if let Some(reply) = reply {
                    self.channel.send(&reply).await?;
                    log::debug!("[gbn:recv] ← {desc} discarded; → {reply}");
                } else {
                    log::debug!("[gbn:recv] ← {desc} discarded; nothing accepted yet");
                }
            }
            ReceiverStep::Close { reply } => {
                self.channel.send(&reply).await?;
                log::debug!("[gbn:recv] ← {desc}; → {reply}");
            }
            ReceiverStep::Ignored(_) => {}
        }
        Ok(())
    }

    /// Keep answering duplicate EOTs for the configured linger period, in
    /// case the first reply was lost.
    async fn linger(&mut self) {
        if self.linger.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.linger;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            match self.channel.recv_timeout(left).await {
                Ok(pkt) => {
                    if let ReceiverStep::Close { reply } = self.receiver.on_packet(pkt) {
                        if let Err(e) = self.channel.send(&reply).await {
                            log::warn!("[gbn:recv] linger: {e}");
                            return;
                        }
                        log::debug!("[gbn:recv] linger: re-answered EOT");
                    }
                }
                Err(ChannelError::Timeout) => return,
                Err(e) if e.is_fatal() => {
                    log::warn!("[gbn:recv] linger: {e}");
                    return;
                }
                Err(_) => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Chunk `data` and send it to the peer on `channel`.
pub async fn send_stream<C: Channel>(
    channel: &C,
    config: &ProtocolConfig,
    data: &[u8],
) -> Result<SenderReport, SessionError> {
    config.validate()?;
    let chunks = chunk_payload(data, config.max_payload);
    SenderSession::new(channel, config, chunks)?.run().await
}

/// Receive one stream from the peer on `channel` into `sink`.
pub async fn receive_stream<C, W>(
    channel: &C,
    config: &ProtocolConfig,
    sink: W,
) -> Result<ReceiverReport, SessionError>
where
    C: Channel,
    W: AsyncWrite + Unpin + Send,
{
    ReceiverSession::new(channel, config, sink)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_matches_reference_example() {
        let data = vec![7u8; 65];
        let chunks = chunk_payload(&data, 30);
        let lens: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![30, 30, 5]);
    }

    #[test]
    fn chunking_empty_input() {
        assert!(chunk_payload(&[], 30).is_empty());
    }

    #[test]
    fn chunking_exact_multiple() {
        assert_eq!(chunk_payload(&[1; 60], 30).len(), 2);
    }
}
