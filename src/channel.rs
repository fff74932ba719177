//! The datagram channel both sessions run over.
//!
//! A [`Channel`] is one endpoint addressed to a fixed peer.  It moves whole
//! [`Packet`]s, may lose, duplicate or reorder them, and reports decode
//! failures as [`ChannelError::Malformed`] so the caller can drop them.
//! Implementations: [`crate::socket::UdpChannel`] and
//! [`crate::simulator::SimEndpoint`].

use std::future::Future;
use std::time::Duration;

use crate::error::ChannelError;
use crate::packet::Packet;

pub trait Channel: Send + Sync {
    /// Send one packet to the peer.  Delivery is not guaranteed.
    fn send(&self, packet: &Packet) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Wait for the next packet from the peer, without a deadline.
    fn recv(&self) -> impl Future<Output = Result<Packet, ChannelError>> + Send;

    /// Wait for the next packet from the peer for at most `timeout`.
    ///
    /// Returns [`ChannelError::Timeout`] when the deadline passes first.
    fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Packet, ChannelError>> + Send {
        async move {
            match tokio::time::timeout(timeout, self.recv()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ChannelError::Timeout),
            }
        }
    }
}
