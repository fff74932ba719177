//! UDP transport for the protocol.
//!
//! [`UdpChannel`] is a thin wrapper around `tokio::net::UdpSocket` that
//! speaks [`Packet`] instead of raw bytes and talks to exactly one peer.
//! All protocol logic lives elsewhere; this module owns only byte I/O.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::packet::Packet;

/// Maximum UDP payload size (theoretical limit; in practice kept much smaller).
const MAX_DATAGRAM: usize = 65_535;

/// A packet-oriented UDP endpoint bound locally and addressed to one peer.
///
/// Datagrams from any other address are dropped on receive.
pub struct UdpChannel {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    peer: SocketAddr,
    inner: UdpSocket,
    /// Receive buffer, reused across calls.
    buf: Mutex<Vec<u8>>,
}

impl UdpChannel {
    /// Bind to `local_addr` and address every send to `peer`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr, peer: SocketAddr) -> Result<Self, ChannelError> {
        let inner = UdpSocket::bind(local_addr).await?;
        Self::from_socket(inner, peer).map_err(Into::into)
    }

    /// Wrap an already-bound socket.
    pub fn from_socket(inner: UdpSocket, peer: SocketAddr) -> std::io::Result<Self> {
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer,
            inner,
            buf: Mutex::new(vec![0u8; MAX_DATAGRAM]),
        })
    }

    /// Size the receive buffer for datagrams of at most `len` bytes.
    ///
    /// One byte of slack is kept so a longer datagram arrives truncated and
    /// fails to decode instead of passing as a shorter valid one.
    pub fn with_max_datagram(self, len: usize) -> Self {
        Self {
            buf: Mutex::new(vec![0u8; len.saturating_add(1).min(MAX_DATAGRAM)]),
            ..self
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl std::fmt::Debug for UdpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpChannel")
            .field("local_addr", &self.local_addr)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl Channel for UdpChannel {
    async fn send(&self, packet: &Packet) -> Result<(), ChannelError> {
        let bytes = packet.encode()?;
        self.inner.send_to(&bytes, self.peer).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Packet, ChannelError> {
        let mut buf = self.buf.lock().await;
        loop {
            let (n, addr) = self.inner.recv_from(&mut buf[..]).await?;
            if addr != self.peer {
                log::debug!("[udp] dropping datagram from stranger {addr}");
                continue;
            }
            return Ok(Packet::decode(&buf[..n])?);
        }
    }
}
