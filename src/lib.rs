//! `gbn-transfer` — reliable one-way transfer over a lossy datagram channel
//! using Go-Back-N.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐    DATA / EOT     ┌────────────────┐
//!  │ SenderSession│──────────────────▶│ReceiverSession │──▶ sink
//!  └──────┬───────┘                   └───────┬────────┘
//!         │◀──────── ACK / EOT reply ─────────┘
//!         │                                   │
//!  ┌──────▼───────┐                   ┌───────▼────────┐
//!  │  GbnSender   │                   │  GbnReceiver   │
//!  │ (window+EOT) │                   │ (in-order only)│
//!  └──────┬───────┘                   └───────┬────────┘
//!         │ Packet                            │ Packet
//!  ┌──────▼───────────────────────────────────▼────────┐
//!  │  Channel: UdpChannel (UDP) | SimEndpoint (memory)  │
//!  └────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]        — wire format (serialise / deserialise, checksum)
//! - [`seq`]           — modular sequence-number arithmetic
//! - [`gbn_sender`]    — outbound window state machine
//! - [`gbn_receiver`]  — inbound cumulative-ACK state machine
//! - [`state`]         — finite-state-machine types
//! - [`timer`]         — the single retransmission timer
//! - [`channel`]       — datagram channel trait
//! - [`socket`]        — UDP channel
//! - [`simulator`]     — lossy/reordering in-memory channel for testing
//! - [`session`]       — async control loops tying the above together
//! - [`config`], [`error`]
//!
//! # Example
//!
//! ```no_run
//! use gbn_transfer::{send_stream, ProtocolConfig, UdpChannel};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = UdpChannel::bind("127.0.0.1:0".parse()?, "127.0.0.1:9000".parse()?).await?;
//! let report = send_stream(&channel, &ProtocolConfig::default(), b"hello").await?;
//! println!("{} packet(s) sent", report.packets);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod seq;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use channel::Channel;
pub use config::ProtocolConfig;
pub use error::{ChannelError, ConfigError, PacketError, SequenceAnomaly, SessionError};
pub use packet::{Packet, PacketKind};
pub use session::{
    chunk_payload, receive_stream, send_stream, ReceiverReport, ReceiverSession, SenderReport,
    SenderSession,
};
pub use simulator::{FaultConfig, LinkStats, SimEndpoint, SimulatedLink};
pub use socket::UdpChannel;
