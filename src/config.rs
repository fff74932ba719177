//! Protocol constants shared by both ends of a transfer.
//!
//! Sender and receiver must be built from identical [`ProtocolConfig`]
//! values; nothing here is negotiated on the wire.

use std::time::Duration;

use crate::error::ConfigError;
use crate::packet::MAX_WIRE_PAYLOAD;
use crate::seq::SeqSpace;

/// Immutable protocol parameters passed to both engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Maximum number of unacknowledged data packets in flight (W).
    pub window_size: usize,
    /// Size of the sequence space (N); sequence numbers live in `[0, N)`.
    pub seq_space: u32,
    /// Largest payload carried by a single data packet.
    pub max_payload: usize,
    /// Retransmission timeout for the oldest unacknowledged packet.
    pub timeout: Duration,
    /// Consecutive timeouts without progress before the sender gives up.
    /// `None` retries forever.
    pub max_consecutive_timeouts: Option<u32>,
    /// Retransmissions of the end-of-transmission packet before the sender
    /// closes without a reply.
    pub eot_retries: u32,
    /// How long a closed receiver keeps answering duplicate EOTs.
    pub linger: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 7,
            seq_space: 8,
            max_payload: 30,
            timeout: Duration::from_millis(2000),
            max_consecutive_timeouts: Some(32),
            eot_retries: 8,
            linger: Duration::ZERO,
        }
    }
}

impl ProtocolConfig {
    /// Check every constraint the protocol relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seq_space < 2 {
            return Err(ConfigError::SeqSpaceTooSmall(self.seq_space));
        }
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.window_size as u64 > u64::from(self.seq_space) - 1 {
            return Err(ConfigError::WindowTooLarge {
                window: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.max_payload == 0 || self.max_payload > MAX_WIRE_PAYLOAD {
            return Err(ConfigError::BadMaxPayload {
                got: self.max_payload,
                max: MAX_WIRE_PAYLOAD,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Sequence arithmetic for this configuration.  Only valid after
    /// [`validate`](Self::validate) has passed.
    pub(crate) fn seq(&self) -> SeqSpace {
        SeqSpace::new(self.seq_space)
    }

    /// Largest datagram either side will ever put on the wire.
    pub fn max_datagram(&self) -> usize {
        crate::packet::HEADER_LEN + self.max_payload
    }
}
