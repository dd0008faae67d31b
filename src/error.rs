//! Error types for the RS-bus decoder

use thiserror::Error;

/// Result type for RS-bus decoder operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors raised while configuring a decoder or feeding it application data.
///
/// Bus-level faults (pulse count mismatch, master-signalled parity error,
/// signal loss) are not errors in this sense; they are reported as
/// [`CycleEvent`](crate::sync::CycleEvent)s and recovered by resynchronising.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Address outside the polled range
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Nibble payload does not fit in 4 bits
    #[error("Invalid nibble: {0}")]
    InvalidNibble(String),

    /// Unknown retransmission policy code
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Unsupported forward error correction level
    #[error("Invalid forward error correction level: {0}")]
    InvalidFecLevel(String),

    /// Transmit queue cannot accept the message
    #[error("Queue overflow: {0}")]
    QueueOverflow(String),

    /// Incomplete or inconsistent configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BusError {
    /// Create a new InvalidAddress error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        BusError::InvalidAddress(msg.into())
    }

    /// Create a new InvalidNibble error
    pub fn invalid_nibble(msg: impl Into<String>) -> Self {
        BusError::InvalidNibble(msg.into())
    }

    /// Create a new InvalidPolicy error
    pub fn invalid_policy(msg: impl Into<String>) -> Self {
        BusError::InvalidPolicy(msg.into())
    }

    /// Create a new InvalidFecLevel error
    pub fn invalid_fec_level(msg: impl Into<String>) -> Self {
        BusError::InvalidFecLevel(msg.into())
    }

    /// Create a new QueueOverflow error
    pub fn queue_overflow(msg: impl Into<String>) -> Self {
        BusError::QueueOverflow(msg.into())
    }

    /// Create a new ConfigError
    pub fn config_error(msg: impl Into<String>) -> Self {
        BusError::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BusError::invalid_address("0");
        assert!(err.to_string().contains("Invalid address"));

        let err = BusError::queue_overflow("need 6 slots, 2 free");
        assert_eq!(err.to_string(), "Queue overflow: need 6 slots, 2 free");
    }
}
