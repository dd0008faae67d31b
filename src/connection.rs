//! Per-address connection to the master
//!
//! After start-up, and after every loss of synchronisation, the master has
//! to learn the complete 8-bit feedback value of an address before it
//! accepts single-nibble updates. Each connection therefore walks through:
//!
//! ```text
//!  NotSynchronized ─▶ FeedbackNeeded ─▶ Nibble1Pending ─▶ Nibble2Pending ─▶ Steady
//!         ▲               (app calls        (1st byte        (2nd byte
//!         │              supply_feedback)    staged)          staged)
//!         └──────────────────── signal invalid (from any state) ─────────────┘
//! ```

use log::{debug, warn};

use crate::bus::BusContext;
use crate::core::{Address, DecoderType, Nibble};
use crate::encoding::FrameEncoder;
use crate::error::{BusError, Result};
use crate::policy::ForwardErrorCorrection;
use crate::pulse::PulseSource;
use crate::queue::FixedQueue;

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No valid signal from the master
    NotSynchronized,
    /// Waiting for the application to supply the full feedback value
    FeedbackNeeded,
    /// Waiting to hand off the first connect byte
    Nibble1Pending,
    /// Waiting to hand off the second connect byte
    Nibble2Pending,
    /// Connected, forwarding any further queued bytes
    Steady,
}

/// Feedback connection for one RS-bus address
#[derive(Debug, Clone)]
pub struct AddressedConnection {
    address: Address,
    encoder: FrameEncoder,
    fec: ForwardErrorCorrection,
    state: ConnectionState,
    feedback_requested: bool,
    queue: FixedQueue,
}

impl AddressedConnection {
    /// Create a connection for a validated address
    pub fn new(address: Address, decoder_type: DecoderType, fec: ForwardErrorCorrection) -> Self {
        AddressedConnection {
            address,
            encoder: FrameEncoder::new(decoder_type),
            fec,
            state: ConnectionState::NotSynchronized,
            feedback_requested: false,
            queue: FixedQueue::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn decoder_type(&self) -> DecoderType {
        self.encoder.decoder_type()
    }

    pub fn forward_error_correction(&self) -> ForwardErrorCorrection {
        self.fec
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Set when the master needs the full feedback value; answer with
    /// [`supply_feedback`](Self::supply_feedback)
    pub fn feedback_requested(&self) -> bool {
        self.feedback_requested
    }

    /// Wire bytes waiting to be handed off
    pub fn queued(&self) -> usize {
        self.queue.size()
    }

    /// Queue a complete 8-bit feedback value (two messages, low nibble
    /// first). Each message is queued `1 + fec` times.
    ///
    /// Rejected as a whole if the queue lacks room for all copies, so the
    /// master never receives half a value.
    pub fn supply_feedback(&mut self, value: u8) -> Result<()> {
        let [low, high] = self.encoder.encode8(value);
        self.enqueue(&[low, high])?;
        self.feedback_requested = false;
        debug!("[{}] feedback {:#04x} queued", self.address, value);
        Ok(())
    }

    /// Queue a single nibble update. Leaves `feedback_requested` alone.
    pub fn supply_nibble(&mut self, nibble: Nibble, value: u8) -> Result<()> {
        if value > 0x0F {
            return Err(BusError::invalid_nibble(format!(
                "Value {} does not fit in 4 bits",
                value
            )));
        }
        let byte = self.encoder.encode_nibble(nibble, value);
        self.enqueue(&[byte])
    }

    fn enqueue(&mut self, bytes: &[u8]) -> Result<()> {
        let copies = self.fec.copies();
        let needed = bytes.len() * copies;
        if needed > self.queue.free() {
            warn!(
                "[{}] queue overflow: need {} slots, {} free",
                self.address,
                needed,
                self.queue.free()
            );
            return Err(BusError::queue_overflow(format!(
                "{}: need {} slots, {} free",
                self.address,
                needed,
                self.queue.free()
            )));
        }
        for &byte in bytes {
            for _ in 0..copies {
                self.queue.push(byte)?;
            }
        }
        Ok(())
    }

    /// Hand the oldest queued byte to the pulse interrupt.
    ///
    /// Succeeds only if something is queued and no byte (from any
    /// connection) is already staged.
    pub fn try_send<P>(&mut self, ctx: &BusContext<P>) -> bool {
        if self.queue.is_empty() || ctx.staged().has_pending() {
            return false;
        }
        match self.queue.pop() {
            Some(byte) => {
                let staged = ctx.staged().stage(self.address, byte);
                debug_assert!(staged, "stage after has_pending check");
                staged
            }
            None => false,
        }
    }

    /// Advance the state machine. Call from the main loop as often as
    /// possible, after the synchroniser.
    pub fn check_connection<P: PulseSource>(&mut self, ctx: &BusContext<P>) {
        if !ctx.signal_valid() {
            if self.state != ConnectionState::NotSynchronized {
                debug!("[{}] signal invalid, connection dropped", self.address);
            }
            self.state = ConnectionState::NotSynchronized;
            self.queue.clear();
            ctx.staged().cancel_for(self.address);
            return;
        }

        let current = self.state;
        let next = match current {
            ConnectionState::NotSynchronized => {
                self.feedback_requested = true;
                ConnectionState::FeedbackNeeded
            }
            ConnectionState::FeedbackNeeded if !self.feedback_requested => {
                ConnectionState::Nibble1Pending
            }
            ConnectionState::FeedbackNeeded => ConnectionState::FeedbackNeeded,
            ConnectionState::Nibble1Pending if self.try_send(ctx) => ConnectionState::Nibble2Pending,
            ConnectionState::Nibble2Pending if self.try_send(ctx) => ConnectionState::Steady,
            ConnectionState::Steady => {
                self.try_send(ctx);
                ConnectionState::Steady
            }
            state => state,
        };

        if next != current {
            debug!("[{}] {:?} -> {:?}", self.address, current, next);
            self.state = next;
        }
    }
}

/// Builder for [`AddressedConnection`] from raw host configuration
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionBuilder {
    address: Option<u8>,
    decoder_type: DecoderType,
    forward_error_correction: u8,
}

impl ConnectionBuilder {
    /// Create a new connection builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address (1-128)
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the decoder type
    pub fn with_decoder_type(mut self, decoder_type: DecoderType) -> Self {
        self.decoder_type = decoder_type;
        self
    }

    /// Set the forward error correction level (0-2)
    pub fn with_forward_error_correction(mut self, level: u8) -> Self {
        self.forward_error_correction = level;
        self
    }

    /// Validate and build the connection
    pub fn build(self) -> Result<AddressedConnection> {
        let address = self
            .address
            .ok_or_else(|| BusError::config_error("no address configured"))?;
        Ok(AddressedConnection::new(
            Address::new(address)?,
            self.decoder_type,
            ForwardErrorCorrection::new(self.forward_error_correction)?,
        ))
    }
}
