//! # RS-bus feedback decoder
//!
//! Decoder side of the RS-bus, the master-polled feedback bus used in
//! model-railway control. Up to 128 feedback addresses share one wire pair;
//! the master sends a periodic pulse train granting each address a turn, and
//! a decoder answers in its turn with a single byte carrying one nibble of
//! feedback data.
//!
//! This library provides:
//!
//! - Cycle synchronisation from pulse counts and silence lengths
//! - Per-address connection state machines
//! - Nibble framing with software parity
//! - Retransmission and forward error correction policies
//!
//! Pins, timers and the UART stay with the host: pulses come in through a
//! [`PulseSource`], bytes go out through a [`TransmitChannel`].
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization of configuration and status
//!
//! ## Example
//!
//! ```
//! use rsbus_decoder::{BusContext, ConnectionBuilder, CycleSynchronizer, EdgeCounter};
//!
//! static RSBUS: BusContext<EdgeCounter> = BusContext::new(EdgeCounter::new());
//!
//! RSBUS.attach();
//! let mut sync = CycleSynchronizer::default();
//! let mut feedback = ConnectionBuilder::new().with_address(17).build()?;
//!
//! // main loop body; the pulse interrupt calls RSBUS.handle_pulse(&mut uart)
//! sync.check_polling(&RSBUS, 2);
//! feedback.check_connection(&RSBUS);
//! if feedback.feedback_requested() {
//!     feedback.supply_feedback(0b0000_0101)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bus;
pub mod connection;
pub mod core;
pub mod encoding;
pub mod error;
pub mod policy;
pub mod pulse;
pub mod queue;
pub mod sync;

pub use bus::{BusContext, BusStatus, StagedTransmission};
pub use connection::{AddressedConnection, ConnectionBuilder, ConnectionState};
pub use crate::core::{Address, DecoderType, Nibble};
pub use encoding::{FrameEncoder, WireByte};
pub use error::{BusError, Result};
pub use policy::{ForwardErrorCorrection, RetransmitPolicy};
pub use pulse::{EdgeCounter, PulseSource, RegisterCounter, TransmitChannel};
pub use queue::FixedQueue;
pub use sync::{CycleEvent, CycleSynchronizer, SyncConfig};

/// RS-bus timing constants
pub mod timing {
    /// Pulses in one polling cycle: sync pulse, 128 address slots, trailing pulse
    pub const PULSES_PER_CYCLE: u16 = 130;

    /// Number of feedback addresses polled per cycle
    pub const ADDRESSES_PER_CYCLE: u8 = 128;

    /// Sampling period of the synchroniser in milliseconds
    pub const TICK_INTERVAL_MS: u32 = 2;

    /// Unchanged samples marking the end of a cycle (~7 ms silence)
    pub const CYCLE_END_TICKS: u8 = 3;

    /// Unchanged samples marking a master-signalled parity error (~10.7 ms)
    pub const PARITY_ERROR_TICKS: u8 = 5;

    /// Unchanged samples after which the signal counts as lost (>12 ms)
    pub const SIGNAL_LOSS_TICKS: u8 = 7;

    /// UART speed for feedback bytes (8N1)
    pub const BAUD_RATE: u32 = 4800;

    /// Nominal spacing of polling pulses in microseconds
    pub const PULSE_SPACING_US: u32 = 200;
}
