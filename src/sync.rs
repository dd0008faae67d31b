//! Cycle synchronisation by silence classification
//!
//! The master sends 130 pulses per polling cycle (sync pulse, 128 address
//! slots, trailing pulse) roughly 200µs apart, then stays silent. The length
//! of that silence carries meaning:
//!
//! ```text
//!   silence   ticks   meaning
//!   ~7 ms     3       end of cycle
//!   ~10.7 ms  5       master saw a parity error in this cycle
//!   >12 ms    7       signal lost
//! ```
//!
//! A tick is one sample of the pulse count taken every 2 ms. Consecutive
//! samples with an unchanged count are counted; ticks 1, 2, 4 and 6 only
//! reflect sampling granularity (a byte on the wire also pauses the pulse
//! train for ~1.9 ms) and are ignored.

use log::{debug, warn};

use crate::bus::BusContext;
use crate::policy::RetransmitPolicy;
use crate::pulse::PulseSource;
use crate::timing;

/// Decoder-wide synchroniser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncConfig {
    /// Reaction to a master-signalled parity error
    pub parity_error_handling: RetransmitPolicy,
    /// Reaction to a cycle without exactly 130 pulses
    pub pulse_count_error_handling: RetransmitPolicy,
    /// Minimum spacing of ticks in [`CycleSynchronizer::check_polling`]
    pub tick_interval_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            parity_error_handling: RetransmitPolicy::IfJustSent,
            pulse_count_error_handling: RetransmitPolicy::Always,
            tick_interval_ms: timing::TICK_INTERVAL_MS,
        }
    }
}

/// Classification produced by one synchroniser tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CycleEvent {
    /// Pulses arrived since the previous tick
    Active,
    /// Silence without a new classification
    Idle,
    /// A cycle of exactly 130 pulses ended
    CycleComplete,
    /// A cycle ended with the wrong number of pulses
    PulseCountError {
        /// Pulses counted in that cycle
        pulses: u16,
    },
    /// The master extended the silence to report a parity error
    ParityError,
    /// Silence too long, synchronisation dropped
    SignalLost,
}

/// Keeps the decoder's notion of the polling cycle in step with the master
#[derive(Debug, Clone)]
pub struct CycleSynchronizer {
    config: SyncConfig,
    last_count: u16,
    idle_ticks: u8,
    last_check_ms: u32,
    flag_parity: bool,
    flag_pulse_count: bool,
}

impl CycleSynchronizer {
    pub fn new(config: SyncConfig) -> Self {
        CycleSynchronizer {
            config,
            last_count: 0,
            idle_ticks: 0,
            last_check_ms: 0,
            flag_parity: false,
            flag_pulse_count: false,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Consecutive ticks without a pulse
    pub fn idle_ticks(&self) -> u8 {
        self.idle_ticks
    }

    /// Call from the main loop as often as possible.
    ///
    /// Runs a tick once at least `tick_interval_ms` have passed since the
    /// previous one, otherwise returns `None`. `now_ms` is any wrapping
    /// millisecond clock.
    pub fn check_polling<P: PulseSource>(
        &mut self,
        ctx: &BusContext<P>,
        now_ms: u32,
    ) -> Option<CycleEvent> {
        if now_ms.wrapping_sub(self.last_check_ms) < self.config.tick_interval_ms {
            return None;
        }
        self.last_check_ms = now_ms;
        Some(self.tick(ctx))
    }

    /// Run one tick unconditionally, e.g. from a 2 ms timer interrupt
    pub fn tick<P: PulseSource>(&mut self, ctx: &BusContext<P>) -> CycleEvent {
        // One read: the interrupt keeps counting underneath us
        let count = ctx.pulse_count();

        if count != self.last_count {
            self.last_count = count;
            self.idle_ticks = 1;
            return CycleEvent::Active;
        }

        self.idle_ticks = self.idle_ticks.saturating_add(1);
        match self.idle_ticks {
            timing::CYCLE_END_TICKS => self.end_of_cycle(ctx, count),
            timing::PARITY_ERROR_TICKS => self.parity_boundary(ctx),
            timing::SIGNAL_LOSS_TICKS => self.signal_loss(ctx),
            _ => CycleEvent::Idle,
        }
    }

    fn end_of_cycle<P: PulseSource>(&mut self, ctx: &BusContext<P>, count: u16) -> CycleEvent {
        let just_transmitted = ctx.take_just_transmitted();
        self.flag_parity = just_transmitted;
        self.flag_pulse_count = just_transmitted;

        let event = if count == timing::PULSES_PER_CYCLE {
            if !ctx.signal_valid() {
                debug!("[rsbus] cycle of {} pulses, signal valid", count);
            }
            ctx.mark_signal_valid();
            if ctx.staged().arm() {
                debug!("[rsbus] staged byte armed for next cycle");
            }
            CycleEvent::CycleComplete
        } else {
            ctx.record_pulse_count_error();
            if ctx.signal_valid() {
                warn!(
                    "[rsbus] pulse count error: {} of {} pulses",
                    count,
                    timing::PULSES_PER_CYCLE
                );
                if ctx.trigger_retransmission(
                    self.config.pulse_count_error_handling,
                    self.flag_pulse_count,
                ) {
                    warn!("[rsbus] resync forced after pulse count error");
                }
            }
            CycleEvent::PulseCountError { pulses: count }
        };

        ctx.reset_pulses();
        self.last_count = 0;
        event
    }

    fn parity_boundary<P: PulseSource>(&mut self, ctx: &BusContext<P>) -> CycleEvent {
        if !ctx.signal_valid() {
            return CycleEvent::Idle;
        }
        ctx.record_parity_error();
        warn!("[rsbus] master signalled parity error");
        if ctx.trigger_retransmission(self.config.parity_error_handling, self.flag_parity) {
            warn!("[rsbus] resync forced after parity error");
        }
        CycleEvent::ParityError
    }

    fn signal_loss<P: PulseSource>(&mut self, ctx: &BusContext<P>) -> CycleEvent {
        let was_valid = ctx.signal_valid();
        if was_valid {
            // The silence at tick 5 was the start of this loss
            ctx.retract_parity_error();
        }
        ctx.invalidate();
        if was_valid {
            warn!("[rsbus] signal lost");
            CycleEvent::SignalLost
        } else {
            CycleEvent::Idle
        }
    }
}

impl Default for CycleSynchronizer {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}
