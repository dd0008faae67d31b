//! Pulse counting and byte hand-off seams
//!
//! The protocol core never touches pins, timers or UART registers. It sees
//! the polling pulses only through [`PulseSource`] and emits bytes only
//! through [`TransmitChannel`]. Both are driven from the pulse interrupt.

use core::sync::atomic::{AtomicU16, Ordering};

/// Counts polling pulses since the last reset.
///
/// Implementations are shared between the pulse interrupt and the control
/// loop, so every method takes `&self` and must be interrupt-safe.
pub trait PulseSource {
    /// Pulses seen since the last [`reset`](PulseSource::reset)
    fn count(&self) -> u16;

    /// Restart counting from zero
    fn reset(&self);

    /// Register one pulse. Called by the pulse handler after the hand-off
    /// check. Peripherals that count in hardware leave this empty.
    fn on_pulse(&self) {}
}

/// Receives the wire byte once the master polls our address
pub trait TransmitChannel {
    /// Start transmitting `byte`. Must not block.
    fn write_byte(&mut self, byte: u8);
}

/// Software counter, incremented from an edge interrupt on the RS-bus input
#[derive(Debug, Default)]
pub struct EdgeCounter {
    pulses: AtomicU16,
}

impl EdgeCounter {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicU16::new(0),
        }
    }
}

impl PulseSource for EdgeCounter {
    #[inline]
    fn count(&self) -> u16 {
        self.pulses.load(Ordering::Acquire)
    }

    #[inline]
    fn reset(&self) {
        self.pulses.store(0, Ordering::Release);
    }

    #[inline]
    fn on_pulse(&self) {
        // Noise on a disconnected line must not wrap back into a valid slot
        let _ = self
            .pulses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1));
    }
}

/// Adapter for a hardware counter peripheral (timer in event-count mode,
/// RTC pulse counter and the like).
///
/// The peripheral counts the pulses itself; the host supplies a function
/// reading its count register and one clearing it. With this source the
/// pulse handler is only needed from the peripheral's compare-match
/// interrupt, armed on the decoder's address.
#[derive(Debug, Clone, Copy)]
pub struct RegisterCounter {
    read: fn() -> u16,
    clear: fn(),
}

impl RegisterCounter {
    pub const fn new(read: fn() -> u16, clear: fn()) -> Self {
        Self { read, clear }
    }
}

impl PulseSource for RegisterCounter {
    #[inline]
    fn count(&self) -> u16 {
        (self.read)()
    }

    #[inline]
    fn reset(&self) {
        (self.clear)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static REGISTER: AtomicU16 = AtomicU16::new(0);

    fn read_register() -> u16 {
        REGISTER.load(Ordering::SeqCst)
    }

    fn clear_register() {
        REGISTER.store(0, Ordering::SeqCst);
    }

    #[test]
    fn test_edge_counter() {
        let counter = EdgeCounter::new();
        assert_eq!(counter.count(), 0);

        for _ in 0..130 {
            counter.on_pulse();
        }
        assert_eq!(counter.count(), 130);

        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_edge_counter_saturates() {
        let counter = EdgeCounter::new();
        counter.pulses.store(u16::MAX, Ordering::SeqCst);
        counter.on_pulse();
        assert_eq!(counter.count(), u16::MAX);
    }

    #[test]
    fn test_register_counter() {
        let counter = RegisterCounter::new(read_register, clear_register);
        REGISTER.store(77, Ordering::SeqCst);
        assert_eq!(counter.count(), 77);

        // Hardware counts on its own
        counter.on_pulse();
        assert_eq!(counter.count(), 77);

        counter.reset();
        assert_eq!(counter.count(), 0);
    }
}
