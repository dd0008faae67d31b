//! State shared between the pulse interrupt and the control loop
//!
//! ```text
//!   pulse interrupt                 BusContext                 control loop
//!   ───────────────                 ──────────                 ────────────
//!   handle_pulse() ──▶ count, staged byte, just-sent ◀── CycleSynchronizer::tick()
//!                                                   ◀── AddressedConnection::check_connection()
//! ```
//!
//! Every field is an atomic so both sides work on `&BusContext` without
//! locks. Multi-field updates are ordered so the interrupt can never observe
//! a half-written staged byte: payload first, flag last (`Release`), and the
//! interrupt reads the flag first (`Acquire`).

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::core::Address;
use crate::policy::RetransmitPolicy;
use crate::pulse::{PulseSource, TransmitChannel};

/// Single byte handed from a connection to the pulse interrupt.
///
/// Lifecycle: `stage()` by a connection, `arm()` by the synchronizer once
/// a cycle is confirmed valid, sent and cleared by the interrupt when the
/// pulse count reaches the byte's address. `cancel()` voids it at any point.
#[derive(Debug, Default)]
pub struct StagedTransmission {
    byte: AtomicU8,
    address: AtomicU8,
    has_pending: AtomicBool,
    ready: AtomicBool,
}

impl StagedTransmission {
    pub const fn new() -> Self {
        Self {
            byte: AtomicU8::new(0),
            address: AtomicU8::new(0),
            has_pending: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Stage `byte` for `address`. Fails if a byte is already staged.
    ///
    /// Only the control loop sets `has_pending`, so the check-then-store
    /// cannot race with the interrupt.
    pub fn stage(&self, address: Address, byte: u8) -> bool {
        if self.has_pending.load(Ordering::Acquire) {
            return false;
        }
        self.byte.store(byte, Ordering::Relaxed);
        self.address.store(address.value(), Ordering::Relaxed);
        self.has_pending.store(true, Ordering::Release);
        true
    }

    /// Allow the interrupt to send the staged byte, if any
    pub fn arm(&self) -> bool {
        if self.has_pending.load(Ordering::Acquire) {
            self.ready.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Interrupt side: take the byte if it is armed and due at `count`
    #[inline]
    pub fn take_due(&self, count: u16) -> Option<u8> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        if u16::from(self.address.load(Ordering::Relaxed)) != count {
            return None;
        }
        let byte = self.byte.load(Ordering::Relaxed);
        self.ready.store(false, Ordering::Release);
        self.has_pending.store(false, Ordering::Release);
        Some(byte)
    }

    /// Void whatever is staged
    pub fn cancel(&self) {
        self.ready.store(false, Ordering::Release);
        self.has_pending.store(false, Ordering::Release);
    }

    /// Void the staged byte only if it belongs to `address`
    pub fn cancel_for(&self, address: Address) -> bool {
        if self.has_pending.load(Ordering::Acquire)
            && self.address.load(Ordering::Relaxed) == address.value()
        {
            self.cancel();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.has_pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Staged `(address, byte)`, if any
    pub fn peek(&self) -> Option<(u8, u8)> {
        if self.has_pending() {
            Some((
                self.address.load(Ordering::Relaxed),
                self.byte.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }
}

/// Decoder-wide bus state, one per physical RS-bus interface.
///
/// Typically placed in a `static` so the pulse interrupt can reach it:
///
/// ```
/// use rsbus_decoder::{BusContext, EdgeCounter};
///
/// static RSBUS: BusContext<EdgeCounter> = BusContext::new(EdgeCounter::new());
/// RSBUS.attach();
/// assert!(!RSBUS.signal_valid());
/// ```
#[derive(Debug)]
pub struct BusContext<P> {
    pulses: P,
    staged: StagedTransmission,
    attached: AtomicBool,
    signal_valid: AtomicBool,
    just_transmitted: AtomicBool,
    parity_errors: AtomicU32,
    pulse_count_errors: AtomicU32,
}

impl<P> BusContext<P> {
    /// Create a detached context around a pulse source
    pub const fn new(pulses: P) -> Self {
        Self {
            pulses,
            staged: StagedTransmission::new(),
            attached: AtomicBool::new(false),
            signal_valid: AtomicBool::new(false),
            just_transmitted: AtomicBool::new(false),
            parity_errors: AtomicU32::new(0),
            pulse_count_errors: AtomicU32::new(0),
        }
    }

    /// The pulse source this context counts with
    pub fn pulses(&self) -> &P {
        &self.pulses
    }

    /// The shared staged byte
    pub fn staged(&self) -> &StagedTransmission {
        &self.staged
    }

    /// True once a complete, correctly counted cycle has been seen
    #[inline]
    pub fn signal_valid(&self) -> bool {
        self.signal_valid.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Cycles the master flagged as parity errors
    pub fn parity_errors(&self) -> u32 {
        self.parity_errors.load(Ordering::Relaxed)
    }

    /// Cycles that did not contain exactly 130 pulses
    pub fn pulse_count_errors(&self) -> u32 {
        self.pulse_count_errors.load(Ordering::Relaxed)
    }

    /// Diagnostic snapshot
    pub fn status(&self) -> BusStatus {
        BusStatus {
            attached: self.is_attached(),
            signal_valid: self.signal_valid(),
            parity_errors: self.parity_errors(),
            pulse_count_errors: self.pulse_count_errors(),
        }
    }

    /// Drop synchronisation and everything in flight.
    ///
    /// Connections notice on their next check, clear their queues and ask
    /// the application for fresh feedback.
    pub fn invalidate(&self) {
        self.signal_valid.store(false, Ordering::Release);
        self.staged.cancel();
    }

    /// Apply `policy` to an error in a cycle where this decoder did or did
    /// not transmit. Returns true if the signal was invalidated.
    pub fn trigger_retransmission(&self, policy: RetransmitPolicy, just_transmitted: bool) -> bool {
        if policy.requires_resync(just_transmitted) {
            self.invalidate();
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_signal_valid(&self) {
        self.signal_valid.store(true, Ordering::Release);
    }

    /// Read and clear the "sent something this cycle" flag
    pub(crate) fn take_just_transmitted(&self) -> bool {
        self.just_transmitted.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn record_parity_error(&self) {
        self.parity_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo the last parity error count when it turns out to be signal loss
    pub(crate) fn retract_parity_error(&self) {
        let _ = self
            .parity_errors
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn record_pulse_count_error(&self) {
        self.pulse_count_errors.fetch_add(1, Ordering::Relaxed);
    }
}

impl<P: PulseSource> BusContext<P> {
    /// Start listening: clear the pulse count and accept pulses
    pub fn attach(&self) {
        self.pulses.reset();
        self.just_transmitted.store(false, Ordering::Relaxed);
        self.attached.store(true, Ordering::Release);
    }

    /// Stop listening, e.g. before a soft reset of the decoder
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        self.invalidate();
    }

    /// Live pulse count
    #[inline]
    pub fn pulse_count(&self) -> u16 {
        self.pulses.count()
    }

    pub(crate) fn reset_pulses(&self) {
        self.pulses.reset();
    }

    /// Pulse interrupt entry point.
    ///
    /// Sends the staged byte if the master is polling its address, then lets
    /// the source register the pulse. Runs in microseconds, never blocks,
    /// never allocates, never logs.
    #[inline]
    pub fn handle_pulse<T: TransmitChannel>(&self, tx: &mut T) {
        if !self.attached.load(Ordering::Acquire) {
            return;
        }
        if let Some(byte) = self.staged.take_due(self.pulses.count()) {
            tx.write_byte(byte);
            self.just_transmitted.store(true, Ordering::Release);
        }
        self.pulses.on_pulse();
    }
}

/// Snapshot of the decoder-wide status at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusStatus {
    pub attached: bool,
    pub signal_valid: bool,
    pub parity_errors: u32,
    pub pulse_count_errors: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::EdgeCounter;

    #[derive(Default)]
    struct Recorder(Vec<u8>);

    impl TransmitChannel for Recorder {
        fn write_byte(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    fn addr(n: u8) -> Address {
        Address::new(n).unwrap()
    }

    #[test]
    fn test_stage_only_one_byte() {
        let staged = StagedTransmission::new();
        assert!(staged.stage(addr(5), 0x63));
        assert!(!staged.stage(addr(6), 0x9A));
        assert_eq!(staged.peek(), Some((5, 0x63)));
    }

    #[test]
    fn test_unarmed_byte_is_not_sent() {
        let staged = StagedTransmission::new();
        staged.stage(addr(5), 0x63);
        assert_eq!(staged.take_due(5), None);

        assert!(staged.arm());
        assert_eq!(staged.take_due(4), None);
        assert_eq!(staged.take_due(5), Some(0x63));
        assert!(!staged.has_pending());
        assert!(!staged.is_ready());
        assert_eq!(staged.take_due(5), None);
    }

    #[test]
    fn test_arm_without_byte() {
        let staged = StagedTransmission::new();
        assert!(!staged.arm());
        assert!(!staged.is_ready());
    }

    #[test]
    fn test_cancel_for_other_address() {
        let staged = StagedTransmission::new();
        staged.stage(addr(5), 0x63);
        assert!(!staged.cancel_for(addr(6)));
        assert!(staged.has_pending());
        assert!(staged.cancel_for(addr(5)));
        assert!(!staged.has_pending());
    }

    #[test]
    fn test_handle_pulse_sends_on_matching_count() {
        let ctx = BusContext::new(EdgeCounter::new());
        let mut tx = Recorder::default();
        ctx.attach();
        ctx.staged().stage(addr(3), 0x42);
        ctx.staged().arm();

        for _ in 0..130 {
            ctx.handle_pulse(&mut tx);
        }

        assert_eq!(tx.0, vec![0x42]);
        assert_eq!(ctx.pulse_count(), 130);
        assert!(ctx.take_just_transmitted());
        assert!(!ctx.take_just_transmitted());
    }

    #[test]
    fn test_detached_ignores_pulses() {
        let ctx = BusContext::new(EdgeCounter::new());
        let mut tx = Recorder::default();
        ctx.handle_pulse(&mut tx);
        assert_eq!(ctx.pulse_count(), 0);

        ctx.attach();
        ctx.handle_pulse(&mut tx);
        assert_eq!(ctx.pulse_count(), 1);

        ctx.mark_signal_valid();
        ctx.detach();
        ctx.handle_pulse(&mut tx);
        assert_eq!(ctx.pulse_count(), 1);
        assert!(!ctx.signal_valid());
    }

    #[test]
    fn test_trigger_retransmission_cancels_staged() {
        let ctx = BusContext::new(EdgeCounter::new());
        ctx.mark_signal_valid();
        ctx.staged().stage(addr(9), 0x11);
        ctx.staged().arm();

        assert!(!ctx.trigger_retransmission(RetransmitPolicy::IfJustSent, false));
        assert!(ctx.signal_valid());
        assert!(ctx.staged().is_ready());

        assert!(ctx.trigger_retransmission(RetransmitPolicy::IfJustSent, true));
        assert!(!ctx.signal_valid());
        assert!(!ctx.staged().has_pending());
    }

    #[test]
    fn test_parity_retraction_never_underflows() {
        let ctx = BusContext::new(EdgeCounter::new());
        ctx.retract_parity_error();
        assert_eq!(ctx.parity_errors(), 0);

        ctx.record_parity_error();
        ctx.record_parity_error();
        ctx.retract_parity_error();
        assert_eq!(ctx.status().parity_errors, 1);
    }
}
