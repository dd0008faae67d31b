//! Retransmission and forward error correction policies

use crate::error::{BusError, Result};

/// What to do after the master reports a transmission problem.
///
/// Forcing a resync makes every connection drop its queue and ask the
/// application for the complete feedback value again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RetransmitPolicy {
    /// Only count the error
    Never = 0,
    /// Resync if this decoder transmitted during the affected cycle
    IfJustSent = 1,
    /// Always resync
    Always = 2,
}

impl RetransmitPolicy {
    /// Decide whether an error should invalidate the signal
    pub fn requires_resync(&self, just_transmitted: bool) -> bool {
        match self {
            RetransmitPolicy::Never => false,
            RetransmitPolicy::IfJustSent => just_transmitted,
            RetransmitPolicy::Always => true,
        }
    }
}

impl TryFrom<u8> for RetransmitPolicy {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RetransmitPolicy::Never),
            1 => Ok(RetransmitPolicy::IfJustSent),
            2 => Ok(RetransmitPolicy::Always),
            _ => Err(BusError::invalid_policy(format!(
                "Unknown retransmission policy: {}",
                value
            ))),
        }
    }
}

/// Number of extra copies sent of every message (0-2), regardless of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct ForwardErrorCorrection(u8);

impl ForwardErrorCorrection {
    /// Highest supported level
    pub const MAX: u8 = 2;

    /// Send every message once
    pub const OFF: ForwardErrorCorrection = ForwardErrorCorrection(0);

    pub fn new(level: u8) -> Result<Self> {
        if level > Self::MAX {
            return Err(BusError::invalid_fec_level(format!(
                "Level {} out of range [0, {}]",
                level,
                Self::MAX
            )));
        }
        Ok(ForwardErrorCorrection(level))
    }

    /// Get the raw level
    pub fn level(&self) -> u8 {
        self.0
    }

    /// How many times each message is queued
    pub fn copies(&self) -> usize {
        1 + self.0 as usize
    }
}

impl TryFrom<u8> for ForwardErrorCorrection {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self> {
        ForwardErrorCorrection::new(value)
    }
}

impl From<ForwardErrorCorrection> for u8 {
    fn from(fec: ForwardErrorCorrection) -> u8 {
        fec.0
    }
}
