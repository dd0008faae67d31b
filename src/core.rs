//! Core vocabulary shared by every layer of the decoder

use crate::error::{BusError, Result};

/// RS-bus feedback address (1-128)
///
/// The master polls the addresses in order, one per pulse, after a leading
/// sync pulse. Address `n` therefore gets its turn while the pulse count
/// equals `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Address(u8);

impl Address {
    /// Lowest feedback address
    pub const MIN: u8 = 1;
    /// Highest feedback address
    pub const MAX: u8 = 128;

    /// Create a new address, validating it's within range [1, 128]
    pub fn new(addr: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&addr) {
            return Err(BusError::invalid_address(format!(
                "Address {} out of range [{}, {}]",
                addr,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Address(addr))
    }

    /// Get the raw address value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Pulse count at which the master grants this address its turn
    pub fn pulse_slot(&self) -> u16 {
        u16::from(self.0)
    }
}

impl TryFrom<u8> for Address {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self> {
        Address::new(value)
    }
}

impl From<Address> for u8 {
    fn from(addr: Address) -> u8 {
        addr.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RS-{}", self.0)
    }
}

/// Decoder category carried in the TT bits of every message.
///
/// Masters are not known to act on it; it does not influence timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecoderType {
    /// Accessory decoder with feedback
    #[default]
    Switch,
    /// Pure feedback module
    Feedback,
}

impl DecoderType {
    /// Value of the 2-bit type field, bit 1 of the result being wire bit 2
    pub fn type_bits(&self) -> u8 {
        match self {
            DecoderType::Switch => 0b10,
            DecoderType::Feedback => 0b01,
        }
    }

    /// Recover the decoder type from a 2-bit type field
    pub fn from_type_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b10 => Some(DecoderType::Switch),
            0b01 => Some(DecoderType::Feedback),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecoderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderType::Switch => write!(f, "Switch"),
            DecoderType::Feedback => write!(f, "Feedback"),
        }
    }
}

/// Which half of an 8-bit feedback value a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Nibble {
    /// Feedback bits 0-3
    Low,
    /// Feedback bits 4-7
    High,
}

impl Nibble {
    /// Convert nibble selector to bit representation
    pub fn as_bit(&self) -> bool {
        match self {
            Nibble::Low => false,
            Nibble::High => true,
        }
    }
}
