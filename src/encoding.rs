//! Nibble framing for RS-bus feedback messages
//!
//! A feedback message is one UART byte (4800 baud, 8N1), sent LSB first.
//! Wire bit 0 follows the start bit and carries even parity, so the UART's
//! own parity generator cannot be used; it is computed here.
//!
//! ```text
//!  bit:   7    6    5    4    3    2    1    0
//!       +----+----+----+----+----+----+----+----+
//!       | d0 | d1 | d2 | d3 | N  | T1 | T0 | P  |
//!       +----+----+----+----+----+----+----+----+
//! ```
//!
//! `d0..d3` are the payload bits in reversed order, `N` selects the low or
//! high nibble, `T1 T0` is the decoder type and `P` makes the total number
//! of set bits even.

use bitfield::bitfield;

use crate::core::{DecoderType, Nibble};

bitfield! {
    /// Field view of a single wire byte
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct WireByte(u8);
    impl Debug;
    u8;
    /// Even-parity bit, first bit after the start bit
    pub parity, set_parity: 0;
    /// Decoder type field (wire bits 2 and 1)
    pub type_bits, set_type_bits: 2, 1;
    /// Set for the high nibble
    pub nibble_high, set_nibble_high: 3;
    /// Payload with its bit order reversed
    pub data_field, set_data_field: 7, 4;
}

impl WireByte {
    /// Wrap a raw byte as seen on the wire
    pub fn from_raw(byte: u8) -> Self {
        WireByte(byte)
    }

    /// Get the raw byte
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Payload nibble in application bit order
    pub fn payload(&self) -> u8 {
        reverse_nibble(self.data_field())
    }

    /// Which half of the feedback value this byte carries
    pub fn nibble(&self) -> Nibble {
        if self.nibble_high() {
            Nibble::High
        } else {
            Nibble::Low
        }
    }

    /// Decoder type, if the type field holds a known code
    pub fn decoder_type(&self) -> Option<DecoderType> {
        DecoderType::from_type_bits(self.type_bits())
    }

    /// Check that bits 0-7 contain an even number of ones
    pub fn has_even_parity(&self) -> bool {
        self.0.count_ones() % 2 == 0
    }
}

/// Mirror the low 4 bits of `value` (bit 0 <-> bit 3, bit 1 <-> bit 2)
pub fn reverse_nibble(value: u8) -> u8 {
    ((value & 0b0001) << 3) | ((value & 0b0010) << 1) | ((value & 0b0100) >> 1) | ((value & 0b1000) >> 3)
}

/// Formats feedback nibbles into wire bytes for one decoder type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameEncoder {
    decoder_type: DecoderType,
}

impl FrameEncoder {
    /// Create an encoder stamping `decoder_type` into every byte
    pub fn new(decoder_type: DecoderType) -> Self {
        FrameEncoder { decoder_type }
    }

    /// Get the decoder type
    pub fn decoder_type(&self) -> DecoderType {
        self.decoder_type
    }

    /// Encode one 4-bit payload. Bits above bit 3 of `value` are ignored.
    pub fn encode_nibble(&self, nibble: Nibble, value: u8) -> u8 {
        let mut frame = WireByte(0);
        frame.set_data_field(reverse_nibble(value & 0x0F));
        frame.set_nibble_high(nibble.as_bit());
        frame.set_type_bits(self.decoder_type.type_bits());
        // Odd count so far means the parity bit must be set
        let odd = frame.raw().count_ones() % 2 == 1;
        frame.set_parity(odd);
        frame.raw()
    }

    /// Encode a full feedback value as two messages, low nibble first
    pub fn encode8(&self, value: u8) -> [u8; 2] {
        [
            self.encode_nibble(Nibble::Low, value & 0x0F),
            self.encode_nibble(Nibble::High, value >> 4),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_nibble() {
        assert_eq!(reverse_nibble(0b0001), 0b1000);
        assert_eq!(reverse_nibble(0b0110), 0b0110);
        assert_eq!(reverse_nibble(0b1011), 0b1101);
        assert_eq!(reverse_nibble(0b1111), 0b1111);
    }

    #[test]
    fn test_known_vector_feedback() {
        let encoder = FrameEncoder::new(DecoderType::Feedback);
        let [low, high] = encoder.encode8(0x96);
        assert_eq!(low, 0x63);
        assert_eq!(high, 0x9A);
    }

    #[test]
    fn test_switch_type_field() {
        let encoder = FrameEncoder::new(DecoderType::Switch);
        // Payload 0, low nibble: only T1 set, so parity must be set too
        assert_eq!(encoder.encode_nibble(Nibble::Low, 0), 0b0000_0101);
        assert_eq!(encoder.encode_nibble(Nibble::High, 0), 0b0000_1100);
    }

    #[test]
    fn test_all_values_even_parity_and_recoverable() {
        for decoder_type in [DecoderType::Switch, DecoderType::Feedback] {
            let encoder = FrameEncoder::new(decoder_type);
            for value in 0..=255u8 {
                let [low, high] = encoder.encode8(value);
                let low = WireByte::from_raw(low);
                let high = WireByte::from_raw(high);

                assert!(low.has_even_parity(), "low nibble of {:#04x}", value);
                assert!(high.has_even_parity(), "high nibble of {:#04x}", value);
                assert_eq!(low.nibble(), Nibble::Low);
                assert_eq!(high.nibble(), Nibble::High);
                assert_eq!(low.decoder_type(), Some(decoder_type));
                assert_eq!((high.payload() << 4) | low.payload(), value);
            }
        }
    }

    #[test]
    fn test_encode_nibble_masks_upper_bits() {
        let encoder = FrameEncoder::default();
        assert_eq!(
            encoder.encode_nibble(Nibble::Low, 0xF5),
            encoder.encode_nibble(Nibble::Low, 0x05)
        );
    }
}
