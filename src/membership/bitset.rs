//! Fixed-size bitset over `[0, max]`.
//!
//! Bit ordering is big-endian within each byte: value 0 = MSB (0x80),
//! value 7 = LSB (0x01).

use super::{DomainError, MembershipIndex};

pub struct BitsetIndex {
    bits: Vec<u8>,
    max: u64,
}

impl BitsetIndex {
    /// Zeroed set over `[0, max]`. `max` must fit in an `i64`; larger
    /// values are unreachable through the `i64` API.
    pub fn new(max: u64) -> Self {
        debug_assert!(
            max <= i64::MAX as u64,
            "Precondition: max {} must fit in i64",
            max
        );
        // ceil((max + 1) / 8) without overflowing at u64::MAX
        let byte_len = (max / 8 + 1) as usize;
        BitsetIndex {
            bits: vec![0u8; byte_len],
            max,
        }
    }

    /// Bytes backing the set (for memory accounting)
    pub fn byte_len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    fn locate(offset: u64) -> (usize, u8) {
        ((offset / 8) as usize, 0x80 >> (offset % 8))
    }
}

impl MembershipIndex for BitsetIndex {
    fn contains(&self, value: i64) -> Result<bool, DomainError> {
        let offset = self.check_domain(value)?;
        let (byte_index, bit_mask) = Self::locate(offset);
        Ok(self.bits[byte_index] & bit_mask != 0)
    }

    fn mark_seen(&mut self, value: i64) -> Result<(), DomainError> {
        let offset = self.check_domain(value)?;
        let (byte_index, bit_mask) = Self::locate(offset);
        self.bits[byte_index] |= bit_mask;

        debug_assert!(
            self.bits[byte_index] & bit_mask != 0,
            "Postcondition: bit for {} must be set",
            value
        );
        Ok(())
    }

    fn max_value(&self) -> u64 {
        self.max
    }
}
