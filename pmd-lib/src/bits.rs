//! LSB-first bit reader and writer.
//!
//! Fields are taken from the least significant unread bit of the current byte
//! before moving on to the next byte, so a field may straddle any number of
//! byte boundaries. No alignment is assumed between consecutive fields.

use crate::constants::MAX_FIELD_BITS;
use crate::error::PmdError;

/// Reads arbitrary-width unsigned fields from a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, bit_pos: 0 }
    }

    /// Number of bits not yet consumed
    pub fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.bit_pos
    }

    /// Read the next `n` bits (at most 32) as an unsigned value.
    ///
    /// Fails instead of padding when the buffer holds fewer than `n` bits.
    pub fn read_bits(&mut self, n: u8) -> Result<u32, PmdError> {
        if n > MAX_FIELD_BITS {
            return Err(PmdError::InvalidDeltaWidth(n));
        }
        let n = usize::from(n);
        let available = self.remaining_bits();
        if n > available {
            return Err(PmdError::BitStreamExhausted { requested: n, available });
        }

        let mut value = 0u64;
        let mut filled = 0;
        while filled < n {
            let byte = self.buf[self.bit_pos / 8];
            let offset = self.bit_pos % 8;
            let take = (8 - offset).min(n - filled);
            let bits = (u64::from(byte) >> offset) & ((1u64 << take) - 1);
            value |= bits << filled;
            filled += take;
            self.bit_pos += take;
        }
        Ok(value as u32)
    }

    /// Read `n` bits and sign-extend them from their own width.
    pub fn read_signed(&mut self, n: u8) -> Result<i32, PmdError> {
        let raw = self.read_bits(n)?;
        Ok(sign_extend(raw, n))
    }
}

/// Writes arbitrary-width unsigned fields, inverse of [`BitReader`].
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `n` bits (at most 32) of `value`.
    pub fn write_bits(&mut self, value: u32, n: u8) -> Result<(), PmdError> {
        if n > MAX_FIELD_BITS {
            return Err(PmdError::InvalidDeltaWidth(n));
        }
        let mut value = u64::from(mask(value, n));
        let mut left = usize::from(n);
        while left > 0 {
            let offset = self.bit_pos % 8;
            if offset == 0 {
                self.buf.push(0);
            }
            let take = (8 - offset).min(left);
            if let Some(last) = self.buf.last_mut() {
                *last |= ((value & ((1u64 << take) - 1)) as u8) << offset;
            }
            value >>= take;
            left -= take;
            self.bit_pos += take;
        }
        Ok(())
    }

    /// Finish writing; the final byte is zero-padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Sign-extend the low `bits` bits of `value` to a full `i32`.
pub fn sign_extend(value: u32, bits: u8) -> i32 {
    match bits {
        0 => 0,
        32.. => value as i32,
        _ => {
            let shift = 32 - u32::from(bits);
            ((value << shift) as i32) >> shift
        }
    }
}

/// Keep only the low `bits` bits of `value`.
pub fn mask(value: u32, bits: u8) -> u32 {
    match bits {
        0 => 0,
        32.. => value,
        _ => value & ((1u32 << bits) - 1),
    }
}

/// Narrowest two's-complement width that can represent `value`.
pub fn signed_width(value: i32) -> u8 {
    let magnitude = if value < 0 { !value } else { value };
    (33 - magnitude.leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lsb_first_across_bytes() {
        // 0b1010_1100, 0b0000_0011
        let data = [0xAC, 0x03];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(2).unwrap(), 0b00);
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
        // remaining 3 bits of byte 0 (0b101) then 2 bits of byte 1 (0b11)
        assert_eq!(reader.read_bits(5).unwrap(), 0b11_101);
        assert_eq!(reader.remaining_bits(), 6);
    }

    #[test]
    fn test_read_past_end_fails() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(6).unwrap(), 0x3F);
        assert_eq!(
            reader.read_bits(3),
            Err(PmdError::BitStreamExhausted { requested: 3, available: 2 })
        );
    }

    #[test]
    fn test_read_full_width() {
        let data = [0x78, 0x56, 0x34, 0x12];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(32).unwrap(), 0x1234_5678);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
    }

    #[test]
    fn test_read_rejects_wide_field() {
        let data = [0u8; 8];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(33), Err(PmdError::InvalidDeltaWidth(33)));
    }

    #[test]
    fn test_read_signed() {
        // two 4-bit fields: 0xF (-1) and 0x7 (7)
        let data = [0x7F];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_signed(4).unwrap(), -1);
        assert_eq!(reader.read_signed(4).unwrap(), 7);
    }

    #[test]
    fn test_writer_matches_reader() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3).unwrap();
        writer.write_bits(0x1FF, 9).unwrap();
        writer.write_bits(0xDEAD_BEEF, 32).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 6);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(9).unwrap(), 0x1FF);
        assert_eq!(reader.read_bits(32).unwrap(), 0xDEAD_BEEF);
        // padding bits
        assert_eq!(reader.read_bits(4).unwrap(), 0);
    }

    #[test]
    fn test_sign_extend_and_width() {
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x3FFFFF, 22), -1);
        assert_eq!(sign_extend(0x1, 0), 0);
        assert_eq!(signed_width(0), 1);
        assert_eq!(signed_width(-1), 1);
        assert_eq!(signed_width(1), 2);
        assert_eq!(signed_width(-128), 8);
        assert_eq!(signed_width(128), 9);
        assert_eq!(signed_width(i32::MIN), 32);
        assert_eq!(signed_width(i32::MAX), 32);
    }
}
