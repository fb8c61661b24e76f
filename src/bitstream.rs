/*!

A `Bitstream` is a read cursor over a byte slice that hands out values a few bits at a time. Bits
are consumed least-significant first within each byte, and bytes in order, which is how the replay
format packs property updates.

The cursor only ever moves forward, and only on success: a read that would run past the end of the
data fails with `PropertyError::UnexpectedEndOfStream` and leaves the position where it was.

`BitWriter` produces streams in the same layout. Decoders never need it; it exists so that tools
and tests can build encoded updates.

*/

use crate::error::PropertyError;

/// The maximum number of 7-bit groups in a variable-length `u32`.
const MAX_VAR_U32_GROUPS: u32 = 5;
/// The maximum number of 7-bit groups in a variable-length `u64`.
const MAX_VAR_U64_GROUPS: u32 = 10;

/// A forward-only, position-tracking bit reader.
#[derive(Debug, Clone)]
pub struct Bitstream<'a> {
    data: &'a [u8],
    /// Number of bits consumed so far.
    position: usize,
}

impl<'a> Bitstream<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Total length of the stream in bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() * 8
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bits consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bits left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len() - self.position
    }

    fn ensure(&self, requested: usize) -> Result<(), PropertyError> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(PropertyError::UnexpectedEndOfStream {
                requested,
                remaining,
            });
        }
        Ok(())
    }

    /// Advances the cursor by `bits` without decoding them.
    pub fn skip(&mut self, bits: usize) -> Result<(), PropertyError> {
        self.ensure(bits)?;
        self.position += bits;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, PropertyError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `bits` bits (at most 32) as an unsigned integer.
    pub fn read_bits(&mut self, bits: u32) -> Result<u32, PropertyError> {
        if bits > 32 {
            return Err(PropertyError::InvalidBitCount(bits));
        }
        // At most 32 bits were read, so the value fits.
        Ok(self.read_bits_u64(bits)? as u32)
    }

    /// Reads `bits` bits (at most 64) as an unsigned integer.
    pub fn read_bits_u64(&mut self, bits: u32) -> Result<u64, PropertyError> {
        if bits > 64 {
            return Err(PropertyError::InvalidBitCount(bits));
        }
        self.ensure(bits as usize)?;

        let mut value = 0u64;
        let mut filled = 0u32;
        while filled < bits {
            let byte = self.data[self.position / 8];
            let offset = (self.position % 8) as u32;
            let take = (8 - offset).min(bits - filled);
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = (byte >> offset) & mask;
            value |= u64::from(chunk) << filled;
            filled += take;
            self.position += take as usize;
        }
        Ok(value)
    }

    /// Reads a little-endian base-128 variable-length integer.
    pub fn read_var_u32(&mut self) -> Result<u32, PropertyError> {
        let start = self.position;
        let value = self.read_var(MAX_VAR_U32_GROUPS)?;
        u32::try_from(value).map_err(|_| {
            self.position = start;
            PropertyError::ValueOutOfRange {
                name: "varint".to_string(),
                value,
                max: u64::from(u32::MAX),
            }
        })
    }

    /// Reads a little-endian base-128 variable-length integer.
    pub fn read_var_u64(&mut self) -> Result<u64, PropertyError> {
        self.read_var(MAX_VAR_U64_GROUPS)
    }

    fn read_var(&mut self, max_groups: u32) -> Result<u64, PropertyError> {
        let start = self.position;
        let result = self.read_var_groups(max_groups);
        if result.is_err() {
            self.position = start;
        }
        result
    }

    fn read_var_groups(&mut self, max_groups: u32) -> Result<u64, PropertyError> {
        let mut value = 0u64;
        for group in 0..max_groups {
            let byte = self.read_bits(8)?;
            let shift = group * 7;
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PropertyError::PropertyError(format!(
            "variable-length integer longer than {max_groups} bytes"
        )))
    }

    /// Reads `count` whole bytes. The cursor need not be byte aligned.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, PropertyError> {
        self.ensure(count * 8)?;
        if self.position % 8 == 0 {
            let start = self.position / 8;
            self.position += count * 8;
            return Ok(self.data[start..start + count].to_vec());
        }
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            bytes.push(self.read_bits(8)? as u8);
        }
        Ok(bytes)
    }
}

/// Builds a byte buffer in the layout `Bitstream` reads.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    data: Vec<u8>,
    /// Number of bits written so far.
    bit_len: usize,
}

impl BitWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_bits_u64(u64::from(value), 1);
    }

    /// Writes the low `bits` bits of `value`. Panics if `bits > 32`.
    pub fn write_bits(&mut self, value: u32, bits: u32) {
        assert!(bits <= 32, "cannot write {bits} bits from a u32");
        self.write_bits_u64(u64::from(value), bits);
    }

    /// Writes the low `bits` bits of `value`. Panics if `bits > 64`.
    pub fn write_bits_u64(&mut self, value: u64, bits: u32) {
        assert!(bits <= 64, "cannot write {bits} bits from a u64");
        let mut written = 0u32;
        while written < bits {
            let offset = (self.bit_len % 8) as u32;
            if offset == 0 {
                self.data.push(0);
            }
            let take = (8 - offset).min(bits - written);
            let mask = (1u64 << take) - 1;
            let chunk = ((value >> written) & mask) as u8;
            if let Some(last) = self.data.last_mut() {
                *last |= chunk << offset;
            }
            written += take;
            self.bit_len += take as usize;
        }
    }

    pub fn write_var_u32(&mut self, value: u32) {
        self.write_var_u64(u64::from(value));
    }

    pub fn write_var_u64(&mut self, mut value: u64) {
        loop {
            let group = (value & 0x7f) as u32;
            value >>= 7;
            if value == 0 {
                self.write_bits(group, 8);
                return;
            }
            self.write_bits(group | 0x80, 8);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_bits(u32::from(*byte), 8);
        }
    }

    /// Consumes the writer. Any trailing partial byte is zero padded.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
