//! Sequential little-endian reader over an in-memory byte buffer.
//!
//! Every read either advances the cursor by the full width of the value or
//! fails without moving it, so the offset reported in an error is always the
//! start of the field that could not be read.

use super::decoder::DecodeError;

/// A forward-only cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true once every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes the next `n` bytes, or fails with the offset of the short read.
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Skips `n` bytes without interpreting them.
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    /// Reads an unsigned 16-bit value. Zero-extends when widened by callers.
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Reads a string prefixed by a signed 32-bit byte count.
    ///
    /// Bytes map one-to-one onto chars (ISO-8859-1), so any byte sequence
    /// decodes. A negative count is a [`DecodeError::MalformedLength`]; a count
    /// larger than the remaining input is [`DecodeError::Truncated`].
    pub fn read_length_prefixed_string(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let length = self.read_i32()?;
        if length < 0 {
            self.pos = offset;
            return Err(DecodeError::MalformedLength { offset, length });
        }
        if length == 0 {
            return Ok(String::new());
        }

        match self.take(length as usize) {
            Ok(bytes) => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Err(e) => {
                // Report the truncation against the length field itself.
                self.pos = offset;
                match e {
                    DecodeError::Truncated {
                        needed, remaining, ..
                    } => Err(DecodeError::Truncated {
                        offset,
                        needed: needed + 4,
                        remaining: remaining + 4,
                    }),
                    other => Err(other),
                }
            }
        }
    }
}
