//! Byte-level reader for WebAssembly binary data.
//!
//! Wraps a byte slice with a position, LEB128 variable-length integer
//! decoding, and fixed-width little-endian reads. Both the module section
//! reader and the operator decoder are built on this.

use super::DecodeError;
use byteorder::{ByteOrder, LittleEndian};

/// A forward-only reader over a borrowed byte slice.
#[derive(Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    /// Current byte offset from the start of the slice.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        match self.bytes.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(DecodeError::UnexpectedEof { offset: self.pos }),
        }
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Result<u8, DecodeError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof { offset: self.pos })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof { offset: self.pos });
        }
        self.pos += len;
        Ok(())
    }

    // Fixed-width little-endian reads ----------------------------------------

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    pub fn read_16_bytes(&mut self) -> Result<[u8; 16], DecodeError> {
        let mut out = [0u8; 16];
        out.copy_from_slice(self.read_bytes(16)?);
        Ok(out)
    }

    // LEB128 variable-length reads -------------------------------------------

    pub fn read_vu32(&mut self) -> Result<u32, DecodeError> {
        let value = self.read_vu(32)?;
        Ok(value as u32)
    }

    pub fn read_vu64(&mut self) -> Result<u64, DecodeError> {
        self.read_vu(64)
    }

    pub fn read_vs32(&mut self) -> Result<i32, DecodeError> {
        let value = self.read_vs(32)?;
        Ok(value as i32)
    }

    pub fn read_vs64(&mut self) -> Result<i64, DecodeError> {
        self.read_vs(64)
    }

    /// Signed 33-bit LEB128, used for block type indices.
    pub fn read_vs33(&mut self) -> Result<i64, DecodeError> {
        self.read_vs(33)
    }

    fn read_vu(&mut self, size_bits: u32) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift + 7 >= size_bits {
                // The final byte must not carry bits beyond the value width.
                let spare = size_bits - shift;
                if spare < 7 && (byte >> spare) != 0 {
                    return Err(DecodeError::IntegerOverflow { offset: start });
                }
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= size_bits {
                return Err(DecodeError::IntegerOverflow { offset: start });
            }
        }
    }

    fn read_vs(&mut self, size_bits: u32) -> Result<i64, DecodeError> {
        let start = self.pos;
        let mut result: i64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    // Sign extend.
                    result |= -1i64 << shift;
                }
                if size_bits < 64 {
                    let min = -(1i64 << (size_bits - 1));
                    let max = (1i64 << (size_bits - 1)) - 1;
                    if result < min || result > max {
                        return Err(DecodeError::IntegerOverflow { offset: start });
                    }
                }
                return Ok(result);
            }
            if shift >= size_bits.div_ceil(7) * 7 {
                return Err(DecodeError::IntegerOverflow { offset: start });
            }
        }
    }

    /// Read a length-prefixed UTF-8 name.
    pub fn read_name(&mut self) -> Result<String, DecodeError> {
        let len = self.read_vu32()? as usize;
        let offset = self.pos;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}
