//! Bounds-checked little-endian field access over a dump buffer.
//!
//! Every multi-byte integer in the exception dump format is little-endian
//! regardless of the host. Reads never truncate or zero-fill: a read that
//! would run past the end of the buffer fails with [`DumpError::OutOfBounds`].

use crate::error::{DumpError, Result};

/// Borrow `length` bytes starting at `offset`.
pub fn read_block(data: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    let end = offset.checked_add(length).ok_or(DumpError::OutOfBounds {
        offset,
        length,
        available: data.len(),
    })?;
    data.get(offset..end).ok_or(DumpError::OutOfBounds {
        offset,
        length,
        available: data.len(),
    })
}

/// Read a little-endian u16 from a byte slice at the given offset.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = read_block(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little-endian u32 from a byte slice at the given offset.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = read_block(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a little-endian u64 from a byte slice at the given offset.
pub fn read_u64_le(data: &[u8], offset: usize) -> Result<u64> {
    let bytes = read_block(data, offset, 8)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(word))
}

/// Read a fixed-length ASCII field. Trailing NUL padding is dropped and any
/// byte outside the ASCII range is replaced with `?`.
pub fn read_ascii_fixed(data: &[u8], offset: usize, length: usize) -> Result<String> {
    let bytes = read_block(data, offset, length)?;
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    Ok(bytes[..end]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect())
}

/// Sequential reader over a buffer, advancing past each field it reads.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Start reading at `offset` instead of the beginning of the buffer.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn u32(&mut self) -> Result<u32> {
        let value = read_u32_le(self.data, self.offset)?;
        self.offset += 4;
        Ok(value)
    }

    pub fn u64(&mut self) -> Result<u64> {
        let value = read_u64_le(self.data, self.offset)?;
        self.offset += 8;
        Ok(value)
    }

    pub fn block(&mut self, length: usize) -> Result<&'a [u8]> {
        let block = read_block(self.data, self.offset, length)?;
        self.offset += length;
        Ok(block)
    }

    pub fn ascii(&mut self, length: usize) -> Result<String> {
        let text = read_ascii_fixed(self.data, self.offset, length)?;
        self.offset += length;
        Ok(text)
    }
}
