//! Byte-level reader and writer
//!
//! Little-endian integers and `u32`-length-prefixed UTF-8 strings. Both the
//! metadata image and the engine's export dump are built from these.

use thiserror::Error;

/// Failure while reading a buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Ran past the end of the buffer
    #[error("Unexpected end of data at offset {0}")]
    UnexpectedEnd(usize),

    /// String bytes are not UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown tag byte
    #[error("Invalid {what} tag {tag} at offset {offset}")]
    InvalidTag {
        /// Kind of value being read
        what: &'static str,
        /// Tag byte found
        tag: u8,
        /// Offset of the tag byte
        offset: usize,
    },

    /// Nested value exceeds the supported depth
    #[error("Nesting deeper than {0} levels at offset {1}")]
    NestingTooDeep(usize, usize),
}

/// Append-only byte sink
#[derive(Debug, Default)]
pub struct ImageWriter {
    buffer: Vec<u8>,
}

impl ImageWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Number of bytes written so far
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// One byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Little-endian `u32`
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Little-endian `i32`
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Raw bytes, no length prefix
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// `u32` byte length, then the UTF-8 bytes
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.emit_bytes(value.as_bytes());
    }

    /// Presence byte (`0` or `1`), then the string if present
    pub fn emit_opt_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.emit_u8(1);
                self.emit_string(s);
            }
            None => self.emit_u8(0),
        }
    }

    /// Write a zero `u32` placeholder and return its offset
    pub fn reserve_u32(&mut self) -> usize {
        let at = self.offset();
        self.emit_u32(0);
        at
    }

    /// Overwrite a placeholder written by [`ImageWriter::reserve_u32`]
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Bounds-checked cursor over a byte slice
#[derive(Debug)]
pub struct ImageReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ImageReader<'a> {
    /// Cursor at the start of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Unread byte count
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Whether any bytes are left
    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// One byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        Ok(self.take(count)?.to_vec())
    }

    /// String written by [`ImageWriter::emit_string`]
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let start = self.position;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// String written by [`ImageWriter::emit_opt_string`]
    pub fn read_opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(None),
            1 => self.read_string().map(Some),
            tag => Err(DecodeError::InvalidTag {
                what: "optional",
                tag,
                offset,
            }),
        }
    }

    /// Element count that could plausibly fit in the rest of the buffer
    ///
    /// Each element must take at least `min_element_size` bytes, so a
    /// corrupt count fails here instead of driving a huge allocation.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, DecodeError> {
        let offset = self.position;
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_element_size.max(1)) > self.remaining() {
            return Err(DecodeError::UnexpectedEnd(offset));
        }
        Ok(count)
    }
}
