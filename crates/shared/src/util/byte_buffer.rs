// ByteBuffer - Binary serialization/deserialization
//
// Backing store for the geodata wire formats. All multi-byte values are
// little-endian; reads past the end of the buffer report UnexpectedEof,
// which the deserializers treat as fatal (a truncated file would
// otherwise decode into a silently corrupt grid).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// A byte buffer for reading/writing binary geodata records.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl ByteBuffer {
    /// Create a new empty ByteBuffer
    pub fn new() -> Self {
        ByteBuffer {
            data: Vec::new(),
            read_pos: 0,
        }
    }

    /// Create with a pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Wrap an existing byte vector for reading
    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteBuffer { data, read_pos: 0 }
    }

    /// Get the current size of the buffer
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the current read position
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Get the raw contents
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    // ---- Write operations (append) ----

    /// Append raw bytes
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Write a u8
    pub fn write_u8(&mut self, val: u8) {
        self.data.push(val);
    }

    /// Write a u16 (little-endian)
    pub fn write_u16(&mut self, val: u16) {
        self.data.write_u16::<LittleEndian>(val).unwrap();
    }

    /// Write an i16 (little-endian)
    pub fn write_i16(&mut self, val: i16) {
        self.data.write_i16::<LittleEndian>(val).unwrap();
    }

    /// Write a u32 (little-endian)
    pub fn write_u32(&mut self, val: u32) {
        self.data.write_u32::<LittleEndian>(val).unwrap();
    }

    /// Write an f32 (little-endian)
    pub fn write_f32(&mut self, val: f32) {
        self.data.write_f32::<LittleEndian>(val).unwrap();
    }

    // ---- Read operations ----

    fn eof(context: &str) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("ByteBuffer read past end: {context}"),
        )
    }

    /// Read a u8
    pub fn read_u8(&mut self) -> Result<u8, std::io::Error> {
        if self.read_pos >= self.data.len() {
            return Err(Self::eof("u8"));
        }
        let val = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(val)
    }

    /// Read a u16 (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, std::io::Error> {
        if self.read_pos + 2 > self.data.len() {
            return Err(Self::eof("u16"));
        }
        let mut cursor = Cursor::new(&self.data[self.read_pos..]);
        let val = cursor.read_u16::<LittleEndian>()?;
        self.read_pos += 2;
        Ok(val)
    }

    /// Read an i16 (little-endian)
    pub fn read_i16(&mut self) -> Result<i16, std::io::Error> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a u32 (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, std::io::Error> {
        if self.read_pos + 4 > self.data.len() {
            return Err(Self::eof("u32"));
        }
        let mut cursor = Cursor::new(&self.data[self.read_pos..]);
        let val = cursor.read_u32::<LittleEndian>()?;
        self.read_pos += 4;
        Ok(val)
    }

    /// Read an f32 (little-endian)
    pub fn read_f32(&mut self) -> Result<f32, std::io::Error> {
        if self.read_pos + 4 > self.data.len() {
            return Err(Self::eof("f32"));
        }
        let mut cursor = Cursor::new(&self.data[self.read_pos..]);
        let val = cursor.read_f32::<LittleEndian>()?;
        self.read_pos += 4;
        Ok(val)
    }

    /// Read N bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, std::io::Error> {
        if self.read_pos + count > self.data.len() {
            return Err(Self::eof("bytes"));
        }
        let bytes = self.data[self.read_pos..self.read_pos + count].to_vec();
        self.read_pos += count;
        Ok(bytes)
    }

    /// Skip N bytes in the read position
    pub fn read_skip(&mut self, count: usize) {
        self.read_pos = (self.read_pos + count).min(self.data.len());
    }
}
