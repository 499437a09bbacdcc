//! Little-endian structured readers and writers for index files.
//!
//! Every file written through [`StructWriter`] ends with a CRC32 of the
//! preceding bytes; [`StructReader::verified`] rejects buffers whose trailer
//! does not match, which is how truncated or torn files are detected.

use std::io::Write;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{QuarryError, Result};

/// Writer that tracks a running checksum of everything written.
pub struct StructWriter<W: Write> {
    inner: W,
    hasher: Hasher,
}

impl<W: Write> StructWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.hasher.update(bytes);
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    /// Length-prefixed byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len: u32 = bytes
            .len()
            .try_into()
            .map_err(|_| QuarryError::invalid_argument("byte slice exceeds u32::MAX"))?;
        self.write_u32(len)?;
        self.put(bytes)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Write the checksum trailer, flush and hand back the inner writer.
    pub fn close(mut self) -> Result<W> {
        let crc = self.hasher.finalize();
        self.inner.write_u32::<LittleEndian>(crc)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reader over a checksummed buffer produced by [`StructWriter`].
pub struct StructReader<'a> {
    data: &'a [u8],
}

impl<'a> StructReader<'a> {
    /// Validate the checksum trailer and return a reader over the payload.
    pub fn verified(data: &'a [u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(QuarryError::index("file too short for checksum trailer"));
        }
        let (payload, mut trailer) = data.split_at(data.len() - 4);
        let expected = trailer.read_u32::<LittleEndian>()?;
        if crc32fast::hash(payload) != expected {
            return Err(QuarryError::index("checksum mismatch"));
        }
        Ok(Self { data: payload })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.data.read_u32::<LittleEndian>()?)
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        if len > self.data.len() {
            return Err(QuarryError::index(format!(
                "length {len} exceeds remaining {} bytes",
                self.data.len()
            )));
        }
        let (bytes, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| QuarryError::index(format!("invalid UTF-8 string: {e}")))
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}
