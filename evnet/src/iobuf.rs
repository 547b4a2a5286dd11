#[cfg(test)]
#[path = "iobuf_test.rs"]
mod iobuf_test;

use shared::error::{Error, Result};

use crate::config::DEFAULT_IO_SIZE;

/// Growable byte store backing a connection's receive and send queues.
///
/// Capacity grows in multiples of the chunk size and drops back to zero
/// once the buffer is emptied.
#[derive(Debug, Clone)]
pub struct IoBuf {
    buf: Vec<u8>,
    chunk_size: usize,
}

impl Default for IoBuf {
    fn default() -> Self {
        Self::with_chunk_size(DEFAULT_IO_SIZE)
    }
}

impl IoBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer that grows by `chunk_size` bytes at a time.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Appends `data` at the tail.
    ///
    /// On allocation failure nothing is appended and
    /// [`Error::ErrOutOfMemory`] is returned.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        let needed = self.buf.len() + data.len();
        if needed > self.buf.capacity() {
            self.resize(needed)?;
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Removes `len` bytes starting at `offset`, shifting the remainder to
    /// the front. Returns the number of bytes removed, which is zero when
    /// the range does not fit inside the buffer.
    pub fn delete(&mut self, offset: usize, len: usize) -> usize {
        let Some(end) = offset.checked_add(len) else {
            return 0;
        };
        if end > self.buf.len() {
            return 0;
        }
        self.buf.drain(offset..end);
        if self.buf.is_empty() {
            self.buf = Vec::new();
        }
        len
    }

    /// Sets the capacity to `size` rounded up to the chunk size.
    ///
    /// Shrinking below the current length is refused. A size of zero on an
    /// empty buffer frees the storage.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        if size < self.buf.len() {
            return Err(Error::ErrBufferShort);
        }
        if size == 0 {
            self.buf = Vec::new();
            return Ok(());
        }
        let target = size
            .div_ceil(self.chunk_size)
            .checked_mul(self.chunk_size)
            .ok_or(Error::ErrOutOfMemory)?;
        if target > self.buf.capacity() {
            self.buf
                .try_reserve_exact(target - self.buf.len())
                .map_err(|_| Error::ErrOutOfMemory)?;
        } else {
            self.buf.shrink_to(target);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.buf = Vec::new();
    }
}
