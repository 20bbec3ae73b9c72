use crc32fast::Hasher;
use std::io::{self, Read};

/// Reader computing a running CRC-32 over every byte read through it.
pub struct CrcReader<R> {
    inner: R,
    hasher: Hasher,
    bytes_read: u64,
}

impl<R: Read> CrcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            bytes_read: 0,
        }
    }

    /// CRC-32 of everything read so far.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
