use super::ReadAt;
use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};

/// Adapts any `Read + Seek` source to [`ReadAt`].
///
/// The inner cursor is shared mutable state; each `read_at` seeks to its
/// offset and reads in one step while holding the borrow.
pub struct SeekableReader<R> {
    inner: RefCell<R>,
    size: u64,
}

impl<R: Read + Seek> SeekableReader<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: RefCell::new(inner),
            size,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> ReadAt for SeekableReader<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        inner.seek(SeekFrom::Start(offset))?;
        inner.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_are_positioned() {
        let reader = SeekableReader::new(Cursor::new(b"0123456789".to_vec())).unwrap();
        assert_eq!(reader.size(), 10);

        let mut buf = [0u8; 3];
        reader.read_exact_at(7, &mut buf).unwrap();
        assert_eq!(&buf, b"789");
        reader.read_exact_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"234");

        let err = reader.read_exact_at(8, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
