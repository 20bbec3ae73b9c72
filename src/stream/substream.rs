use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use crate::io::ReadAt;

/// Read-only view over `[start, start + len)` of a shared source.
///
/// Reads never cross the end of the window. The view keeps its own position
/// and every read is positioned, so any number of views may be open over the
/// same source at once.
pub struct SubStream {
    source: Rc<dyn ReadAt>,
    start: u64,
    len: u64,
    pos: u64,
}

impl SubStream {
    pub fn new(source: Rc<dyn ReadAt>, start: u64, len: u64) -> Self {
        Self {
            source,
            start,
            len,
            pos: 0,
        }
    }

    /// A view from `start` to the end of the source.
    pub fn to_end(source: Rc<dyn ReadAt>, start: u64) -> Self {
        let len = source.size().saturating_sub(start);
        Self::new(source, start, len)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset of the current position within the shared source.
    pub fn absolute_position(&self) -> u64 {
        self.start + self.pos
    }
}

impl Read for SubStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let max = (self.len - self.pos).min(buf.len() as u64) as usize;
        let n = self.source.read_at(self.start + self.pos, &mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SubStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.pos = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SeekableReader;
    use std::io::Cursor;

    fn source(data: &[u8]) -> Rc<dyn ReadAt> {
        Rc::new(SeekableReader::new(Cursor::new(data.to_vec())).unwrap())
    }

    #[test]
    fn test_reads_stop_at_boundary() {
        let mut sub = SubStream::new(source(b"headerBODYtrailer"), 6, 4);
        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"BODY");
        assert_eq!(sub.read(&mut [0u8; 8]).unwrap(), 0);
    }

    #[test]
    fn test_independent_views_over_one_source() {
        let shared = source(b"aaaabbbb");
        let mut first = SubStream::new(shared.clone(), 0, 4);
        let mut second = SubStream::new(shared, 4, 4);

        let mut buf = [0u8; 2];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"aa");
        second.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bb");
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"aa");
        assert_eq!(first.absolute_position(), 4);
    }

    #[test]
    fn test_seek_within_window() {
        let mut sub = SubStream::to_end(source(b"0123456789"), 5);
        assert_eq!(sub.len(), 5);
        sub.seek(SeekFrom::End(-2)).unwrap();
        let mut out = String::new();
        sub.read_to_string(&mut out).unwrap();
        assert_eq!(out, "89");
        assert!(sub.seek(SeekFrom::Current(-10)).is_err());
    }
}
