mod local;
mod seekable;

pub use local::LocalFileReader;
pub use seekable::SeekableReader;

use std::io;

/// Trait for random access reading from a data source
///
/// Every read names its own offset, so several logical streams can share one
/// physical source without relying on cursor continuity between calls.
pub trait ReadAt {
    /// Read data at the specified offset into the buffer
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer from `offset`, failing with `UnexpectedEof` if
    /// the source ends first
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
