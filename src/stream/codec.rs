use std::io::{self, Read, Write};

use super::counting::{Counter, CountingReader, CountingWriter};
use crate::method::{CompressionMethod, DecodeParams, Encoder};

/// Compressing writer driven by a pluggable method.
///
/// Counts uncompressed bytes coming in and compressed bytes going out, which
/// are the size fields of the entry's headers once `finish` returns.
pub struct EncoderStream<'a> {
    encoder: Box<dyn Encoder + 'a>,
    bytes_read: u64,
    bytes_written: Counter,
}

impl<'a> EncoderStream<'a> {
    pub fn new<W: Write + 'a>(method: &dyn CompressionMethod, sink: W) -> io::Result<Self> {
        let sink = CountingWriter::new(sink);
        let bytes_written = sink.counter();
        Ok(Self {
            encoder: method.encoder(Box::new(sink))?,
            bytes_read: 0,
            bytes_written,
        })
    }

    /// Finish the compressed stream and return `(bytes_read, bytes_written)`.
    pub fn finish(self) -> io::Result<(u64, u64)> {
        self.encoder.finish()?;
        Ok((self.bytes_read, self.bytes_written.get()))
    }
}

impl Write for EncoderStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Decompressing reader driven by a pluggable method.
pub struct DecoderStream<'a> {
    decoder: Box<dyn Read + 'a>,
    bytes_read: Counter,
    bytes_written: u64,
}

impl<'a> DecoderStream<'a> {
    pub fn new<R: Read + 'a>(
        method: &dyn CompressionMethod,
        source: R,
        params: DecodeParams,
    ) -> io::Result<Self> {
        let source = CountingReader::new(source);
        let bytes_read = source.counter();
        Ok(Self {
            decoder: method.decoder(Box::new(source), params)?,
            bytes_read,
            bytes_written: 0,
        })
    }

    /// Compressed bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.get()
    }

    /// Decompressed bytes produced so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Read for DecoderStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{Deflate, Store};

    #[test]
    fn test_counters_after_round_trip() {
        let input = b"counting counting counting counting".to_vec();
        let mut compressed = Vec::new();
        let mut encoder = EncoderStream::new(&Deflate::default(), &mut compressed).unwrap();
        encoder.write_all(&input).unwrap();
        let (read, written) = encoder.finish().unwrap();
        assert_eq!(read, input.len() as u64);
        assert_eq!(written, compressed.len() as u64);

        let mut decoder =
            DecoderStream::new(&Deflate::default(), &compressed[..], DecodeParams::default())
                .unwrap();
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, input);
        assert_eq!(decoder.bytes_written(), input.len() as u64);
        assert_eq!(decoder.bytes_read(), compressed.len() as u64);
    }

    #[test]
    fn test_store_counts_match() {
        let mut out = Vec::new();
        let mut encoder = EncoderStream::new(&Store, &mut out).unwrap();
        encoder.write_all(b"plain").unwrap();
        assert_eq!(encoder.finish().unwrap(), (5, 5));
        assert_eq!(out, b"plain");
    }
}
