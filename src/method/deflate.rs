use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{self, Read, Write};

use super::{CompressionMethod, DecodeParams, Encoder};

/// Method 8: raw DEFLATE through flate2.
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: Compression,
}

impl Deflate {
    pub const CODE: u16 = 8;

    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

struct DeflateWriter<'a>(DeflateEncoder<Box<dyn Write + 'a>>);

impl Write for DeflateWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Encoder for DeflateWriter<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut sink = self.0.finish()?;
        sink.flush()
    }
}

impl CompressionMethod for Deflate {
    fn code(&self) -> u16 {
        Self::CODE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn version_needed(&self) -> u16 {
        20
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn Encoder + 'a>> {
        Ok(Box::new(DeflateWriter(DeflateEncoder::new(sink, self.level))))
    }

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + 'a>,
        _params: DecodeParams,
    ) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(DeflateDecoder::new(source)))
    }
}
