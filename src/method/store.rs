use std::io::{self, Read, Write};

use super::{CompressionMethod, DecodeParams, Encoder};

/// Method 0: data stored as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct Store;

impl Store {
    pub const CODE: u16 = 0;
}

struct StoreEncoder<'a>(Box<dyn Write + 'a>);

impl Write for StoreEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Encoder for StoreEncoder<'_> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

impl CompressionMethod for Store {
    fn code(&self) -> u16 {
        Self::CODE
    }

    fn name(&self) -> &'static str {
        "store"
    }

    fn version_needed(&self) -> u16 {
        10
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn Encoder + 'a>> {
        Ok(Box::new(StoreEncoder(sink)))
    }

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + 'a>,
        _params: DecodeParams,
    ) -> io::Result<Box<dyn Read + 'a>> {
        Ok(source)
    }
}
