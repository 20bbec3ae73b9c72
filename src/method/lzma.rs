use std::io::{self, Cursor, Read, Write};

use lzma_rs::compress::{Options as CompressOptions, UnpackedSize as CompressSize};
use lzma_rs::decompress::{Options as DecompressOptions, UnpackedSize as DecompressSize};

use super::{CompressionMethod, DecodeParams, Encoder};

/// LZMA SDK version recorded in the ZIP-specific LZMA header.
const SDK_VERSION: [u8; 2] = [9, 20];
/// Length of the LZMA properties block (lc/lp/pb byte plus dictionary size).
const PROPERTIES_SIZE: u16 = 5;
/// General purpose bit 1: the stream ends with an end-of-stream marker.
const EOS_MARKER_FLAG: u16 = 1 << 1;

/// Method 14: LZMA through lzma-rs.
///
/// lzma-rs works on whole buffers, so the encoder collects its input until
/// `finish` and the decoder inflates the entry on first read.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lzma;

impl Lzma {
    pub const CODE: u16 = 14;
}

struct LzmaEncoder<'a> {
    sink: Box<dyn Write + 'a>,
    input: Vec<u8>,
}

impl Write for LzmaEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.input.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Encoder for LzmaEncoder<'_> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let LzmaEncoder { mut sink, input } = *self;
        sink.write_all(&SDK_VERSION)?;
        sink.write_all(&PROPERTIES_SIZE.to_le_bytes())?;
        let options = CompressOptions {
            unpacked_size: CompressSize::SkipWritingToHeader,
        };
        lzma_rs::lzma_compress_with_options(&mut &input[..], &mut sink, &options)?;
        sink.flush()
    }
}

struct LzmaDecoder<'a> {
    source: Option<Box<dyn Read + 'a>>,
    params: DecodeParams,
    output: Cursor<Vec<u8>>,
}

impl LzmaDecoder<'_> {
    fn inflate(&mut self, mut source: Box<dyn Read + '_>) -> io::Result<()> {
        let mut header = [0u8; 4];
        source.read_exact(&mut header)?;
        let properties_size = u16::from_le_bytes([header[2], header[3]]);
        if properties_size != PROPERTIES_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected LZMA properties size {properties_size}"),
            ));
        }

        let mut compressed = Vec::new();
        source.read_to_end(&mut compressed)?;

        let unpacked_size = if self.params.flags & EOS_MARKER_FLAG != 0 {
            DecompressSize::UseProvided(None)
        } else {
            DecompressSize::UseProvided(Some(self.params.uncompressed_size))
        };
        let options = DecompressOptions {
            unpacked_size,
            ..Default::default()
        };
        let mut output = Vec::with_capacity(self.params.capacity_hint());
        lzma_rs::lzma_decompress_with_options(&mut &compressed[..], &mut output, &options)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("LZMA: {e:?}")))?;
        self.output = Cursor::new(output);
        Ok(())
    }
}

impl Read for LzmaDecoder<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(source) = self.source.take() {
            self.inflate(source)?;
        }
        self.output.read(buf)
    }
}

impl CompressionMethod for Lzma {
    fn code(&self) -> u16 {
        Self::CODE
    }

    fn name(&self) -> &'static str {
        "lzma"
    }

    fn version_needed(&self) -> u16 {
        63
    }

    fn required_flags(&self) -> u16 {
        EOS_MARKER_FLAG
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn Encoder + 'a>> {
        Ok(Box::new(LzmaEncoder {
            sink,
            input: Vec::new(),
        }))
    }

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + 'a>,
        params: DecodeParams,
    ) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(LzmaDecoder {
            source: Some(source),
            params,
            output: Cursor::new(Vec::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_lzma_header_layout() {
        let mut compressed = Vec::new();
        let mut encoder = Lzma.encoder(Box::new(&mut compressed)).unwrap();
        encoder.write_all(b"lzma lzma lzma lzma").unwrap();
        encoder.finish().unwrap();

        assert_eq!(&compressed[..4], &[9, 20, 5, 0]);

        let params = DecodeParams {
            uncompressed_size: 19,
            flags: EOS_MARKER_FLAG,
        };
        let mut output = String::new();
        Lzma.decoder(Box::new(&compressed[..]), params)
            .unwrap()
            .read_to_string(&mut output)
            .unwrap();
        assert_eq!(output, "lzma lzma lzma lzma");
    }

    #[test]
    fn test_oversized_header_size_is_only_a_hint() {
        let mut compressed = Vec::new();
        let mut encoder = Lzma.encoder(Box::new(&mut compressed)).unwrap();
        encoder.write_all(b"small").unwrap();
        encoder.finish().unwrap();

        let params = DecodeParams {
            uncompressed_size: u64::MAX,
            flags: EOS_MARKER_FLAG,
        };
        assert_eq!(params.capacity_hint(), 1 << 20);
        let mut output = Vec::new();
        Lzma.decoder(Box::new(&compressed[..]), params)
            .unwrap()
            .read_to_end(&mut output)
            .unwrap();
        assert_eq!(output, b"small");
    }
}
