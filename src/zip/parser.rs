//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header lazily to learn
//!    where its compressed data begins

use log::{debug, warn};
use std::io::{Cursor, Read, Seek};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::io::ReadAt;
use crate::stream::SubStream;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser over a shared random-access source.
pub struct ZipParser {
    /// The underlying data source
    reader: Rc<dyn ReadAt>,
    /// Total size of the archive in bytes
    size: u64,
}

impl ZipParser {
    pub fn new(reader: Rc<dyn ReadAt>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Scans backwards from the end of the source, so when the signature
    /// bytes also occur earlier (inside compressed data, say) the occurrence
    /// nearest the end wins.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// [`Error::MissingEndOfCentralDirectory`] if no signature is found,
    /// indicating the source is not a ZIP archive or is truncated.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(Error::MissingEndOfCentralDirectory);
        }

        // Optimization: First try the simple case where there's no comment.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf)?;
        if read_u32_le(&buf, 0) == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            if let Some(eocd) = EndOfCentralDirectory::read(&mut Cursor::new(&buf))? {
                debug!("found end of central directory at {offset}");
                return Ok((eocd, offset));
            }
        }

        // EOCD not at expected location - search backwards for it.
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf)?;

        let last_candidate = buf.len() - EndOfCentralDirectory::SIZE;
        for i in (0..=last_candidate).rev() {
            if read_u32_le(&buf, i) != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let mut cursor = Cursor::new(&buf[i..]);
            if let Some(eocd) = EndOfCentralDirectory::read(&mut cursor)? {
                let offset = search_start + i as u64;
                debug!("found end of central directory at {offset} after backward scan");
                return Ok((eocd, offset));
            }
        }

        Err(Error::MissingEndOfCentralDirectory)
    }

    /// Read every Central Directory File Header.
    ///
    /// The directory between its recorded start and the EOCD is fetched in one
    /// read, then headers are parsed until one fails to match its signature.
    pub fn read_central_directory(
        &self,
        eocd: &EndOfCentralDirectory,
        eocd_offset: u64,
    ) -> Result<Vec<CentralDirectoryHeader>> {
        let cd_offset = eocd.cd_offset as u64;
        let cd_len = eocd_offset.saturating_sub(cd_offset);

        let mut cd_data = Vec::with_capacity(cd_len as usize);
        SubStream::new(self.reader.clone(), cd_offset, cd_len).read_to_end(&mut cd_data)?;

        let mut headers = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(&cd_data);
        while let Some(header) = CentralDirectoryHeader::read(&mut cursor)? {
            headers.push(header);
        }

        if headers.len() != eocd.total_entries as usize {
            warn!(
                "central directory holds {} entries but the end record claims {}",
                headers.len(),
                eocd.total_entries
            );
        }
        debug!("read {} central directory headers", headers.len());
        Ok(headers)
    }

    /// Read the Local File Header at `offset`.
    ///
    /// # Returns
    ///
    /// The header and the offset where its compressed data begins, or `None`
    /// if there is no local header at that position.
    pub fn read_local_header(&self, offset: u64) -> Result<Option<(LocalFileHeader, u64)>> {
        let mut stream = SubStream::to_end(self.reader.clone(), offset);
        let Some(header) = LocalFileHeader::read(&mut stream)? else {
            return Ok(None);
        };
        let data_offset = offset + stream.stream_position()?;
        Ok(Some((header, data_offset)))
    }
}

fn read_u32_le(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
