//! A single archive member.
//!
//! An entry is backed by exactly one data source at a time:
//! - the still-compressed bytes of the archive it was loaded from,
//! - an in-memory buffer filled by [`CompressionMode::Immediate`], or
//! - a pending input that is compressed while the archive is written.
//!
//! Local file headers of loaded entries are fetched lazily, the first time
//! something needs to know where the compressed data begins.

use log::{debug, trace, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;
use crate::method::{CompressionMethod, DecodeParams, MAX_CAPACITY_HINT, MethodRegistry, Store};
use crate::stream::{
    CrcReader, DecoderStream, ENCRYPTION_HEADER_SIZE, EncoderStream, SubStream, ZipCryptoReader,
    ZipCryptoWriter,
};

use super::attributes::*;
use super::parser::ZipParser;
use super::structures::{CentralDirectoryHeader, LocalFileHeader, length_u32};
use super::time::DosDateTime;

/// When the data handed to [`Entry::set_compression_stream`] is compressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionMode {
    /// Compress into memory right away; the input is not kept.
    Immediate,
    /// Keep the input and compress it while the archive is written.
    #[default]
    Deferred,
}

pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Data to be compressed into an entry.
pub enum InputSource {
    /// Forward-only input. Encrypting it requires a data descriptor, because
    /// the check byte would otherwise need the CRC-32 before compression.
    Stream(Box<dyn Read>),
    /// Input that can be read twice and rewound between saves.
    Seekable(Box<dyn ReadSeek>),
}

impl InputSource {
    pub fn stream<R: Read + 'static>(reader: R) -> Self {
        Self::Stream(Box::new(reader))
    }

    pub fn seekable<R: Read + Seek + 'static>(reader: R) -> Self {
        Self::Seekable(Box::new(reader))
    }
}

impl From<File> for InputSource {
    fn from(file: File) -> Self {
        Self::seekable(file)
    }
}

impl From<Vec<u8>> for InputSource {
    fn from(data: Vec<u8>) -> Self {
        Self::seekable(Cursor::new(data))
    }
}

impl From<&'static [u8]> for InputSource {
    fn from(data: &'static [u8]) -> Self {
        Self::seekable(Cursor::new(data))
    }
}

impl From<Cursor<Vec<u8>>> for InputSource {
    fn from(cursor: Cursor<Vec<u8>>) -> Self {
        Self::seekable(cursor)
    }
}

/// Pending input plus the position it started at.
struct Pending {
    input: InputSource,
    start: u64,
    consumed: bool,
}

impl Pending {
    fn new(mut input: InputSource) -> io::Result<Self> {
        let start = match &mut input {
            InputSource::Seekable(reader) => reader.stream_position()?,
            InputSource::Stream(_) => 0,
        };
        Ok(Self {
            input,
            start,
            consumed: false,
        })
    }

    fn empty() -> io::Result<Self> {
        Self::new(InputSource::from(Vec::new()))
    }

    fn reader(&mut self) -> &mut dyn Read {
        self.consumed = true;
        match &mut self.input {
            InputSource::Stream(reader) => reader,
            InputSource::Seekable(reader) => reader,
        }
    }

    /// A forward-only input cannot be read a second time.
    fn is_spent(&self) -> bool {
        self.consumed && matches!(self.input, InputSource::Stream(_))
    }

    fn rewind(&mut self) -> io::Result<()> {
        if let InputSource::Seekable(reader) = &mut self.input {
            reader.seek(SeekFrom::Start(self.start))?;
        }
        Ok(())
    }

    /// Read the whole input through a CRC-32 and seek back to the start.
    fn pre_read_crc32(&mut self) -> Result<u32> {
        let InputSource::Seekable(reader) = &mut self.input else {
            return Err(Error::UnseekableInput);
        };
        let mut crc_reader = CrcReader::new(reader);
        io::copy(&mut crc_reader, &mut io::sink())?;
        let crc32 = crc_reader.crc32();
        self.rewind()?;
        Ok(crc32)
    }
}

/// Normalize an in-archive path: backslashes become slashes, leading and
/// repeated slashes are dropped. A trailing slash (a directory) is kept.
///
/// Fails with [`Error::InvalidFileName`] when nothing but slashes remain.
pub fn normalize_name(path: &str) -> Result<String> {
    normalize_name_bytes(path.as_bytes())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| Error::InvalidFileName(path.to_string()))
}

/// [`normalize_name`] over raw name bytes of unknown encoding. Only ASCII
/// slashes and backslashes are touched, so the remaining bytes are kept.
fn normalize_name_bytes(path: &[u8]) -> Option<Vec<u8>> {
    let mut normalized = Vec::with_capacity(path.len());
    let mut previous_was_slash = true;
    for &b in path {
        let b = if b == b'\\' { b'/' } else { b };
        if b == b'/' && previous_was_slash {
            continue;
        }
        previous_was_slash = b == b'/';
        normalized.push(b);
    }
    (!normalized.is_empty()).then_some(normalized)
}

/// A file or directory inside an [`Archive`](super::Archive).
pub struct Entry {
    central: CentralDirectoryHeader,
    local: LocalFileHeader,
    full_name: String,
    comment: String,
    password: Option<String>,

    originally_in_archive: bool,
    is_new_or_changed: bool,
    has_local_header: bool,

    compressed_data_offset: u64,
    serialized_local_header_offset: u64,

    source: Option<Rc<dyn ReadAt>>,
    registry: Arc<MethodRegistry>,
    method: Option<Arc<dyn CompressionMethod>>,

    pending: Option<Pending>,
    immediate: Option<Rc<[u8]>>,

    raw_stream: Option<Box<dyn Read>>,
    decompression_stream: Option<Box<dyn Read>>,
}

impl Entry {
    fn blank(
        central: CentralDirectoryHeader,
        source: Option<Rc<dyn ReadAt>>,
        registry: Arc<MethodRegistry>,
    ) -> Self {
        Self {
            central,
            local: LocalFileHeader::default(),
            full_name: String::new(),
            comment: String::new(),
            password: None,
            originally_in_archive: false,
            is_new_or_changed: false,
            has_local_header: false,
            compressed_data_offset: 0,
            serialized_local_header_offset: 0,
            source,
            registry,
            method: None,
            pending: None,
            immediate: None,
            raw_stream: None,
            decompression_stream: None,
        }
    }

    /// A new, empty entry stored with method Store and the current time.
    pub(crate) fn new(full_name: &str, registry: Arc<MethodRegistry>) -> Result<Self> {
        let central = CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED_DEFAULT,
            compression_method: Store::CODE,
            ..Default::default()
        };
        let mut entry = Self::blank(central, None, registry);
        entry.is_new_or_changed = true;
        entry.method = Some(Arc::new(Store));
        entry.set_attributes(Attributes::ARCHIVE);
        entry.set_dos_time(DosDateTime::now());
        entry.set_full_name(full_name)?;
        Ok(entry)
    }

    /// An entry described by a parsed central directory header.
    ///
    /// The path decides between file and directory; attributes that disagree
    /// with it are corrected.
    pub(crate) fn from_central(
        central: CentralDirectoryHeader,
        source: Rc<dyn ReadAt>,
        registry: Arc<MethodRegistry>,
    ) -> Result<Self> {
        let raw_name = central.file_name.clone();
        let comment = String::from_utf8_lossy(&central.comment).into_owned();
        let mut entry = Self::blank(central, Some(source), registry);
        entry.originally_in_archive = true;
        entry.comment = comment;
        entry.set_full_name(&String::from_utf8_lossy(&raw_name))?;
        // Written back with the bytes it was read with, not the decoded text
        if let Some(normalized) = normalize_name_bytes(&raw_name) {
            entry.central.file_name = normalized;
        }
        Ok(entry)
    }

    /// The path inside the archive. Names that are not valid UTF-8 are shown
    /// lossily here but saved with their original bytes until renamed.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Rename the entry. A trailing slash turns it into a directory, its
    /// absence into a file.
    pub fn set_full_name(&mut self, full_name: &str) -> Result<()> {
        let normalized = normalize_name(full_name)?;
        let is_directory = normalized.ends_with('/');
        self.central.file_name = normalized.clone().into_bytes();
        self.full_name = normalized;
        self.set_attributes(if is_directory {
            Attributes::DIRECTORY
        } else {
            Attributes::ARCHIVE
        });
        Ok(())
    }

    /// Last path segment, without the trailing slash of a directory.
    pub fn name(&self) -> &str {
        let full_name = self.full_name();
        let trimmed = full_name.strip_suffix('/').unwrap_or(full_name);
        match trimmed.rfind('/') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        }
    }

    /// Replace the last path segment, keeping the parent directories.
    ///
    /// The entry does not know its siblings; [`Archive::rename_entry`] and
    /// [`Lookup::set_name`] also reject names that are already taken.
    ///
    /// [`Archive::rename_entry`]: super::Archive::rename_entry
    /// [`Lookup::set_name`]: super::Lookup::set_name
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let new_name = self.sibling_name(name);
        self.set_full_name(&new_name)
    }

    /// Full name after replacing the last path segment with `name`.
    pub(crate) fn sibling_name(&self, name: &str) -> String {
        let full_name = self.full_name();
        let trimmed = full_name.strip_suffix('/').unwrap_or(full_name);
        let mut new_name = match trimmed.rfind('/') {
            Some(pos) => trimmed[..=pos].to_string(),
            None => String::new(),
        };
        new_name.push_str(name);
        if self.is_directory() && !new_name.ends_with('/') {
            new_name.push('/');
        }
        new_name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.central.comment = comment.as_bytes().to_vec();
        self.comment = comment.to_string();
    }

    fn dos_time(&self) -> DosDateTime {
        DosDateTime::new(self.central.last_mod_date, self.central.last_mod_time)
    }

    fn set_dos_time(&mut self, time: DosDateTime) {
        self.central.last_mod_date = time.date;
        self.central.last_mod_time = time.time;
    }

    /// Modification time as Unix seconds (UTC), `None` if the stored DOS
    /// date is not a real calendar date.
    pub fn last_write_time(&self) -> Option<i64> {
        self.dos_time().to_unix()
    }

    pub fn set_last_write_time(&mut self, unix_seconds: i64) {
        self.set_dos_time(DosDateTime::from_unix(unix_seconds));
    }

    /// Modification `(year, month, day, hour, minute, second)` as stored.
    pub fn modified(&self) -> (u16, u8, u8, u8, u8, u8) {
        let time = self.dos_time();
        let (year, month, day) = time.date_parts();
        let (hour, minute, second) = time.time_parts();
        (year, month, day, hour, minute, second)
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits(self.central.external_attributes)
    }

    /// Merge `value` into the current attributes.
    ///
    /// Asking for [`Attributes::ARCHIVE`] on a directory turns it into a file
    /// (the trailing slash goes away); asking for [`Attributes::DIRECTORY`] on
    /// a file does the reverse. A directory never carries data, so its CRC-32
    /// and sizes are reset and any pending data is dropped.
    pub fn set_attributes(&mut self, value: Attributes) {
        let previous = self.attributes();
        let mut attributes = previous | value;
        let raw_name = &mut self.central.file_name;
        let full_name = &mut self.full_name;

        if value.contains(Attributes::ARCHIVE) && previous.contains(Attributes::DIRECTORY) {
            attributes = attributes & !Attributes::DIRECTORY;
            if full_name.ends_with('/') {
                full_name.pop();
            }
            if raw_name.last() == Some(&b'/') {
                raw_name.pop();
            }
        } else if value.contains(Attributes::DIRECTORY) && previous.contains(Attributes::ARCHIVE) {
            attributes = attributes & !Attributes::ARCHIVE;
            if !full_name.ends_with('/') {
                full_name.push('/');
            }
            if raw_name.last() != Some(&b'/') {
                raw_name.push(b'/');
            }
        }

        if attributes.contains(Attributes::DIRECTORY) {
            self.central.crc32 = 0;
            self.central.compressed_size = 0;
            self.central.uncompressed_size = 0;
            self.pending = None;
            self.immediate = None;
            self.raise_version_needed(VERSION_NEEDED_DIRECTORY);
        }

        self.central.external_attributes = attributes.bits();
    }

    pub fn is_directory(&self) -> bool {
        self.attributes().contains(Attributes::DIRECTORY)
    }

    pub fn compression_method(&self) -> u16 {
        self.central.compression_method
    }

    pub fn crc32(&self) -> u32 {
        self.central.crc32
    }

    /// Uncompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.central.uncompressed_size as u64
    }

    /// Compressed size in bytes, including the encryption header if any.
    pub fn compressed_size(&self) -> u64 {
        self.central.compressed_size as u64
    }

    pub fn flags(&self) -> u16 {
        self.central.flags
    }

    fn set_flag(&mut self, flag: u16, on: bool) {
        if on {
            self.central.flags |= flag;
        } else {
            self.central.flags &= !flag;
        }
    }

    pub fn is_password_protected(&self) -> bool {
        self.central.flags & FLAG_ENCRYPTED != 0
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Set or clear (with `None` or an empty string) the password.
    ///
    /// The password is always kept, so an encrypted entry can be read. The
    /// encrypted flag follows it only while the entry has no committed data:
    /// it is new and not yet compressed, or it is empty. Data already stored
    /// in an archive is never silently marked encrypted without being
    /// recompressed.
    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = password.filter(|p| !p.is_empty()).map(str::to_owned);
        self.close_decompression_stream();

        let is_empty = self.size() == 0 && self.compressed_size() == 0;
        let uncommitted = !self.originally_in_archive || is_empty;
        if uncommitted && self.immediate.is_none() {
            let encrypted = self.password.is_some();
            self.set_flag(FLAG_ENCRYPTED, encrypted);
        }
    }

    pub fn is_using_data_descriptor(&self) -> bool {
        self.central.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Write crc and sizes after the data instead of patching the local
    /// header. With a password this also avoids reading the input twice.
    pub fn use_data_descriptor(&mut self, on: bool) {
        self.set_flag(FLAG_DATA_DESCRIPTOR, on);
    }

    pub fn is_unicode_name(&self) -> bool {
        self.central.flags & FLAG_UNICODE_NAME != 0
    }

    /// Only the flag is stored. Loaded names keep their bytes; names set
    /// through this API are written as UTF-8.
    pub fn set_unicode_name(&mut self, on: bool) {
        self.set_flag(FLAG_UNICODE_NAME, on);
    }

    pub fn version_needed_to_extract(&self) -> u16 {
        self.central.version_needed
    }

    pub fn version_made_by(&self) -> u16 {
        self.central.version_made_by
    }

    fn raise_version_needed(&mut self, version: u16) {
        if self.central.version_needed < version {
            self.central.version_needed = version;
        }
    }

    pub fn can_extract(&self) -> bool {
        self.version_needed_to_extract() <= VERSION_MADE_BY
    }

    /// Whether the entry's data will be compressed during the next save.
    pub fn is_new_or_changed(&self) -> bool {
        self.is_new_or_changed
    }

    /// Give the entry new data.
    ///
    /// Any previous data is discarded. In [`CompressionMode::Immediate`] the
    /// input is compressed into memory right now; in
    /// [`CompressionMode::Deferred`] it is kept until the archive is written.
    /// A password and data-descriptor mode must be chosen before an immediate
    /// compression.
    pub fn set_compression_stream(
        &mut self,
        input: impl Into<InputSource>,
        method: Arc<dyn CompressionMethod>,
        mode: CompressionMode,
    ) -> Result<()> {
        if self.is_directory() {
            return Err(Error::DirectoryData(self.full_name().to_string()));
        }

        self.close_raw_stream();
        self.close_decompression_stream();
        self.unload_compression_data();

        self.is_new_or_changed = true;
        self.central.compression_method = method.code();
        self.method = Some(method);

        let mut pending = Pending::new(input.into())?;
        match mode {
            CompressionMode::Immediate => {
                let method = self.prepare_compression();
                let mut buffer = Vec::new();
                self.compress(&*method, &mut pending, &mut buffer)?;
                debug!(
                    "compressed {} into {} bytes in memory",
                    self.full_name(),
                    buffer.len()
                );
                self.immediate = Some(buffer.into());
                self.is_new_or_changed = false;
            }
            CompressionMode::Deferred => self.pending = Some(pending),
        }
        Ok(())
    }

    /// Drop the entry's data and password; it is saved as an empty file.
    pub fn unset_compression_stream(&mut self) {
        self.close_raw_stream();
        self.close_decompression_stream();
        self.unload_compression_data();
        self.is_new_or_changed = true;
        self.set_password(None);
    }

    fn unload_compression_data(&mut self) {
        self.pending = None;
        self.immediate = None;
        self.central.crc32 = 0;
        self.central.compressed_size = 0;
        self.central.uncompressed_size = 0;
    }

    /// The still-compressed (and possibly encrypted) bytes of the entry.
    ///
    /// Repeated calls return the same open stream. `None` when the data only
    /// exists as pending input.
    pub fn raw_stream(&mut self) -> Result<Option<&mut dyn Read>> {
        if self.raw_stream.is_none() {
            self.raw_stream = self.open_raw()?;
        }
        Ok(self.raw_stream.as_mut().map(|stream| stream as &mut dyn Read))
    }

    pub fn is_raw_stream_opened(&self) -> bool {
        self.raw_stream.is_some()
    }

    pub fn close_raw_stream(&mut self) {
        self.raw_stream = None;
    }

    /// Decrypted and decompressed contents of the entry.
    ///
    /// Repeated calls return the same open stream. `None` when the entry
    /// cannot be extracted: its version is too new, the password is missing
    /// or wrong, or its data only exists as pending input. An unknown
    /// compression method yields the raw compressed bytes.
    pub fn decompression_stream(&mut self) -> Result<Option<&mut dyn Read>> {
        if self.decompression_stream.is_none() {
            self.decompression_stream = self.open_decompression()?;
        }
        Ok(self
            .decompression_stream
            .as_mut()
            .map(|stream| stream as &mut dyn Read))
    }

    pub fn is_decompression_stream_opened(&self) -> bool {
        self.decompression_stream.is_some()
    }

    pub fn close_decompression_stream(&mut self) {
        self.decompression_stream = None;
    }

    /// Read the whole decompressed contents into memory.
    pub fn read_to_vec(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(mut stream) = self.open_decompression()? else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(self.size().min(MAX_CAPACITY_HINT) as usize);
        stream.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    fn open_raw(&mut self) -> Result<Option<Box<dyn Read>>> {
        if let Some(buffer) = &self.immediate {
            return Ok(Some(Box::new(Cursor::new(buffer.clone()))));
        }
        if self.is_new_or_changed {
            return Ok(None);
        }
        let Some(source) = self.source.clone() else {
            return Ok(None);
        };
        let offset = self.compressed_data_offset()?;
        Ok(Some(Box::new(SubStream::new(
            source,
            offset,
            self.compressed_size(),
        ))))
    }

    fn open_decompression(&mut self) -> Result<Option<Box<dyn Read>>> {
        if !self.can_extract() {
            debug!(
                "{} needs version {} to extract",
                self.full_name(),
                self.version_needed_to_extract()
            );
            return Ok(None);
        }
        if self.is_directory() {
            return Ok(Some(Box::new(io::empty())));
        }
        let Some(mut stream) = self.open_raw()? else {
            return Ok(None);
        };

        if self.is_password_protected() {
            let Some(password) = self.password.as_deref() else {
                debug!("{} is encrypted and no password is set", self.full_name());
                return Ok(None);
            };
            match ZipCryptoReader::prepare(stream, password.as_bytes(), self.stored_check_byte()) {
                Ok(Some(reader)) => stream = Box::new(reader),
                Ok(None) => {
                    debug!("wrong password for {}", self.full_name());
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("{} is too short to hold an encryption header", self.full_name());
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let code = self.compression_method();
        let method = self
            .method
            .clone()
            .filter(|m| m.code() == code)
            .or_else(|| self.registry.resolve(code));
        let Some(method) = method else {
            warn!(
                "unknown compression method {code} for {}, returning raw data",
                self.full_name()
            );
            return Ok(Some(stream));
        };

        let params = DecodeParams {
            uncompressed_size: self.size(),
            flags: self.central.flags,
        };
        Ok(Some(Box::new(DecoderStream::new(&*method, stream, params)?)))
    }

    /// Check byte expected at the end of the encryption header of stored data.
    fn stored_check_byte(&self) -> u8 {
        if self.is_using_data_descriptor() {
            (self.central.last_mod_time >> 8) as u8
        } else {
            (self.central.crc32 >> 24) as u8
        }
    }

    /// Check byte for data about to be encrypted. Without a data descriptor
    /// this needs the final CRC-32, so the input is read once up front.
    fn encryption_check_byte(&self, pending: &mut Pending) -> Result<u8> {
        if self.is_using_data_descriptor() {
            Ok((self.central.last_mod_time >> 8) as u8)
        } else {
            Ok((pending.pre_read_crc32()? >> 24) as u8)
        }
    }

    fn compressed_data_offset(&mut self) -> Result<u64> {
        if !self.has_local_header {
            self.fetch_local_header()?;
        }
        Ok(self.compressed_data_offset)
    }

    fn fetch_local_header(&mut self) -> Result<()> {
        if !self.has_local_header && self.originally_in_archive {
            let offset = self.central.local_header_offset as u32 as u64;
            let header = match &self.source {
                Some(source) => ZipParser::new(source.clone()).read_local_header(offset)?,
                None => None,
            };
            let Some((header, data_offset)) = header else {
                return Err(Error::MissingLocalHeader(self.full_name().to_string()));
            };
            trace!(
                "local header of {} at {offset}, data at {data_offset}",
                self.full_name()
            );
            self.local = header;
            self.compressed_data_offset = data_offset;
        }

        self.local.sync_with_central(&self.central);
        self.has_local_header = true;
        Ok(())
    }

    /// Resolve the method used to (re)compress this entry and stamp its
    /// code, flags and version into the central header.
    fn prepare_compression(&mut self) -> Arc<dyn CompressionMethod> {
        let method = self
            .method
            .clone()
            .or_else(|| self.registry.resolve(self.central.compression_method))
            .unwrap_or_else(|| Arc::new(Store));

        self.central.compression_method = method.code();
        let encrypted = self.password.is_some();
        self.set_flag(FLAG_ENCRYPTED, encrypted);
        self.central.flags |= method.required_flags();
        self.raise_version_needed(method.version_needed());
        method
    }

    /// Stream `pending` through CRC-32, the encoder and, with a password, the
    /// cipher into `out`. Sizes and CRC-32 land in both headers.
    fn compress(
        &mut self,
        method: &dyn CompressionMethod,
        pending: &mut Pending,
        out: &mut dyn Write,
    ) -> Result<()> {
        if pending.is_spent() {
            return Err(Error::InputConsumed(self.full_name().to_string()));
        }
        pending.rewind()?;

        let (bytes_read, bytes_written, crc32) = match self.password.clone() {
            Some(password) => {
                let check_byte = self.encryption_check_byte(pending)?;
                let cipher = ZipCryptoWriter::new(out, password.as_bytes(), check_byte)?;
                let mut encoder = EncoderStream::new(method, cipher)?;
                let mut input = CrcReader::new(pending.reader());
                io::copy(&mut input, &mut encoder)?;
                let (read, written) = encoder.finish()?;
                (read, written + ENCRYPTION_HEADER_SIZE as u64, input.crc32())
            }
            None => {
                let mut encoder = EncoderStream::new(method, out)?;
                let mut input = CrcReader::new(pending.reader());
                io::copy(&mut input, &mut encoder)?;
                let (read, written) = encoder.finish()?;
                (read, written, input.crc32())
            }
        };

        self.local.uncompressed_size = length_u32(bytes_read, "uncompressed size")?;
        self.local.compressed_size = length_u32(bytes_written, "compressed size")?;
        self.local.crc32 = crc32;
        self.central.sync_with_local(&self.local);
        Ok(())
    }

    fn write_local_fields<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.is_using_data_descriptor() {
            self.local.crc32 = 0;
            self.local.compressed_size = 0;
            self.local.uncompressed_size = 0;
        }
        self.local.write(out)
    }

    /// Write the local header and the entry's data at the current position.
    ///
    /// New or changed data is compressed straight into `out`; the crc and
    /// sizes then go either into a trailing data descriptor or into the local
    /// header, which is rewritten in place. Unchanged data is copied as is.
    pub(crate) fn write_local_header<W: Write + Seek>(
        &mut self,
        out: &mut W,
        start: u64,
    ) -> Result<()> {
        self.fetch_local_header()?;
        let header_position = out.stream_position()?;
        self.serialized_local_header_offset = header_position - start;

        if self.is_directory() {
            debug_assert!(
                self.crc32() == 0
                    && self.size() == 0
                    && self.compressed_size() == 0
                    && self.pending.is_none()
            );
            self.write_local_fields(out)?;
            if self.is_using_data_descriptor() {
                self.local.data_descriptor().write(out)?;
            }
            return Ok(());
        }

        if self.is_new_or_changed {
            let mut pending = match self.pending.take() {
                Some(pending) => pending,
                None => Pending::empty()?,
            };
            let method = self.prepare_compression();
            self.local.sync_with_central(&self.central);
            self.write_local_fields(out)?;

            let compressed = self.compress(&*method, &mut pending, &mut *out);
            self.pending = Some(pending);
            compressed?;

            if self.is_using_data_descriptor() {
                self.local.data_descriptor().write(out)?;
                debug!(
                    "compressed {} with {}, sizes in data descriptor",
                    self.full_name(),
                    method.name()
                );
            } else {
                let end = out.stream_position()?;
                out.seek(SeekFrom::Start(header_position))?;
                self.local.write(out)?;
                out.seek(SeekFrom::Start(end))?;
                debug!(
                    "compressed {} with {}, local header patched",
                    self.full_name(),
                    method.name()
                );
            }
            return Ok(());
        }

        self.write_local_fields(out)?;
        let copied = match self.open_raw()? {
            Some(mut raw) => io::copy(&mut raw, out)?,
            None => 0,
        };
        if copied != self.compressed_size() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{}: expected {} compressed bytes, copied {copied}",
                    self.full_name(),
                    self.compressed_size()
                ),
            )));
        }
        if self.is_using_data_descriptor() {
            self.local.sync_with_central(&self.central);
            self.local.data_descriptor().write(out)?;
        }
        debug!("copied {copied} compressed bytes of {}", self.full_name());
        Ok(())
    }

    /// Write the central directory header, pointing at the local header
    /// written by the preceding [`write_local_header`](Self::write_local_header).
    pub(crate) fn write_central_header<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let offset = length_u32(self.serialized_local_header_offset, "local header offset")?;
        self.central.local_header_offset = i32::try_from(offset).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("local header offset {offset} does not fit the header field"),
            )
        })?;
        self.central.write(out)?;
        Ok(())
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.full_name)
            .field("method", &self.central.compression_method)
            .field("size", &self.central.uncompressed_size)
            .field("compressed_size", &self.central.compressed_size)
            .field("flags", &format_args!("{:#06x}", self.central.flags))
            .field("attributes", &self.attributes())
            .finish_non_exhaustive()
    }
}
