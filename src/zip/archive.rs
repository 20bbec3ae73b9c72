use log::{debug, warn};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::ops::{Index, IndexMut};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt, SeekableReader};
use crate::method::{CompressionMethod, MethodRegistry};

use super::entry::{Entry, normalize_name};
use super::lookup::{MaybeEntry, MaybeEntryMut};
use super::parser::ZipParser;
use super::structures::{EndOfCentralDirectory, length_u32};

/// An in-memory view of a ZIP archive.
///
/// Entries keep the order of the central directory they were read from, and
/// that order is preserved when the archive is written. The source the
/// archive was opened from stays shared with its entries until the archive
/// and every entry are dropped.
pub struct Archive {
    entries: Vec<Entry>,
    comment: String,
    raw_comment: Vec<u8>,
    source: Option<Rc<dyn ReadAt>>,
    registry: Arc<MethodRegistry>,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// An empty archive with the built-in compression methods.
    pub fn new() -> Self {
        Self::with_registry(MethodRegistry::shared())
    }

    /// An empty archive resolving compression methods through `registry`.
    pub fn with_registry(registry: Arc<MethodRegistry>) -> Self {
        Self {
            entries: Vec::new(),
            comment: String::new(),
            raw_comment: Vec::new(),
            source: None,
            registry,
        }
    }

    /// Parse the archive held by a random-access source.
    pub fn open<R: ReadAt + 'static>(reader: R) -> Result<Self> {
        Self::open_with_registry(reader, MethodRegistry::shared())
    }

    /// Parse the archive held by any seekable stream.
    pub fn open_seekable<R: Read + Seek + 'static>(reader: R) -> Result<Self> {
        Self::open(SeekableReader::new(reader)?)
    }

    /// Parse the archive file at `path`.
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(LocalFileReader::new(path)?)
    }

    pub fn open_with_registry<R: ReadAt + 'static>(
        reader: R,
        registry: Arc<MethodRegistry>,
    ) -> Result<Self> {
        let source: Rc<dyn ReadAt> = Rc::new(reader);
        let parser = ZipParser::new(source.clone());
        let (eocd, eocd_offset) = parser.find_eocd()?;
        let headers = parser.read_central_directory(&eocd, eocd_offset)?;

        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            match Entry::from_central(header, source.clone(), registry.clone()) {
                Ok(entry) => entries.push(entry),
                Err(Error::InvalidFileName(name)) => {
                    warn!("skipping entry with unusable name {name:?}");
                }
                Err(e) => return Err(e),
            }
        }
        debug!("opened archive with {} entries", entries.len());

        Ok(Self {
            entries,
            comment: String::from_utf8_lossy(&eocd.comment).into_owned(),
            raw_comment: eocd.comment,
            source: Some(source),
            registry,
        })
    }

    /// The archive comment. A comment that is not valid UTF-8 is shown
    /// lossily but saved with its original bytes until replaced.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.raw_comment = comment.as_bytes().to_vec();
        self.comment = comment.to_string();
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Look up a compression method by code in this archive's registry.
    pub fn method(&self, code: u16) -> Result<Arc<dyn CompressionMethod>> {
        self.registry
            .resolve(code)
            .ok_or(Error::UnsupportedMethod(code))
    }

    /// Whether the archive was read from a source rather than created empty.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entry> {
        self.entries.iter_mut()
    }

    /// Index of the entry called `name` (after normalization).
    pub fn find(&self, name: &str) -> Option<usize> {
        let name = normalize_name(name).ok()?;
        self.entries.iter().position(|e| e.full_name() == name)
    }

    /// Look up an entry for reading.
    pub fn entry(&self, name: &str) -> MaybeEntry<'_> {
        MaybeEntry::new(self, name)
    }

    /// Look up an entry for modification, creation or removal.
    pub fn entry_mut(&mut self, name: &str) -> MaybeEntryMut<'_> {
        MaybeEntryMut::new(self, name)
    }

    /// Append a new, empty entry. Fails if the name is taken.
    pub fn add_entry(&mut self, name: &str) -> Result<&mut Entry> {
        let normalized = normalize_name(name)?;
        if self.find(&normalized).is_some() {
            return Err(Error::EntryExists(normalized));
        }
        self.push_entry(Entry::new(&normalized, self.registry.clone())?);
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    /// Give the entry at `index` a new full name. Fails if another entry
    /// already has it.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn rename_entry(&mut self, index: usize, full_name: &str) -> Result<()> {
        let normalized = normalize_name(full_name)?;
        if self.find(&normalized).is_some_and(|existing| existing != index) {
            return Err(Error::EntryExists(normalized));
        }
        self.entries[index].set_full_name(&normalized)
    }

    pub(crate) fn push_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub(crate) fn replace_entry(&mut self, index: usize, entry: Entry) {
        self.entries[index] = entry;
    }

    /// Remove the entry at `index`; later entries move down by one.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    pub fn remove_entry(&mut self, index: usize) -> Entry {
        let mut entry = self.entries.remove(index);
        entry.close_raw_stream();
        entry.close_decompression_stream();
        entry
    }

    /// Serialize the whole archive at the current position of `out`.
    ///
    /// Local headers and data come first, in entry order, then the central
    /// directory, then the end record. Offsets are relative to the position
    /// `out` was at when the call started.
    pub fn write_to<W: Write + Seek>(&mut self, out: &mut W) -> Result<()> {
        let start = out.stream_position()?;

        for entry in &mut self.entries {
            entry.write_local_header(out, start)?;
        }

        let cd_start = out.stream_position()?;
        for entry in &mut self.entries {
            entry.write_central_header(out)?;
        }
        let cd_end = out.stream_position()?;

        let entry_count = u16::try_from(self.entries.len()).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} entries need ZIP64, which is not supported", self.entries.len()),
            )
        })?;
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entry_count,
            total_entries: entry_count,
            cd_size: length_u32(cd_end - cd_start, "central directory")?,
            cd_offset: length_u32(cd_start - start, "central directory offset")?,
            comment: self.raw_comment.clone(),
        };
        eocd.write(out)?;
        out.flush()?;

        debug!(
            "wrote {} entries, central directory at {} ({} bytes)",
            entry_count,
            eocd.cd_offset,
            eocd.cd_size
        );
        Ok(())
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries)
            .field("comment", &self.comment)
            .field("has_source", &self.has_source())
            .finish_non_exhaustive()
    }
}

impl Index<usize> for Archive {
    type Output = Entry;

    fn index(&self, index: usize) -> &Entry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for Archive {
    fn index_mut(&mut self, index: usize) -> &mut Entry {
        &mut self.entries[index]
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut Archive {
    type Item = &'a mut Entry;
    type IntoIter = std::slice::IterMut<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
