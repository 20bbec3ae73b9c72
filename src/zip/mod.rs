//! ZIP archive reading, editing and writing.
//!
//! ## Architecture
//!
//! - `structures`: on-disk records (EOCD, central and local headers, data descriptor)
//! - [`ZipParser`]: locating and decoding those records from a random-access source
//! - [`Entry`]: one file or directory, with lazily opened data streams
//! - [`Archive`]: the ordered entry list plus the archive comment, and saving
//! - [`Lookup`]: find-or-create handles returned by [`Archive::entry_mut`]
//! - [`ZipFile`]: one-call helpers working on an archive file on disk
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD, then the Central Directory; entry data is
//! only touched when a stream is opened or the archive is saved.
//!
//! ## Supported Features
//!
//! - STORED, DEFLATE and LZMA methods, more through [`MethodRegistry`](crate::method::MethodRegistry)
//! - Traditional PKWARE encryption
//! - Data descriptors
//!
//! ## Limitations
//!
//! - No ZIP64, no multi-disk archives

mod archive;
mod attributes;
mod entry;
mod file;
mod lookup;
mod parser;
mod structures;
mod time;

pub use archive::Archive;
pub use attributes::*;
pub use entry::{CompressionMode, Entry, InputSource, ReadSeek, normalize_name};
pub use file::{AddOptions, ZipFile};
pub use lookup::{CreateMode, Lookup, MaybeEntry, MaybeEntryMut, RemoveMode};
pub use parser::ZipParser;
pub use structures::*;
pub use time::DosDateTime;
