//! # zipcodec
//!
//! Read, edit and write ZIP archives.
//!
//! An [`Archive`] is loaded from any random-access source. Entries read their
//! data lazily from that source through bounded views, so listing a large
//! archive only touches its central directory. Entries can be added, renamed,
//! removed and given new contents; saving writes the whole archive to any
//! seekable sink and copies untouched entries without recompressing them.
//!
//! ## Features
//!
//! - STORED, DEFLATE and LZMA compression, extensible through [`MethodRegistry`]
//! - Traditional PKWARE ("ZipCrypto") encryption
//! - Data descriptors, entry and archive comments, MS-DOS attributes
//! - Immediate or deferred compression of new data
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::sync::Arc;
//! use zipcodec::{Archive, CompressionMode, method::Deflate};
//!
//! fn main() -> zipcodec::Result<()> {
//!     let mut archive = Archive::new();
//!     archive.add_entry("docs/")?;
//!     archive.add_entry("docs/readme.txt")?.set_compression_stream(
//!         b"hello".to_vec(),
//!         Arc::new(Deflate::default()),
//!         CompressionMode::Deferred,
//!     )?;
//!
//!     let mut out = Cursor::new(Vec::new());
//!     archive.write_to(&mut out)?;
//!
//!     let mut reopened = Archive::open_seekable(Cursor::new(out.into_inner()))?;
//!     for entry in &mut reopened {
//!         let data = entry.read_to_vec()?;
//!         println!("{} {:?}", entry.full_name(), data);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod method;
pub mod stream;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{LocalFileReader, ReadAt, SeekableReader};
pub use method::{CompressionMethod, MethodRegistry};
pub use zip::{
    AddOptions, Archive, Attributes, CompressionMode, CreateMode, Entry, InputSource,
    MaybeEntry, MaybeEntryMut, RemoveMode, ZipFile,
};
