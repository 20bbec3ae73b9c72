//! One-call operations on an archive file on disk.
//!
//! Every modifying operation writes the whole archive to `<archive>.tmp`,
//! then replaces the original with it.

use log::debug;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::method::Deflate;

use super::archive::Archive;
use super::entry::CompressionMode;
use super::lookup::{CreateMode, RemoveMode};

/// How [`ZipFile::add_file`] stores a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    /// Compression method code
    pub method: u16,
    pub password: Option<String>,
    pub data_descriptor: bool,
    pub mode: CompressionMode,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            method: Deflate::CODE,
            password: None,
            data_descriptor: false,
            mode: CompressionMode::Deferred,
        }
    }
}

impl AddOptions {
    /// Deflate with a password. The data descriptor is turned on so the
    /// encryption header does not depend on the CRC-32.
    pub fn encrypted(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            data_descriptor: true,
            ..Self::default()
        }
    }
}

/// An archive file addressed by path.
#[derive(Debug, Clone)]
pub struct ZipFile {
    path: PathBuf,
}

impl ZipFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the archive, creating an empty file first if there is none.
    pub fn open(&self) -> Result<Archive> {
        if !self.path.exists() {
            debug!("creating empty archive {}", self.path.display());
            File::create(&self.path)?;
        }
        if fs::metadata(&self.path)?.len() == 0 {
            return Ok(Archive::new());
        }
        Archive::open_path(&self.path)
    }

    /// Add `file` under `name` (its file name if `None`), replacing any entry
    /// with the same name.
    pub fn add_file(&self, file: &Path, name: Option<&str>, options: &AddOptions) -> Result<()> {
        let name = match name {
            Some(name) => name.to_string(),
            None => file
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| Error::InvalidFileName(file.display().to_string()))?,
        };

        let mut archive = self.open()?;
        let method = archive.method(options.method)?;
        let input = File::open(file)?;
        let modified = input
            .metadata()?
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);

        let mut lookup = archive.entry_mut(&name);
        let entry = lookup.create(CreateMode::Overwrite)?.get_mut()?;
        if let Some(seconds) = modified {
            entry.set_last_write_time(seconds);
        }
        entry.set_password(options.password.as_deref());
        entry.use_data_descriptor(options.data_descriptor);
        entry.set_compression_stream(input, method, options.mode)?;

        debug!("adding {} as {name}", file.display());
        self.rewrite(archive)
    }

    pub fn add_encrypted_file(&self, file: &Path, name: Option<&str>, password: &str) -> Result<()> {
        self.add_file(file, name, &AddOptions::encrypted(password))
    }

    /// Decompress the entry `name` into `destination`, creating parent
    /// directories as needed.
    ///
    /// Fails with [`Error::WrongPassword`] when the entry cannot be opened,
    /// which includes a missing password.
    pub fn extract_file(&self, name: &str, destination: &Path, password: Option<&str>) -> Result<()> {
        let mut archive = self.open()?;
        let mut lookup = archive.entry_mut(name);
        let entry = lookup.get_mut()?;
        if password.is_some() {
            entry.set_password(password);
        }

        if entry.is_directory() {
            fs::create_dir_all(destination)?;
            return Ok(());
        }

        let full_name = entry.full_name().to_string();
        let Some(stream) = entry.decompression_stream()? else {
            return Err(Error::WrongPassword(full_name));
        };

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut out = File::create(destination)?;
        let written = io::copy(stream, &mut out)?;
        debug!("extracted {full_name} ({written} bytes) to {}", destination.display());
        Ok(())
    }

    pub fn extract_encrypted_file(&self, name: &str, destination: &Path, password: &str) -> Result<()> {
        self.extract_file(name, destination, Some(password))
    }

    /// Remove the entry `name`; fails if there is none.
    pub fn remove_entry(&self, name: &str) -> Result<()> {
        let mut archive = self.open()?;
        archive.entry_mut(name).remove(RemoveMode::FailIfNotExists)?;
        self.rewrite(archive)
    }

    /// Set the archive comment.
    pub fn set_comment(&self, comment: &str) -> Result<()> {
        let mut archive = self.open()?;
        archive.set_comment(comment);
        self.rewrite(archive)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Save `archive` over the file it was loaded from.
    pub fn rewrite(&self, mut archive: Archive) -> Result<()> {
        let temp = self.temp_path();
        let written = write_archive(&mut archive, &temp);
        // The source file stays open until every entry is gone.
        drop(archive);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        fs::remove_file(&self.path)?;
        fs::rename(&temp, &self.path)?;
        debug!("replaced {}", self.path.display());
        Ok(())
    }
}

fn write_archive(archive: &mut Archive, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    archive.write_to(&mut out)?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}
