//! Error types for zipcodec

use thiserror::Error;

/// Main error type for archive operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a valid ZIP file: end of central directory not found")]
    MissingEndOfCentralDirectory,

    #[error("Bad file name: {0:?}")]
    InvalidFileName(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry already exists: {0}")]
    EntryExists(String),

    #[error("Local file header not found for entry: {0}")]
    MissingLocalHeader(String),

    #[error("Directory entry cannot hold data: {0}")]
    DirectoryData(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedMethod(u16),

    #[error("Wrong password for entry: {0}")]
    WrongPassword(String),

    #[error("Input stream must be seekable to compute the CRC-32 before encryption")]
    UnseekableInput,

    #[error("Forward-only input of entry {0} was already read by an earlier save")]
    InputConsumed(String),
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;
