//! Error type shared by the fetch / extract script and the profile table.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    /// The HTTP client could not be set up (bad trust anchor, TLS backend, ...)
    #[error("could not initialise transport: {0}")]
    TransportInit(String),

    /// The download target could not be opened for writing
    #[error("could not open {} for writing: {source}", path.display())]
    DestinationOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The request failed or the server answered with a non-success status
    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    #[error("could not open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("could not read entry {index} of {}: {reason}", path.display())]
    ArchiveEntryRead {
        path: PathBuf,
        index: usize,
        reason: String,
    },

    /// Entry name is absolute or climbs out of the storage root
    #[error("archive entry '{name}' points outside the storage root")]
    UnsafeEntry { name: String },

    #[error("could not create directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The profile table failed to parse or validate
    #[error("profile table error: {0}")]
    Profiles(String),

    #[error("storage root {} is not mounted", path.display())]
    StorageMissing { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, SetupError>;

impl SetupError {
    pub fn transport_init(msg: impl Into<String>) -> Self {
        Self::TransportInit(msg.into())
    }

    pub fn transfer(url: &str, reason: impl ToString) -> Self {
        Self::Transfer {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn profiles(msg: impl Into<String>) -> Self {
        Self::Profiles(msg.into())
    }
}
