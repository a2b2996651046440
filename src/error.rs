use std::fmt::Display;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Settings that can never be valid, e.g. both duplicate policies enabled.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cataloging was asked for something without a usable path or file type.
    #[error("invalid episode: {0}")]
    InvalidEpisode(String),

    /// A metadata, torrent or magnet lookup failed or returned garbage.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("filesystem error at {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn collaborator(err: impl Display) -> Self {
        Error::Collaborator(format!("{err:#}"))
    }

    pub fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Errors that batches record and skip past instead of halting on.
    pub fn is_per_item(&self) -> bool {
        matches!(self, Error::InvalidEpisode(_) | Error::FileSystem { .. })
    }
}
