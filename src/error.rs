use std::{io, path::PathBuf};
use thiserror::Error;

/// Why a save file could not be turned into a pet.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("could not read save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("save file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("save file {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}
