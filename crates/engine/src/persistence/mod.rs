mod atomic_io;
mod coordinator;
mod snapshot;
mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use coordinator::SaveCoordinator;
pub use snapshot::{
    SaveFile, SavedLocation, SavedObjective, SavedQuest, SessionSnapshot, SAVE_VERSION,
};
pub use store::{
    validate_slot_name, FileSlotStore, MemorySlotStore, SlotStore, MAX_SLOT_NAME_LEN,
    SAVE_FILE_SUFFIX,
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid save slot name '{0}': use 1-64 characters from A-Z, a-z, 0-9, '_' and '-'")]
    InvalidSlotName(String),
    #[error("save slot '{0}' does not exist")]
    SlotNotFound(String),
    #[error("save io failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
    #[error("save checksum mismatch: header says {expected}, snapshot hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}
