use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::atomic_io::replace_slot_file;
use super::PersistenceError;

pub const SAVE_FILE_SUFFIX: &str = ".save.json";
pub const MAX_SLOT_NAME_LEN: usize = 64;

/// Where serialized saves live. Implementations never see an unvalidated slot name.
pub trait SlotStore {
    /// Slot names, sorted.
    fn list(&self) -> Result<Vec<String>, PersistenceError>;
    fn read(&self, slot: &str) -> Result<String, PersistenceError>;
    /// Replaces the slot as a whole; readers never observe a partial write.
    fn write(&mut self, slot: &str, contents: &str) -> Result<(), PersistenceError>;
    fn delete(&mut self, slot: &str) -> Result<(), PersistenceError>;
}

pub fn validate_slot_name(slot: &str) -> Result<(), PersistenceError> {
    let valid = !slot.is_empty()
        && slot.len() <= MAX_SLOT_NAME_LEN
        && slot
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidSlotName(slot.to_string()))
    }
}

/// One `<slot>.save.json` file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}{SAVE_FILE_SUFFIX}"))
    }

    fn io_error(path: &Path, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SlotStore for FileSlotStore {
    fn list(&self) -> Result<Vec<String>, PersistenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(Self::io_error(&self.dir, error)),
        };

        let mut slots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| Self::io_error(&self.dir, error))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(slot) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(SAVE_FILE_SUFFIX))
            else {
                continue;
            };
            if validate_slot_name(slot).is_ok() {
                slots.push(slot.to_string());
            }
        }
        slots.sort();
        Ok(slots)
    }

    fn read(&self, slot: &str) -> Result<String, PersistenceError> {
        let path = self.path_for(slot);
        fs::read_to_string(&path).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                PersistenceError::SlotNotFound(slot.to_string())
            } else {
                Self::io_error(&path, error)
            }
        })
    }

    fn write(&mut self, slot: &str, contents: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(slot);
        replace_slot_file(&path, contents).map_err(|error| Self::io_error(&path, error))
    }

    fn delete(&mut self, slot: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(slot);
        fs::remove_file(&path).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                PersistenceError::SlotNotFound(slot.to_string())
            } else {
                Self::io_error(&path, error)
            }
        })
    }
}

/// Keeps saves in memory; handy for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    slots: BTreeMap<String, String>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn list(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.slots.keys().cloned().collect())
    }

    fn read(&self, slot: &str) -> Result<String, PersistenceError> {
        self.slots
            .get(slot)
            .cloned()
            .ok_or_else(|| PersistenceError::SlotNotFound(slot.to_string()))
    }

    fn write(&mut self, slot: &str, contents: &str) -> Result<(), PersistenceError> {
        self.slots.insert(slot.to_string(), contents.to_string());
        Ok(())
    }

    fn delete(&mut self, slot: &str) -> Result<(), PersistenceError> {
        self.slots
            .remove(slot)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::SlotNotFound(slot.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn slot_names_are_restricted() {
        for valid in ["a", "slot_1", "Auto-Save", "x".repeat(MAX_SLOT_NAME_LEN).as_str()] {
            assert!(validate_slot_name(valid).is_ok(), "{valid}");
        }
        for invalid in ["", "../escape", "two words", "dot.name", "x".repeat(65).as_str()] {
            assert!(
                matches!(
                    validate_slot_name(invalid),
                    Err(PersistenceError::InvalidSlotName(_))
                ),
                "{invalid}"
            );
        }
    }

    #[test]
    fn file_store_lists_only_save_files() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileSlotStore::new(temp.path().join("saves"));
        assert!(store.list().expect("list missing dir").is_empty());

        store.write("beta", "{}").expect("write beta");
        store.write("alpha", "{}").expect("write alpha");
        fs::write(store.dir().join("notes.txt"), "ignored").expect("write stray");
        fs::write(store.dir().join("bad name.save.json"), "{}").expect("write bad");

        assert_eq!(store.list().expect("list"), vec!["alpha", "beta"]);
    }

    #[test]
    fn file_store_reports_missing_slots() {
        let temp = TempDir::new().expect("temp");
        let mut store = FileSlotStore::new(temp.path());

        assert!(matches!(
            store.read("ghost"),
            Err(PersistenceError::SlotNotFound(slot)) if slot == "ghost"
        ));
        assert!(matches!(
            store.delete("ghost"),
            Err(PersistenceError::SlotNotFound(_))
        ));

        store.write("real", "payload").expect("write");
        assert_eq!(store.read("real").expect("read"), "payload");
        store.delete("real").expect("delete");
        assert!(!store.path_for("real").exists());
    }

    #[test]
    fn memory_store_behaves_like_file_store() {
        let mut store = MemorySlotStore::new();
        store.write("b", "2").expect("write");
        store.write("a", "1").expect("write");
        store.write("a", "3").expect("overwrite");

        assert_eq!(store.list().expect("list"), vec!["a", "b"]);
        assert_eq!(store.read("a").expect("read"), "3");
        store.delete("a").expect("delete");
        assert!(matches!(
            store.delete("a"),
            Err(PersistenceError::SlotNotFound(_))
        ));
    }
}
