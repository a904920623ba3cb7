use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const PARTIAL_SUFFIX: &str = ".partial";

/// Writes `contents` next to `path`, flushes it to disk, then renames it over `path`.
///
/// The previous file at `path` stays in place until the rename succeeds. `fs::rename`
/// replaces an existing destination on every supported platform, so the old slot is
/// never removed ahead of the new one.
pub(crate) fn replace_slot_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path_for(path);
    if let Err(error) = write_synced(&partial, contents.as_bytes()) {
        discard(&partial);
        return Err(error);
    }
    commit_partial(&partial, path)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Only the partial file is cleaned up on failure.
fn commit_partial(partial: &Path, path: &Path) -> io::Result<()> {
    fs::rename(partial, path).map_err(|error| {
        discard(partial);
        error
    })
}

fn discard(partial: &Path) {
    if partial.is_file() {
        let _ = fs::remove_file(partial);
    }
}

/// `<dir>/<slot>.save.json.partial`; never matches the slot listing suffix.
fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
