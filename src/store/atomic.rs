//! Atomic write-to-temp-then-rename, with a per-file exclusive lock
//! enforcing the Workspace Store's single-writer discipline.
//!
//! Grounded in `audit/logger.rs`'s `save_current()`, which wrote directly
//! with `fs::write` — a gap relative to the write-to-temp-then-rename
//! requirement this component must satisfy. `fs2` supplies the advisory
//! lock; `rename` within the same directory is atomic on the filesystems
//! this tool targets.

use crate::errors::StoreError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Write `contents` to `path` atomically: serialize to a sibling temp
/// file, fsync, then rename over the destination. Takes an exclusive
/// advisory lock on the destination (creating it if absent) for the
/// duration of the write so concurrent writers within this process or a
/// sibling process serialize on this file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path_or_sibling_lock(path))
        .map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    lock_file
        .lock_exclusive()
        .map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

    let tmp_path = sibling_temp_path(path);
    {
        let mut tmp = File::create(&tmp_path).map_err(|source| StoreError::AtomicWriteFailed {
            path: tmp_path.clone(),
            source,
        })?;
        tmp.write_all(contents)
            .map_err(|source| StoreError::AtomicWriteFailed {
                path: tmp_path.clone(),
                source,
            })?;
        tmp.sync_all()
            .map_err(|source| StoreError::AtomicWriteFailed {
                path: tmp_path.clone(),
                source,
            })?;
    }

    fs::rename(&tmp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;

    FileExt::unlock(&lock_file).ok();
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let body =
        serde_json::to_vec_pretty(value).map_err(|source| StoreError::MalformedJson {
            path: path.to_path_buf(),
            source,
        })?;
    write_atomic(path, &body)
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::MalformedJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Append one line to an append-only NDJSON file, taking the same
/// exclusive lock so concurrent appenders don't interleave writes.
pub fn append_ndjson_line(path: &Path, line: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    file.lock_exclusive()
        .map_err(|source| StoreError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
    writeln!(file, "{line}").map_err(|source| StoreError::AtomicWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    FileExt::unlock(&file).ok();
    Ok(())
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
}

fn path_or_sibling_lock(path: &Path) -> std::path::PathBuf {
    if path.exists() {
        path.to_path_buf()
    } else {
        path.with_extension("lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_creates_parent_dirs_and_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn write_atomic_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, b"hello").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.contains(".tmp-"))
            .collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn write_json_atomic_round_trips() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Thing {
            n: u32,
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("thing.json");
        write_json_atomic(&path, &Thing { n: 7 }).unwrap();
        let round: Thing = read_json(&path).unwrap();
        assert_eq!(round, Thing { n: 7 });
    }

    #[test]
    fn append_ndjson_line_appends_multiple_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.ndjson");
        append_ndjson_line(&path, r#"{"a":1}"#).unwrap();
        append_ndjson_line(&path, r#"{"a":2}"#).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
