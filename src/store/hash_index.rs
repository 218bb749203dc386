//! A hash-index of canonical source files, used by the Store to detect
//! drift between what the codebase indexer last saw and the working tree
//! (a brand-new-project check feeds the Context Packet Builder's
//! `MissingIndex` decision).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashIndex {
    /// path (relative to project root) -> hex sha256 of file contents
    pub entries: BTreeMap<String, String>,
}

impl HashIndex {
    /// Build an index over every file under `root` (recursively), skipping
    /// the workspace directory itself and common VCS/build directories.
    pub fn build(root: &Path, workspace_dir_name: &str) -> Self {
        let mut entries = BTreeMap::new();
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_excluded(e, workspace_dir_name))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                continue;
            };
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let digest = format!("{:x}", hasher.finalize());
            if let Ok(rel) = entry.path().strip_prefix(root) {
                entries.insert(rel.to_string_lossy().to_string(), digest);
            }
        }
        Self { entries }
    }

    /// Paths present in `self` but with a different hash (or absent) in
    /// `other` — i.e. files that changed since `other` was captured.
    pub fn diff(&self, other: &HashIndex) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(path, hash)| other.entries.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_excluded(entry: &walkdir::DirEntry, workspace_dir_name: &str) -> bool {
    let name = entry.file_name().to_string_lossy();
    name == workspace_dir_name || name == ".git" || name == "target" || name == "node_modules"
}
