//! Read-only JSON index types produced by the out-of-scope codebase
//! indexer and consumed here as plain data (§1 non-goal: "it does not
//! parse source code; it consults pre-built index files").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    pub files: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleMap {
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractEntry {
    pub name: String,
    pub declared_paths: Vec<String>,
    pub shape: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsMap {
    pub contracts: Vec<ContractEntry>,
}

/// path -> list of exported symbol names (depth-1 hint, never a graph walk)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolIndex {
    pub exports: BTreeMap<String, Vec<String>>,
    /// path -> list of paths it imports
    pub imports: BTreeMap<String, Vec<String>>,
}

/// source path -> test file paths covering it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMap {
    pub map: BTreeMap<String, Vec<String>>,
}

impl ModuleMap {
    /// Entries whose files-set intersects `files` by exact path or
    /// path-prefix boundary — never a substring match.
    pub fn intersecting(&self, files: &[String]) -> Vec<&ModuleEntry> {
        self.modules
            .iter()
            .filter(|m| m.files.iter().any(|f| path_boundary_match(f, files)))
            .collect()
    }
}

impl ContractsMap {
    pub fn intersecting(&self, files: &[String]) -> Vec<&ContractEntry> {
        self.contracts
            .iter()
            .filter(|c| c.declared_paths.iter().any(|p| path_boundary_match(p, files)))
            .collect()
    }
}

/// True if `candidate` equals one of `files` or sits under one of them as
/// a directory-boundary prefix (`src/util` must not match `src/util-new`).
fn path_boundary_match(candidate: &str, files: &[String]) -> bool {
    files.iter().any(|f| {
        candidate == f
            || candidate.starts_with(&format!("{f}/"))
            || f.starts_with(&format!("{candidate}/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_boundary_match_rejects_substring_collision() {
        let files = vec!["src/util.ts".to_string()];
        assert!(!path_boundary_match("src/util-new.ts", &files));
        assert!(path_boundary_match("src/util.ts", &files));
    }

    #[test]
    fn module_map_intersecting_respects_boundary() {
        let map = ModuleMap {
            modules: vec![ModuleEntry {
                name: "util".into(),
                files: vec!["src/util.ts".into()],
                summary: String::new(),
            }],
        };
        assert_eq!(map.intersecting(&["src/util-new.ts".to_string()]).len(), 0);
        assert_eq!(map.intersecting(&["src/util.ts".to_string()]).len(), 1);
    }
}
