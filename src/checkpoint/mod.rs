//! Checkpoint Manager (C6): pre-task snapshots and rollback.
//!
//! Grounded in `tracker/git.rs`'s `GitTracker` (commit-based snapshot +
//! `diff_tree_to_workdir_with_index` change computation), generalized in
//! one deliberate way: the teacher commits onto `HEAD`, which this system
//! cannot do because `HEAD` advances intra-wave as other tasks complete.
//! Checkpoints here land on a private reference namespace,
//! `refs/forge/checkpoints/<id>`, created directly via `Repository::commit`
//! with that ref name instead of `"HEAD"`, leaving the working branch
//! untouched.

use crate::errors::CheckpointError;
use crate::store::WorkspaceStore;
use chrono::Utc;
use forge_common::checkpoint::Checkpoint;
use git2::{Delta, DiffOptions, Repository, Signature};
use std::path::{Path, PathBuf};

const CHECKPOINT_REF_PREFIX: &str = "refs/forge/checkpoints/";

pub struct CheckpointManager {
    repo: Repository,
    project_root: PathBuf,
}

impl CheckpointManager {
    pub fn open(project_root: &Path) -> Result<Self, CheckpointError> {
        let repo = Repository::open(project_root)?;
        Ok(Self {
            repo,
            project_root: project_root.to_path_buf(),
        })
    }

    /// Stage all changes, commit them onto a fresh private ref, and return
    /// the checkpoint record (the caller persists it via the Workspace
    /// Store and writes the JSON file under checkpoints/).
    pub fn create(&self, task_id: &str, reason: &str) -> Result<Checkpoint, CheckpointError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("forge", "forge@localhost")?;

        let checkpoint = Checkpoint::new(task_id, "", reason);
        let ref_name = format!("{CHECKPOINT_REF_PREFIX}{}", checkpoint.id);

        let parents: Vec<git2::Commit<'_>> = self.head_commit().into_iter().collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let commit_id = self.repo.commit(
            Some(&ref_name),
            &sig,
            &sig,
            &format!("[forge] checkpoint {} for task {task_id}: {reason}", checkpoint.id),
            &tree,
            &parent_refs,
        )?;

        Ok(Checkpoint {
            vcs_ref: commit_id.to_string(),
            ..checkpoint
        })
    }

    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo.head().ok().and_then(|h| h.peel_to_commit().ok())
    }

    /// Files changed between `pre_run_ref` and the current working tree,
    /// used by rung 1's undeclared-write check. Never diffs against
    /// `HEAD` directly — always against the ref recorded before dispatch.
    pub fn changed_files_since(&self, pre_run_ref: &str) -> Result<Vec<String>, CheckpointError> {
        let oid = git2::Oid::from_str(pre_run_ref).map_err(CheckpointError::Git)?;
        let commit = self.repo.find_commit(oid)?;
        let tree = commit.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true);
        let diff = self.repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

        let mut files = Vec::new();
        diff.foreach(
            &mut |delta, _progress| {
                if matches!(delta.status(), Delta::Added | Delta::Untracked | Delta::Modified | Delta::Deleted) {
                    if let Some(path) = delta.new_file().path() {
                        files.push(path.to_string_lossy().to_string());
                    }
                }
                true
            },
            None,
            None,
            None,
        )?;
        Ok(files)
    }

    /// Cheap, validator-free integrity check run synchronously on receipt
    /// of a completion claim: every path in `files_modified` must exist on
    /// disk, and the diff against `pre_run_ref` must be non-empty. Passing
    /// `files_modified` as `&[]` (as resume reconciliation does, since a
    /// crashed worker left no claim behind) skips the existence check and
    /// only asks whether anything changed at all.
    pub fn spot_check(&self, pre_run_ref: &str, files_modified: &[String]) -> Result<bool, CheckpointError> {
        for f in files_modified {
            if !self.project_root.join(f).is_file() {
                return Ok(false);
            }
        }
        let changed = self.changed_files_since(pre_run_ref)?;
        Ok(!changed.is_empty())
    }

    /// Reset the working tree to `checkpoint`'s commit and quarantine the
    /// diff that was about to be lost into `artifacts/rollback-<ts>/`.
    pub fn rollback(&self, checkpoint: &Checkpoint, store: &WorkspaceStore) -> Result<PathBuf, CheckpointError> {
        let oid = git2::Oid::from_str(&checkpoint.vcs_ref).map_err(CheckpointError::Git)?;
        let commit = self.repo.find_commit(oid)?;

        let quarantine_dir = self
            .project_root
            .join(".nexus")
            .join("07-artifacts")
            .join(format!("rollback-{}", Utc::now().format("%Y%m%dT%H%M%SZ")));
        std::fs::create_dir_all(&quarantine_dir).map_err(|e| CheckpointError::Git(git2::Error::from_str(&e.to_string())))?;

        let diff_files = self.changed_files_since(&checkpoint.vcs_ref)?;
        for rel in &diff_files {
            let src = self.project_root.join(rel);
            if src.is_file() {
                if let Some(parent) = quarantine_dir.join(rel).parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::copy(&src, quarantine_dir.join(rel));
            }
        }

        self.repo.reset(commit.as_object(), git2::ResetType::Hard, None)?;
        let _ = store;
        Ok(quarantine_dir)
    }

    /// Delete the checkpoint ref for an evicted checkpoint. Never call this
    /// for a checkpoint younger than 24h or referenced by an open scar —
    /// the caller (`prune`) enforces that.
    pub fn evict(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let ref_name = format!("{CHECKPOINT_REF_PREFIX}{}", checkpoint.id);
        let mut reference = self
            .repo
            .find_reference(&ref_name)
            .map_err(|_| CheckpointError::NotFound { id: checkpoint.id.clone() })?;
        reference.delete()?;
        Ok(())
    }

    /// Keep at most `max_retained` checkpoints, evicting oldest-first,
    /// skipping any younger than 24h or referenced by an open scar.
    pub fn prune(
        &self,
        checkpoints: &[Checkpoint],
        max_retained: usize,
        open_scar_checkpoint_ids: &[String],
    ) -> Result<Vec<String>, CheckpointError> {
        if checkpoints.len() <= max_retained {
            return Ok(vec![]);
        }
        let mut sorted: Vec<&Checkpoint> = checkpoints.iter().collect();
        sorted.sort_by_key(|c| c.created_at);

        let mut evicted = Vec::new();
        let overflow = checkpoints.len() - max_retained;
        for checkpoint in sorted {
            if evicted.len() >= overflow {
                break;
            }
            if checkpoint.younger_than_24h() {
                continue;
            }
            if open_scar_checkpoint_ids.contains(&checkpoint.id) {
                continue;
            }
            self.evict(checkpoint)?;
            evicted.push(checkpoint.id.clone());
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("a.txt"), "hello").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@test").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        repo
    }

    #[test]
    fn create_checkpoint_lands_on_private_ref_not_head() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();
        let head_before = mgr.head_commit().unwrap().id().to_string();

        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let checkpoint = mgr.create("t1", "pre-dispatch").unwrap();

        let head_after = mgr.head_commit().unwrap().id().to_string();
        assert_eq!(head_before, head_after, "HEAD must not move");
        assert_ne!(checkpoint.vcs_ref, head_after);

        let reference = mgr
            .repo
            .find_reference(&format!("{CHECKPOINT_REF_PREFIX}{}", checkpoint.id))
            .unwrap();
        assert_eq!(reference.target().unwrap().to_string(), checkpoint.vcs_ref);
    }

    #[test]
    fn changed_files_since_detects_new_file() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();
        let pre_run_ref = mgr.head_commit().unwrap().id().to_string();

        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let changed = mgr.changed_files_since(&pre_run_ref).unwrap();
        assert!(changed.contains(&"b.txt".to_string()));
    }

    #[test]
    fn spot_check_fails_when_declared_file_is_missing() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();
        let pre_run_ref = mgr.head_commit().unwrap().id().to_string();

        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let passed = mgr
            .spot_check(&pre_run_ref, &["c.txt".to_string()])
            .unwrap();
        assert!(!passed);
    }

    #[test]
    fn spot_check_fails_when_diff_is_empty() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();
        let pre_run_ref = mgr.head_commit().unwrap().id().to_string();

        let passed = mgr.spot_check(&pre_run_ref, &[]).unwrap();
        assert!(!passed);
    }

    #[test]
    fn spot_check_passes_when_files_exist_and_diff_is_non_empty() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();
        let pre_run_ref = mgr.head_commit().unwrap().id().to_string();

        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let passed = mgr
            .spot_check(&pre_run_ref, &["b.txt".to_string()])
            .unwrap();
        assert!(passed);
    }

    #[test]
    fn prune_skips_checkpoints_referenced_by_open_scars() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let mgr = CheckpointManager::open(dir.path()).unwrap();

        let mut checkpoints = Vec::new();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "x").unwrap();
            let mut c = mgr.create(&format!("t{i}"), "pre-dispatch").unwrap();
            c.created_at = Utc::now() - chrono::Duration::days(2);
            checkpoints.push(c);
        }
        let protected = checkpoints[0].id.clone();
        let evicted = mgr.prune(&checkpoints, 2, &[protected.clone()]).unwrap();
        assert!(!evicted.contains(&protected));
        assert_eq!(evicted.len(), 3);
    }
}
