//! Scar Registry (C7): the failure-learning feedback loop. Every rollback
//! or three-consecutive-failure escalation appends a scar with exactly one
//! derived prevention rule; active rules are injected into subsequent
//! context packets' `scarsDigest` slot.
//!
//! Grounded in `patterns/learning.rs`'s "read project history, derive
//! durable facts, persist to a small file" shape, narrowed from that
//! module's whole-project pattern snapshot down to the spec's single
//! append-only, monotonically-growing scar list.

use crate::errors::StoreError;
use crate::store::WorkspaceStore;
use forge_common::scar::{Scar, ScarCategory};

pub struct ScarRegistry<'a> {
    store: &'a WorkspaceStore,
}

impl<'a> ScarRegistry<'a> {
    pub fn new(store: &'a WorkspaceStore) -> Self {
        Self { store }
    }

    /// Append a new scar (provisional or promoted) to the registry.
    pub fn append(&self, scar: Scar) -> Result<(), StoreError> {
        let mut scars = self.store.read_scars()?;
        scars.push(scar);
        self.store.write_scars(&scars)
    }

    /// Record a rollback: always creates a provisional scar referencing
    /// the checkpoint that was targeted.
    pub fn record_rollback(
        &self,
        description: impl Into<String>,
        root_cause: impl Into<String>,
        prevention_rule: impl Into<String>,
        checkpoint_id: String,
    ) -> Result<Scar, StoreError> {
        let scar = Scar::new(
            ScarCategory::Implementation,
            description,
            root_cause,
            "rolled back to pre-task checkpoint",
            prevention_rule,
        )
        .provisional(Some(checkpoint_id));
        self.append(scar.clone())?;
        Ok(scar)
    }

    /// Record a three-consecutive-failures escalation (no rollback target,
    /// still provisional until the Loop Controller promotes it in UNIFY).
    pub fn record_escalation(
        &self,
        task_id: &str,
        last_failure_reason: impl Into<String>,
        prevention_rule: impl Into<String>,
    ) -> Result<Scar, StoreError> {
        let scar = Scar::new(
            ScarCategory::Process,
            format!("task {task_id} hit three consecutive failures"),
            last_failure_reason,
            "escalated to architect review",
            prevention_rule,
        )
        .provisional(None);
        self.append(scar.clone())?;
        Ok(scar)
    }

    /// Promote every provisional scar whose checkpoint is no longer open,
    /// called from UNIFY once a plan's loop completes cleanly.
    pub fn promote_all(&self) -> Result<(), StoreError> {
        let mut scars = self.store.read_scars()?;
        for s in &mut scars {
            s.promote();
        }
        self.store.write_scars(&scars)
    }

    pub fn list_all(&self) -> Result<Vec<Scar>, StoreError> {
        self.store.read_scars()
    }

    pub fn list_active_rules(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .read_scars()?
            .into_iter()
            .map(|s| s.prevention_rule)
            .collect())
    }

    /// Checkpoint IDs that must never be evicted because an open
    /// (provisional) scar still references them.
    pub fn open_checkpoint_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .read_scars()?
            .into_iter()
            .filter(|s| s.is_open())
            .filter_map(|s| s.checkpoint_id)
            .collect())
    }

    /// Render the scars digest consumed by the Context Packet Builder:
    /// one line per active prevention rule, newest first.
    pub fn render_digest(&self) -> Result<String, StoreError> {
        let mut scars = self.store.read_scars()?;
        scars.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(scars
            .into_iter()
            .map(|s| format!("- {}", s.prevention_rule))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> WorkspaceStore {
        let s = WorkspaceStore::open(dir);
        s.initialise("demo").unwrap();
        s
    }

    #[test]
    fn record_rollback_creates_provisional_scar_referencing_checkpoint() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let registry = ScarRegistry::new(&store);
        let scar = registry
            .record_rollback("bad migration", "missing index", "always run migrations in a transaction", "cp-1".to_string())
            .unwrap();
        assert!(scar.is_open());
        assert_eq!(scar.checkpoint_id, Some("cp-1".to_string()));
    }

    #[test]
    fn open_checkpoint_ids_excludes_promoted_scars() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let registry = ScarRegistry::new(&store);
        registry
            .record_rollback("d", "c", "rule", "cp-1".to_string())
            .unwrap();
        assert_eq!(registry.open_checkpoint_ids().unwrap(), vec!["cp-1".to_string()]);
        registry.promote_all().unwrap();
        assert!(registry.open_checkpoint_ids().unwrap().is_empty());
    }

    #[test]
    fn render_digest_lists_prevention_rules_newest_first() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let registry = ScarRegistry::new(&store);
        registry.record_escalation("t1", "timeout", "add retry budget").unwrap();
        registry.record_escalation("t2", "crash", "validate input first").unwrap();
        let digest = registry.render_digest().unwrap();
        assert!(digest.starts_with("- validate input first"));
    }
}
