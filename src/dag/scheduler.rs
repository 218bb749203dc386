//! Wave Scheduler (C4): validates a task graph and drives it wave by wave.
//!
//! Grounded in `DagScheduler::compute_waves`/`mark_running`/`mark_failed`,
//! generalized from the teacher's dynamically-computed `PhaseStatus` waves
//! to the spec's pre-assigned `TaskNode::wave` numbers: a plan already
//! states which wave each task belongs to, so the scheduler's job is to
//! validate that assignment (acyclic, file-disjoint per wave) and to
//! enforce the three-consecutive-failures and resume rules at runtime
//! instead of computing waves itself.

use crate::checkpoint::CheckpointManager;
use crate::errors::SchedulerError;
use forge_common::task::{TaskGraph, TaskNode, TaskStatus};
use std::collections::{HashMap, HashSet};

pub struct WaveScheduler<'a> {
    graph: &'a mut TaskGraph,
}

impl<'a> WaveScheduler<'a> {
    pub fn new(graph: &'a mut TaskGraph) -> Self {
        Self { graph }
    }

    /// Validate the graph before any dispatch: every dependency must name
    /// a real task in a strictly earlier wave, the dependency relation
    /// must be acyclic, and no two tasks in the same wave may declare the
    /// same file.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let by_id: HashMap<&str, &TaskNode> = self.graph.nodes_by_id();

        for node in &self.graph.nodes {
            for dep in &node.dependencies {
                let Some(dep_node) = by_id.get(dep.as_str()) else {
                    return Err(SchedulerError::UnknownDependency {
                        task: node.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if dep_node.wave >= node.wave {
                    return Err(SchedulerError::DependencyWaveViolation {
                        task: node.id.clone(),
                        task_wave: node.wave,
                        dependency: dep.clone(),
                        dependency_wave: dep_node.wave,
                    });
                }
            }
        }

        detect_cycle(&self.graph.nodes, &by_id)?;

        for wave in 0..self.graph.wave_count {
            check_wave_disjoint(self.graph.nodes_in_wave(wave), wave)?;
        }

        Ok(())
    }

    /// Tasks in `wave` whose dependencies are all completed (or deferred)
    /// and that are themselves still pending.
    pub fn ready_in_wave(&self, wave: u32) -> Vec<&TaskNode> {
        let by_id = self.graph.nodes_by_id();
        self.graph
            .nodes_in_wave(wave)
            .filter(|n| n.status == TaskStatus::Pending)
            .filter(|n| {
                n.dependencies.iter().all(|d| {
                    by_id
                        .get(d.as_str())
                        .map(|dep| dep.status.is_terminal())
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    pub fn mark_running(&mut self, task_id: &str) {
        if let Some(n) = self.graph.find_mut(task_id) {
            n.status = TaskStatus::Running;
        }
    }

    pub fn mark_completed(&mut self, task_id: &str) {
        if let Some(n) = self.graph.find_mut(task_id) {
            n.status = TaskStatus::Completed;
        }
    }

    /// Record a failed dispatch. Returns an error once the task has hit
    /// the three-consecutive-failures limit so the Loop Controller can
    /// surface a checkpoint.
    pub fn mark_failed(&mut self, task_id: &str) -> Result<(), SchedulerError> {
        let Some(n) = self.graph.find_mut(task_id) else {
            return Ok(());
        };
        n.mark_failed();
        if n.is_three_consecutive_failures() {
            return Err(SchedulerError::ThreeConsecutiveFailures {
                task: task_id.to_string(),
            });
        }
        Ok(())
    }

    /// Called once at startup (§4.4): any task left `Running` from a prior
    /// session that crashed mid-dispatch is reconciled to `Completed` if a
    /// spot-check against its recorded `pre_run_ref` passes (the worker
    /// did finish, only the process's own exit was lost), else reverted
    /// to `Pending` with the failure counter incremented. A task with no
    /// recorded `pre_run_ref`, or no checkpoint manager available at all,
    /// cannot be spot-checked and is treated as a failed attempt.
    pub fn reconcile_resumed(&mut self, checkpoint_mgr: Option<&CheckpointManager>) {
        for n in &mut self.graph.nodes {
            if n.status != TaskStatus::Running {
                continue;
            }
            let spot_check_passed = match (checkpoint_mgr, n.pre_run_ref.as_deref()) {
                (Some(mgr), Some(pre_run_ref)) => mgr.spot_check(pre_run_ref, &[]).unwrap_or(false),
                _ => false,
            };
            if spot_check_passed {
                n.status = TaskStatus::Completed;
            } else {
                n.status = TaskStatus::Pending;
                n.failure_count = n.failure_count.saturating_add(1);
            }
        }
    }

    pub fn wave_is_complete(&self, wave: u32) -> bool {
        self.graph
            .nodes_in_wave(wave)
            .all(|n| n.status.is_terminal() || n.status == TaskStatus::Blocked)
    }
}

fn check_wave_disjoint<'a>(
    nodes: impl Iterator<Item = &'a TaskNode>,
    wave: u32,
) -> Result<(), SchedulerError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for n in nodes {
        for f in &n.declared_files {
            if let Some(prior) = seen.get(f.as_str()) {
                return Err(SchedulerError::WaveFileCollision {
                    wave,
                    task_a: (*prior).to_string(),
                    task_b: n.id.clone(),
                    file: f.clone(),
                });
            }
            seen.insert(f.as_str(), n.id.as_str());
        }
    }
    Ok(())
}

fn detect_cycle(
    nodes: &[TaskNode],
    by_id: &HashMap<&str, &TaskNode>,
) -> Result<(), SchedulerError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = nodes.iter().map(|n| (n.id.as_str(), Mark::Unvisited)).collect();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a TaskNode>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), SchedulerError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(SchedulerError::CycleDetected { task: id.to_string() })
            }
            _ => {}
        }
        marks.insert(id, Mark::InProgress);
        if let Some(node) = by_id.get(id) {
            for dep in &node.dependencies {
                visit(dep.as_str(), by_id, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut seen_marks: HashSet<&str> = HashSet::new();
    for id in ids {
        if seen_marks.contains(id) {
            continue;
        }
        visit(id, by_id, &mut marks)?;
        seen_marks.insert(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::task::{RiskTier, TddMode};

    fn node(id: &str, wave: u32, deps: &[&str], files: &[&str]) -> TaskNode {
        TaskNode {
            id: id.to_string(),
            description: "desc".to_string(),
            wave,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            declared_files: files.iter().map(|s| s.to_string()).collect(),
            risk_tier: RiskTier::Low,
            tdd_mode: TddMode::Standard,
            skip_justification: None,
            acceptance_criteria: vec![],
            status: TaskStatus::Pending,
            failure_count: 0,
            pre_run_ref: None,
            deviations: vec![],
            deferred_items: vec![],
        }
    }

    #[test]
    fn validate_rejects_unknown_dependency() {
        let mut g = TaskGraph::new("auth", 1, vec![node("t1", 0, &["ghost"], &["a.rs"])]);
        let s = WaveScheduler::new(&mut g);
        assert!(matches!(s.validate(), Err(SchedulerError::UnknownDependency { .. })));
    }

    #[test]
    fn validate_rejects_file_collision_within_a_wave() {
        let mut g = TaskGraph::new(
            "auth",
            1,
            vec![node("t1", 0, &[], &["a.rs"]), node("t2", 0, &[], &["a.rs"])],
        );
        let s = WaveScheduler::new(&mut g);
        assert!(matches!(s.validate(), Err(SchedulerError::WaveFileCollision { .. })));
    }

    #[test]
    fn validate_rejects_cycles() {
        let mut g = TaskGraph::new(
            "auth",
            1,
            vec![node("t1", 0, &["t2"], &["a.rs"]), node("t2", 0, &["t1"], &["b.rs"])],
        );
        let s = WaveScheduler::new(&mut g);
        assert!(matches!(s.validate(), Err(SchedulerError::CycleDetected { .. })));
    }

    #[test]
    fn ready_in_wave_waits_for_dependency_completion() {
        let mut g = TaskGraph::new(
            "auth",
            1,
            vec![node("t1", 0, &[], &["a.rs"]), node("t2", 1, &["t1"], &["b.rs"])],
        );
        let s = WaveScheduler::new(&mut g);
        assert_eq!(s.ready_in_wave(1).len(), 0);
    }

    #[test]
    fn ready_in_wave_allows_task_once_dependency_completed() {
        let mut g = TaskGraph::new(
            "auth",
            1,
            vec![node("t1", 0, &[], &["a.rs"]), node("t2", 1, &["t1"], &["b.rs"])],
        );
        g.find_mut("t1").unwrap().status = TaskStatus::Completed;
        let s = WaveScheduler::new(&mut g);
        assert_eq!(s.ready_in_wave(1).len(), 1);
    }

    #[test]
    fn mark_failed_three_times_returns_error() {
        let mut g = TaskGraph::new("auth", 1, vec![node("t1", 0, &[], &["a.rs"])]);
        let mut s = WaveScheduler::new(&mut g);
        s.mark_failed("t1").unwrap();
        s.mark_failed("t1").unwrap();
        assert!(matches!(
            s.mark_failed("t1"),
            Err(SchedulerError::ThreeConsecutiveFailures { .. })
        ));
    }

    #[test]
    fn reconcile_resumed_without_a_checkpoint_manager_reverts_to_pending_and_counts_a_failure() {
        let mut g = TaskGraph::new("auth", 1, vec![node("t1", 0, &[], &["a.rs"])]);
        g.find_mut("t1").unwrap().status = TaskStatus::Running;
        let mut s = WaveScheduler::new(&mut g);
        s.reconcile_resumed(None);
        let t1 = g.find("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::Pending);
        assert_eq!(t1.failure_count, 1);
    }

    #[test]
    fn reconcile_resumed_completes_a_running_task_whose_spot_check_passes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("a.rs")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("test", "test@test").unwrap();
        let pre_run_ref = repo
            .commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap()
            .to_string();
        std::fs::write(dir.path().join("a.rs"), "fn main() { println!(); }").unwrap();

        let mgr = crate::checkpoint::CheckpointManager::open(dir.path()).unwrap();
        let mut g = TaskGraph::new("auth", 1, vec![node("t1", 0, &[], &["a.rs"])]);
        {
            let n = g.find_mut("t1").unwrap();
            n.status = TaskStatus::Running;
            n.pre_run_ref = Some(pre_run_ref);
        }
        let mut s = WaveScheduler::new(&mut g);
        s.reconcile_resumed(Some(&mgr));
        assert_eq!(g.find("t1").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn validate_rejects_dependency_in_the_same_or_a_later_wave() {
        let mut g = TaskGraph::new(
            "auth",
            1,
            vec![node("t1", 0, &["t2"], &["a.rs"]), node("t2", 0, &[], &["b.rs"])],
        );
        g.wave_count = 1;
        let s = WaveScheduler::new(&mut g);
        assert!(matches!(
            s.validate(),
            Err(SchedulerError::DependencyWaveViolation { .. })
        ));
    }
}
