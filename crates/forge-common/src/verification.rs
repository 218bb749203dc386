//! VerificationReport: the single JSON artefact written once per
//! verification ladder run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RungOutcome {
    Ok,
    Failed,
    Skipped,
    NotApplicable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationGap {
    /// Which truth or rung failed (a must-have ID, a rung name, ...).
    pub truth: String,
    pub reason: String,
    #[serde(default)]
    pub missing_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub rungs: Vec<(String, RungOutcome)>,
    pub gaps: Vec<VerificationGap>,
    pub merge_approved: bool,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self {
            rungs: Vec::new(),
            gaps: Vec::new(),
            merge_approved: false,
        }
    }

    pub fn record(&mut self, rung: impl Into<String>, outcome: RungOutcome) {
        self.rungs.push((rung.into(), outcome));
    }

    pub fn add_gap(&mut self, gap: VerificationGap) {
        self.gaps.push(gap);
    }

    pub fn rung_outcome(&self, rung: &str) -> Option<RungOutcome> {
        self.rungs
            .iter()
            .find(|(name, _)| name == rung)
            .map(|(_, o)| *o)
    }

    pub fn any_failed(&self) -> bool {
        self.rungs
            .iter()
            .any(|(_, o)| *o == RungOutcome::Failed)
    }
}

impl Default for VerificationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failed_detects_a_single_failed_rung() {
        let mut r = VerificationReport::new();
        r.record("physicality", RungOutcome::Ok);
        r.record("deterministic", RungOutcome::Failed);
        assert!(r.any_failed());
    }

    #[test]
    fn rung_outcome_looks_up_by_name() {
        let mut r = VerificationReport::new();
        r.record("physicality", RungOutcome::Ok);
        assert_eq!(r.rung_outcome("physicality"), Some(RungOutcome::Ok));
        assert_eq!(r.rung_outcome("missing"), None);
    }
}
