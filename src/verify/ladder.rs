//! The eight-rung Verification Ladder (C5): rungs 1-2 fail-fast, rungs 3-7
//! are non-blocking and accumulate gaps, rung 8 is the merge-judge gate.

use crate::errors::VerificationError;
use crate::settings::Settings;
use crate::verify::rungs::{self, Gap};
use forge_common::task::TaskGraph;
use forge_common::verification::{RungOutcome, VerificationGap, VerificationReport};
use std::path::Path;

/// Declares whether the plan requires browser validation and, if so,
/// whether the browser-automation collaborator is configured to run it.
pub struct BrowserRequirement {
    pub required: bool,
    pub available: bool,
}

/// One `{truth description, artefact path}` pair pulled from the plan's
/// must-haves list, fed into rung 4.
pub type Truth = (String, String);

pub struct LadderInputs<'a> {
    pub project_root: &'a Path,
    pub settings: &'a Settings,
    pub graph: &'a TaskGraph,
    pub changed_files: Vec<String>,
    pub truths: Vec<Truth>,
    pub browser: BrowserRequirement,
}

/// Run every rung in order, honouring fail-fast on rungs 1-2, and return
/// the populated report.
pub async fn run(inputs: LadderInputs<'_>) -> Result<VerificationReport, VerificationError> {
    let mut report = VerificationReport::new();

    let (phys_outcome, phys_gaps) = rungs::physicality(inputs.project_root, inputs.graph);
    let undeclared = rungs::undeclared_writes(inputs.graph, &inputs.changed_files);
    let rung1_outcome = if phys_outcome == RungOutcome::Failed || !undeclared.is_empty() {
        RungOutcome::Failed
    } else {
        RungOutcome::Ok
    };
    report.record("physicality", rung1_outcome);
    for g in phys_gaps.into_iter().chain(undeclared) {
        report.add_gap(into_verification_gap(g));
    }
    if rung1_outcome == RungOutcome::Failed {
        return Err(VerificationError::FailFastHalt {
            rung: "physicality".to_string(),
        });
    }

    let (det_outcome, det_gaps) = rungs::deterministic(inputs.project_root, inputs.settings).await?;
    report.record("deterministic", det_outcome);
    for g in det_gaps {
        report.add_gap(into_verification_gap(g));
    }
    if det_outcome == RungOutcome::Failed {
        return Err(VerificationError::FailFastHalt {
            rung: "deterministic".to_string(),
        });
    }

    let (delta_outcome, delta_gaps) = rungs::delta_tests(inputs.project_root, inputs.settings).await?;
    report.record("delta-tests", delta_outcome);
    for g in delta_gaps {
        report.add_gap(into_verification_gap(g));
    }

    let (goal_outcome, goal_gaps) = rungs::goal_backward(inputs.project_root, &inputs.truths);
    report.record("goal-backward", goal_outcome);
    for g in goal_gaps {
        report.add_gap(into_verification_gap(g));
    }

    let (adv_outcome, adv_findings) = rungs::adversarial(inputs.project_root, &inputs.changed_files);
    report.record("adversarial", adv_outcome);
    for f in adv_findings
        .iter()
        .filter(|f| f.severity == rungs::AdversarialSeverity::Blocker)
    {
        report.add_gap(VerificationGap {
            truth: f.category.to_string(),
            reason: f.detail.clone(),
            missing_files: vec![f.file.clone()],
        });
    }

    let (sysval_outcome, sysval_gaps) =
        rungs::system_validation(inputs.project_root, inputs.settings).await?;
    report.record("system-validation", sysval_outcome);
    for g in sysval_gaps {
        report.add_gap(into_verification_gap(g));
    }

    let browser_outcome = if !inputs.browser.required {
        RungOutcome::NotApplicable
    } else if !inputs.browser.available {
        // §9 open-question resolution: prompt once during verify; if no
        // resolution, record as a gap and continue rather than failing.
        report.add_gap(VerificationGap {
            truth: "browser-validation".to_string(),
            reason: "plan requires browser validation but no collaborator is configured".to_string(),
            missing_files: vec![],
        });
        RungOutcome::Skipped
    } else {
        // Actual browser-driving happens through the MCP collaborator at
        // the call site; callers record the real outcome via a second
        // pass. Treated as Ok here when declared available.
        RungOutcome::Ok
    };
    report.record("browser-validation", browser_outcome);

    let merge_rungs_ok = [
        "physicality",
        "deterministic",
        "goal-backward",
        "adversarial",
        "system-validation",
    ]
    .iter()
    .all(|r| matches!(report.rung_outcome(r), Some(RungOutcome::Ok) | Some(RungOutcome::NotApplicable)));

    let browser_ok = matches!(
        report.rung_outcome("browser-validation"),
        Some(RungOutcome::Ok) | Some(RungOutcome::NotApplicable)
    );

    report.merge_approved = merge_rungs_ok && browser_ok;
    report.record(
        "merge-judge",
        if report.merge_approved { RungOutcome::Ok } else { RungOutcome::Failed },
    );

    Ok(report)
}

fn into_verification_gap(g: Gap) -> VerificationGap {
    VerificationGap {
        truth: g.truth,
        reason: g.reason,
        missing_files: g.missing_files,
    }
}
