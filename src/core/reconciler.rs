//! Folding authoritative server snapshots into local state.
//!
//! Every function here is pure: inputs are borrowed, new snapshots are
//! returned, and nothing is mutated in place.

use crate::domain::{Case, CaseId, EvidenceId, EvidenceStatus};

/// Result of reconciling a fresh case list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Replaces the local list wholesale
    pub cases: Vec<Case>,

    /// Fresh snapshot of the selected case; `None` if it no longer exists
    pub selected: Option<Case>,
}

/// Replace the case list and re-resolve the selection against it
pub fn reconcile(fresh_cases: &[Case], selection: Option<&CaseId>) -> Reconciled {
    let selected = selection.and_then(|id| {
        let found = fresh_cases.iter().find(|case| &case.id == id).cloned();
        if found.is_none() {
            tracing::warn!("Selected case {} is no longer listed by the server", id);
        }
        found
    });

    Reconciled {
        cases: fresh_cases.to_vec(),
        selected,
    }
}

/// Fold an updated case into the list.
///
/// The server copy wins outright. The matching entry is replaced in place;
/// other entries keep their values and order. An unknown case is appended.
pub fn apply_evidence_update(cases: &[Case], updated: &Case) -> Vec<Case> {
    let mut replaced = false;
    let mut merged: Vec<Case> = cases
        .iter()
        .map(|case| {
            if case.id == updated.id {
                replaced = true;
                updated.clone()
            } else {
                case.clone()
            }
        })
        .collect();

    if !replaced {
        merged.push(updated.clone());
    }

    merged
}

/// Fold one poll response into the owning case.
///
/// Returns `None` when nothing changes: unknown case or evidence, a repeated
/// state, or a transition the forward-only lifecycle forbids.
pub fn apply_evidence_status(
    cases: &[Case],
    case_id: &CaseId,
    evidence_id: &EvidenceId,
    status: &EvidenceStatus,
) -> Option<Vec<Case>> {
    let case = cases.iter().find(|case| &case.id == case_id)?;
    let current = case.find_evidence(evidence_id)?;

    if current.status == *status {
        return None;
    }

    if !current.state().can_advance_to(&status.state) {
        tracing::warn!(
            "Ignoring backward transition for evidence {}: {} -> {}",
            evidence_id,
            current.state(),
            status.state
        );
        return None;
    }

    let evidence = case
        .evidence
        .iter()
        .map(|e| {
            if &e.id == evidence_id {
                e.with_status(status.clone())
            } else {
                e.clone()
            }
        })
        .collect();

    let updated = Case {
        evidence,
        ..case.clone()
    };

    Some(apply_evidence_update(cases, &updated))
}
