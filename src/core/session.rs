//! The case view: case list, selection, and evidence tracking in one owner.
//!
//! A `CaseSession` is created once per view and lives as long as it does.
//! All state changes go through `&mut self`, so a refresh always sees the
//! current selection and no two uploads can race for the tracker.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::reconciler::{apply_evidence_status, apply_evidence_update, reconcile, Reconciled};
use super::selection::SelectionController;
use super::tracker::{EvidenceTracker, PollOutcome, PollSettings, Subscription, TrackerError};
use crate::adapters::{case_draft, CaseRepository, RepositoryError};
use crate::domain::{Case, CaseId, EvidenceId, EvidenceStatus, EvidenceUpload, ProcessingState};

/// Errors from user actions on the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("No case selected")]
    NoCaseSelected,

    #[error("Evidence {0} is still being processed; wait before uploading again")]
    UploadInProgress(EvidenceId),

    #[error("Evidence {evidence_id} not found in case {case_id}")]
    EvidenceNotFound {
        case_id: CaseId,
        evidence_id: EvidenceId,
    },
}

/// Change reported by [`CaseSession::next_update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Evidence is still moving through the pipeline
    Progress {
        case_id: CaseId,
        evidence_id: EvidenceId,
        attempt: u32,
        state: ProcessingState,
    },

    /// Evidence reached a terminal state and tracking stopped
    Finished {
        case_id: CaseId,
        evidence_id: EvidenceId,
        status: EvidenceStatus,

        /// Whether the follow-up case list refresh succeeded
        refreshed: bool,
    },
}

/// Owner of everything the case view displays
pub struct CaseSession {
    repository: Arc<dyn CaseRepository>,
    cases: Vec<Case>,
    selection: SelectionController,
    tracker: EvidenceTracker,
}

impl CaseSession {
    pub fn new(repository: Arc<dyn CaseRepository>, settings: PollSettings) -> Self {
        let tracker = EvidenceTracker::new(Arc::clone(&repository), settings);
        Self {
            repository,
            cases: Vec::new(),
            selection: SelectionController::new(),
            tracker,
        }
    }

    /// Cases in server display order
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn selected_id(&self) -> Option<&CaseId> {
        self.selection.current()
    }

    /// Latest snapshot of the selected case
    pub fn selected_case(&self) -> Option<&Case> {
        let id = self.selection.current()?;
        self.cases.iter().find(|case| &case.id == id)
    }

    pub fn poll_settings(&self) -> &PollSettings {
        self.tracker.settings()
    }

    /// True while evidence is being tracked; new uploads are refused.
    ///
    /// Poll responses that already arrived are folded in first.
    pub fn is_processing(&mut self) -> bool {
        self.absorb_pending();
        self.tracker.is_processing()
    }

    pub fn tracking(&mut self) -> Option<&Subscription> {
        self.absorb_pending();
        self.tracker.active()
    }

    /// Reload the case list and re-resolve the selection against it
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let fresh = self.repository.list_cases().await?;
        let Reconciled { cases, selected } = reconcile(&fresh, self.selection.current());
        self.cases = cases;

        if selected.is_none() && self.selection.clear() {
            self.tracker.cancel();
        }

        Ok(())
    }

    /// Create a case and add it to the list
    pub async fn create_case(&mut self, title: &str, summary: &str) -> Result<Case, SessionError> {
        let draft = case_draft(title, summary)?;
        let case = self.repository.create_case(&draft).await?;
        self.cases = apply_evidence_update(&self.cases, &case);
        Ok(case)
    }

    /// Select a case; returns `false` without any network call if it was
    /// already selected.
    pub async fn select(&mut self, case_id: CaseId) -> Result<bool, SessionError> {
        if !self.selection.select(case_id.clone()) {
            return Ok(false);
        }

        self.absorb_pending();
        if self
            .tracker
            .active()
            .is_some_and(|subscription| subscription.case_id != case_id)
        {
            self.tracker.cancel();
        }

        self.refresh().await?;
        Ok(true)
    }

    /// View closed: stop tracking and drop the selection
    pub fn close(&mut self) {
        self.tracker.cancel();
        self.selection.clear();
    }

    /// Upload a file to the selected case and start tracking it.
    ///
    /// `on_complete` fires once when the new evidence reaches a terminal
    /// state, immediately if the upload response already reports one. It is
    /// dropped if tracking is torn down first.
    pub async fn upload_evidence<F>(
        &mut self,
        upload: EvidenceUpload,
        on_complete: F,
    ) -> Result<Case, SessionError>
    where
        F: FnOnce(&EvidenceStatus) + Send + 'static,
    {
        let case_id = self
            .selection
            .current()
            .cloned()
            .ok_or(SessionError::NoCaseSelected)?;

        self.absorb_pending();
        if let Some(active) = self.tracker.active() {
            return Err(SessionError::UploadInProgress(active.evidence_id.clone()));
        }

        let previous_count = self.selected_case().map(|case| case.evidence.len());
        let updated = self.repository.upload_evidence(&case_id, &upload).await?;

        if let Some(previous) = previous_count {
            if updated.evidence.len() != previous + 1 {
                warn!(
                    "Case {} went from {} to {} evidence items after one upload",
                    case_id,
                    previous,
                    updated.evidence.len()
                );
            }
        }

        self.cases = apply_evidence_update(&self.cases, &updated);

        match updated.latest_evidence() {
            Some(newest) if !newest.state().is_terminal() => {
                self.tracker
                    .start(case_id, newest.id.clone(), on_complete)?;
            }
            Some(newest) => {
                info!(
                    "Evidence {} was already {} on upload",
                    newest.id,
                    newest.state()
                );
                on_complete(&newest.status);
            }
            None => warn!("Upload to case {} returned no evidence", case_id),
        }

        Ok(updated)
    }

    /// Resume tracking an evidence item of the selected case.
    ///
    /// Returns `Ok(None)` if the item has already finished.
    pub fn track_evidence<F>(
        &mut self,
        evidence_id: EvidenceId,
        on_complete: F,
    ) -> Result<Option<Subscription>, SessionError>
    where
        F: FnOnce(&EvidenceStatus) + Send + 'static,
    {
        let case = self.selected_case().ok_or(SessionError::NoCaseSelected)?;
        let evidence =
            case.find_evidence(&evidence_id)
                .ok_or_else(|| SessionError::EvidenceNotFound {
                    case_id: case.id.clone(),
                    evidence_id: evidence_id.clone(),
                })?;

        if evidence.state().is_terminal() {
            return Ok(None);
        }

        let case_id = case.id.clone();
        self.absorb_pending();
        let subscription = self.tracker.start(case_id, evidence_id, on_complete)?;
        Ok(Some(subscription))
    }

    /// Wait for the next poll response and fold it into the case snapshot.
    ///
    /// A terminal response also refreshes the case list. Returns `None`
    /// when nothing is being tracked.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            match self.tracker.next().await? {
                PollOutcome::Progress {
                    subscription,
                    attempt,
                    status,
                } => {
                    self.fold_status(&subscription, &status);
                    return Some(SessionUpdate::Progress {
                        case_id: subscription.case_id,
                        evidence_id: subscription.evidence_id,
                        attempt,
                        state: status.state,
                    });
                }
                PollOutcome::Finished {
                    subscription,
                    status,
                    ..
                } => {
                    self.fold_status(&subscription, &status);

                    let refreshed = match self.refresh().await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("Refresh after analysis failed: {}", e);
                            false
                        }
                    };

                    return Some(SessionUpdate::Finished {
                        case_id: subscription.case_id,
                        evidence_id: subscription.evidence_id,
                        status,
                        refreshed,
                    });
                }
                PollOutcome::Discarded => continue,
            }
        }
    }

    /// Fold responses that arrived while nobody awaited `next_update`.
    ///
    /// A terminal one finishes tracking on the spot; the case list is not
    /// refreshed here since that needs a network call.
    fn absorb_pending(&mut self) {
        for outcome in self.tracker.drain() {
            match outcome {
                PollOutcome::Progress {
                    subscription,
                    status,
                    ..
                }
                | PollOutcome::Finished {
                    subscription,
                    status,
                    ..
                } => self.fold_status(&subscription, &status),
                PollOutcome::Discarded => {}
            }
        }
    }

    fn fold_status(&mut self, subscription: &Subscription, status: &EvidenceStatus) {
        if let Some(cases) = apply_evidence_status(
            &self.cases,
            &subscription.case_id,
            &subscription.evidence_id,
            status,
        ) {
            self.cases = cases;
        }
    }
}
