//! Client-side case synchronization.
//!
//! This module contains:
//! - Selection: Which case the view shows
//! - Reconciler: Folding server snapshots into local state
//! - Tracker: Polling state machine for in-flight evidence
//! - Session: The owner that wires them together

pub mod reconciler;
pub mod selection;
pub mod session;
pub mod tracker;

// Re-export commonly used types
pub use reconciler::{apply_evidence_status, apply_evidence_update, reconcile, Reconciled};
pub use selection::SelectionController;
pub use session::{CaseSession, SessionError, SessionUpdate};
pub use tracker::{
    CompletionCallback, EvidenceTracker, PollEvent, PollOutcome, PollSettings, Subscription,
    TrackerError, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
