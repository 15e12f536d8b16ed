//! Domain types for casetrack.
//!
//! This module contains the core data structures:
//! - Case: A legal matter and its attached evidence
//! - Evidence: An uploaded file and its analysis lifecycle
//! - Upload: File payloads sent to the backend

pub mod case;
pub mod evidence;
pub mod upload;

// Re-export commonly used types
pub use case::{Case, CaseDraft, CaseId};
pub use evidence::{
    AnalysisResults, Evidence, EvidenceId, EvidenceStatus, ExtractedEntity, ProcessingState,
    QualityVerification, POLL_EXHAUSTED_STATE, POLL_FAILURE_STATE,
};
pub use upload::EvidenceUpload;
