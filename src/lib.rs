//! casetrack - Legal case and evidence analysis client
//!
//! A Rust client for a backend that analyses legal evidence (text
//! extraction, entity extraction, retrieval, strategy drafting, quality
//! verification) asynchronously.
//!
//! # Architecture
//!
//! The client keeps a local snapshot of the backend's cases in sync:
//! - Uploads are reflected immediately as queued evidence
//! - In-flight evidence is polled until the backend reports a terminal state
//! - Server snapshots replace local state wholesale, never field by field
//! - Polling stops on completion, on error, or when the view moves on
//!
//! # Modules
//!
//! - `adapters`: Backend access (`CaseRepository`, HTTP implementation)
//! - `core`: Synchronization logic (Session, Tracker, Reconciler, Selection)
//! - `domain`: Data structures (Case, Evidence, ProcessingState)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a case and attach evidence
//! casetrack create "Accidente Pérez" --summary "Colisión en la calle 80"
//! casetrack upload <case-id> contrato.pdf
//!
//! # Resume following an item still being analysed
//! casetrack watch <case-id> <evidence-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{CaseRepository, HttpCaseRepository, RepositoryError};
pub use core::{CaseSession, EvidenceTracker, PollSettings, SessionError, SessionUpdate};
pub use domain::{Case, CaseId, Evidence, EvidenceId, EvidenceStatus, ProcessingState};
