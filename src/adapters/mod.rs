//! Adapter interfaces for the case backend.
//!
//! The session and tracker only talk to the backend through
//! [`CaseRepository`], so they can run against a stub in tests.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Case, CaseDraft, CaseId, EvidenceId, EvidenceStatus, EvidenceUpload};

// Re-export the HTTP adapter
pub use http::HttpCaseRepository;

/// Errors surfaced by repository operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Rejected locally, before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure, non-2xx response, or an undecodable body
    #[error("Server error{}: {message}", status_suffix(.status))]
    Server {
        status: Option<u16>,
        message: String,
    },
}

impl RepositoryError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => *status,
            Self::Validation(_) => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Validate case input before it reaches the network
pub fn case_draft(title: &str, summary: &str) -> Result<CaseDraft, RepositoryError> {
    CaseDraft::new(title, summary)
        .ok_or_else(|| RepositoryError::Validation("Case title cannot be empty".to_string()))
}

/// Backend operations on cases and evidence
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Create an empty case
    async fn create_case(&self, draft: &CaseDraft) -> Result<Case, RepositoryError>;

    /// All cases, in server display order
    async fn list_cases(&self) -> Result<Vec<Case>, RepositoryError>;

    /// One case with its evidence
    async fn fetch_case(&self, case_id: &CaseId) -> Result<Case, RepositoryError>;

    /// Attach a file; returns the updated case
    async fn upload_evidence(
        &self,
        case_id: &CaseId,
        upload: &EvidenceUpload,
    ) -> Result<Case, RepositoryError>;

    /// Current processing state of one evidence item.
    ///
    /// Never fails: implementations report their own failures as
    /// [`EvidenceStatus::poll_failure`] so polling always terminates.
    async fn fetch_evidence_status(&self, evidence_id: &EvidenceId) -> EvidenceStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_draft_validation() {
        let err = case_draft("  ", "resumen").unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert!(case_draft("Caso", "").is_ok());
    }

    #[test]
    fn test_server_error_display() {
        let with_status = RepositoryError::Server {
            status: Some(404),
            message: "El caso no fue encontrado".to_string(),
        };
        assert_eq!(
            with_status.to_string(),
            "Server error (404): El caso no fue encontrado"
        );
        assert_eq!(with_status.status(), Some(404));

        let transport = RepositoryError::server("connection refused");
        assert_eq!(transport.to_string(), "Server error: connection refused");
        assert_eq!(transport.status(), None);
    }
}
