//! In-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;
use uuid::Uuid;

use casetrack::adapters::{CaseRepository, RepositoryError};
use casetrack::domain::{
    AnalysisResults, Case, CaseDraft, CaseId, Evidence, EvidenceId, EvidenceStatus,
    EvidenceUpload, ExtractedEntity, QualityVerification,
};

#[derive(Default)]
struct StubState {
    cases: Vec<Case>,
    scripts: HashMap<EvidenceId, VecDeque<EvidenceStatus>>,
    upload_status: Option<EvidenceStatus>,
    fail_list: bool,
}

/// Backend double: cases live in memory, status polls follow a script
#[derive(Default)]
pub struct StubRepository {
    state: Mutex<StubState>,
    hold_polls: Option<Notify>,
    response_delay: Option<Duration>,
    pub create_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl StubRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status polls never answer until `release_polls`
    pub fn holding_polls() -> Self {
        Self {
            hold_polls: Some(Notify::new()),
            ..Self::default()
        }
    }

    /// Every status poll takes `delay` to answer
    pub fn with_response_delay(delay: Duration) -> Self {
        Self {
            response_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn release_polls(&self) {
        if let Some(gate) = &self.hold_polls {
            gate.notify_waiters();
        }
    }

    /// Responses for successive polls of `evidence_id`; the last one repeats
    pub fn script(&self, evidence_id: &EvidenceId, statuses: Vec<EvidenceStatus>) {
        let mut state = self.state.lock().unwrap();
        state.scripts.insert(evidence_id.clone(), statuses.into());
    }

    pub fn seed_case(&self, title: &str) -> Case {
        let case = new_case(title, "");
        self.state.lock().unwrap().cases.push(case.clone());
        case
    }

    pub fn remove_case(&self, case_id: &CaseId) {
        self.state.lock().unwrap().cases.retain(|c| &c.id != case_id);
    }

    /// Uploads come back already in `status`, as a synchronous backend does
    pub fn finish_uploads_as(&self, status: EvidenceStatus) {
        self.state.lock().unwrap().upload_status = Some(status);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn next_status(&self, evidence_id: &EvidenceId) -> EvidenceStatus {
        let mut state = self.state.lock().unwrap();

        let status = match state.scripts.get_mut(evidence_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap_or_else(EvidenceStatus::processing),
            None => EvidenceStatus::processing(),
        };

        // The backend's own record advances too
        for case in &mut state.cases {
            for evidence in &mut case.evidence {
                if &evidence.id == evidence_id {
                    evidence.status = status.clone();
                }
            }
        }

        status
    }
}

#[async_trait]
impl CaseRepository for StubRepository {
    async fn create_case(&self, draft: &CaseDraft) -> Result<Case, RepositoryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let case = new_case(draft.title(), draft.summary());
        self.state.lock().unwrap().cases.push(case.clone());
        Ok(case)
    }

    async fn list_cases(&self) -> Result<Vec<Case>, RepositoryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(RepositoryError::Server {
                status: Some(503),
                message: "unavailable".to_string(),
            });
        }
        Ok(state.cases.clone())
    }

    async fn fetch_case(&self, case_id: &CaseId) -> Result<Case, RepositoryError> {
        let state = self.state.lock().unwrap();
        state
            .cases
            .iter()
            .find(|c| &c.id == case_id)
            .cloned()
            .ok_or(RepositoryError::Server {
                status: Some(404),
                message: "El caso no fue encontrado".to_string(),
            })
    }

    async fn upload_evidence(
        &self,
        case_id: &CaseId,
        upload: &EvidenceUpload,
    ) -> Result<Case, RepositoryError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let status = state
            .upload_status
            .clone()
            .unwrap_or_else(EvidenceStatus::queued);
        let case = state
            .cases
            .iter_mut()
            .find(|c| &c.id == case_id)
            .ok_or(RepositoryError::Server {
                status: Some(404),
                message: "El caso no fue encontrado".to_string(),
            })?;

        case.evidence.push(Evidence {
            id: EvidenceId::new(Uuid::new_v4().to_string()),
            file_name: upload.file_name.clone(),
            content_type: Some(upload.content_type.clone()),
            status,
        });

        Ok(case.clone())
    }

    async fn fetch_evidence_status(&self, evidence_id: &EvidenceId) -> EvidenceStatus {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.hold_polls {
            gate.notified().await;
        }
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.next_status(evidence_id)
    }
}

pub fn new_case(title: &str, summary: &str) -> Case {
    Case {
        id: CaseId::new(Uuid::new_v4().to_string()),
        title: title.to_string(),
        summary: Some(summary.to_string()),
        created_at: NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
        evidence: Vec::new(),
    }
}

/// A full analysis result, as the backend reports it on completion
pub fn sample_results() -> AnalysisResults {
    AnalysisResults {
        extracted_text: Some("Contrato de arrendamiento entre las partes...".to_string()),
        entities: vec![
            ExtractedEntity {
                entity: "Juan Pérez".to_string(),
                category: "Persona".to_string(),
            },
            ExtractedEntity {
                entity: "Calle 80".to_string(),
                category: "Lugar".to_string(),
            },
        ],
        retrieved_context: vec!["Código Civil, Art. 1973".to_string()],
        strategy_draft: Some("1. Resumen breve del caso...".to_string()),
        quality_check: Some(QualityVerification {
            verified: true,
            notes: "Coherente con la evidencia".to_string(),
        }),
    }
}
