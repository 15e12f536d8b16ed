//! HTTP adapter for the case backend.
//!
//! Talks JSON to the FastAPI service; evidence files go up as multipart
//! with a single `archivo` field.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{CaseRepository, RepositoryError};
use crate::domain::{Case, CaseDraft, CaseId, EvidenceId, EvidenceStatus, EvidenceUpload};

/// Backend client over HTTP
pub struct HttpCaseRepository {
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpCaseRepository {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build endpoint URL from path segments.
    ///
    /// Identifiers are opaque, so each segment is percent-encoded on its own
    /// and a `/` or `?` inside an id stays part of that id.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            RepositoryError::Validation(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                RepositoryError::Validation(format!(
                    "Base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Send a request and decode a 2xx JSON body
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, RepositoryError> {
        let response = request.send().await.map_err(|e| {
            warn!("Failed to {}: {}", action, e);
            RepositoryError::server(format!("Failed to {}: {}", action, e))
        })?;

        let response = check_status(response, action).await?;

        response.json::<T>().await.map_err(|e| {
            warn!("Failed to decode response to {}: {}", action, e);
            RepositoryError::server(format!("Invalid response to {}: {}", action, e))
        })
    }
}

/// Turn a non-2xx response into `RepositoryError::Server`, keeping the body
async fn check_status(response: Response, action: &str) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = server_detail(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });

    warn!("Backend rejected request to {}: {} {}", action, status.as_u16(), message);

    Err(RepositoryError::Server {
        status: Some(status.as_u16()),
        message,
    })
}

/// FastAPI puts the human-readable reason in `detail`
fn server_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        Err(_) => Some(trimmed.to_string()),
    }
}

#[async_trait]
impl CaseRepository for HttpCaseRepository {
    async fn create_case(&self, draft: &CaseDraft) -> Result<Case, RepositoryError> {
        debug!("Creating case '{}'", draft.title());

        let request = self.client.post(self.endpoint(&["casos"])?).json(draft);
        let case: Case = self.execute(request, "create case").await?;

        info!("Case created: {} ({})", case.title, case.id);
        Ok(case)
    }

    async fn list_cases(&self) -> Result<Vec<Case>, RepositoryError> {
        let request = self.client.get(self.endpoint(&["casos"])?);
        let cases: Vec<Case> = self.execute(request, "list cases").await?;

        debug!("Received {} cases", cases.len());
        Ok(cases)
    }

    async fn fetch_case(&self, case_id: &CaseId) -> Result<Case, RepositoryError> {
        let request = self
            .client
            .get(self.endpoint(&["casos", case_id.as_str()])?);
        self.execute(request, "fetch case").await
    }

    async fn upload_evidence(
        &self,
        case_id: &CaseId,
        upload: &EvidenceUpload,
    ) -> Result<Case, RepositoryError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| {
                RepositoryError::Validation(format!(
                    "Invalid content type '{}': {}",
                    upload.content_type, e
                ))
            })?;

        let form = Form::new().part("archivo", part);

        info!(
            "Uploading {} ({} bytes, {}) to case {}",
            upload.file_name,
            upload.len(),
            upload.content_type,
            case_id
        );

        let request = self
            .client
            .post(self.endpoint(&["casos", case_id.as_str(), "evidencia"])?)
            .multipart(form);

        self.execute(request, "upload evidence").await
    }

    async fn fetch_evidence_status(&self, evidence_id: &EvidenceId) -> EvidenceStatus {
        let fetched = match self.endpoint(&["evidencias", evidence_id.as_str(), "estado"]) {
            Ok(url) => {
                let request = self.client.get(url);
                self.execute::<EvidenceStatus>(request, "fetch evidence status")
                    .await
            }
            Err(e) => Err(e),
        };

        match fetched {
            Ok(status) => {
                debug!("Evidence {} is {}", evidence_id, status.state);
                status
            }
            Err(e) => {
                warn!("Status poll for evidence {} failed: {}", evidence_id, e);
                EvidenceStatus::poll_failure()
            }
        }
    }
}
