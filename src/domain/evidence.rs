//! Evidence items and their analysis lifecycle.
//!
//! An evidence item moves forward through the backend pipeline:
//!
//! ```text
//! queued → processing → completed
//!    └─────────┴──────→ error(reason)
//! ```
//!
//! Analysis results are only meaningful once the item is `completed`.
//! Decoding enforces that: result fields that arrive alongside any other
//! state are dropped.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Synthetic state reported when the status endpoint cannot be reached.
pub const POLL_FAILURE_STATE: &str = "error_en_sondeo";

/// Synthetic state reported when polling gives up on a stuck item.
pub const POLL_EXHAUSTED_STATE: &str = "error_tiempo_agotado";

/// Opaque, server-assigned evidence identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(String);

impl EvidenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an evidence item in the analysis pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingState {
    /// Uploaded, waiting for a worker
    Queued,

    /// A worker is running the analysis graph
    Processing,

    /// Analysis finished; results are attached
    Completed,

    /// Analysis failed; carries the raw backend state
    Error(String),
}

impl ProcessingState {
    /// Map a backend `estado_procesamiento` value.
    ///
    /// Any value containing `error` is terminal, whatever its suffix.
    pub fn from_wire(value: &str) -> Self {
        let normalized = value.trim().to_lowercase();

        if normalized.contains("error") {
            return Self::Error(value.trim().to_string());
        }

        match normalized.as_str() {
            "pendiente" | "encolado" | "queued" => Self::Queued,
            "procesando" | "en_proceso" | "processing" => Self::Processing,
            "completado" | "completed" => Self::Completed,
            other => {
                tracing::debug!("Unknown processing state '{}', treating as in progress", other);
                Self::Processing
            }
        }
    }

    /// Canonical backend spelling
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Queued => "pendiente",
            Self::Processing => "procesando",
            Self::Completed => "completado",
            Self::Error(reason) => reason,
        }
    }

    /// Completed or failed; no further transitions happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Completed | Self::Error(_) => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle
    pub fn can_advance_to(&self, next: &ProcessingState) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}

impl From<String> for ProcessingState {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ProcessingState> for String {
    fn from(state: ProcessingState) -> Self {
        state.as_wire().to_string()
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A key entity found in the evidence text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(rename = "entidad")]
    pub entity: String,

    /// Older workers report this as `tipo`
    #[serde(
        rename = "categoria",
        alias = "tipo",
        default,
        deserialize_with = "null_as_default"
    )]
    pub category: String,
}

/// Verdict of the quality guardian on the strategy draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVerification {
    #[serde(rename = "verificado", default, deserialize_with = "null_as_default")]
    pub verified: bool,

    #[serde(rename = "observaciones", default, deserialize_with = "null_as_default")]
    pub notes: String,
}

/// The backend sends `null` as freely as it omits a field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Everything the analysis pipeline produces for one evidence item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResults {
    pub extracted_text: Option<String>,
    pub entities: Vec<ExtractedEntity>,
    pub retrieved_context: Vec<String>,
    pub strategy_draft: Option<String>,
    pub quality_check: Option<QualityVerification>,
}

/// Result fields as they appear on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AnalysisFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    texto_extraido: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    entidades_extraidas: Option<Vec<ExtractedEntity>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    informacion_recuperada: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    borrador_estrategia: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    verificacion_calidad: Option<QualityVerification>,
}

impl AnalysisFields {
    fn is_populated(&self) -> bool {
        self.texto_extraido.is_some()
            || self.entidades_extraidas.as_ref().is_some_and(|e| !e.is_empty())
            || self.informacion_recuperada.as_ref().is_some_and(|i| !i.is_empty())
            || self.borrador_estrategia.is_some()
            || self.verificacion_calidad.is_some()
    }
}

impl From<AnalysisFields> for AnalysisResults {
    fn from(fields: AnalysisFields) -> Self {
        Self {
            extracted_text: fields.texto_extraido,
            entities: fields.entidades_extraidas.unwrap_or_default(),
            retrieved_context: fields.informacion_recuperada.unwrap_or_default(),
            strategy_draft: fields.borrador_estrategia,
            quality_check: fields.verificacion_calidad,
        }
    }
}

impl From<AnalysisResults> for AnalysisFields {
    fn from(results: AnalysisResults) -> Self {
        Self {
            texto_extraido: results.extracted_text,
            entidades_extraidas: Some(results.entities).filter(|e| !e.is_empty()),
            informacion_recuperada: Some(results.retrieved_context).filter(|i| !i.is_empty()),
            borrador_estrategia: results.strategy_draft,
            verificacion_calidad: results.quality_check,
        }
    }
}

/// Processing state plus results, as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusRecord", into = "StatusRecord")]
pub struct EvidenceStatus {
    pub state: ProcessingState,

    /// Present only when `state` is `Completed`
    results: Option<AnalysisResults>,
}

impl EvidenceStatus {
    /// Build a status, dropping results unless the state is completed
    pub fn new(state: ProcessingState, results: Option<AnalysisResults>) -> Self {
        let results = if state == ProcessingState::Completed {
            Some(results.unwrap_or_default())
        } else {
            None
        };
        Self { state, results }
    }

    pub fn queued() -> Self {
        Self::new(ProcessingState::Queued, None)
    }

    pub fn processing() -> Self {
        Self::new(ProcessingState::Processing, None)
    }

    pub fn completed(results: AnalysisResults) -> Self {
        Self::new(ProcessingState::Completed, Some(results))
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(ProcessingState::Error(reason.into()), None)
    }

    /// Status used when polling itself failed
    pub fn poll_failure() -> Self {
        Self::failed(POLL_FAILURE_STATE)
    }

    pub fn results(&self) -> Option<&AnalysisResults> {
        self.results.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRecord {
    estado_procesamiento: String,

    #[serde(flatten)]
    fields: AnalysisFields,
}

impl From<StatusRecord> for EvidenceStatus {
    fn from(record: StatusRecord) -> Self {
        let state = ProcessingState::from_wire(&record.estado_procesamiento);
        if state != ProcessingState::Completed && record.fields.is_populated() {
            tracing::warn!(
                "Dropping analysis results reported with state '{}'",
                record.estado_procesamiento
            );
        }
        Self::new(state, Some(record.fields.into()))
    }
}

impl From<EvidenceStatus> for StatusRecord {
    fn from(status: EvidenceStatus) -> Self {
        Self {
            estado_procesamiento: status.state.as_wire().to_string(),
            fields: status.results.map(Into::into).unwrap_or_default(),
        }
    }
}

/// An uploaded file attached to a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EvidenceRecord", into = "EvidenceRecord")]
pub struct Evidence {
    pub id: EvidenceId,
    pub file_name: String,

    /// MIME type recorded by the backend at upload time
    pub content_type: Option<String>,

    pub status: EvidenceStatus,
}

impl Evidence {
    pub fn state(&self) -> &ProcessingState {
        &self.status.state
    }

    pub fn results(&self) -> Option<&AnalysisResults> {
        self.status.results()
    }

    /// New snapshot of this item carrying `status`
    pub fn with_status(&self, status: EvidenceStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvidenceRecord {
    id_evidencia: EvidenceId,
    nombre_archivo: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tipo_contenido: Option<String>,

    estado_procesamiento: String,

    #[serde(flatten)]
    fields: AnalysisFields,
}

impl From<EvidenceRecord> for Evidence {
    fn from(record: EvidenceRecord) -> Self {
        let status = EvidenceStatus::from(StatusRecord {
            estado_procesamiento: record.estado_procesamiento,
            fields: record.fields,
        });
        Self {
            id: record.id_evidencia,
            file_name: record.nombre_archivo,
            content_type: record.tipo_contenido,
            status,
        }
    }
}

impl From<Evidence> for EvidenceRecord {
    fn from(evidence: Evidence) -> Self {
        let status = StatusRecord::from(evidence.status);
        Self {
            id_evidencia: evidence.id,
            nombre_archivo: evidence.file_name,
            tipo_contenido: evidence.content_type,
            estado_procesamiento: status.estado_procesamiento,
            fields: status.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_state_mapping() {
        assert_eq!(ProcessingState::from_wire("pendiente"), ProcessingState::Queued);
        assert_eq!(ProcessingState::from_wire("en_proceso"), ProcessingState::Processing);
        assert_eq!(ProcessingState::from_wire("procesando"), ProcessingState::Processing);
        assert_eq!(ProcessingState::from_wire("completado"), ProcessingState::Completed);
        assert_eq!(
            ProcessingState::from_wire("error_critico"),
            ProcessingState::Error("error_critico".to_string())
        );
        // Unknown values keep polling
        assert_eq!(ProcessingState::from_wire("reintentando"), ProcessingState::Processing);
    }

    #[test]
    fn test_error_detection_is_containment() {
        for value in ["error", "error_critico", POLL_FAILURE_STATE, "fatal_error"] {
            let state = ProcessingState::from_wire(value);
            assert!(state.is_terminal(), "{} should be terminal", value);
            assert!(state.is_error());
            assert_eq!(state.as_wire(), value);
        }
    }

    #[test]
    fn test_forward_only_transitions() {
        let queued = ProcessingState::Queued;
        let processing = ProcessingState::Processing;
        let done = ProcessingState::Completed;
        let failed = ProcessingState::Error("error".to_string());

        assert!(queued.can_advance_to(&processing));
        assert!(queued.can_advance_to(&failed));
        assert!(processing.can_advance_to(&processing));
        assert!(processing.can_advance_to(&done));
        assert!(!processing.can_advance_to(&queued));
        assert!(!done.can_advance_to(&processing));
        assert!(!done.can_advance_to(&failed));
        assert!(!failed.can_advance_to(&done));
    }

    #[test]
    fn test_decode_completed_evidence() {
        let evidence: Evidence = serde_json::from_value(json!({
            "id_evidencia": "ev-1",
            "nombre_archivo": "contrato.pdf",
            "tipo_contenido": "application/pdf",
            "estado_procesamiento": "completado",
            "texto_extraido": "El arrendatario...",
            "entidades_extraidas": [
                {"entidad": "Juan Pérez", "categoria": "Persona"},
                {"entidad": "Bogotá", "tipo": "Lugar"}
            ],
            "informacion_recuperada": ["Art. 1973 Código Civil"],
            "borrador_estrategia": "## Estrategia",
            "verificacion_calidad": {"verificado": true, "observaciones": "Coherente"}
        }))
        .unwrap();

        assert_eq!(evidence.id.as_str(), "ev-1");
        assert_eq!(evidence.state(), &ProcessingState::Completed);

        let results = evidence.results().unwrap();
        assert_eq!(results.extracted_text.as_deref(), Some("El arrendatario..."));
        assert_eq!(results.entities.len(), 2);
        assert_eq!(results.entities[1].category, "Lugar");
        assert_eq!(results.retrieved_context, vec!["Art. 1973 Código Civil"]);
        assert!(results.quality_check.as_ref().unwrap().verified);
    }

    #[test]
    fn test_results_dropped_unless_completed() {
        let evidence: Evidence = serde_json::from_value(json!({
            "id_evidencia": "ev-2",
            "nombre_archivo": "audio.mp3",
            "estado_procesamiento": "procesando",
            "texto_extraido": "partial",
            "entidades_extraidas": null
        }))
        .unwrap();

        assert_eq!(evidence.state(), &ProcessingState::Processing);
        assert!(evidence.results().is_none());
        assert!(evidence.content_type.is_none());
    }

    #[test]
    fn test_nulls_in_completed_results() {
        let status: EvidenceStatus = serde_json::from_value(json!({
            "estado_procesamiento": "completed",
            "texto_extraido": null,
            "entidades_extraidas": [{"entidad": "Juzgado 3 Civil", "categoria": null}],
            "informacion_recuperada": null,
            "verificacion_calidad": {"verificado": null, "observaciones": null}
        }))
        .unwrap();

        let results = status.results().unwrap();
        assert!(results.extracted_text.is_none());
        assert_eq!(results.entities[0].category, "");
        assert!(results.retrieved_context.is_empty());
        assert!(!results.quality_check.as_ref().unwrap().verified);
    }

    #[test]
    fn test_status_serializes_back_to_wire_shape() {
        let status = EvidenceStatus::completed(AnalysisResults {
            extracted_text: Some("texto".to_string()),
            ..Default::default()
        });

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["estado_procesamiento"], "completado");
        assert_eq!(value["texto_extraido"], "texto");
        assert!(value.get("entidades_extraidas").is_none());
    }
}
