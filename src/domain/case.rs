//! Legal cases and the draft used to create them.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::evidence::{null_as_default, Evidence, EvidenceId};

/// Opaque, server-assigned case identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A legal matter and the evidence attached to it.
///
/// Cases are snapshots: a refresh replaces the whole value rather than
/// mutating one in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    #[serde(rename = "id_caso")]
    pub id: CaseId,

    #[serde(rename = "titulo")]
    pub title: String,

    #[serde(rename = "resumen", default)]
    pub summary: Option<String>,

    /// Backend local time; may or may not carry an offset
    #[serde(rename = "fecha_creacion", with = "timestamp")]
    pub created_at: NaiveDateTime,

    /// Attachment order
    #[serde(rename = "evidencias", default, deserialize_with = "null_as_default")]
    pub evidence: Vec<Evidence>,
}

impl Case {
    pub fn find_evidence(&self, id: &EvidenceId) -> Option<&Evidence> {
        self.evidence.iter().find(|e| &e.id == id)
    }

    /// Most recently attached evidence item
    pub fn latest_evidence(&self) -> Option<&Evidence> {
        self.evidence.last()
    }

    /// Evidence items still moving through the pipeline
    pub fn pending_evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence.iter().filter(|e| !e.state().is_terminal())
    }
}

/// Validated input for creating a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseDraft {
    #[serde(rename = "titulo")]
    title: String,

    #[serde(rename = "resumen")]
    summary: String,
}

impl CaseDraft {
    /// Returns `None` when the title is blank.
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Option<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return None;
        }
        Some(Self {
            title,
            summary: summary.into(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// `fecha_creacion` (de)serialization.
///
/// Accepts RFC 3339 as well as the naive ISO-8601 form the backend emits.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(NAIVE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
            return Ok(with_offset.naive_local());
        }
        NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draft_rejects_blank_title() {
        assert!(CaseDraft::new("", "resumen").is_none());
        assert!(CaseDraft::new("   \t", "").is_none());

        let draft = CaseDraft::new("Accidente Pérez", "").unwrap();
        assert_eq!(draft.title(), "Accidente Pérez");
        assert_eq!(draft.summary(), "");
    }

    #[test]
    fn test_draft_wire_shape() {
        let draft = CaseDraft::new("Demanda XYZ", "Incumplimiento").unwrap();
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value, json!({"titulo": "Demanda XYZ", "resumen": "Incumplimiento"}));
    }

    #[test]
    fn test_decode_case_without_evidence() {
        let case: Case = serde_json::from_value(json!({
            "id_caso": "3f1c",
            "titulo": "Accidente Pérez",
            "resumen": null,
            "fecha_creacion": "2024-05-01T10:15:30.123456"
        }))
        .unwrap();

        assert_eq!(case.id.as_str(), "3f1c");
        assert!(case.summary.is_none());
        assert!(case.evidence.is_empty());
        assert!(case.latest_evidence().is_none());
    }

    #[test]
    fn test_timestamp_formats() {
        let naive = timestamp::parse("2024-05-01T10:15:30").unwrap();
        let offset = timestamp::parse("2024-05-01T10:15:30+00:00").unwrap();
        assert_eq!(naive, offset);
        assert!(timestamp::parse("ayer").is_err());
    }

    #[test]
    fn test_pending_evidence_filters_terminal_items() {
        let case: Case = serde_json::from_value(json!({
            "id_caso": "c1",
            "titulo": "Caso",
            "resumen": "",
            "fecha_creacion": "2024-05-01T10:15:30",
            "evidencias": [
                {"id_evidencia": "a", "nombre_archivo": "a.pdf", "estado_procesamiento": "completado"},
                {"id_evidencia": "b", "nombre_archivo": "b.pdf", "estado_procesamiento": "procesando"},
                {"id_evidencia": "c", "nombre_archivo": "c.pdf", "estado_procesamiento": "error"}
            ]
        }))
        .unwrap();

        let pending: Vec<_> = case.pending_evidence().map(|e| e.id.as_str()).collect();
        assert_eq!(pending, vec!["b"]);
        assert_eq!(case.latest_evidence().unwrap().file_name, "c.pdf");
    }
}
