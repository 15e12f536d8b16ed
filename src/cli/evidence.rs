//! Text rendering for cases and evidence analysis.

use std::fmt;

use crate::domain::{Case, Evidence, ProcessingState};

/// One line per case for list output
pub fn case_row(case: &Case) -> String {
    format!(
        "{:<38} {:<40} {:>3}",
        case.id,
        truncate(&case.title, 40),
        case.evidence.len()
    )
}

/// Full case detail, including every evidence item
pub struct CaseReport<'a>(pub &'a Case);

impl fmt::Display for CaseReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let case = self.0;

        writeln!(f, "Case: {}", case.title)?;
        let summary = case
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Not provided");
        writeln!(f, "Summary: {}", summary)?;
        writeln!(f, "ID: {}", case.id)?;
        writeln!(f, "Created: {}", case.created_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "\nEvidence ({})", case.evidence.len())?;

        for evidence in &case.evidence {
            writeln!(f, "{}", "-".repeat(60))?;
            write!(f, "{}", EvidenceReport(evidence))?;
        }

        Ok(())
    }
}

/// One evidence item; analysis sections only once it has completed
pub struct EvidenceReport<'a>(pub &'a Evidence);

impl fmt::Display for EvidenceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let evidence = self.0;

        writeln!(f, "File: {}", evidence.file_name)?;
        writeln!(f, "ID: {}", evidence.id)?;
        writeln!(f, "State: {}", state_label(evidence.state()))?;

        let Some(results) = evidence.results() else {
            return Ok(());
        };

        if let Some(text) = results.extracted_text.as_deref().filter(|t| !t.is_empty()) {
            writeln!(f, "\n## Extracted text\n{}", text)?;
        }

        if !results.entities.is_empty() {
            writeln!(f, "\n## Key entities")?;
            for entity in &results.entities {
                writeln!(f, "- {} ({})", entity.entity, entity.category)?;
            }
        }

        if !results.retrieved_context.is_empty() {
            writeln!(
                f,
                "\n## Retrieved information\n{}",
                results.retrieved_context.join("\n\n")
            )?;
        }

        if let Some(draft) = results.strategy_draft.as_deref().filter(|d| !d.is_empty()) {
            writeln!(f, "\n## Strategy draft\n{}", draft)?;
        }

        if let Some(verdict) = &results.quality_check {
            writeln!(f, "\n## Quality verdict")?;
            writeln!(f, "Verified: {}", if verdict.verified { "yes" } else { "no" })?;
            writeln!(f, "Notes: {}", verdict.notes)?;
        }

        Ok(())
    }
}

/// Short human label for a state
pub fn state_label(state: &ProcessingState) -> String {
    match state {
        ProcessingState::Queued => "queued".to_string(),
        ProcessingState::Processing => "processing".to_string(),
        ProcessingState::Completed => "completed".to_string(),
        ProcessingState::Error(reason) => format!("error ({})", reason),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
