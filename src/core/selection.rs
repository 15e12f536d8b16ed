//! Which case the view is currently showing.

use crate::domain::CaseId;

/// Tracks the selected case id.
///
/// Re-selecting the current case reports no change, so callers can skip
/// the refresh and tracker teardown that a real change triggers.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    current: Option<CaseId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `case_id`; returns `true` if the selection changed
    pub fn select(&mut self, case_id: CaseId) -> bool {
        if self.current.as_ref() == Some(&case_id) {
            return false;
        }
        tracing::debug!("Selected case {}", case_id);
        self.current = Some(case_id);
        true
    }

    /// Clear the selection; returns `true` if something was selected
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn current(&self) -> Option<&CaseId> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_idempotent() {
        let mut selection = SelectionController::new();
        assert!(selection.current().is_none());

        assert!(selection.select(CaseId::new("a")));
        assert!(!selection.select(CaseId::new("a")));
        assert_eq!(selection.current(), Some(&CaseId::new("a")));

        assert!(selection.select(CaseId::new("b")));
        assert_eq!(selection.current(), Some(&CaseId::new("b")));
    }

    #[test]
    fn test_clear() {
        let mut selection = SelectionController::new();
        assert!(!selection.clear());

        selection.select(CaseId::new("a"));
        assert!(selection.clear());
        assert!(selection.current().is_none());
    }
}
