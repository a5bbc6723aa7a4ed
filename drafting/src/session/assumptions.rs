//! Assumption set and custom-instruction negotiation.
//!
//! At most one assumption is in custom mode at a time. Custom text is only
//! buffered here; `selected` changes only when the session confirms it.

use std::collections::HashMap;

use shared_types::{Assumption, AssumptionId};

use super::protocol::WorkflowError;

/// The fixed questions presented after analysing a reference document.
pub fn reference_assumptions() -> Vec<Assumption> {
    vec![
        assumption(
            1,
            "Legal Theory",
            "The reference describes unpaid invoices under a signed services agreement, so the draft proceeds on a breach of contract theory.",
            "Which legal theory should the draft rely on?",
            &["Breach of contract", "Unjust enrichment", "Account stated"],
        ),
        assumption(
            2,
            "Jurisdiction",
            "The agreement's governing-law clause points to New York.",
            "Which jurisdiction's law should the draft apply?",
            &["New York", "Delaware", "California"],
        ),
        assumption(
            3,
            "Tone",
            "Opposing counsel has not yet responded, so a firm but professional tone is appropriate.",
            "What tone should the letter take?",
            &["Firm and professional", "Conciliatory", "Aggressive"],
        ),
        assumption(
            4,
            "Relief Sought",
            "The reference quantifies the outstanding balance, so the draft demands payment in full.",
            "What relief should the draft demand?",
            &[
                "Payment in full within 14 days",
                "Payment plan proposal",
                "Payment plus interest and fees",
            ],
        ),
    ]
}

fn assumption(
    id: AssumptionId,
    category: &str,
    default_reading: &str,
    question: &str,
    options: &[&str],
) -> Assumption {
    Assumption {
        id,
        category: category.to_string(),
        assumption: default_reading.to_string(),
        question: question.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        selected: None,
    }
}

/// Custom-mode cursor and per-assumption text buffers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomInstructions {
    active: Option<AssumptionId>,
    /// `selected` of the active assumption when custom mode was entered
    rollback: Option<String>,
    buffers: HashMap<AssumptionId, String>,
}

impl CustomInstructions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<AssumptionId> {
        self.active
    }

    pub fn is_active(&self, id: AssumptionId) -> bool {
        self.active == Some(id)
    }

    pub fn buffer(&self, id: AssumptionId) -> Option<&str> {
        self.buffers.get(&id).map(String::as_str)
    }

    pub fn rollback_point(&self) -> Option<&str> {
        self.rollback.as_deref()
    }

    /// Enter custom mode for `id`, or leave it if `id` is already active.
    /// Entering on a different assumption silently leaves the previous one and
    /// drops its buffer. Returns whether `id` is now active.
    pub fn toggle(&mut self, id: AssumptionId, current_selected: Option<&str>) -> bool {
        if self.is_active(id) {
            self.exit();
            return false;
        }
        if self.active.is_some() {
            self.exit();
        }
        self.active = Some(id);
        self.rollback = current_selected.map(str::to_string);
        true
    }

    pub fn set_input(&mut self, id: AssumptionId, text: impl Into<String>) -> Result<(), WorkflowError> {
        if !self.is_active(id) {
            return Err(WorkflowError::CustomModeInactive(id));
        }
        self.buffers.insert(id, text.into());
        Ok(())
    }

    /// Validate and take the buffered text for `id`, leaving custom mode.
    /// Whitespace is trimmed; a blank buffer leaves the mode untouched.
    pub fn take_confirmed(&mut self, id: AssumptionId) -> Result<String, WorkflowError> {
        if !self.is_active(id) {
            return Err(WorkflowError::CustomModeInactive(id));
        }
        let text = self
            .buffers
            .get(&id)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(WorkflowError::EmptyCustomInstruction(id))?;
        self.exit();
        Ok(text)
    }

    /// Discard the active buffer and leave custom mode. Returns the assumption
    /// that was active and its rollback point.
    pub fn cancel(&mut self) -> Option<(AssumptionId, Option<String>)> {
        let id = self.active?;
        let rollback = self.rollback.take();
        self.exit();
        Some((id, rollback))
    }

    fn exit(&mut self) {
        if let Some(id) = self.active.take() {
            self.buffers.remove(&id);
        }
        self.rollback = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_set_has_four_unanswered_questions() {
        let set = reference_assumptions();
        assert_eq!(set.len(), 4);
        assert!(set.iter().all(|a| a.selected.is_none()));
        assert!(set.iter().all(|a| !a.options.is_empty()));
        let ids: Vec<_> = set.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn entering_second_assumption_exits_first() {
        let mut custom = CustomInstructions::new();
        assert!(custom.toggle(1, None));
        custom.set_input(1, "draft text").unwrap();

        assert!(custom.toggle(2, Some("Delaware")));
        assert_eq!(custom.active(), Some(2));
        assert!(!custom.is_active(1));
        assert_eq!(custom.buffer(1), None);
        assert_eq!(custom.rollback_point(), Some("Delaware"));
    }

    #[test]
    fn toggling_active_assumption_leaves_custom_mode() {
        let mut custom = CustomInstructions::new();
        custom.toggle(3, None);
        assert!(!custom.toggle(3, None));
        assert_eq!(custom.active(), None);
    }

    #[test]
    fn input_requires_active_custom_mode() {
        let mut custom = CustomInstructions::new();
        assert_eq!(
            custom.set_input(1, "text"),
            Err(WorkflowError::CustomModeInactive(1))
        );
    }

    #[test]
    fn blank_buffer_cannot_be_confirmed() {
        let mut custom = CustomInstructions::new();
        custom.toggle(1, None);
        assert_eq!(
            custom.take_confirmed(1),
            Err(WorkflowError::EmptyCustomInstruction(1))
        );
        custom.set_input(1, "   ").unwrap();
        assert_eq!(
            custom.take_confirmed(1),
            Err(WorkflowError::EmptyCustomInstruction(1))
        );
        assert!(custom.is_active(1));

        custom.set_input(1, "  Quantum meruit  ").unwrap();
        assert_eq!(custom.take_confirmed(1).unwrap(), "Quantum meruit");
        assert_eq!(custom.active(), None);
    }

    #[test]
    fn cancel_returns_rollback_point() {
        let mut custom = CustomInstructions::new();
        assert_eq!(custom.cancel(), None);

        custom.toggle(4, Some("Payment plan proposal"));
        custom.set_input(4, "something else").unwrap();
        assert_eq!(
            custom.cancel(),
            Some((4, Some("Payment plan proposal".to_string())))
        );
        assert_eq!(custom.buffer(4), None);
        assert_eq!(custom.active(), None);
    }
}
