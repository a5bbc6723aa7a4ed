//! Session error taxonomy and action outcomes.

use shared_types::{ActionKind, AssumptionId, TaskPhase};

/// Operation a caller attempted, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    SubmitReferenceFile,
    AnswerAssumption,
    CustomInstruction,
    BeginDrafting,
    CompleteDraft,
    RequestReview,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmitReferenceFile => "submit_reference_file",
            Self::AnswerAssumption => "answer_assumption",
            Self::CustomInstruction => "custom_instruction",
            Self::BeginDrafting => "begin_drafting",
            Self::CompleteDraft => "complete_draft",
            Self::RequestReview => "request_review",
        }
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by session operations. All are recoverable; the UI decides
/// whether to surface them or ignore them.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no active drafting task")]
    NoActiveTask,

    #[error("cannot {action} while task is in phase {from}")]
    InvalidPhaseTransition { from: TaskPhase, action: TaskAction },

    #[error("unknown assumption: {0}")]
    UnknownAssumption(AssumptionId),

    #[error("custom instruction for assumption {0} is empty")]
    EmptyCustomInstruction(AssumptionId),

    #[error("answer for assumption {0} is empty")]
    EmptyAnswer(AssumptionId),

    #[error("assumption {0} is not in custom mode")]
    CustomModeInactive(AssumptionId),

    #[error("chat tab not found: {0}")]
    UnknownTab(String),

    #[error("notification not found: {0}")]
    NotificationNotFound(String),

    #[error("no completed job to act on")]
    NoCompletedJob,
}

impl WorkflowError {
    /// Errors the reference UI silently ignored because the affordance that
    /// triggers them is hidden or disabled in that state.
    pub fn is_benign_noop(&self) -> bool {
        matches!(
            self,
            Self::InvalidPhaseTransition { .. }
                | Self::UnknownAssumption(_)
                | Self::EmptyCustomInstruction(_)
                | Self::EmptyAnswer(_)
                | Self::CustomModeInactive(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveTask => "NO_ACTIVE_TASK",
            Self::InvalidPhaseTransition { .. } => "INVALID_PHASE_TRANSITION",
            Self::UnknownAssumption(_) => "UNKNOWN_ASSUMPTION",
            Self::EmptyCustomInstruction(_) => "EMPTY_CUSTOM_INSTRUCTION",
            Self::EmptyAnswer(_) => "EMPTY_ANSWER",
            Self::CustomModeInactive(_) => "CUSTOM_MODE_INACTIVE",
            Self::UnknownTab(_) => "UNKNOWN_TAB",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::NoCompletedJob => "NO_COMPLETED_JOB",
        }
    }
}

/// Where a notification action should take the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTarget {
    pub notification_id: String,
    pub action: ActionKind,
    pub job_id: String,
    pub task_id: Option<String>,
    pub tab_id: Option<String>,
    /// The notification's own job could not be resolved and the most recently
    /// completed job was used instead
    pub fallback: bool,
}

/// Caller-supplied side of a notification action (e.g. opening the document
/// canvas). Opaque to the session.
pub trait NotificationActionHandler {
    fn handle(&mut self, target: &ActionTarget);
}

impl<F> NotificationActionHandler for F
where
    F: FnMut(&ActionTarget),
{
    fn handle(&mut self, target: &ActionTarget) {
        self(target)
    }
}

/// Handler that does nothing beyond the session's own bookkeeping
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActionHandler;

impl NotificationActionHandler for NoopActionHandler {
    fn handle(&mut self, _target: &ActionTarget) {}
}
