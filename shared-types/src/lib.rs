//! Shared types between the drafting engine and the UI
//!
//! These types are used by both:
//! - the workflow engine and its session actor (native Rust)
//! - the case-management front end (via generated TypeScript bindings)
//!
//! Serializable with serde for JSON snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a UI session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Assumption ids are stable small integers within a task.
pub type AssumptionId = u32;

/// Build a prefixed, time-sortable id (e.g. `job_01J...`).
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", ulid::Ulid::new())
}

// ============================================================================
// Drafting Task
// ============================================================================

/// Coarse, user-facing task state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum TaskStatus {
    NeedsInput,
    Generating,
    DraftComplete,
}

/// Fine-grained workflow position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum TaskPhase {
    Upload,
    Analyzing,
    Assumptions,
    Drafting,
    Complete,
    Review,
}

impl TaskPhase {
    /// Position along the forward-only workflow.
    pub fn rank(self) -> u8 {
        match self {
            Self::Upload => 0,
            Self::Analyzing => 1,
            Self::Assumptions => 2,
            Self::Drafting => 3,
            Self::Complete => 4,
            Self::Review => 5,
        }
    }

    /// The only phase reachable from `self`, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Upload => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Assumptions),
            Self::Assumptions => Some(Self::Drafting),
            Self::Drafting => Some(Self::Complete),
            Self::Complete => Some(Self::Review),
            Self::Review => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Analyzing => "analyzing",
            Self::Assumptions => "assumptions",
            Self::Drafting => "drafting",
            Self::Complete => "complete",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for the reference file. File content is never consumed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct UploadedFile {
    pub name: String,
    #[ts(type = "number")]
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// One negotiable decision point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct Assumption {
    pub id: AssumptionId,
    pub category: String,
    /// The default interpretation, shown as justification text
    pub assumption: String,
    pub question: String,
    pub options: Vec<String>,
    /// `None` until answered; either one of `options` or a custom instruction
    pub selected: Option<String>,
}

impl Assumption {
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }

    /// True when the selected answer is not one of the canned options.
    pub fn is_custom_answer(&self) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|selected| !self.options.iter().any(|option| option == selected))
    }
}

/// The single in-flight document-drafting workflow instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct DraftingTask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub phase: TaskPhase,
    pub messages: Vec<Message>,
    pub uploaded_file: Option<UploadedFile>,
    pub assumptions: Vec<Assumption>,
    pub assumption_responses: BTreeMap<AssumptionId, String>,
    pub drafting_start_time: Option<DateTime<Utc>>,
    /// Display-only duration since drafting started
    #[ts(type = "number")]
    pub elapsed_ms: u64,
    pub draft_ready: bool,
    pub drafting_job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftingTask {
    pub fn assumption(&self, id: AssumptionId) -> Option<&Assumption> {
        self.assumptions.iter().find(|a| a.id == id)
    }

    pub fn assumption_mut(&mut self, id: AssumptionId) -> Option<&mut Assumption> {
        self.assumptions.iter_mut().find(|a| a.id == id)
    }

    /// AND over every assumption's answered state. False when no assumptions
    /// have been presented yet.
    pub fn all_assumptions_answered(&self) -> bool {
        !self.assumptions.is_empty() && self.assumptions.iter().all(Assumption::is_answered)
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn drafting_started(&self) -> bool {
        self.drafting_job_id.is_some()
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum Sender {
    User,
    Assistant,
}

/// What an actionable button does when invoked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum ActionKind {
    ReviewDraft,
    Export,
    OpenDocument,
}

/// Button attached to a message or notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct Action {
    pub label: String,
    pub kind: ActionKind,
    pub icon: String,
    pub primary: bool,
}

impl Action {
    pub fn review_draft() -> Self {
        Self {
            label: "Review Draft".to_string(),
            kind: ActionKind::ReviewDraft,
            icon: "eye".to_string(),
            primary: true,
        }
    }

    pub fn export() -> Self {
        Self {
            label: "Export".to_string(),
            kind: ActionKind::Export,
            icon: "download".to_string(),
            primary: false,
        }
    }

    pub fn open_document() -> Self {
        Self {
            label: "Open Document".to_string(),
            kind: ActionKind::OpenDocument,
            icon: "file-text".to_string(),
            primary: true,
        }
    }
}

/// Rendering mode of a message. Exactly one applies per message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum MessageKind {
    PlainText,
    UploadPrompt,
    FileUpload { file: UploadedFile },
    Analyzing,
    AssumptionsPresented { assumption_ids: Vec<AssumptionId> },
    BeginDrafting,
    DraftingInProgress { job_id: String },
    DraftingComplete { job_id: String },
    DraftReady { actions: Vec<Action> },
}

/// One entry in a chat transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    /// Free text, may contain `**bold**` markdown
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

impl Message {
    pub fn assistant(content: impl Into<String>, kind: MessageKind, at: DateTime<Utc>) -> Self {
        Self {
            id: new_id("msg"),
            sender: Sender::Assistant,
            content: content.into(),
            timestamp: at,
            kind,
        }
    }

    pub fn user(content: impl Into<String>, kind: MessageKind, at: DateTime<Utc>) -> Self {
        Self {
            id: new_id("msg"),
            sender: Sender::User,
            content: content.into(),
            timestamp: at,
            kind,
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum JobStatus {
    InProgress,
    Complete,
    /// Abandoned because its task was replaced
    Cancelled,
}

/// How a generated document is produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "method", rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum CreationMethod {
    Blueprint {
        blueprint_name: String,
    },
    Reference {
        file_name: String,
        document_type: Option<String>,
        instructions: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum JobKind {
    Drafting,
    DocumentGeneration {
        creation: CreationMethod,
        saved_as_blueprint: bool,
    },
}

/// Background-work record shown in the jobs panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct Job {
    pub id: String,
    /// Weak back-reference to the spawning task
    pub task_id: Option<String>,
    pub kind: JobKind,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[ts(type = "number")]
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_in_progress(&self) -> bool {
        self.status == JobStatus::InProgress
    }
}

/// Request from the document-generation form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct DocumentGenerationRequest {
    pub title: String,
    pub creation: CreationMethod,
    pub save_as_blueprint: bool,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One-shot user alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub actions: Vec<Action>,
    pub job_id: Option<String>,
}

// ============================================================================
// Chat Tabs
// ============================================================================

/// Per-tab ordered message log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct ChatTab {
    pub id: String,
    pub title: String,
    pub task_id: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// Everything the UI renders, taken after each mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/drafting.ts")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub task: Option<DraftingTask>,
    pub jobs: Vec<Job>,
    pub notifications: Vec<Notification>,
    pub chat_tabs: Vec<ChatTab>,
    pub active_tab_id: Option<String>,
    #[ts(type = "number")]
    pub unread_notifications: usize,
    pub taken_at: DateTime<Utc>,
}

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_TASK_TITLE: &str = "Draft Demand Letter";
pub const DRAFT_COMPLETE_TITLE: &str = "Draft Complete";
pub const DOCUMENT_READY_TITLE: &str = "Document Ready";

// ============================================================================
// Tests
// ============================================================================
