//! Drafting session - the task state machine and its collaborators.
//!
//! One [`DraftingSession`] owns the single active [`DraftingTask`], the job
//! registry, the notification queue and the chat tabs for a UI session.
//! Every public operation first fires the timers that are already due, then
//! applies itself; a phase change and its message append happen in the same
//! call, so observers never see one without the other.
//!
//! Phases only move forward:
//! `Upload -> Analyzing -> Assumptions -> Drafting -> Complete -> Review`.

pub mod assumptions;
pub mod chat_tabs;
pub mod jobs;
pub mod notifications;
pub mod protocol;

use chrono::{DateTime, Utc};
use shared_types::{
    Action, ActionKind, AssumptionId, DocumentGenerationRequest, DraftingTask, JobKind, JobStatus,
    Message, MessageKind, NotificationLevel, SessionId, SessionSnapshot, TaskPhase, TaskStatus,
    UploadedFile,
};

use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::timers::{TimerEvent, TimerQueue};

pub use assumptions::{reference_assumptions, CustomInstructions};
pub use chat_tabs::ChatTabs;
pub use jobs::{JobRegistry, JobUpdate};
pub use notifications::{NewNotification, NotificationQueue};
pub use protocol::{
    ActionTarget, NoopActionHandler, NotificationActionHandler, TaskAction, WorkflowError,
};

/// Per-task runtime bookkeeping that is replaced together with the task
#[derive(Debug, Clone)]
struct ActiveTask {
    task: DraftingTask,
    tab_id: String,
    custom: CustomInstructions,
    confirmation_scheduled: bool,
    drafting_message_id: Option<String>,
}

pub struct DraftingSession<C: Clock = SystemClock> {
    session_id: SessionId,
    config: WorkflowConfig,
    clock: C,
    active: Option<ActiveTask>,
    jobs: JobRegistry,
    notifications: NotificationQueue,
    tabs: ChatTabs,
    timers: TimerQueue,
}

impl DraftingSession<SystemClock> {
    pub fn new(config: WorkflowConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> DraftingSession<C> {
    pub fn with_clock(config: WorkflowConfig, clock: C) -> Self {
        Self {
            session_id: SessionId::new(),
            config,
            clock,
            active: None,
            jobs: JobRegistry::new(),
            notifications: NotificationQueue::new(),
            tabs: ChatTabs::new(),
            timers: TimerQueue::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn task(&self) -> Option<&DraftingTask> {
        self.active.as_ref().map(|active| &active.task)
    }

    pub fn task_tab_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.tab_id.as_str())
    }

    pub fn custom_instructions(&self) -> Option<&CustomInstructions> {
        self.active.as_ref().map(|active| &active.custom)
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn chat_tabs(&self) -> &ChatTabs {
        &self.tabs
    }

    pub fn next_timer_due(&self) -> Option<DateTime<Utc>> {
        self.timers.next_due()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            task: self.task().cloned(),
            jobs: self.jobs.jobs().to_vec(),
            notifications: self.notifications.notifications().to_vec(),
            chat_tabs: self.tabs.tabs().to_vec(),
            active_tab_id: self.tabs.active_tab_id().map(str::to_string),
            unread_notifications: self.notifications.unread_count(),
            taken_at: self.clock.now(),
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Fire every timer due at or before now, each at its own due time.
    /// Returns how many fired.
    pub fn run_due_timers(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(timer) = self.timers.pop_due(now) {
            tracing::debug!(timer = timer.event.name(), due_at = %timer.due_at, "Timer fired");
            self.fire(timer.event, timer.due_at);
            fired += 1;
        }
        fired
    }

    /// Drop every pending timer (session teardown).
    pub fn clear_timers(&mut self) -> usize {
        self.timers.cancel_where(|_| true)
    }

    fn fire(&mut self, event: TimerEvent, at: DateTime<Utc>) {
        match event {
            TimerEvent::AnalysisNotice { task_id } => self.on_analysis_notice(&task_id, at),
            TimerEvent::AnalysisFinished { task_id } => self.on_analysis_finished(&task_id, at),
            TimerEvent::AssumptionsConfirmed { task_id } => {
                self.on_assumptions_confirmed(&task_id, at)
            }
            TimerEvent::DraftingDue { task_id } => self.on_drafting_due(&task_id, at),
            TimerEvent::GenerationDue { job_id } => self.complete_document_job(&job_id, at),
            TimerEvent::Tick => self.on_tick(at),
        }
    }

    fn arm_tick(&mut self, now: DateTime<Utc>) {
        if !self.timers.contains(|event| *event == TimerEvent::Tick) {
            self.timers
                .schedule(now + self.config.tick_interval(), TimerEvent::Tick);
        }
    }

    // =========================================================================
    // Task lifecycle
    // =========================================================================

    /// Start a new drafting task, abandoning any previous one. The old task's
    /// timers are cancelled and its in-progress drafting job is marked
    /// cancelled so nothing stale can fire against the new task.
    pub fn create_task(&mut self) -> String {
        self.run_due_timers();
        let now = self.clock.now();

        if let Some(previous) = self.active.take() {
            let cancelled = self.timers.cancel_for_task(&previous.task.id);
            if let Some(job_id) = previous.task.drafting_job_id.as_deref() {
                self.jobs.cancel(job_id, now);
            }
            tracing::info!(
                task_id = %previous.task.id,
                phase = %previous.task.phase,
                cancelled_timers = cancelled,
                "Abandoning drafting task"
            );
        }

        let task = DraftingTask {
            id: shared_types::new_id("task"),
            title: self.config.task_title.clone(),
            status: TaskStatus::NeedsInput,
            phase: TaskPhase::Upload,
            messages: Vec::new(),
            uploaded_file: None,
            assumptions: Vec::new(),
            assumption_responses: Default::default(),
            drafting_start_time: None,
            elapsed_ms: 0,
            draft_ready: false,
            drafting_job_id: None,
            created_at: now,
        };
        let task_id = task.id.clone();
        let tab_id = self.tabs.open_tab(&task.title, Some(task_id.clone()), now);
        self.active = Some(ActiveTask {
            task,
            tab_id,
            custom: CustomInstructions::new(),
            confirmation_scheduled: false,
            drafting_message_id: None,
        });

        self.push_message(Message::assistant(
            "Upload a reference document and I'll use it as the basis for your draft.",
            MessageKind::UploadPrompt,
            now,
        ));
        tracing::info!(task_id = %task_id, "Drafting task created");
        task_id
    }

    pub fn submit_reference_file(&mut self, file: UploadedFile) -> Result<(), WorkflowError> {
        self.run_due_timers();
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        advance_phase(
            &mut active.task,
            TaskPhase::Analyzing,
            TaskAction::SubmitReferenceFile,
        )?;
        active.task.status = TaskStatus::Generating;
        active.task.uploaded_file = Some(file.clone());
        let task_id = active.task.id.clone();

        self.push_message(Message::user(
            format!("Uploaded **{}**", file.name),
            MessageKind::FileUpload { file },
            now,
        ));
        self.timers.schedule(
            now + self.config.analysis_notice_delay(),
            TimerEvent::AnalysisNotice {
                task_id: task_id.clone(),
            },
        );
        self.timers.schedule(
            now + self.config.analysis_duration(),
            TimerEvent::AnalysisFinished { task_id },
        );
        Ok(())
    }

    fn on_analysis_notice(&mut self, task_id: &str, at: DateTime<Utc>) {
        let Some(active) = self.active_for(task_id) else {
            return;
        };
        if active.task.phase != TaskPhase::Analyzing {
            return;
        }
        let file_name = active
            .task
            .uploaded_file
            .as_ref()
            .map(|file| file.name.clone())
            .unwrap_or_default();
        self.push_message(Message::assistant(
            format!("Analyzing **{file_name}** for parties, claims, and key terms..."),
            MessageKind::Analyzing,
            at,
        ));
    }

    fn on_analysis_finished(&mut self, task_id: &str, at: DateTime<Utc>) {
        let Some(active) = self.active_for(task_id) else {
            return;
        };
        if let Err(err) = advance_phase(
            &mut active.task,
            TaskPhase::Assumptions,
            TaskAction::SubmitReferenceFile,
        ) {
            tracing::debug!(task_id, error = %err, "Skipping stale analysis timer");
            return;
        }
        active.task.status = TaskStatus::NeedsInput;
        active.task.assumptions = reference_assumptions();
        let assumption_ids = active.task.assumptions.iter().map(|a| a.id).collect();

        self.push_message(Message::assistant(
            "I've reviewed your reference. Before drafting, please confirm a few assumptions:",
            MessageKind::AssumptionsPresented { assumption_ids },
            at,
        ));
    }

    pub fn answer_assumption(
        &mut self,
        assumption_id: AssumptionId,
        value: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.run_due_timers();
        let now = self.clock.now();
        let confirmation_delay = self.config.confirmation_delay();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        require_phase(
            &active.task,
            TaskPhase::Assumptions,
            TaskAction::AnswerAssumption,
        )?;
        let value: String = value.into();
        let value = value.trim().to_string();
        if active.task.assumption(assumption_id).is_none() {
            return Err(WorkflowError::UnknownAssumption(assumption_id));
        }
        if value.is_empty() {
            return Err(WorkflowError::EmptyAnswer(assumption_id));
        }
        let assumption = active
            .task
            .assumption_mut(assumption_id)
            .ok_or(WorkflowError::UnknownAssumption(assumption_id))?;
        assumption.selected = Some(value.clone());
        active
            .task
            .assumption_responses
            .insert(assumption_id, value);
        if active.custom.is_active(assumption_id) {
            active.custom.cancel();
        }
        tracing::debug!(task_id = %active.task.id, assumption_id, "Assumption answered");

        if active.task.all_assumptions_answered() && !active.confirmation_scheduled {
            active.confirmation_scheduled = true;
            let task_id = active.task.id.clone();
            self.timers.schedule(
                now + confirmation_delay,
                TimerEvent::AssumptionsConfirmed { task_id },
            );
        }
        Ok(())
    }

    fn on_assumptions_confirmed(&mut self, task_id: &str, at: DateTime<Utc>) {
        let Some(active) = self.active_for(task_id) else {
            return;
        };
        if active.task.phase != TaskPhase::Assumptions || !active.task.all_assumptions_answered()
        {
            return;
        }
        let mut summary = String::from("Thanks. I'll draft with these choices:\n");
        for assumption in &active.task.assumptions {
            if let Some(selected) = assumption.selected.as_deref() {
                summary.push_str(&format!("\n**{}:** {}", assumption.category, selected));
            }
        }
        summary.push_str("\n\nReady when you are.");
        self.push_message(Message::assistant(summary, MessageKind::BeginDrafting, at));
    }

    // =========================================================================
    // Custom instructions
    // =========================================================================

    /// Enter or leave custom mode for an assumption. Returns whether the
    /// assumption is in custom mode afterwards.
    pub fn toggle_custom_mode(&mut self, assumption_id: AssumptionId) -> Result<bool, WorkflowError> {
        self.run_due_timers();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        require_phase(
            &active.task,
            TaskPhase::Assumptions,
            TaskAction::CustomInstruction,
        )?;
        let selected = active
            .task
            .assumption(assumption_id)
            .ok_or(WorkflowError::UnknownAssumption(assumption_id))?
            .selected
            .clone();
        Ok(active.custom.toggle(assumption_id, selected.as_deref()))
    }

    pub fn set_custom_input(
        &mut self,
        assumption_id: AssumptionId,
        text: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        if active.task.assumption(assumption_id).is_none() {
            return Err(WorkflowError::UnknownAssumption(assumption_id));
        }
        active.custom.set_input(assumption_id, text)
    }

    /// Answer the assumption with the buffered custom text and leave custom
    /// mode. A blank buffer is rejected and custom mode stays open.
    pub fn confirm_custom_instruction(
        &mut self,
        assumption_id: AssumptionId,
    ) -> Result<(), WorkflowError> {
        self.run_due_timers();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        require_phase(
            &active.task,
            TaskPhase::Assumptions,
            TaskAction::CustomInstruction,
        )?;
        if active.task.assumption(assumption_id).is_none() {
            return Err(WorkflowError::UnknownAssumption(assumption_id));
        }
        let text = active.custom.take_confirmed(assumption_id)?;
        self.answer_assumption(assumption_id, text)
    }

    /// Discard the buffer of the assumption in custom mode, if any. Its
    /// `selected` value was never touched by the buffer, so nothing else
    /// changes. Returns the assumption that left custom mode.
    pub fn cancel_custom_instruction(&mut self) -> Result<Option<AssumptionId>, WorkflowError> {
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        Ok(active.custom.cancel().map(|(assumption_id, _)| assumption_id))
    }

    // =========================================================================
    // Drafting
    // =========================================================================

    /// Start drafting. Rejected unless every assumption is answered and
    /// drafting has not started, so repeated calls never create a second job
    /// or a second tick. Returns the drafting job id.
    pub fn begin_drafting(&mut self) -> Result<String, WorkflowError> {
        self.run_due_timers();
        let now = self.clock.now();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        if active.task.drafting_started() || !active.task.all_assumptions_answered() {
            return Err(WorkflowError::InvalidPhaseTransition {
                from: active.task.phase,
                action: TaskAction::BeginDrafting,
            });
        }
        advance_phase(&mut active.task, TaskPhase::Drafting, TaskAction::BeginDrafting)?;

        let task_id = active.task.id.clone();
        active.custom.cancel();
        active.task.status = TaskStatus::Generating;
        active.task.drafting_start_time = Some(now);
        active.task.elapsed_ms = 0;

        let source = active
            .task
            .uploaded_file
            .as_ref()
            .map(|file| format!("Drafting from {}", file.name))
            .unwrap_or_else(|| "Drafting".to_string());
        let job = JobRegistry::new_job(
            JobKind::Drafting,
            Some(task_id.clone()),
            active.task.title.clone(),
            source,
            now,
        );
        let job_id = job.id.clone();
        active.task.drafting_job_id = Some(job_id.clone());
        self.jobs.add_job(job);

        // The confirmation is moot once drafting has begun.
        self.timers.cancel_where(|event| {
            matches!(event, TimerEvent::AssumptionsConfirmed { task_id: t } if *t == task_id)
        });

        let message = Message::assistant(
            "Drafting your document. You can keep working; I'll notify you when it's ready.",
            MessageKind::DraftingInProgress {
                job_id: job_id.clone(),
            },
            now,
        );
        if let Some(active) = self.active.as_mut() {
            active.drafting_message_id = Some(message.id.clone());
        }
        self.push_message(message);
        self.timers.schedule(
            now + self.config.drafting_duration(),
            TimerEvent::DraftingDue {
                task_id: task_id.clone(),
            },
        );
        self.arm_tick(now);

        tracing::info!(task_id = %task_id, job_id = %job_id, "Drafting started");
        Ok(job_id)
    }

    /// Finish drafting now. Rejected unless the task is drafting, so the tick
    /// path and a manual trigger can never both apply completion.
    pub fn complete_draft(&mut self) -> Result<(), WorkflowError> {
        self.run_due_timers();
        let now = self.clock.now();
        self.complete_draft_at(now)
    }

    fn complete_draft_at(&mut self, at: DateTime<Utc>) -> Result<(), WorkflowError> {
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        advance_phase(&mut active.task, TaskPhase::Complete, TaskAction::CompleteDraft)?;

        active.task.status = TaskStatus::DraftComplete;
        active.task.draft_ready = true;
        if let Some(start) = active.task.drafting_start_time {
            active.task.elapsed_ms = jobs::elapsed_ms(start, at);
        }
        let task_id = active.task.id.clone();
        let title = active.task.title.clone();
        let tab_id = active.tab_id.clone();
        let job_id = active.task.drafting_job_id.clone().unwrap_or_default();

        if let Some(message_id) = active.drafting_message_id.clone() {
            let kind = MessageKind::DraftingComplete {
                job_id: job_id.clone(),
            };
            if let Some(message) = active
                .task
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
            {
                message.kind = kind.clone();
            }
            self.tabs.replace_kind(&tab_id, &message_id, kind);
        }

        self.jobs.complete(&job_id, at);
        self.timers.cancel_where(|event| {
            matches!(event, TimerEvent::DraftingDue { task_id: t } if *t == task_id)
        });
        let actions = vec![Action::review_draft(), Action::export()];
        self.push_message(Message::assistant(
            format!("Your **{title}** is ready. Review it now or export a copy."),
            MessageKind::DraftReady {
                actions: actions.clone(),
            },
            at,
        ));
        self.notifications.enqueue(
            NewNotification {
                level: NotificationLevel::Success,
                title: shared_types::DRAFT_COMPLETE_TITLE.to_string(),
                message: format!("{title} is ready for review."),
                actions,
                job_id: Some(job_id.clone()),
            },
            at,
        );

        tracing::info!(task_id = %task_id, job_id = %job_id, "Draft complete");
        Ok(())
    }

    pub fn request_review(&mut self) -> Result<(), WorkflowError> {
        self.run_due_timers();
        let active = self.active.as_mut().ok_or(WorkflowError::NoActiveTask)?;
        advance_phase(&mut active.task, TaskPhase::Review, TaskAction::RequestReview)
    }

    /// Refresh elapsed times. Completion is driven by each job's own due
    /// timer, so a shared tick never delays it.
    fn on_tick(&mut self, at: DateTime<Utc>) {
        self.jobs.tick_all(at);
        if let Some(active) = self.active.as_mut() {
            if active.task.phase == TaskPhase::Drafting {
                if let Some(start) = active.task.drafting_start_time {
                    active.task.elapsed_ms = jobs::elapsed_ms(start, at);
                }
            }
        }
        if self.jobs.has_in_progress() {
            self.timers
                .schedule(at + self.config.tick_interval(), TimerEvent::Tick);
        }
    }

    fn on_drafting_due(&mut self, task_id: &str, at: DateTime<Utc>) {
        if self.active_for(task_id).is_none() {
            return;
        }
        if let Err(err) = self.complete_draft_at(at) {
            tracing::debug!(task_id, error = %err, "Drafting deadline skipped");
        }
    }

    // =========================================================================
    // Document generation
    // =========================================================================

    pub fn start_document_generation(&mut self, request: DocumentGenerationRequest) -> String {
        self.run_due_timers();
        let now = self.clock.now();
        let description = match &request.creation {
            shared_types::CreationMethod::Blueprint { blueprint_name } => {
                format!("Generating from blueprint {blueprint_name}")
            }
            shared_types::CreationMethod::Reference {
                file_name,
                document_type,
                ..
            } => match document_type {
                Some(doc_type) => format!("Generating {doc_type} from {file_name}"),
                None => format!("Generating from {file_name}"),
            },
        };
        let job = JobRegistry::new_job(
            JobKind::DocumentGeneration {
                creation: request.creation,
                saved_as_blueprint: request.save_as_blueprint,
            },
            None,
            request.title,
            description,
            now,
        );
        let job_id = job.id.clone();
        self.jobs.add_job(job);
        self.timers.schedule(
            now + self.config.document_generation_duration(),
            TimerEvent::GenerationDue {
                job_id: job_id.clone(),
            },
        );
        self.arm_tick(now);
        tracing::info!(job_id = %job_id, "Document generation started");
        job_id
    }

    pub fn mark_saved_as_blueprint(&mut self, job_id: &str) -> bool {
        self.jobs.update_job(
            job_id,
            JobUpdate {
                saved_as_blueprint: Some(true),
                ..JobUpdate::default()
            },
        )
    }

    fn complete_document_job(&mut self, job_id: &str, at: DateTime<Utc>) {
        if !self.jobs.complete(job_id, at) {
            return;
        }
        let title = self
            .jobs
            .get(job_id)
            .map(|job| job.title.clone())
            .unwrap_or_default();
        self.notifications.enqueue(
            NewNotification {
                level: NotificationLevel::Success,
                title: shared_types::DOCUMENT_READY_TITLE.to_string(),
                message: format!("{title} has been generated."),
                actions: vec![Action::open_document(), Action::export()],
                job_id: Some(job_id.to_string()),
            },
            at,
        );
        tracing::info!(job_id, "Document generation complete");
    }

    // =========================================================================
    // Chat tabs
    // =========================================================================

    pub fn open_chat_tab(&mut self, title: impl Into<String>) -> String {
        let now = self.clock.now();
        self.tabs.open_tab(title, None, now)
    }

    pub fn activate_chat_tab(&mut self, tab_id: &str) -> Result<(), WorkflowError> {
        if self.tabs.activate(tab_id) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownTab(tab_id.to_string()))
        }
    }

    pub fn close_chat_tab(&mut self, tab_id: &str) -> Result<(), WorkflowError> {
        if self.tabs.close(tab_id) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownTab(tab_id.to_string()))
        }
    }

    /// Append a plain user message to a tab. Messages on the active task's
    /// tab also land in the task transcript. Returns the message id.
    pub fn post_user_message(
        &mut self,
        tab_id: &str,
        text: impl Into<String>,
    ) -> Result<String, WorkflowError> {
        self.run_due_timers();
        let now = self.clock.now();
        let message = Message::user(text, MessageKind::PlainText, now);
        let message_id = message.id.clone();
        if self.task_tab_id() == Some(tab_id) {
            self.push_message(message);
            return Ok(message_id);
        }
        if self.tabs.append(tab_id, message) {
            Ok(message_id)
        } else {
            Err(WorkflowError::UnknownTab(tab_id.to_string()))
        }
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Post a notification on behalf of the host (e.g. an export finished).
    pub fn enqueue_notification(&mut self, new: NewNotification) -> String {
        let now = self.clock.now();
        self.notifications.enqueue(new, now)
    }

    pub fn mark_notification_read(&mut self, notification_id: &str) -> Result<(), WorkflowError> {
        if self.notifications.mark_read(notification_id) {
            Ok(())
        } else {
            Err(WorkflowError::NotificationNotFound(
                notification_id.to_string(),
            ))
        }
    }

    pub fn mark_all_notifications_read(&mut self) -> usize {
        self.notifications.mark_all_read()
    }

    /// Run a notification action: mark it read, resolve its job, reopen the
    /// task's chat tab, and hand the target to `handler`. A job that cannot be
    /// resolved degrades to the most recently completed job, flagged via
    /// [`ActionTarget::fallback`].
    pub fn dispatch_notification_action<H>(
        &mut self,
        notification_id: &str,
        action: ActionKind,
        handler: &mut H,
    ) -> Result<ActionTarget, WorkflowError>
    where
        H: NotificationActionHandler + ?Sized,
    {
        self.run_due_timers();
        let now = self.clock.now();
        let job_ref = self
            .notifications
            .get(notification_id)
            .ok_or_else(|| WorkflowError::NotificationNotFound(notification_id.to_string()))?
            .job_id
            .clone();
        self.notifications.mark_read(notification_id);

        let resolved = job_ref.as_deref().and_then(|id| self.jobs.get(id));
        let (job, fallback) = match resolved {
            Some(job) => (job, false),
            None => {
                let job = self
                    .jobs
                    .most_recently_completed()
                    .ok_or(WorkflowError::NoCompletedJob)?;
                tracing::warn!(
                    notification_id,
                    missing_job_id = ?job_ref,
                    fallback_job_id = %job.id,
                    "Notification job not found; falling back to most recently completed job"
                );
                (job, true)
            }
        };
        let job_id = job.id.clone();
        let task_id = job.task_id.clone();

        let mut tab_id = None;
        if let Some(task_id) = task_id.as_deref() {
            if let Some(active) = self.active.as_mut().filter(|a| a.task.id == task_id) {
                let id = self.tabs.reopen_for_task(
                    task_id,
                    &active.task.title,
                    &active.task.messages,
                    now,
                );
                active.tab_id = id.clone();
                if action == ActionKind::ReviewDraft && active.task.phase == TaskPhase::Complete {
                    advance_phase(&mut active.task, TaskPhase::Review, TaskAction::RequestReview)?;
                }
                tab_id = Some(id);
            } else if let Some(id) = self.tabs.tab_for_task(task_id).map(|tab| tab.id.clone()) {
                self.tabs.activate(&id);
                tab_id = Some(id);
            }
        }

        let target = ActionTarget {
            notification_id: notification_id.to_string(),
            action,
            job_id,
            task_id,
            tab_id,
            fallback,
        };
        tracing::info!(
            notification_id,
            action = ?action,
            job_id = %target.job_id,
            fallback,
            "Dispatching notification action"
        );
        handler.handle(&target);
        Ok(target)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn active_for(&mut self, task_id: &str) -> Option<&mut ActiveTask> {
        let active = self.active.as_mut().filter(|a| a.task.id == task_id);
        if active.is_none() {
            tracing::debug!(task_id, "Timer for inactive task ignored");
        }
        active
    }

    /// Append to the task transcript and its tab in one step.
    fn push_message(&mut self, message: Message) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        self.tabs.append(&active.tab_id, message.clone());
        active.task.messages.push(message);
    }

    /// Whether the drafting job for the active task is still running.
    pub fn drafting_in_progress(&self) -> bool {
        self.task()
            .and_then(|task| task.drafting_job_id.as_deref())
            .and_then(|id| self.jobs.get(id))
            .is_some_and(|job| job.status == JobStatus::InProgress)
    }
}

fn require_phase(
    task: &DraftingTask,
    expected: TaskPhase,
    action: TaskAction,
) -> Result<(), WorkflowError> {
    if task.phase == expected {
        Ok(())
    } else {
        Err(WorkflowError::InvalidPhaseTransition {
            from: task.phase,
            action,
        })
    }
}

/// The single gate for phase changes: only the immediate successor is legal.
fn advance_phase(
    task: &mut DraftingTask,
    next: TaskPhase,
    action: TaskAction,
) -> Result<(), WorkflowError> {
    if task.phase.successor() != Some(next) {
        return Err(WorkflowError::InvalidPhaseTransition {
            from: task.phase,
            action,
        });
    }
    tracing::info!(task_id = %task.id, from = %task.phase, to = %next, "Task phase advanced");
    task.phase = next;
    Ok(())
}
