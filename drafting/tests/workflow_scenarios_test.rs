//! End-to-end drafting workflow tests on a manual clock
//!
//! Tests for:
//! - The upload -> assumptions -> drafting -> complete walk
//! - Forward-only phases and append-only message ordering
//! - Idempotent drafting start and completion
//! - Custom-mode exclusivity
//! - Notification dispatch, including the missing-job fallback

use drafting::session::{ActionTarget, NewNotification, NoopActionHandler, TaskAction};
use drafting::{DraftingSession, ManualClock, WorkflowConfig, WorkflowError};
use shared_types::{
    Action, ActionKind, JobStatus, MessageKind, NotificationLevel, TaskPhase, TaskStatus,
    UploadedFile, DRAFT_COMPLETE_TITLE,
};

fn new_session() -> (DraftingSession<ManualClock>, ManualClock) {
    let clock = ManualClock::at_epoch();
    let session = DraftingSession::with_clock(WorkflowConfig::default(), clock.clone());
    (session, clock)
}

fn reference_docx() -> UploadedFile {
    UploadedFile::new(
        "ref.docx",
        48_213,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    )
}

/// Advance in one-second steps, firing timers as a UI event loop would.
fn advance_secs(session: &mut DraftingSession<ManualClock>, clock: &ManualClock, secs: i64) {
    for _ in 0..secs {
        clock.advance_ms(1_000);
        session.run_due_timers();
    }
}

fn to_assumptions(session: &mut DraftingSession<ManualClock>, clock: &ManualClock) {
    session.create_task();
    session.submit_reference_file(reference_docx()).unwrap();
    advance_secs(session, clock, 3);
}

fn answer_all_with_first_option(session: &mut DraftingSession<ManualClock>) {
    let answers: Vec<_> = session
        .task()
        .unwrap()
        .assumptions
        .iter()
        .map(|a| (a.id, a.options[0].clone()))
        .collect();
    for (id, value) in answers {
        session.answer_assumption(id, value).unwrap();
    }
}

fn begin_drafting_count(session: &DraftingSession<ManualClock>) -> usize {
    session
        .task()
        .unwrap()
        .messages
        .iter()
        .filter(|m| m.kind == MessageKind::BeginDrafting)
        .count()
}

// ============================================================================
// Concrete scenarios
// ============================================================================

#[test]
fn test_create_task_starts_at_upload_with_prompt() {
    let (mut session, _clock) = new_session();
    session.create_task();

    let task = session.task().unwrap();
    assert_eq!(task.phase, TaskPhase::Upload);
    assert_eq!(task.status, TaskStatus::NeedsInput);
    assert_eq!(task.messages.len(), 1);
    assert_eq!(task.messages[0].kind, MessageKind::UploadPrompt);
}

#[test]
fn test_upload_analyzes_then_presents_four_assumptions() {
    let (mut session, clock) = new_session();
    session.create_task();
    session.submit_reference_file(reference_docx()).unwrap();
    assert_eq!(session.task().unwrap().phase, TaskPhase::Analyzing);

    advance_secs(&mut session, &clock, 2);
    assert_eq!(session.task().unwrap().phase, TaskPhase::Analyzing);

    advance_secs(&mut session, &clock, 1);
    let task = session.task().unwrap();
    assert_eq!(task.phase, TaskPhase::Assumptions);
    assert_eq!(task.assumptions.len(), 4);
    assert!(task.assumptions.iter().all(|a| a.selected.is_none()));
    assert_eq!(task.uploaded_file.as_ref().unwrap().name, "ref.docx");
}

#[test]
fn test_answering_all_posts_single_confirmation() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    assert_eq!(begin_drafting_count(&session), 0);

    advance_secs(&mut session, &clock, 1);
    assert_eq!(begin_drafting_count(&session), 1);

    advance_secs(&mut session, &clock, 5);
    assert_eq!(begin_drafting_count(&session), 1);
}

#[test]
fn test_begin_drafting_twice_creates_one_job() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    advance_secs(&mut session, &clock, 1);

    let job_id = session.begin_drafting().unwrap();
    let again = session.begin_drafting();
    assert!(matches!(
        again,
        Err(WorkflowError::InvalidPhaseTransition {
            from: TaskPhase::Drafting,
            action: TaskAction::BeginDrafting
        })
    ));

    assert_eq!(session.jobs().len(), 1);
    let job = session.jobs().get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.task_id.as_deref(), Some(session.task().unwrap().id.as_str()));
    assert_eq!(session.task().unwrap().status, TaskStatus::Generating);
}

#[test]
fn test_drafting_completes_after_thirty_seconds() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    let job_id = session.begin_drafting().unwrap();

    advance_secs(&mut session, &clock, 29);
    let task = session.task().unwrap();
    assert_eq!(task.phase, TaskPhase::Drafting);
    assert_eq!(task.elapsed_ms, 29_000);
    assert!(!task.draft_ready);

    advance_secs(&mut session, &clock, 1);
    let task = session.task().unwrap();
    assert_eq!(task.phase, TaskPhase::Complete);
    assert_eq!(task.status, TaskStatus::DraftComplete);
    assert!(task.draft_ready);

    let job = session.jobs().get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(session.notifications().len(), 1);
    let notification = &session.notifications().notifications()[0];
    assert_eq!(notification.title, DRAFT_COMPLETE_TITLE);
    assert_eq!(notification.job_id.as_deref(), Some(job_id.as_str()));
    assert!(!notification.read);

    // The in-progress message flipped to its completed form in place.
    assert!(task.messages.iter().any(
        |m| matches!(&m.kind, MessageKind::DraftingComplete { job_id: id } if *id == job_id)
    ));
    assert!(!task
        .messages
        .iter()
        .any(|m| matches!(m.kind, MessageKind::DraftingInProgress { .. })));
    assert!(matches!(
        task.messages.last().unwrap().kind,
        MessageKind::DraftReady { .. }
    ));
}

#[test]
fn test_drafting_deadline_ignores_earlier_job_tick() {
    let (mut session, clock) = new_session();
    let generation_job = session.start_document_generation(shared_types::DocumentGenerationRequest {
        title: "Engagement Letter".to_string(),
        creation: shared_types::CreationMethod::Blueprint {
            blueprint_name: "Standard Engagement".to_string(),
        },
        save_as_blueprint: false,
    });

    session.create_task();
    session.submit_reference_file(reference_docx()).unwrap();
    clock.advance_ms(3_500);
    session.run_due_timers();
    answer_all_with_first_option(&mut session);
    // Drafting starts half-way between two ticks of the running job.
    let drafting_job = session.begin_drafting().unwrap();

    clock.advance_ms(29_999);
    session.run_due_timers();
    assert_eq!(session.task().unwrap().phase, TaskPhase::Drafting);

    clock.advance_ms(1);
    session.run_due_timers();
    let task = session.task().unwrap();
    assert_eq!(task.phase, TaskPhase::Complete);
    assert_eq!(task.elapsed_ms, 30_000);
    let job = session.jobs().get(&drafting_job).unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.elapsed_ms, 30_000);

    // The generation job kept its own deadline.
    let generated = session.jobs().get(&generation_job).unwrap();
    assert_eq!(generated.status, JobStatus::Complete);
    assert_eq!(generated.elapsed_ms, 30_000);
}

#[test]
fn test_switching_custom_mode_keeps_previous_selection() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    session.answer_assumption(1, "Unjust enrichment").unwrap();

    assert!(session.toggle_custom_mode(1).unwrap());
    session.set_custom_input(1, "Promissory estoppel").unwrap();
    assert!(session.toggle_custom_mode(2).unwrap());

    let custom = session.custom_instructions().unwrap();
    assert_eq!(custom.active(), Some(2));
    assert!(!custom.is_active(1));
    assert_eq!(
        session.task().unwrap().assumption(1).unwrap().selected.as_deref(),
        Some("Unjust enrichment")
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_phases_only_move_forward() {
    let (mut session, clock) = new_session();
    let mut seen = Vec::new();
    let mut record = |session: &DraftingSession<ManualClock>| {
        let phase = session.task().unwrap().phase;
        if seen.last() != Some(&phase) {
            seen.push(phase);
        }
    };

    session.create_task();
    record(&session);
    // Out-of-order calls are rejected and never move the phase.
    assert!(session.begin_drafting().is_err());
    assert!(session.complete_draft().is_err());
    assert!(session.request_review().is_err());
    record(&session);

    session.submit_reference_file(reference_docx()).unwrap();
    record(&session);
    advance_secs(&mut session, &clock, 3);
    record(&session);
    assert!(session.submit_reference_file(reference_docx()).is_err());

    answer_all_with_first_option(&mut session);
    session.begin_drafting().unwrap();
    record(&session);
    assert!(session.answer_assumption(1, "Account stated").is_err());

    session.complete_draft().unwrap();
    record(&session);
    session.request_review().unwrap();
    record(&session);
    advance_secs(&mut session, &clock, 40);
    record(&session);

    assert_eq!(
        seen,
        vec![
            TaskPhase::Upload,
            TaskPhase::Analyzing,
            TaskPhase::Assumptions,
            TaskPhase::Drafting,
            TaskPhase::Complete,
            TaskPhase::Review,
        ]
    );
    assert!(seen.windows(2).all(|w| w[0].rank() < w[1].rank()));
}

#[test]
fn test_begin_drafting_requires_every_answer() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    session.answer_assumption(1, "Breach of contract").unwrap();
    session.answer_assumption(2, "New York").unwrap();
    session.answer_assumption(3, "Conciliatory").unwrap();

    assert!(matches!(
        session.begin_drafting(),
        Err(WorkflowError::InvalidPhaseTransition {
            from: TaskPhase::Assumptions,
            ..
        })
    ));
    assert!(session.jobs().is_empty());

    session.answer_assumption(4, "Payment plan proposal").unwrap();
    assert!(session.begin_drafting().is_ok());
}

#[test]
fn test_manual_and_timer_completion_apply_once() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    let job_id = session.begin_drafting().unwrap();
    advance_secs(&mut session, &clock, 10);

    session.complete_draft().unwrap();
    let second = session.complete_draft();
    assert!(matches!(
        second,
        Err(WorkflowError::InvalidPhaseTransition {
            from: TaskPhase::Complete,
            action: TaskAction::CompleteDraft
        })
    ));
    // The tick path reaching the duration later must not complete again.
    advance_secs(&mut session, &clock, 30);

    let task = session.task().unwrap();
    let ready_messages = task
        .messages
        .iter()
        .filter(|m| matches!(m.kind, MessageKind::DraftReady { .. }))
        .count();
    assert_eq!(ready_messages, 1);
    assert_eq!(session.notifications().for_job(&job_id).count(), 1);
    assert_eq!(session.jobs().get(&job_id).unwrap().status, JobStatus::Complete);
    assert_eq!(session.pending_timers(), 0);
}

#[test]
fn test_at_most_one_assumption_in_custom_mode() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);

    for id in [1, 2, 3, 2, 4, 4, 1] {
        session.toggle_custom_mode(id).unwrap();
        let custom = session.custom_instructions().unwrap();
        let active: Vec<_> = (1..=4).filter(|id| custom.is_active(*id)).collect();
        assert!(active.len() <= 1, "several assumptions in custom mode: {active:?}");
    }
    assert_eq!(session.custom_instructions().unwrap().active(), Some(1));
}

#[test]
fn test_messages_are_append_only_and_time_ordered() {
    let (mut session, clock) = new_session();
    let tab_id = {
        session.create_task();
        session.task_tab_id().unwrap().to_string()
    };
    let mut previous_ids: Vec<String> = Vec::new();
    let mut check = |session: &DraftingSession<ManualClock>| {
        let messages = &session.task().unwrap().messages;
        let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        assert!(ids.starts_with(&previous_ids), "messages were reordered or removed");
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        previous_ids = ids;
    };

    check(&session);
    session.submit_reference_file(reference_docx()).unwrap();
    check(&session);
    session.post_user_message(&tab_id, "It's the March invoice").unwrap();
    check(&session);
    advance_secs(&mut session, &clock, 3);
    check(&session);
    answer_all_with_first_option(&mut session);
    advance_secs(&mut session, &clock, 1);
    check(&session);
    session.begin_drafting().unwrap();
    check(&session);
    advance_secs(&mut session, &clock, 30);
    check(&session);

    assert_eq!(
        session.chat_tabs().get(&tab_id).unwrap().messages,
        session.task().unwrap().messages
    );
}

#[test]
fn test_completed_job_elapsed_time_is_frozen() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    let job_id = session.begin_drafting().unwrap();
    advance_secs(&mut session, &clock, 12);
    session.complete_draft().unwrap();

    let frozen = session.jobs().get(&job_id).unwrap().elapsed_ms;
    assert_eq!(frozen, 12_000);

    // Keep a tick running through a second job.
    session.start_document_generation(shared_types::DocumentGenerationRequest {
        title: "Settlement Offer".to_string(),
        creation: shared_types::CreationMethod::Blueprint {
            blueprint_name: "Settlement".to_string(),
        },
        save_as_blueprint: false,
    });
    advance_secs(&mut session, &clock, 20);

    assert_eq!(session.jobs().get(&job_id).unwrap().elapsed_ms, frozen);
    assert_eq!(session.task().unwrap().elapsed_ms, frozen);
}

// ============================================================================
// Replacement and notification dispatch
// ============================================================================

#[test]
fn test_new_task_discards_stale_completion() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    let old_job = session.begin_drafting().unwrap();
    advance_secs(&mut session, &clock, 20);

    session.create_task();
    advance_secs(&mut session, &clock, 20);

    assert_eq!(session.task().unwrap().phase, TaskPhase::Upload);
    assert!(!session.task().unwrap().draft_ready);
    assert_eq!(
        session.jobs().get(&old_job).unwrap().status,
        JobStatus::Cancelled
    );
    assert!(session.notifications().is_empty());
}

#[test]
fn test_review_action_reopens_task_and_moves_to_review() {
    let (mut session, clock) = new_session();
    to_assumptions(&mut session, &clock);
    answer_all_with_first_option(&mut session);
    let job_id = session.begin_drafting().unwrap();
    advance_secs(&mut session, &clock, 30);

    let task_tab = session.task_tab_id().unwrap().to_string();
    session.open_chat_tab("Research");
    session.close_chat_tab(&task_tab).unwrap();

    let notification_id = session.notifications().notifications()[0].id.clone();
    let mut seen: Vec<ActionTarget> = Vec::new();
    let target = session
        .dispatch_notification_action(
            &notification_id,
            ActionKind::ReviewDraft,
            &mut |t: &ActionTarget| seen.push(t.clone()),
        )
        .unwrap();

    assert_eq!(target.job_id, job_id);
    assert!(!target.fallback);
    assert_eq!(seen, vec![target.clone()]);
    assert_eq!(session.task().unwrap().phase, TaskPhase::Review);
    assert!(session.notifications().get(&notification_id).unwrap().read);

    let reopened = target.tab_id.unwrap();
    assert_ne!(reopened, task_tab);
    assert_eq!(session.chat_tabs().active_tab_id(), Some(reopened.as_str()));
    assert_eq!(
        session.chat_tabs().get(&reopened).unwrap().messages,
        session.task().unwrap().messages
    );
}

#[test]
fn test_action_for_missing_job_falls_back_to_latest_completed() {
    let (mut session, clock) = new_session();
    let generated = session.start_document_generation(shared_types::DocumentGenerationRequest {
        title: "Engagement Letter".to_string(),
        creation: shared_types::CreationMethod::Blueprint {
            blueprint_name: "Standard Engagement".to_string(),
        },
        save_as_blueprint: false,
    });
    advance_secs(&mut session, &clock, 30);
    let ready_id = session.notifications().notifications()[0].id.clone();

    let target = session
        .dispatch_notification_action(&ready_id, ActionKind::OpenDocument, &mut NoopActionHandler)
        .unwrap();
    assert_eq!(target.job_id, generated);
    assert!(!target.fallback);
    assert_eq!(target.task_id, None);

    let orphan_id = session.enqueue_notification(NewNotification {
        level: NotificationLevel::Info,
        title: "Export finished".to_string(),
        message: "Your export is ready.".to_string(),
        actions: vec![Action::open_document()],
        job_id: Some("job_deleted".to_string()),
    });
    let target = session
        .dispatch_notification_action(&orphan_id, ActionKind::OpenDocument, &mut NoopActionHandler)
        .unwrap();
    assert_eq!(target.job_id, generated);
    assert!(target.fallback);
    assert_eq!(session.notifications().unread_count(), 0);

    assert!(matches!(
        session.dispatch_notification_action(
            "notif_missing",
            ActionKind::Export,
            &mut NoopActionHandler
        ),
        Err(WorkflowError::NotificationNotFound(_))
    ));
}

#[test]
fn test_action_without_completed_jobs_is_an_error() {
    let (mut session, _clock) = new_session();
    let id = session.enqueue_notification(NewNotification {
        level: NotificationLevel::Warning,
        title: "Heads up".to_string(),
        message: "Nothing to open yet.".to_string(),
        actions: Vec::new(),
        job_id: None,
    });

    assert_eq!(
        session.dispatch_notification_action(&id, ActionKind::OpenDocument, &mut NoopActionHandler),
        Err(WorkflowError::NoCompletedJob)
    );
    assert!(matches!(
        session.mark_notification_read("notif_missing"),
        Err(WorkflowError::NotificationNotFound(_))
    ));
    assert_eq!(session.mark_all_notifications_read(), 1);
}
