//! DraftingSessionActor - owns one [`DraftingSession`] behind a mailbox.
//!
//! The actor serialises every operation, so the session's single-writer
//! assumptions hold even with several UI surfaces attached. A background
//! ticker casts [`DraftingSessionMsg::PollTimers`] at the configured poll
//! interval; due timers fire there (and lazily at the start of every other
//! operation). Subscribers receive a fresh [`SessionSnapshot`] after each
//! change through a `tokio::sync::watch` channel.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{
    ActionKind, AssumptionId, DocumentGenerationRequest, SessionSnapshot, UploadedFile,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::SystemClock;
use crate::config::WorkflowConfig;
use crate::session::{ActionTarget, DraftingSession, NoopActionHandler, WorkflowError};

/// Actor that drives a drafting session in real time
#[derive(Debug, Default)]
pub struct DraftingSessionActor;

/// Arguments for spawning DraftingSessionActor
#[derive(Debug, Clone, Default)]
pub struct DraftingSessionArguments {
    pub config: WorkflowConfig,
}

/// State for DraftingSessionActor
pub struct DraftingSessionState {
    session: DraftingSession<SystemClock>,
    snapshots: watch::Sender<SessionSnapshot>,
    ticker: Option<JoinHandle<()>>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum DraftingSessionMsg {
    /// Start a new task, abandoning the current one
    CreateTask { reply: RpcReplyPort<String> },
    SubmitReferenceFile {
        file: UploadedFile,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    AnswerAssumption {
        assumption_id: AssumptionId,
        value: String,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    ToggleCustomMode {
        assumption_id: AssumptionId,
        reply: RpcReplyPort<Result<bool, WorkflowError>>,
    },
    SetCustomInput {
        assumption_id: AssumptionId,
        text: String,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    ConfirmCustomInstruction {
        assumption_id: AssumptionId,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    CancelCustomInstruction {
        reply: RpcReplyPort<Result<Option<AssumptionId>, WorkflowError>>,
    },
    /// Returns the drafting job id
    BeginDrafting {
        reply: RpcReplyPort<Result<String, WorkflowError>>,
    },
    CompleteDraft {
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    RequestReview {
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    /// Returns the document generation job id
    StartDocumentGeneration {
        request: DocumentGenerationRequest,
        reply: RpcReplyPort<String>,
    },
    MarkSavedAsBlueprint {
        job_id: String,
        reply: RpcReplyPort<bool>,
    },
    OpenChatTab {
        title: String,
        reply: RpcReplyPort<String>,
    },
    CloseChatTab {
        tab_id: String,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    ActivateChatTab {
        tab_id: String,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    PostUserMessage {
        tab_id: String,
        text: String,
        reply: RpcReplyPort<Result<String, WorkflowError>>,
    },
    MarkNotificationRead {
        notification_id: String,
        reply: RpcReplyPort<Result<(), WorkflowError>>,
    },
    MarkAllNotificationsRead { reply: RpcReplyPort<usize> },
    /// Resolve a notification action. The caller performs the UI side
    /// (opening the canvas, exporting) from the returned target.
    DispatchNotificationAction {
        notification_id: String,
        action: ActionKind,
        reply: RpcReplyPort<Result<ActionTarget, WorkflowError>>,
    },
    /// Internal trigger from the ticker
    PollTimers,
    GetSnapshot { reply: RpcReplyPort<SessionSnapshot> },
    Subscribe {
        reply: RpcReplyPort<watch::Receiver<SessionSnapshot>>,
    },
}

#[async_trait]
impl Actor for DraftingSessionActor {
    type Msg = DraftingSessionMsg;
    type State = DraftingSessionState;
    type Arguments = DraftingSessionArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let poll_interval = args.config.poll_interval();
        let session = DraftingSession::new(args.config);
        let (snapshots, _) = watch::channel(session.snapshot());

        tracing::info!(
            actor_id = %myself.get_id(),
            session_id = %session.session_id().as_str(),
            poll_interval_ms = poll_interval.as_millis() as u64,
            "DraftingSessionActor starting"
        );

        let tick_ref = myself.clone();
        let ticker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tick_ref.cast(DraftingSessionMsg::PollTimers).is_err() {
                    break;
                }
            }
        });

        Ok(DraftingSessionState {
            session,
            snapshots,
            ticker: Some(ticker),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let session = &mut state.session;
        let fired = session.run_due_timers() > 0;
        let changed = match message {
            DraftingSessionMsg::CreateTask { reply } => {
                let _ = reply.send(session.create_task());
                true
            }
            DraftingSessionMsg::SubmitReferenceFile { file, reply } => {
                respond(reply, session.submit_reference_file(file))
            }
            DraftingSessionMsg::AnswerAssumption {
                assumption_id,
                value,
                reply,
            } => respond(reply, session.answer_assumption(assumption_id, value)),
            DraftingSessionMsg::ToggleCustomMode {
                assumption_id,
                reply,
            } => respond(reply, session.toggle_custom_mode(assumption_id)),
            DraftingSessionMsg::SetCustomInput {
                assumption_id,
                text,
                reply,
            } => respond(reply, session.set_custom_input(assumption_id, text)),
            DraftingSessionMsg::ConfirmCustomInstruction {
                assumption_id,
                reply,
            } => respond(reply, session.confirm_custom_instruction(assumption_id)),
            DraftingSessionMsg::CancelCustomInstruction { reply } => {
                respond(reply, session.cancel_custom_instruction())
            }
            DraftingSessionMsg::BeginDrafting { reply } => {
                respond(reply, session.begin_drafting())
            }
            DraftingSessionMsg::CompleteDraft { reply } => respond(reply, session.complete_draft()),
            DraftingSessionMsg::RequestReview { reply } => {
                respond(reply, session.request_review())
            }
            DraftingSessionMsg::StartDocumentGeneration { request, reply } => {
                let _ = reply.send(session.start_document_generation(request));
                true
            }
            DraftingSessionMsg::MarkSavedAsBlueprint { job_id, reply } => {
                let updated = session.mark_saved_as_blueprint(&job_id);
                let _ = reply.send(updated);
                updated
            }
            DraftingSessionMsg::OpenChatTab { title, reply } => {
                let _ = reply.send(session.open_chat_tab(title));
                true
            }
            DraftingSessionMsg::CloseChatTab { tab_id, reply } => {
                respond(reply, session.close_chat_tab(&tab_id))
            }
            DraftingSessionMsg::ActivateChatTab { tab_id, reply } => {
                respond(reply, session.activate_chat_tab(&tab_id))
            }
            DraftingSessionMsg::PostUserMessage {
                tab_id,
                text,
                reply,
            } => respond(reply, session.post_user_message(&tab_id, text)),
            DraftingSessionMsg::MarkNotificationRead {
                notification_id,
                reply,
            } => respond(reply, session.mark_notification_read(&notification_id)),
            DraftingSessionMsg::MarkAllNotificationsRead { reply } => {
                let marked = session.mark_all_notifications_read();
                let _ = reply.send(marked);
                marked > 0
            }
            DraftingSessionMsg::DispatchNotificationAction {
                notification_id,
                action,
                reply,
            } => {
                let result = session.dispatch_notification_action(
                    &notification_id,
                    action,
                    &mut NoopActionHandler,
                );
                respond(reply, result)
            }
            DraftingSessionMsg::PollTimers => false,
            DraftingSessionMsg::GetSnapshot { reply } => {
                let _ = reply.send(session.snapshot());
                false
            }
            DraftingSessionMsg::Subscribe { reply } => {
                let _ = reply.send(state.snapshots.subscribe());
                false
            }
        };

        if fired || changed {
            state.snapshots.send_replace(state.session.snapshot());
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        let dropped = state.session.clear_timers();
        tracing::info!(
            actor_id = %myself.get_id(),
            dropped_timers = dropped,
            "DraftingSessionActor stopped"
        );
        Ok(())
    }
}

/// Send an operation result back and report whether it changed the session.
fn respond<T>(reply: RpcReplyPort<Result<T, WorkflowError>>, result: Result<T, WorkflowError>) -> bool
where
    T: Send + 'static,
{
    if let Err(err) = &result {
        if err.is_benign_noop() {
            tracing::debug!(code = err.code(), error = %err, "Ignored session operation");
        } else {
            tracing::warn!(code = err.code(), error = %err, "Session operation failed");
        }
    }
    let changed = result.is_ok();
    let _ = reply.send(result);
    changed
}

// ============================================================================
// Convenience Functions
// ============================================================================

type CallResult<T> = Result<T, ractor::RactorErr<DraftingSessionMsg>>;

pub async fn create_task(session: &ActorRef<DraftingSessionMsg>) -> CallResult<String> {
    ractor::call!(session, |reply| DraftingSessionMsg::CreateTask { reply })
}

pub async fn submit_reference_file(
    session: &ActorRef<DraftingSessionMsg>,
    file: UploadedFile,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::SubmitReferenceFile {
        file,
        reply
    })
}

pub async fn answer_assumption(
    session: &ActorRef<DraftingSessionMsg>,
    assumption_id: AssumptionId,
    value: impl Into<String>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::AnswerAssumption {
        assumption_id,
        value: value.into(),
        reply,
    })
}

pub async fn toggle_custom_mode(
    session: &ActorRef<DraftingSessionMsg>,
    assumption_id: AssumptionId,
) -> CallResult<Result<bool, WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::ToggleCustomMode {
        assumption_id,
        reply
    })
}

pub async fn set_custom_input(
    session: &ActorRef<DraftingSessionMsg>,
    assumption_id: AssumptionId,
    text: impl Into<String>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::SetCustomInput {
        assumption_id,
        text: text.into(),
        reply,
    })
}

pub async fn confirm_custom_instruction(
    session: &ActorRef<DraftingSessionMsg>,
    assumption_id: AssumptionId,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| {
        DraftingSessionMsg::ConfirmCustomInstruction {
            assumption_id,
            reply,
        }
    })
}

pub async fn cancel_custom_instruction(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<Result<Option<AssumptionId>, WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::CancelCustomInstruction {
        reply
    })
}

pub async fn begin_drafting(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<Result<String, WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::BeginDrafting { reply })
}

pub async fn complete_draft(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::CompleteDraft { reply })
}

pub async fn request_review(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::RequestReview { reply })
}

pub async fn start_document_generation(
    session: &ActorRef<DraftingSessionMsg>,
    request: DocumentGenerationRequest,
) -> CallResult<String> {
    ractor::call!(session, |reply| DraftingSessionMsg::StartDocumentGeneration {
        request,
        reply
    })
}

pub async fn mark_saved_as_blueprint(
    session: &ActorRef<DraftingSessionMsg>,
    job_id: impl Into<String>,
) -> CallResult<bool> {
    ractor::call!(session, |reply| DraftingSessionMsg::MarkSavedAsBlueprint {
        job_id: job_id.into(),
        reply,
    })
}

pub async fn open_chat_tab(
    session: &ActorRef<DraftingSessionMsg>,
    title: impl Into<String>,
) -> CallResult<String> {
    ractor::call!(session, |reply| DraftingSessionMsg::OpenChatTab {
        title: title.into(),
        reply,
    })
}

pub async fn close_chat_tab(
    session: &ActorRef<DraftingSessionMsg>,
    tab_id: impl Into<String>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::CloseChatTab {
        tab_id: tab_id.into(),
        reply,
    })
}

pub async fn activate_chat_tab(
    session: &ActorRef<DraftingSessionMsg>,
    tab_id: impl Into<String>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::ActivateChatTab {
        tab_id: tab_id.into(),
        reply,
    })
}

pub async fn post_user_message(
    session: &ActorRef<DraftingSessionMsg>,
    tab_id: impl Into<String>,
    text: impl Into<String>,
) -> CallResult<Result<String, WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::PostUserMessage {
        tab_id: tab_id.into(),
        text: text.into(),
        reply,
    })
}

pub async fn mark_notification_read(
    session: &ActorRef<DraftingSessionMsg>,
    notification_id: impl Into<String>,
) -> CallResult<Result<(), WorkflowError>> {
    ractor::call!(session, |reply| DraftingSessionMsg::MarkNotificationRead {
        notification_id: notification_id.into(),
        reply,
    })
}

pub async fn mark_all_notifications_read(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<usize> {
    ractor::call!(session, |reply| DraftingSessionMsg::MarkAllNotificationsRead {
        reply
    })
}

pub async fn dispatch_notification_action(
    session: &ActorRef<DraftingSessionMsg>,
    notification_id: impl Into<String>,
    action: ActionKind,
) -> CallResult<Result<ActionTarget, WorkflowError>> {
    ractor::call!(session, |reply| {
        DraftingSessionMsg::DispatchNotificationAction {
            notification_id: notification_id.into(),
            action,
            reply,
        }
    })
}

pub async fn get_snapshot(session: &ActorRef<DraftingSessionMsg>) -> CallResult<SessionSnapshot> {
    ractor::call!(session, |reply| DraftingSessionMsg::GetSnapshot { reply })
}

pub async fn subscribe(
    session: &ActorRef<DraftingSessionMsg>,
) -> CallResult<watch::Receiver<SessionSnapshot>> {
    ractor::call!(session, |reply| DraftingSessionMsg::Subscribe { reply })
}
