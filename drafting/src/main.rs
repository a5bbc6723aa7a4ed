use anyhow::Context;
use ractor::Actor;
use shared_types::{ActionKind, CreationMethod, DocumentGenerationRequest, TaskPhase, UploadedFile};
use tracing_subscriber::EnvFilter;

use drafting::actors::session as api;
use drafting::actors::{DraftingSessionActor, DraftingSessionArguments};
use drafting::WorkflowConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    drafting::config::load_env_file();

    // `--fast` swaps the product timings for millisecond ones.
    let config = if std::env::args().any(|arg| arg == "--fast") {
        WorkflowConfig::accelerated()
    } else {
        WorkflowConfig::load()
    };
    tracing::info!(?config, "Starting drafting demo");

    let (session, handle) = Actor::spawn(
        None,
        DraftingSessionActor,
        DraftingSessionArguments {
            config: config.clone(),
        },
    )
    .await
    .context("failed to spawn drafting session")?;
    let mut updates = api::subscribe(&session).await?;

    let task_id = api::create_task(&session).await?;
    tracing::info!(task_id = %task_id, "Task created");

    api::submit_reference_file(
        &session,
        UploadedFile::new("acme-invoice-dispute.pdf", 182_044, "application/pdf"),
    )
    .await??;

    wait_for(&mut updates, |s| {
        s.task.as_ref().is_some_and(|t| t.phase == TaskPhase::Assumptions)
    })
    .await?;

    let assumptions = api::get_snapshot(&session)
        .await?
        .task
        .map(|task| task.assumptions)
        .unwrap_or_default();
    for assumption in &assumptions {
        if assumption.category == "Tone" {
            api::toggle_custom_mode(&session, assumption.id).await??;
            api::set_custom_input(&session, assumption.id, "Firm, but leave room to settle").await??;
            api::confirm_custom_instruction(&session, assumption.id).await??;
        } else if let Some(first) = assumption.options.first() {
            api::answer_assumption(&session, assumption.id, first.clone()).await??;
        }
    }

    let doc_job = api::start_document_generation(
        &session,
        DocumentGenerationRequest {
            title: "Engagement Letter".to_string(),
            creation: CreationMethod::Blueprint {
                blueprint_name: "Standard Engagement".to_string(),
            },
            save_as_blueprint: false,
        },
    )
    .await?;
    tracing::info!(job_id = %doc_job, "Document generation queued");

    let drafting_job = api::begin_drafting(&session).await??;
    tracing::info!(job_id = %drafting_job, "Drafting queued");

    wait_for(&mut updates, |s| {
        s.task.as_ref().is_some_and(|t| t.draft_ready)
    })
    .await?;

    let snapshot = api::get_snapshot(&session).await?;
    if let Some(notification) = snapshot
        .notifications
        .iter()
        .find(|n| n.job_id.as_deref() == Some(drafting_job.as_str()))
    {
        let target =
            api::dispatch_notification_action(&session, &notification.id, ActionKind::ReviewDraft)
                .await??;
        tracing::info!(?target, "Opened draft for review");
    }

    let snapshot = api::get_snapshot(&session).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    session.stop(None);
    handle.await.context("drafting session panicked")?;
    Ok(())
}

async fn wait_for<F>(
    updates: &mut tokio::sync::watch::Receiver<shared_types::SessionSnapshot>,
    mut predicate: F,
) -> anyhow::Result<()>
where
    F: FnMut(&shared_types::SessionSnapshot) -> bool,
{
    loop {
        if predicate(&updates.borrow_and_update()) {
            return Ok(());
        }
        updates
            .changed()
            .await
            .context("drafting session stopped unexpectedly")?;
    }
}
