//! Deterministic timer queue.
//!
//! Replaces fire-and-forget UI timeouts with explicit, cancellable entries.
//! Timers fire in `(due_at, insertion)` order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deferred work the session performs when a timer fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Post the "analyzing" notice for a freshly uploaded reference
    AnalysisNotice { task_id: String },
    /// Finish analysis and present the assumptions
    AnalysisFinished { task_id: String },
    /// All assumptions answered; post the begin-drafting confirmation
    AssumptionsConfirmed { task_id: String },
    /// Drafting for the task reaches its configured duration
    DraftingDue { task_id: String },
    /// A document-generation job reaches its configured duration
    GenerationDue { job_id: String },
    /// Repeating elapsed-time refresh for the task and in-progress jobs
    Tick,
}

impl TimerEvent {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::AnalysisNotice { task_id }
            | Self::AnalysisFinished { task_id }
            | Self::AssumptionsConfirmed { task_id }
            | Self::DraftingDue { task_id } => Some(task_id),
            Self::GenerationDue { .. } | Self::Tick => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalysisNotice { .. } => "analysis_notice",
            Self::AnalysisFinished { .. } => "analysis_finished",
            Self::AssumptionsConfirmed { .. } => "assumptions_confirmed",
            Self::DraftingDue { .. } => "drafting_due",
            Self::GenerationDue { .. } => "generation_due",
            Self::Tick => "tick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub id: TimerId,
    pub due_at: DateTime<Utc>,
    pub event: TimerEvent,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(DateTime<Utc>, TimerId), TimerEvent>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_at: DateTime<Utc>, event: TimerEvent) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert((due_at, id), event);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.entries.keys().find(|(_, tid)| *tid == id).copied();
        match key {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Cancel every timer whose event matches. Returns how many were dropped.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&TimerEvent) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, event| !predicate(event));
        before - self.entries.len()
    }

    pub fn cancel_for_task(&mut self, task_id: &str) -> usize {
        self.cancel_where(|event| event.task_id() == Some(task_id))
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledTimer> {
        let (&(due_at, id), _) = self.entries.iter().next()?;
        if due_at > now {
            return None;
        }
        let event = self.entries.remove(&(due_at, id))?;
        Some(ScheduledTimer { id, due_at, event })
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries.keys().next().map(|(due_at, _)| *due_at)
    }

    pub fn contains(&self, predicate: impl Fn(&TimerEvent) -> bool) -> bool {
        self.entries.values().any(predicate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
