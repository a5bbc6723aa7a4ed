//! Job Registry - append-only list of background jobs.

use chrono::{DateTime, Utc};
use shared_types::{Job, JobKind, JobStatus};

/// Partial update merged into a job by [`JobRegistry::update_job`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub elapsed_ms: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub saved_as_blueprint: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an in-progress job started at `now`.
    pub fn new_job(
        kind: JobKind,
        task_id: Option<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Job {
        Job {
            id: shared_types::new_id("job"),
            task_id,
            kind,
            title: title.into(),
            description: description.into(),
            status: JobStatus::InProgress,
            start_time: now,
            elapsed_ms: 0,
            created_at: now,
            completed_at: None,
        }
    }

    /// Append a job. Ids are the caller's responsibility.
    pub fn add_job(&mut self, job: Job) {
        tracing::debug!(job_id = %job.id, title = %job.title, "Job added");
        self.jobs.push(job);
    }

    /// Merge `update` into the job with `id`. Returns false if not found.
    pub fn update_job(&mut self, id: &str, update: JobUpdate) -> bool {
        let Some(job) = self.get_mut(id) else {
            return false;
        };
        if let Some(title) = update.title {
            job.title = title;
        }
        if let Some(description) = update.description {
            job.description = description;
        }
        if let Some(status) = update.status {
            job.status = status;
        }
        if let Some(elapsed_ms) = update.elapsed_ms {
            job.elapsed_ms = elapsed_ms;
        }
        if let Some(completed_at) = update.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(saved) = update.saved_as_blueprint {
            if let JobKind::DocumentGeneration {
                saved_as_blueprint, ..
            } = &mut job.kind
            {
                *saved_as_blueprint = saved;
            }
        }
        true
    }

    /// Refresh `elapsed_ms` for an in-progress job. Finished jobs keep the
    /// value frozen at completion. Returns the current elapsed time.
    pub fn tick(&mut self, id: &str, now: DateTime<Utc>) -> Option<u64> {
        let job = self.get_mut(id)?;
        if job.is_in_progress() {
            job.elapsed_ms = elapsed_ms(job.start_time, now);
        }
        Some(job.elapsed_ms)
    }

    pub fn tick_all(&mut self, now: DateTime<Utc>) {
        for job in self.jobs.iter_mut().filter(|job| job.is_in_progress()) {
            job.elapsed_ms = elapsed_ms(job.start_time, now);
        }
    }

    /// Mark complete, freezing elapsed time. No-op unless in progress.
    pub fn complete(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        self.finish(id, JobStatus::Complete, now)
    }

    /// Mark cancelled, freezing elapsed time. No-op unless in progress.
    pub fn cancel(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        self.finish(id, JobStatus::Cancelled, now)
    }

    fn finish(&mut self, id: &str, status: JobStatus, now: DateTime<Utc>) -> bool {
        let Some(job) = self.get_mut(id) else {
            return false;
        };
        if !job.is_in_progress() {
            return false;
        }
        job.elapsed_ms = elapsed_ms(job.start_time, now);
        job.status = status;
        if status == JobStatus::Complete {
            job.completed_at = Some(now);
        }
        true
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn in_progress(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|job| job.is_in_progress())
    }

    pub fn has_in_progress(&self) -> bool {
        self.in_progress().next().is_some()
    }

    pub fn most_recently_completed(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Complete)
            .max_by_key(|job| job.completed_at)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

pub(crate) fn elapsed_ms(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use shared_types::CreationMethod;

    fn drafting_job(clock: &ManualClock) -> Job {
        JobRegistry::new_job(
            JobKind::Drafting,
            Some("task_1".to_string()),
            "Draft Demand Letter",
            "Drafting from ref.docx",
            clock.now(),
        )
    }

    #[test]
    fn tick_tracks_in_progress_jobs() {
        let clock = ManualClock::at_epoch();
        let mut registry = JobRegistry::new();
        let job = drafting_job(&clock);
        let id = job.id.clone();
        registry.add_job(job);

        clock.advance_ms(4_000);
        assert_eq!(registry.tick(&id, clock.now()), Some(4_000));
        assert_eq!(registry.tick("missing", clock.now()), None);
    }

    #[test]
    fn completed_jobs_keep_frozen_elapsed_time() {
        let clock = ManualClock::at_epoch();
        let mut registry = JobRegistry::new();
        let job = drafting_job(&clock);
        let id = job.id.clone();
        registry.add_job(job);

        clock.advance_ms(30_000);
        assert!(registry.complete(&id, clock.now()));
        assert!(!registry.complete(&id, clock.now()));

        clock.advance_ms(10_000);
        registry.tick(&id, clock.now());
        registry.tick_all(clock.now());

        let job = registry.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.elapsed_ms, 30_000);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn update_merges_only_given_fields() {
        let clock = ManualClock::at_epoch();
        let mut registry = JobRegistry::new();
        let job = JobRegistry::new_job(
            JobKind::DocumentGeneration {
                creation: CreationMethod::Blueprint {
                    blueprint_name: "Engagement Letter".to_string(),
                },
                saved_as_blueprint: false,
            },
            None,
            "Engagement Letter",
            "Generating from blueprint",
            clock.now(),
        );
        let id = job.id.clone();
        registry.add_job(job);

        assert!(registry.update_job(
            &id,
            JobUpdate {
                description: Some("Regenerating".to_string()),
                saved_as_blueprint: Some(true),
                ..JobUpdate::default()
            }
        ));
        assert!(!registry.update_job("missing", JobUpdate::default()));

        let job = registry.get(&id).unwrap();
        assert_eq!(job.title, "Engagement Letter");
        assert_eq!(job.description, "Regenerating");
        assert!(matches!(
            job.kind,
            JobKind::DocumentGeneration {
                saved_as_blueprint: true,
                ..
            }
        ));
    }

    #[test]
    fn most_recently_completed_ignores_cancelled_and_running() {
        let clock = ManualClock::at_epoch();
        let mut registry = JobRegistry::new();
        let first = drafting_job(&clock);
        let second = drafting_job(&clock);
        let third = drafting_job(&clock);
        let (first_id, second_id, third_id) =
            (first.id.clone(), second.id.clone(), third.id.clone());
        registry.add_job(first);
        registry.add_job(second);
        registry.add_job(third);

        assert!(registry.most_recently_completed().is_none());

        clock.advance_ms(1_000);
        registry.complete(&first_id, clock.now());
        clock.advance_ms(1_000);
        registry.complete(&second_id, clock.now());
        clock.advance_ms(1_000);
        registry.cancel(&third_id, clock.now());

        assert_eq!(registry.most_recently_completed().unwrap().id, second_id);
        assert!(!registry.has_in_progress());
    }
}
