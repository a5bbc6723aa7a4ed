//! Notification Queue - newest-first list of one-shot alerts.

use chrono::{DateTime, Utc};
use shared_types::{Action, Notification, NotificationLevel};

/// Caller-provided notification content. Id, timestamp and read state are
/// assigned on enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub actions: Vec<Action>,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    notifications: Vec<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a new unread notification and return its id.
    pub fn enqueue(&mut self, new: NewNotification, now: DateTime<Utc>) -> String {
        let notification = Notification {
            id: shared_types::new_id("notif"),
            level: new.level,
            title: new.title,
            message: new.message,
            timestamp: now,
            read: false,
            actions: new.actions,
            job_id: new.job_id,
        };
        let id = notification.id.clone();
        tracing::info!(
            notification_id = %id,
            title = %notification.title,
            job_id = ?notification.job_id,
            "Notification enqueued"
        );
        self.notifications.insert(0, notification);
        id
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// Returns how many were newly marked.
    pub fn mark_all_read(&mut self) -> usize {
        let mut marked = 0;
        for notification in self.notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            marked += 1;
        }
        marked
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn for_job<'a>(&'a self, job_id: &'a str) -> impl Iterator<Item = &'a Notification> + 'a {
        self.notifications
            .iter()
            .filter(move |n| n.job_id.as_deref() == Some(job_id))
    }

    /// Newest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}
