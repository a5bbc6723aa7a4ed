//! Chat tab routing.
//!
//! Tabs are display surfaces; closing a task's tab never touches the task.

use chrono::{DateTime, Utc};
use shared_types::{ChatTab, Message, MessageKind};

#[derive(Debug, Clone, Default)]
pub struct ChatTabs {
    tabs: Vec<ChatTab>,
    active: Option<String>,
}

impl ChatTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and activate a new tab.
    pub fn open_tab(
        &mut self,
        title: impl Into<String>,
        task_id: Option<String>,
        now: DateTime<Utc>,
    ) -> String {
        let tab = ChatTab {
            id: shared_types::new_id("tab"),
            title: title.into(),
            task_id,
            messages: Vec::new(),
            created_at: now,
        };
        let id = tab.id.clone();
        tracing::debug!(tab_id = %id, task_id = ?tab.task_id, "Chat tab opened");
        self.tabs.push(tab);
        self.active = Some(id.clone());
        id
    }

    pub fn activate(&mut self, tab_id: &str) -> bool {
        if self.get(tab_id).is_none() {
            return false;
        }
        self.active = Some(tab_id.to_string());
        true
    }

    /// Close a tab. The active tab falls back to the last remaining one.
    pub fn close(&mut self, tab_id: &str) -> bool {
        let before = self.tabs.len();
        self.tabs.retain(|tab| tab.id != tab_id);
        if self.tabs.len() == before {
            return false;
        }
        if self.active.as_deref() == Some(tab_id) {
            self.active = self.tabs.last().map(|tab| tab.id.clone());
        }
        true
    }

    pub fn append(&mut self, tab_id: &str, message: Message) -> bool {
        match self.get_mut(tab_id) {
            Some(tab) => {
                tab.messages.push(message);
                true
            }
            None => false,
        }
    }

    /// Change the rendering mode of an existing message in place.
    pub fn replace_kind(&mut self, tab_id: &str, message_id: &str, kind: MessageKind) -> bool {
        let Some(tab) = self.get_mut(tab_id) else {
            return false;
        };
        match tab.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.kind = kind;
                true
            }
            None => false,
        }
    }

    pub fn tab_for_task(&self, task_id: &str) -> Option<&ChatTab> {
        self.tabs
            .iter()
            .find(|tab| tab.task_id.as_deref() == Some(task_id))
    }

    /// Activate the task's tab, re-creating it from `history` if it was closed.
    pub fn reopen_for_task(
        &mut self,
        task_id: &str,
        title: &str,
        history: &[Message],
        now: DateTime<Utc>,
    ) -> String {
        if let Some(id) = self.tab_for_task(task_id).map(|tab| tab.id.clone()) {
            self.active = Some(id.clone());
            return id;
        }
        let id = self.open_tab(title, Some(task_id.to_string()), now);
        if let Some(tab) = self.get_mut(&id) {
            tab.messages = history.to_vec();
        }
        id
    }

    pub fn get(&self, tab_id: &str) -> Option<&ChatTab> {
        self.tabs.iter().find(|tab| tab.id == tab_id)
    }

    fn get_mut(&mut self, tab_id: &str) -> Option<&mut ChatTab> {
        self.tabs.iter_mut().find(|tab| tab.id == tab_id)
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn tabs(&self) -> &[ChatTab] {
        &self.tabs
    }
}
