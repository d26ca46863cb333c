//! Conversation threads and their on-disk store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::message::Message;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: i64,
    pub last_updated: i64,
}

impl Thread {
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            is_pinned: false,
            is_archived: false,
            category: None,
            summary: None,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Criteria for [`ThreadStore::filtered`].
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    threads: Vec<Thread>,
    #[serde(default)]
    active_thread: Option<String>,
}

/// All conversations, newest first, persisted as one JSON file.
///
/// Every mutation saves immediately; a store without a path is purely
/// in-memory (used in tests).
pub struct ThreadStore {
    threads: Vec<Thread>,
    active_thread: Option<String>,
    path: Option<PathBuf>,
}

impl ThreadStore {
    pub fn in_memory() -> Self {
        Self {
            threads: Vec::new(),
            active_thread: None,
            path: None,
        }
    }

    /// Load the store from `path`, starting empty if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<PersistedState>(&raw)?
        } else {
            PersistedState::default()
        };

        debug!(path = %path.display(), threads = state.threads.len(), "thread store loaded");

        Ok(Self {
            threads: state.threads,
            active_thread: state.active_thread,
            path: Some(path),
        })
    }

    fn save(&self) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let state = PersistedState {
            threads: self.threads.clone(),
            active_thread: self.active_thread.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&state)?)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn get(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    fn get_mut(&mut self, thread_id: &str) -> Result<&mut Thread, Error> {
        self.threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| Error::ThreadNotFound(thread_id.to_string()))
    }

    pub fn active(&self) -> Option<&Thread> {
        let id = self.active_thread.as_deref()?;
        self.get(id)
    }

    pub fn set_active(&mut self, thread_id: Option<&str>) -> Result<(), Error> {
        if let Some(id) = thread_id {
            if self.get(id).is_none() {
                return Err(Error::ThreadNotFound(id.to_string()));
            }
        }
        self.active_thread = thread_id.map(str::to_string);
        self.save()
    }

    /// Create a thread, make it active, and return its id.
    pub fn create_thread(&mut self, title: impl Into<String>) -> Result<String, Error> {
        let thread = Thread::new(title);
        let id = thread.id.clone();
        self.threads.insert(0, thread);
        self.active_thread = Some(id.clone());
        self.save()?;
        Ok(id)
    }

    pub fn add_message(&mut self, thread_id: &str, message: Message) -> Result<(), Error> {
        let now = now_millis();
        let thread = self.get_mut(thread_id)?;
        thread.messages.push(message);
        thread.last_updated = now;
        self.save()
    }

    pub fn delete_thread(&mut self, thread_id: &str) -> Result<(), Error> {
        let before = self.threads.len();
        self.threads.retain(|t| t.id != thread_id);
        if self.threads.len() == before {
            return Err(Error::ThreadNotFound(thread_id.to_string()));
        }
        if self.active_thread.as_deref() == Some(thread_id) {
            self.active_thread = self.threads.first().map(|t| t.id.clone());
        }
        self.save()
    }

    pub fn clear_messages(&mut self, thread_id: &str) -> Result<(), Error> {
        let now = now_millis();
        let thread = self.get_mut(thread_id)?;
        thread.messages.clear();
        thread.last_updated = now;
        self.save()
    }

    pub fn rename(&mut self, thread_id: &str, title: impl Into<String>) -> Result<(), Error> {
        let now = now_millis();
        let thread = self.get_mut(thread_id)?;
        thread.title = title.into();
        thread.last_updated = now;
        self.save()
    }

    pub fn toggle_pin(&mut self, thread_id: &str) -> Result<bool, Error> {
        let thread = self.get_mut(thread_id)?;
        thread.is_pinned = !thread.is_pinned;
        let pinned = thread.is_pinned;
        self.save()?;
        Ok(pinned)
    }

    pub fn toggle_archive(&mut self, thread_id: &str) -> Result<bool, Error> {
        let thread = self.get_mut(thread_id)?;
        thread.is_archived = !thread.is_archived;
        let archived = thread.is_archived;
        self.save()?;
        Ok(archived)
    }

    pub fn set_category(&mut self, thread_id: &str, category: impl Into<String>) -> Result<(), Error> {
        let thread = self.get_mut(thread_id)?;
        thread.category = Some(category.into());
        self.save()
    }

    pub fn set_summary(&mut self, thread_id: &str, summary: impl Into<String>) -> Result<(), Error> {
        let thread = self.get_mut(thread_id)?;
        thread.summary = Some(summary.into());
        self.save()
    }

    pub fn filtered(&self, filter: &ThreadFilter) -> Vec<&Thread> {
        self.threads
            .iter()
            .filter(|t| {
                if let Some(pinned) = filter.pinned {
                    if t.is_pinned != pinned {
                        return false;
                    }
                }
                if let Some(archived) = filter.archived {
                    if t.is_archived != archived {
                        return false;
                    }
                }
                if let Some(category) = &filter.category {
                    if t.category.as_deref() != Some(category.as_str()) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Case-insensitive search over titles and message content.
    pub fn search(&self, query: &str) -> Vec<&Thread> {
        let term = query.to_lowercase();
        self.threads
            .iter()
            .filter(|t| {
                t.title.to_lowercase().contains(&term)
                    || t.messages
                        .iter()
                        .any(|m| m.content.to_lowercase().contains(&term))
            })
            .collect()
    }
}
