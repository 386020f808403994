//! Thread metadata registry
//!
//! Process-local CRUD over thread metadata (id, title, creation time),
//! independent of message content. A thread may exist with no messages, and
//! messages may outlive deleted metadata; neither side checks the other.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ColloquyError, Result};

/// Thread metadata as sent to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Opaque thread id, assigned at creation
    #[serde(rename = "threadId")]
    pub id: String,
    /// Display title
    pub title: String,
    /// Creation time (UTC)
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ThreadMeta {
    title: String,
    created_at: DateTime<Utc>,
}

/// Registry of thread metadata
///
/// All operations are synchronous and process-local. Interior mutability via
/// `RwLock` makes the registry safe to share across async tasks.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: RwLock<HashMap<String, ThreadMeta>>,
}

impl ThreadRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new thread with a unique id and the given title
    pub fn create(&self, title: impl Into<String>) -> Thread {
        let id = Uuid::new_v4().to_string();
        let meta = ThreadMeta {
            title: title.into(),
            created_at: Utc::now(),
        };

        let thread = Thread {
            id: id.clone(),
            title: meta.title.clone(),
            created_at: meta.created_at,
        };

        self.threads
            .write()
            .expect("thread registry lock poisoned")
            .insert(id, meta);

        tracing::debug!(thread_id = %thread.id, title = %thread.title, "thread created");
        thread
    }

    /// List all threads, most recently created first
    pub fn list(&self) -> Vec<Thread> {
        let threads = self.threads.read().expect("thread registry lock poisoned");

        let mut result: Vec<Thread> = threads
            .iter()
            .map(|(id, meta)| Thread {
                id: id.clone(),
                title: meta.title.clone(),
                created_at: meta.created_at,
            })
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Get a single thread's metadata
    pub fn get(&self, id: &str) -> Option<Thread> {
        let threads = self.threads.read().expect("thread registry lock poisoned");
        threads.get(id).map(|meta| Thread {
            id: id.to_string(),
            title: meta.title.clone(),
            created_at: meta.created_at,
        })
    }

    /// Update a thread's title
    pub fn update(&self, id: &str, title: impl Into<String>) -> Result<Thread> {
        let mut threads = self.threads.write().expect("thread registry lock poisoned");

        let meta = threads
            .get_mut(id)
            .ok_or_else(|| ColloquyError::not_found(format!("thread {}", id)))?;

        meta.title = title.into();
        tracing::debug!(thread_id = %id, title = %meta.title, "thread updated");

        Ok(Thread {
            id: id.to_string(),
            title: meta.title.clone(),
            created_at: meta.created_at,
        })
    }

    /// Delete a thread's metadata
    ///
    /// Returns true iff a record existed and was removed. Deleting an absent
    /// thread is a normal outcome, not an error.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self
            .threads
            .write()
            .expect("thread registry lock poisoned")
            .remove(id)
            .is_some();

        if removed {
            tracing::debug!(thread_id = %id, "thread deleted");
        } else {
            tracing::debug!(thread_id = %id, "delete of absent thread");
        }
        removed
    }
}
