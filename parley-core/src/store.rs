// ABOUTME: Durable thread storage: one JSON document per thread in SQLite plus a light index.
// ABOUTME: All mutation is read-modify-write under one connection lock, atomic per operation.

use anyhow::{bail, Context, Result};
use parley_agent::{AvailableTask, Message, Meta, Sender, Thread, ThreadSummary};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Partial update applied to a single message in place.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub meta: Option<Meta>,
    pub is_html: Option<bool>,
    pub available_tasks: Option<Vec<AvailableTask>>,
}

impl MessagePatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_available_tasks(mut self, tasks: Vec<AvailableTask>) -> Self {
        self.available_tasks = Some(tasks);
        self
    }

    fn apply(self, message: &mut Message) {
        if let Some(text) = self.text {
            message.text = text;
        }
        if let Some(meta) = self.meta {
            message.meta = meta;
        }
        if let Some(is_html) = self.is_html {
            message.is_html = is_html;
        }
        if let Some(tasks) = self.available_tasks {
            message.available_tasks = tasks;
        }
    }
}

/// SQLite-backed store of thread documents.
///
/// Concurrent writers to the same thread serialize on the connection
/// mutex; a partial write is never observed by a subsequent read.
#[derive(Clone)]
pub struct ThreadStore {
    db: Arc<Mutex<Connection>>,
}

impl ThreadStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;

        let db_path = data_dir.join("threads.db");
        let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS thread_index (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                agent TEXT NOT NULL
            )",
            [],
        )?;

        tracing::info!(db = %db_path.display(), "ThreadStore initialized");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_db(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))
    }

    fn load_locked(db: &Connection, id: &str) -> Result<Thread> {
        let mut stmt = db.prepare("SELECT document FROM threads WHERE id = ?1")?;
        let document = stmt.query_row(params![id], |row| row.get::<_, String>(0));
        match document {
            Ok(doc) => serde_json::from_str(&doc).context("Corrupt thread document"),
            Err(rusqlite::Error::QueryReturnedNoRows) => bail!("Unknown thread: {}", id),
            Err(e) => Err(e.into()),
        }
    }

    fn save_locked(db: &Connection, thread: &Thread) -> Result<()> {
        let document = serde_json::to_string(thread)?;
        db.execute(
            "INSERT INTO threads (id, document) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET document = ?2",
            params![thread.id, document],
        )?;
        db.execute(
            "INSERT INTO thread_index (id, name, agent) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = ?2, agent = ?3",
            params![thread.id, thread.name, thread.agent],
        )?;
        Ok(())
    }

    /// Load, mutate, and persist one thread under a single lock acquisition
    fn mutate<R>(&self, id: &str, f: impl FnOnce(&mut Thread) -> Result<R>) -> Result<R> {
        let db = self.lock_db()?;
        let mut thread = Self::load_locked(&db, id)?;
        let result = f(&mut thread)?;
        Self::save_locked(&db, &thread)?;
        Ok(result)
    }

    /// Create and persist a new thread
    pub fn create(&self, name: &str, agent: &str) -> Result<Thread> {
        if name.trim().is_empty() {
            bail!("Thread name must not be empty");
        }
        if agent.trim().is_empty() {
            bail!("Agent name must not be empty");
        }

        let thread = Thread::new(name, agent);
        let db = self.lock_db()?;
        Self::save_locked(&db, &thread)?;
        tracing::info!(
            thread_id = %thread.id,
            name = %thread.name,
            agent = %thread.agent,
            "Thread created"
        );
        Ok(thread)
    }

    /// Load the full thread document
    pub fn load(&self, id: &str) -> Result<Thread> {
        let db = self.lock_db()?;
        Self::load_locked(&db, id)
    }

    /// Persist the document and refresh the index entry
    pub fn save(&self, thread: &Thread) -> Result<()> {
        let db = self.lock_db()?;
        Self::save_locked(&db, thread)
    }

    /// Append one message to a thread's log
    pub fn append(&self, thread_id: &str, message: &Message) -> Result<()> {
        self.mutate(thread_id, |thread| {
            thread.messages.push(message.clone());
            Ok(())
        })?;
        tracing::debug!(thread_id = %thread_id, message_id = %message.id, "Message appended");
        Ok(())
    }

    /// Apply a partial update to one message
    pub fn patch(&self, thread_id: &str, message_id: &str, patch: MessagePatch) -> Result<()> {
        self.mutate(thread_id, |thread| {
            let message = thread
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .with_context(|| format!("Unknown message: {}", message_id))?;
            patch.apply(message);
            Ok(())
        })
    }

    /// Remove every message after the last one matching the predicate and
    /// return the removed tail. When nothing matches, nothing is removed.
    pub fn remove_after(
        &self,
        thread_id: &str,
        predicate: impl Fn(&Message) -> bool,
    ) -> Result<Vec<Message>> {
        let removed = self.mutate(thread_id, |thread| {
            match thread.messages.iter().rposition(|m| predicate(m)) {
                Some(i) => Ok(thread.messages.split_off(i + 1)),
                None => Ok(Vec::new()),
            }
        })?;
        if !removed.is_empty() {
            tracing::info!(
                thread_id = %thread_id,
                removed = removed.len(),
                "Trimmed messages after last match"
            );
        }
        Ok(removed)
    }

    /// Retry support: trim everything after the last user message
    pub fn remove_after_last_user(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.remove_after(thread_id, |m| m.sender == Sender::User)
    }

    /// Bulk delete messages by id, returning how many were removed
    pub fn delete_by_ids(&self, thread_id: &str, ids: &[String]) -> Result<usize> {
        self.mutate(thread_id, |thread| {
            let before = thread.messages.len();
            thread.messages.retain(|m| !ids.contains(&m.id));
            Ok(before - thread.messages.len())
        })
    }

    pub fn rename(&self, thread_id: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            bail!("Thread name must not be empty");
        }
        self.mutate(thread_id, |thread| {
            thread.name = name.to_string();
            Ok(())
        })?;
        tracing::info!(thread_id = %thread_id, name = %name, "Thread renamed");
        Ok(())
    }

    /// Replace the agent-defined settings map
    pub fn update_settings(&self, thread_id: &str, settings: Meta) -> Result<()> {
        self.mutate(thread_id, |thread| {
            thread.settings = Some(settings);
            Ok(())
        })
    }

    /// Rebind the thread to another agent. Callers must invalidate the
    /// agent cache for this thread afterwards.
    pub fn update_agent(&self, thread_id: &str, agent: &str) -> Result<()> {
        self.mutate(thread_id, |thread| {
            thread.agent = agent.to_string();
            Ok(())
        })?;
        tracing::info!(thread_id = %thread_id, agent = %agent, "Thread agent updated");
        Ok(())
    }

    /// List index entries without loading message history
    pub fn list(&self) -> Result<Vec<ThreadSummary>> {
        let db = self.lock_db()?;
        let mut stmt = db.prepare("SELECT id, name, agent FROM thread_index ORDER BY rowid")?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(ThreadSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    agent: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Thread deletion is index removal: the document stays on disk
    pub fn remove_from_index(&self, thread_id: &str) -> Result<()> {
        let db = self.lock_db()?;
        db.execute(
            "DELETE FROM thread_index WHERE id = ?1",
            params![thread_id],
        )?;
        tracing::info!(thread_id = %thread_id, "Thread removed from index");
        Ok(())
    }
}
