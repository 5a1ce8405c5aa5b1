// ABOUTME: Thread and message model: a persisted conversation with one bound agent.
// ABOUTME: Message ids are role-prefixed creation timestamps, unique within a process.

use crate::response::AvailableTask;
use crate::task::Meta;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Who produced a message. Markers are zero-content turn dividers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
    Marker,
}

/// One entry of a thread's message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub is_html: bool,
    /// Creation time, unix millis
    pub timestamp: i64,
    /// Denormalized back-reference, not an ownership link
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_tasks: Vec<AvailableTask>,
}

// Ids must stay unique when several messages land in the same millisecond.
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_stamp() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    LAST_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .map(|last| now.max(last + 1))
        .unwrap_or(now)
}

impl Message {
    fn new(prefix: &str, sender: Sender, thread_id: &str, text: impl Into<String>) -> Self {
        let stamp = next_stamp();
        Self {
            id: format!("{}_{}", prefix, stamp),
            sender,
            text: text.into(),
            is_html: false,
            timestamp: stamp,
            thread_id: thread_id.to_string(),
            meta: Meta::new(),
            available_tasks: Vec::new(),
        }
    }

    pub fn user(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new("msg", Sender::User, thread_id, text)
    }

    pub fn bot(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new("bot", Sender::Bot, thread_id, text)
    }

    /// Synthetic error message shown to the user when a task fails
    pub fn error(thread_id: &str, text: impl Into<String>) -> Self {
        Self::new("error", Sender::Bot, thread_id, text)
    }

    /// Zero-content divider delimiting a turn boundary
    pub fn marker(thread_id: &str) -> Self {
        Self::new("marker", Sender::Marker, thread_id, "")
    }

    pub fn with_html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn is_marker(&self) -> bool {
        self.sender == Sender::Marker
    }
}

/// Lightweight index entry for listing threads without loading history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub name: String,
    pub agent: String,
}

/// A persisted conversation bound to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub name: String,
    /// Name of the bound agent, resolved through the registry
    pub agent: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Free-form, agent-defined settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Meta>,
    /// Job records for job-type threads; opaque to the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<serde_json::Value>>,
}

impl Thread {
    pub fn new(name: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            agent: agent.into(),
            messages: Vec::new(),
            settings: None,
            jobs: None,
        }
    }

    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            agent: self.agent.clone(),
        }
    }

    /// Messages of the current turn: everything after the last marker,
    /// or the whole log when no marker exists.
    pub fn messages_after_last_marker(&self) -> &[Message] {
        let start = self
            .messages
            .iter()
            .rposition(Message::is_marker)
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.messages[start..]
    }

    /// The most recent user message, if any
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_prefixes() {
        assert!(Message::user("t1", "hi").id.starts_with("msg_"));
        assert!(Message::bot("t1", "hi").id.starts_with("bot_"));
        assert!(Message::error("t1", "boom").id.starts_with("error_"));
        assert!(Message::marker("t1").id.starts_with("marker_"));
    }

    #[test]
    fn test_message_ids_unique_within_millisecond() {
        let a = Message::bot("t1", "x");
        let b = Message::bot("t1", "y");
        let c = Message::bot("t1", "z");
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert!(a.timestamp < b.timestamp && b.timestamp < c.timestamp);
    }

    #[test]
    fn test_marker_is_zero_content() {
        let m = Message::marker("t1");
        assert!(m.is_marker());
        assert!(m.text.is_empty());
    }

    #[test]
    fn test_messages_after_last_marker() {
        let mut thread = Thread::new("test", "echo");
        let tid = thread.id.clone();
        thread.messages.push(Message::user(&tid, "one"));
        thread.messages.push(Message::bot(&tid, "two"));
        thread.messages.push(Message::marker(&tid));
        thread.messages.push(Message::user(&tid, "three"));
        thread.messages.push(Message::bot(&tid, "four"));

        let turn = thread.messages_after_last_marker();
        assert_eq!(turn.len(), 2);
        assert_eq!(turn[0].text, "three");
        assert_eq!(turn[1].text, "four");
    }

    #[test]
    fn test_messages_after_last_marker_no_marker() {
        let mut thread = Thread::new("test", "echo");
        let tid = thread.id.clone();
        thread.messages.push(Message::user(&tid, "only"));
        assert_eq!(thread.messages_after_last_marker().len(), 1);
    }

    #[test]
    fn test_last_user_message() {
        let mut thread = Thread::new("test", "echo");
        let tid = thread.id.clone();
        assert!(thread.last_user_message().is_none());
        thread.messages.push(Message::user(&tid, "first"));
        thread.messages.push(Message::bot(&tid, "reply"));
        assert_eq!(thread.last_user_message().unwrap().text, "first");
    }

    #[test]
    fn test_thread_document_round_trip() {
        let mut thread = Thread::new("demo", "echo");
        let tid = thread.id.clone();
        thread.messages.push(Message::user(&tid, "hello"));
        let json = serde_json::to_string(&thread).unwrap();
        let back: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, thread.id);
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.summary(), thread.summary());
    }

    #[test]
    fn test_empty_meta_omitted_from_document() {
        let m = Message::user("t1", "hi");
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("\"meta\""));
        assert!(!json.contains("available_tasks"));
    }
}
