// ABOUTME: Turns raw user input into a persisted user message and its initial task.
// ABOUTME: Store failures propagate uncaught; a lost user message is fatal for the turn.

use crate::store::ThreadStore;
use anyhow::Result;
use parley_agent::{HostUtils, Message, Task, Thread};
use serde_json::json;
use std::sync::Arc;

/// Persist the user's utterance and return the freshly reloaded thread.
pub fn add_user_message(store: &ThreadStore, thread_id: &str, text: &str) -> Result<Thread> {
    let message = Message::user(thread_id, text);
    store.append(thread_id, &message)?;
    store.load(thread_id)
}

/// Build the message-kind task for a user utterance. The user message is
/// already persisted by `add_user_message`, so the task skips the
/// synthetic one.
pub fn build_task(text: &str, thread: &Thread, host_utils: Option<Arc<dyn HostUtils>>) -> Task {
    let mut task = Task::message("user-message", text)
        .with_meta_entry("threadId", json!(thread.id))
        .with_meta_entry(
            "timestamp",
            json!(chrono::Utc::now().timestamp_millis()),
        );
    task.skip_user_message = true;
    task.host_utils = host_utils;
    task
}
