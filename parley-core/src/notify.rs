// ABOUTME: Observer port through which the processor reports progress to a UI host.
// ABOUTME: Callbacks are synchronous and fire-and-forget; return values are ignored.

use parley_agent::{AvailableTask, Message};

/// Notifications emitted by the processor, in the order persisted state
/// changes: a UI mirroring these 1:1 never sees a state the store does
/// not already reflect.
pub trait ThreadObserver: Send + Sync {
    fn on_user_message_added(&self, _message: &Message) {}

    fn on_bot_message_start(&self, _message: &Message, _is_streaming: bool) {}

    fn on_bot_message_append(&self, _message_id: &str, _chunk: &str) {}

    fn on_bot_message_complete(&self, _message: &Message) {}

    fn on_available_tasks_added(&self, _message_id: &str, _tasks: &[AvailableTask]) {}

    fn on_error(&self, _message: &Message, _error: &anyhow::Error) {}

    fn on_processing_complete(&self, _thread_id: &str) {}
}

/// Observer that ignores every notification.
pub struct NullObserver;

impl ThreadObserver for NullObserver {}
