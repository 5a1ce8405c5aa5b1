// ABOUTME: Core Agent trait that all agent implementations provide.
// ABOUTME: Two operations: free-form reply generation and structured task execution.

use crate::response::Response;
use crate::task::{HostUtils, Task};
use crate::thread::Thread;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A conversational agent bound to a thread.
///
/// Implementations must be `Send + Sync`; the orchestrator shares them
/// across calls through the provider cache.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and cache keys
    fn name(&self) -> &str;

    /// Reply to the thread's latest user utterance (message tasks)
    async fn generate_reply(
        &self,
        thread: &Thread,
        host_utils: Option<Arc<dyn HostUtils>>,
    ) -> Result<Response>;

    /// Execute a structured operation (action tasks)
    async fn execute_task(&self, task: &Task, thread: &Thread) -> Result<Response>;

    /// Pre-built response shown when a thread has no messages yet.
    ///
    /// Built fresh per call; stream responses are single-use.
    fn boot_message(&self) -> Option<Response> {
        None
    }

    /// Task to auto-run the first time a thread is opened
    fn init_task(&self) -> Option<Task> {
        None
    }
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("name", &self.name()).finish()
    }
}
