// ABOUTME: Echo agent that streams the user's text back in small chunks.
// ABOUTME: Default agent so a fresh install can hold a conversation immediately.

use crate::provider::AgentFactory;
use crate::response::Response;
use crate::task::{HostUtils, Task};
use crate::thread::Thread;
use crate::traits::Agent;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

const CHUNK_SIZE: usize = 16;

pub struct EchoAgent;

impl EchoAgent {
    pub fn new() -> Self {
        Self
    }

    /// Factory function for the registry
    pub fn factory() -> AgentFactory {
        Box::new(|_config| Ok(Arc::new(EchoAgent::new()) as Arc<dyn Agent>))
    }

    fn chunked(text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(CHUNK_SIZE)
            .map(|c| c.iter().collect())
            .collect()
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate_reply(
        &self,
        thread: &Thread,
        _host_utils: Option<Arc<dyn HostUtils>>,
    ) -> Result<Response> {
        let text = thread
            .last_user_message()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        tracing::debug!(thread_id = %thread.id, len = text.len(), "Echoing user text");
        Ok(Response::stream_from(Self::chunked(&text)))
    }

    async fn execute_task(&self, task: &Task, _thread: &Thread) -> Result<Response> {
        Ok(Response::text(format!("echo: {}", task.message)))
    }

    fn boot_message(&self) -> Option<Response> {
        Some(Response::text(
            "Hello! I repeat whatever you say. Try me.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_echo_streams_user_text() {
        let mut thread = Thread::new("test", "echo");
        let tid = thread.id.clone();
        thread
            .messages
            .push(Message::user(&tid, "a".repeat(40)));

        let agent = EchoAgent::new();
        let response = agent.generate_reply(&thread, None).await.unwrap();
        let Response::Stream(mut s) = response else {
            panic!("echo reply should stream");
        };

        let mut text = String::new();
        let mut chunks = 0;
        while let Some(chunk) = s.chunks.next().await {
            text.push_str(&chunk.unwrap());
            chunks += 1;
        }
        assert_eq!(text, "a".repeat(40));
        assert_eq!(chunks, 3);
    }

    #[tokio::test]
    async fn test_echo_execute_task() {
        let thread = Thread::new("test", "echo");
        let agent = EchoAgent::new();
        let task = Task::action("shout", "hello");
        match agent.execute_task(&task, &thread).await.unwrap() {
            Response::Normal(r) => assert_eq!(r.full_message, "echo: hello"),
            other => panic!("expected normal response, got {:?}", other),
        }
    }

    #[test]
    fn test_boot_message_present() {
        assert!(EchoAgent::new().boot_message().is_some());
    }
}
