// ABOUTME: Agent response shapes: plan, stream, or complete message.
// ABOUTME: A response is exactly one shape; callers branch via capability queries.

use crate::task::{Meta, Task, TaskKind};
use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazy, finite, non-restartable sequence of text chunks.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// Sender half of a test/driver-controlled chunk stream.
pub type ChunkSender = mpsc::Sender<Result<String>>;

/// Create a channel-backed chunk stream. The sender side drives chunk
/// arrival; dropping it ends the stream.
pub fn chunk_channel(capacity: usize) -> (ChunkSender, ChunkStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ReceiverStream::new(rx).boxed())
}

/// A follow-up task the UI may offer as a button after a bot message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTask {
    pub name: String,
    pub task: Task,
}

/// One entry of a plan response's task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub name: String,
    /// Routing kind; plan steps default to action when unset
    #[serde(default)]
    pub kind: Option<TaskKind>,
    pub message: String,
    #[serde(default)]
    pub meta: Meta,
}

impl PlanStep {
    pub fn action(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(TaskKind::Action),
            message: message.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

/// Response deferring to a sequence of further tasks instead of text.
#[derive(Debug, Clone)]
pub struct PlanResponse {
    pub steps: Vec<PlanStep>,
}

/// Response streaming text chunks as they are produced.
pub struct StreamResponse {
    pub chunks: ChunkStream,
    pub is_html: bool,
    pub meta: Meta,
    pub available_tasks: Vec<AvailableTask>,
    pub next_tasks: Vec<Task>,
}

/// Response carrying a complete message ready for display.
#[derive(Debug, Clone, Default)]
pub struct NormalResponse {
    pub full_message: String,
    pub is_html: bool,
    pub meta: Meta,
    pub available_tasks: Vec<AvailableTask>,
    pub next_tasks: Vec<Task>,
}

/// An agent's answer to a task. Exactly one of plan, stream, or normal.
pub enum Response {
    Plan(PlanResponse),
    Stream(StreamResponse),
    Normal(NormalResponse),
}

impl Response {
    /// Plain-text complete response
    pub fn text(text: impl Into<String>) -> Self {
        Response::Normal(NormalResponse {
            full_message: text.into(),
            ..Default::default()
        })
    }

    /// Complete response whose text is trusted pre-rendered markup
    pub fn html(markup: impl Into<String>) -> Self {
        Response::Normal(NormalResponse {
            full_message: markup.into(),
            is_html: true,
            ..Default::default()
        })
    }

    /// Plan response over an ordered task list
    pub fn plan(steps: Vec<PlanStep>) -> Self {
        Response::Plan(PlanResponse { steps })
    }

    /// Streaming response over a chunk stream
    pub fn stream(chunks: ChunkStream) -> Self {
        Response::Stream(StreamResponse {
            chunks,
            is_html: false,
            meta: Meta::new(),
            available_tasks: Vec::new(),
            next_tasks: Vec::new(),
        })
    }

    /// Streaming response over a fixed chunk list (convenience for agents
    /// that already hold the chunks in memory)
    pub fn stream_from(chunks: Vec<String>) -> Self {
        Self::stream(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    pub fn is_plan(&self) -> bool {
        matches!(self, Response::Plan(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Response::Stream(_))
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        match &mut self {
            Response::Plan(_) => {}
            Response::Stream(r) => r.meta = meta,
            Response::Normal(r) => r.meta = meta,
        }
        self
    }

    pub fn with_available_tasks(mut self, tasks: Vec<AvailableTask>) -> Self {
        match &mut self {
            Response::Plan(_) => {}
            Response::Stream(r) => r.available_tasks = tasks,
            Response::Normal(r) => r.available_tasks = tasks,
        }
        self
    }

    pub fn with_next_tasks(mut self, tasks: Vec<Task>) -> Self {
        match &mut self {
            Response::Plan(_) => {}
            Response::Stream(r) => r.next_tasks = tasks,
            Response::Normal(r) => r.next_tasks = tasks,
        }
        self
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Plan(p) => f.debug_tuple("Plan").field(&p.steps.len()).finish(),
            Response::Stream(_) => f.debug_struct("Stream").finish_non_exhaustive(),
            Response::Normal(r) => f.debug_tuple("Normal").field(&r.full_message).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capability_queries() {
        assert!(Response::plan(vec![]).is_plan());
        assert!(!Response::plan(vec![]).is_stream());
        assert!(Response::stream_from(vec![]).is_stream());
        assert!(!Response::text("hi").is_plan());
        assert!(!Response::text("hi").is_stream());
    }

    #[test]
    fn test_text_and_html_constructors() {
        match Response::text("hello") {
            Response::Normal(r) => {
                assert_eq!(r.full_message, "hello");
                assert!(!r.is_html);
            }
            other => panic!("expected normal response, got {:?}", other),
        }
        match Response::html("<b>hi</b>") {
            Response::Normal(r) => assert!(r.is_html),
            other => panic!("expected normal response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_from_yields_chunks_in_order() {
        let chunks = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut collected = Vec::new();
        if let Response::Stream(mut s) = Response::stream_from(chunks) {
            while let Some(chunk) = s.chunks.next().await {
                collected.push(chunk.unwrap());
            }
        }
        assert_eq!(collected, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_chunk_channel_ends_on_sender_drop() {
        let (tx, mut stream) = chunk_channel(8);
        tx.send(Ok("one".to_string())).await.unwrap();
        drop(tx);
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_plan_step_defaults_to_action_kind_unset() {
        let json = json!({"name": "step", "message": "do it"});
        let step: PlanStep = serde_json::from_value(json).unwrap();
        assert!(step.kind.is_none());
        assert!(step.meta.is_empty());
    }

    #[test]
    fn test_with_available_tasks_attaches() {
        let tasks = vec![AvailableTask {
            name: "Continue".to_string(),
            task: Task::action("continue", "Continue"),
        }];
        match Response::text("done").with_available_tasks(tasks) {
            Response::Normal(r) => assert_eq!(r.available_tasks.len(), 1),
            other => panic!("expected normal response, got {:?}", other),
        }
    }
}
