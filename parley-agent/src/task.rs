// ABOUTME: Task vocabulary shared between the orchestrator and agents.
// ABOUTME: Message tasks carry raw user text; action tasks carry structured operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Free-form metadata map threaded through task expansion.
pub type Meta = serde_json::Map<String, Value>;

/// Shallow-merge two meta maps. Keys from `child` win on conflict.
pub fn merge_meta(parent: &Meta, child: &Meta) -> Meta {
    let mut merged = parent.clone();
    for (k, v) in child {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Capabilities the host makes available to agents for the duration of a call.
///
/// Never persisted; tasks drop this on serialization.
pub trait HostUtils: Send + Sync {
    /// Convert a workspace-relative path into a host-displayable URI
    fn to_host_uri(&self, path: &str) -> String;

    /// Root directory of the workspace the conversation is bound to
    fn workspace_root(&self) -> PathBuf;
}

/// How a task is routed to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Raw user utterance, routed to `Agent::generate_reply`
    Message,
    /// Structured operation, routed to `Agent::execute_task`
    Action,
}

/// One unit of work submitted to an agent.
#[derive(Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    /// Text payload; the user utterance for message tasks, display text otherwise
    pub message: String,
    /// Accumulated context, shallow-merged at each expansion level
    #[serde(default)]
    pub meta: Meta,
    /// Host capability bag, injected by the caller and stripped before serialization
    #[serde(skip)]
    pub host_utils: Option<Arc<dyn HostUtils>>,
    /// Do not log a synthetic user message before executing
    #[serde(default)]
    pub skip_user_message: bool,
    /// Suppress the visible bot message; side effects only
    #[serde(default)]
    pub skip_bot_message: bool,
}

impl Task {
    /// Create a message-kind task from raw user text
    pub fn message(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Message, text)
    }

    /// Create an action-kind task
    pub fn action(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, TaskKind::Action, text)
    }

    fn new(name: impl Into<String>, kind: TaskKind, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            message: text.into(),
            meta: Meta::new(),
            host_utils: None,
            skip_user_message: false,
            skip_bot_message: false,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_meta_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn with_host_utils(mut self, host_utils: Arc<dyn HostUtils>) -> Self {
        self.host_utils = Some(host_utils);
        self
    }

    /// Mark this task as silent: no user message, no visible bot message
    pub fn silent(mut self) -> Self {
        self.skip_user_message = true;
        self.skip_bot_message = true;
        self
    }

    /// The message id this task should update, if one was stamped into meta
    pub fn target_message_id(&self) -> Option<&str> {
        self.meta.get("messageId").and_then(Value::as_str)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("meta", &self.meta)
            .field("host_utils", &self.host_utils.as_ref().map(|_| "..."))
            .field("skip_user_message", &self.skip_user_message)
            .field("skip_bot_message", &self.skip_bot_message)
            .finish()
    }
}
