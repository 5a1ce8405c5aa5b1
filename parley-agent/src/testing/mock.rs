// ABOUTME: Mock agent for testing - returns pre-configured responses.
// ABOUTME: Records every dispatch so tests can assert call order and effective meta.
//!
//! # Example
//!
//! ```no_run
//! use parley_agent::testing::mock::MockAgent;
//! use parley_agent::{PlanStep, Response};
//!
//! let mock = MockAgent::new()
//!     .on_message("hello").reply_text("Hi there!")
//!     .on_message("deploy").reply_plan(vec![
//!         PlanStep::action("build", "Building..."),
//!         PlanStep::action("ship", "Shipping..."),
//!     ])
//!     .on_message("stream").reply_stream(vec!["chunk one ", "chunk two"]);
//! ```

use crate::provider::AgentFactory;
use crate::response::{PlanStep, Response};
use crate::task::{HostUtils, Meta, Task};
use crate::thread::Thread;
use crate::traits::Agent;
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type ResponseFn = Arc<dyn Fn() -> Result<Response> + Send + Sync>;

struct Expectation {
    pattern: String,
    build: ResponseFn,
}

/// Which agent operation a recorded call went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Reply,
    Execute,
}

/// One recorded dispatch to the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    /// User text for replies, task message for executions
    pub prompt: String,
    pub task_name: Option<String>,
    /// Effective task meta at dispatch time
    pub meta: Meta,
}

/// Mock agent for testing
#[derive(Clone)]
pub struct MockAgent {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    boot: Option<ResponseFn>,
    init_task: Option<Task>,
}

impl MockAgent {
    /// Create a new mock agent with no expectations
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            boot: None,
            init_task: None,
        }
    }

    /// Set up an expectation for a prompt or task matching the pattern
    pub fn on_message(self, pattern: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            agent: self,
            pattern: pattern.to_string(),
        }
    }

    /// Configure the boot message shown on an empty thread
    pub fn with_boot_text(mut self, text: &str) -> Self {
        let text = text.to_string();
        self.boot = Some(Arc::new(move || Ok(Response::text(text.clone()))));
        self
    }

    /// Configure the task auto-run on first open
    pub fn with_init_task(mut self, task: Task) -> Self {
        self.init_task = Some(task);
        self
    }

    /// All dispatches recorded so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Factory for the registry: a fresh, empty mock per create
    pub fn factory() -> AgentFactory {
        Box::new(|_config| Ok(Arc::new(MockAgent::new()) as Arc<dyn Agent>))
    }

    /// Factory producing clones of this configured mock. Clones share the
    /// expectation queue and the call log, so tests keep their handle for
    /// assertions.
    pub fn as_factory(&self) -> AgentFactory {
        let agent = self.clone();
        Box::new(move |_config| Ok(Arc::new(agent.clone()) as Arc<dyn Agent>))
    }

    fn record(&self, call: RecordedCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    // FIFO preference: check the front first, fall back to searching the
    // queue so out-of-order prompts still find their match.
    fn take_matching(&self, text: &str) -> Option<ResponseFn> {
        let mut exp = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(front) = exp.front() {
            if text.contains(&front.pattern) {
                return exp.pop_front().map(|e| e.build);
            }
            return exp
                .iter()
                .position(|e| text.contains(&e.pattern))
                .and_then(|i| exp.remove(i))
                .map(|e| e.build);
        }
        None
    }

    fn respond(&self, text: &str) -> Result<Response> {
        match self.take_matching(text) {
            Some(build) => build(),
            None => Ok(Response::text(format!(
                "Mock: no expectation for '{}'",
                text
            ))),
        }
    }
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_reply(
        &self,
        thread: &Thread,
        _host_utils: Option<Arc<dyn HostUtils>>,
    ) -> Result<Response> {
        let prompt = thread
            .last_user_message()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        self.record(RecordedCall {
            kind: CallKind::Reply,
            prompt: prompt.clone(),
            task_name: None,
            meta: Meta::new(),
        });
        self.respond(&prompt)
    }

    async fn execute_task(&self, task: &Task, _thread: &Thread) -> Result<Response> {
        self.record(RecordedCall {
            kind: CallKind::Execute,
            prompt: task.message.clone(),
            task_name: Some(task.name.clone()),
            meta: task.meta.clone(),
        });
        let haystack = format!("{} {}", task.name, task.message);
        self.respond(&haystack)
    }

    fn boot_message(&self) -> Option<Response> {
        self.boot.as_ref().and_then(|build| build().ok())
    }

    fn init_task(&self) -> Option<Task> {
        self.init_task.clone()
    }
}

/// Builder for setting up mock expectations with a fluent API
pub struct ExpectationBuilder {
    agent: MockAgent,
    pattern: String,
}

impl ExpectationBuilder {
    /// Respond with an arbitrary response builder
    pub fn reply_with<F>(self, build: F) -> MockAgent
    where
        F: Fn() -> Result<Response> + Send + Sync + 'static,
    {
        self.agent
            .expectations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Expectation {
                pattern: self.pattern,
                build: Arc::new(build),
            });
        self.agent
    }

    /// Respond with a complete plain-text message
    pub fn reply_text(self, text: &str) -> MockAgent {
        let text = text.to_string();
        self.reply_with(move || Ok(Response::text(text.clone())))
    }

    /// Respond with a plan over the given steps
    pub fn reply_plan(self, steps: Vec<PlanStep>) -> MockAgent {
        self.reply_with(move || Ok(Response::plan(steps.clone())))
    }

    /// Respond with a stream over the given chunks
    pub fn reply_stream(self, chunks: Vec<&str>) -> MockAgent {
        let chunks: Vec<String> = chunks.into_iter().map(String::from).collect();
        self.reply_with(move || Ok(Response::stream_from(chunks.clone())))
    }

    /// Respond with a stream that yields the chunks and then errors
    pub fn reply_stream_failing(self, chunks: Vec<&str>, error: &str) -> MockAgent {
        let chunks: Vec<String> = chunks.into_iter().map(String::from).collect();
        let error = error.to_string();
        self.reply_with(move || {
            let ok = chunks.clone().into_iter().map(Ok);
            let err = std::iter::once(Err(anyhow::anyhow!(error.clone())));
            Ok(Response::stream(
                futures::stream::iter(ok.chain(err)).boxed(),
            ))
        })
    }

    /// Fail the agent call itself
    pub fn reply_error(self, message: &str) -> MockAgent {
        let message = message.to_string();
        self.reply_with(move || Err(anyhow::anyhow!(message.clone())))
    }
}
