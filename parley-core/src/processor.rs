// ABOUTME: Task processing loop: drives the agent, expands plans, streams chunks.
// ABOUTME: One terminal completion notification per top-level handle call, no matter what.

use crate::cancel::CancellationRegistry;
use crate::metrics;
use crate::notify::ThreadObserver;
use crate::store::{MessagePatch, ThreadStore};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::StreamExt;
use parley_agent::{
    merge_meta, AgentProvider, AvailableTask, ChunkStream, Message, Meta, NormalResponse,
    PlanResponse, Response, StreamResponse, Task, TaskKind,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shown to the user whenever a task fails anywhere in its expansion.
const GENERIC_ERROR_TEXT: &str =
    "An unexpected error occurred while processing your request. Please try again.";

/// Appended to a partially streamed message when its source fails mid-iteration.
const STREAM_INTERRUPTED_NOTICE: &str =
    "\n\n[The response stream was interrupted before it finished.]";

const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(100);

/// Result of handling a task to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Task and all of its expansion completed
    Completed,
    /// Task failed; an error message was persisted and reported
    Failed(String),
}

impl HandleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HandleOutcome::Failed(_))
    }
}

/// Executes one task against a thread: invokes the agent, interprets the
/// response, recursively expands plans, streams partial output, and
/// persists every state change through the store.
pub struct Processor {
    store: ThreadStore,
    agents: Arc<AgentProvider>,
    cancel: Arc<CancellationRegistry>,
    observer: Arc<dyn ThreadObserver>,
    grace_delay: Duration,
}

impl Processor {
    pub fn new(
        store: ThreadStore,
        agents: Arc<AgentProvider>,
        cancel: Arc<CancellationRegistry>,
        observer: Arc<dyn ThreadObserver>,
    ) -> Self {
        Self {
            store,
            agents,
            cancel,
            observer,
            grace_delay: DEFAULT_GRACE_DELAY,
        }
    }

    /// Override the delay before the terminal completion notification
    pub fn with_grace_delay(mut self, delay: Duration) -> Self {
        self.grace_delay = delay;
        self
    }

    /// Execute one task to completion, including all recursive expansion.
    ///
    /// Errors anywhere in the expansion are caught here, at the outermost
    /// level only: one synthetic error message per failed call, siblings
    /// already executed stay persisted. The completion notification fires
    /// exactly once in every outcome.
    pub async fn handle(&self, thread_id: &str, task: Task) -> HandleOutcome {
        let kind = match task.kind {
            TaskKind::Message => "message",
            TaskKind::Action => "action",
        };
        metrics::record_task(kind);
        let started = Instant::now();
        tracing::info!(thread_id = %thread_id, task = %task.name, kind = %kind, "Handling task");

        // Stop requests are accepted for the whole call, so one issued
        // while the agent is still generating takes effect at the first
        // chunk poll.
        self.cancel.begin(thread_id);
        let outcome = match self.execute(thread_id, task).await {
            Ok(_) => HandleOutcome::Completed,
            Err(e) => {
                tracing::error!(thread_id = %thread_id, error = %e, "Task processing failed");
                metrics::record_error("task");
                let message = Message::error(thread_id, GENERIC_ERROR_TEXT);
                if let Err(store_err) = self.store.append(thread_id, &message) {
                    tracing::error!(
                        thread_id = %thread_id,
                        error = %store_err,
                        "Failed to persist error message"
                    );
                }
                self.observer.on_error(&message, &e);
                HandleOutcome::Failed(e.to_string())
            }
        };

        // Unconditional: the flag must never leak into the next turn.
        self.cancel.finish(thread_id);

        // Terminal notification, guaranteed even on error or cancellation
        tokio::time::sleep(self.grace_delay).await;
        self.observer.on_processing_complete(thread_id);
        metrics::record_handle_duration(started.elapsed().as_secs_f64());
        outcome
    }

    /// First open of a thread: render the agent's boot message on an empty
    /// log and auto-run its init task, if either exists.
    pub async fn open_thread(&self, thread_id: &str) -> Result<()> {
        let thread = self.store.load(thread_id)?;
        if !thread.messages.is_empty() {
            return Ok(());
        }
        let agent = self.agents.resolve(&thread)?;

        if let Some(boot) = agent.boot_message() {
            tracing::info!(thread_id = %thread_id, "Rendering boot message");
            let mut boot_task = Task::action("boot", "");
            boot_task.skip_user_message = true;
            self.apply_response(thread_id, &boot_task, boot).await?;
        }

        if let Some(init) = agent.init_task() {
            tracing::info!(thread_id = %thread_id, task = %init.name, "Running init task");
            self.handle(thread_id, init).await;
        }
        Ok(())
    }

    /// One level of task execution. Recursion goes through the boxed
    /// future; errors propagate uncaught up to `handle`.
    fn execute<'a>(&'a self, thread_id: &'a str, task: Task) -> BoxFuture<'a, Result<Meta>> {
        Box::pin(async move {
            if !task.skip_user_message {
                let message = Message::user(thread_id, &task.message);
                self.store.append(thread_id, &message)?;
                self.observer.on_user_message_added(&message);
            }

            // Re-load before dispatch: earlier plan steps or a concurrent
            // edit may have changed the thread since the caller saw it.
            let thread = self.store.load(thread_id)?;
            let agent = self.agents.resolve(&thread)?;

            let response = match task.kind {
                TaskKind::Message => {
                    agent
                        .generate_reply(&thread, task.host_utils.clone())
                        .await?
                }
                TaskKind::Action => agent.execute_task(&task, &thread).await?,
            };

            self.apply_response(thread_id, &task, response).await
        })
    }

    async fn apply_response(
        &self,
        thread_id: &str,
        task: &Task,
        response: Response,
    ) -> Result<Meta> {
        match response {
            Response::Plan(plan) => self.run_plan(thread_id, task, plan).await,
            Response::Stream(stream) => {
                if task.skip_bot_message {
                    let StreamResponse {
                        chunks,
                        meta,
                        available_tasks,
                        next_tasks,
                        ..
                    } = stream;
                    self.run_silent(thread_id, task, meta, available_tasks, next_tasks, Some(chunks))
                        .await
                } else {
                    self.run_stream(thread_id, task, stream).await
                }
            }
            Response::Normal(normal) => {
                if task.skip_bot_message {
                    let NormalResponse {
                        meta,
                        available_tasks,
                        next_tasks,
                        ..
                    } = normal;
                    self.run_silent(thread_id, task, meta, available_tasks, next_tasks, None)
                        .await
                } else {
                    self.run_normal(thread_id, task, normal).await
                }
            }
        }
    }

    /// Expand a plan strictly in order, folding each child's response meta
    /// into the next child's task meta. A later step always sees the
    /// persisted effects of earlier ones.
    async fn run_plan(&self, thread_id: &str, task: &Task, plan: PlanResponse) -> Result<Meta> {
        tracing::info!(thread_id = %thread_id, steps = plan.steps.len(), "Expanding plan");
        let mut previous_meta = Meta::new();
        for step in plan.steps {
            let child = Task {
                name: step.name,
                kind: step.kind.unwrap_or(TaskKind::Action),
                message: step.message,
                meta: merge_meta(&previous_meta, &step.meta),
                host_utils: task.host_utils.clone(),
                skip_user_message: false,
                skip_bot_message: false,
            };
            previous_meta = self.execute(thread_id, child).await?;
        }
        Ok(previous_meta)
    }

    async fn run_stream(
        &self,
        thread_id: &str,
        task: &Task,
        stream: StreamResponse,
    ) -> Result<Meta> {
        let StreamResponse {
            mut chunks,
            is_html,
            meta,
            available_tasks,
            next_tasks,
        } = stream;

        // Persist the empty message before consuming any chunk so the host
        // can show a pending bubble while the first chunk is in flight.
        let mut message = Message::bot(thread_id, "").with_html(is_html);
        self.store.append(thread_id, &message)?;
        self.observer.on_bot_message_start(&message, true);

        loop {
            if self.cancel.is_stop_requested(thread_id) {
                // The source is abandoned, not torn down; partial output stands.
                tracing::info!(thread_id = %thread_id, message_id = %message.id, "Stream cancelled");
                metrics::record_cancellation();
                break;
            }
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    message.text.push_str(&chunk);
                    metrics::record_chunk();
                    self.observer.on_bot_message_append(&message.id, &chunk);
                }
                Some(Err(e)) => {
                    tracing::warn!(thread_id = %thread_id, error = %e, "Stream iteration failed");
                    metrics::record_error("stream");
                    if !self.cancel.is_stop_requested(thread_id) {
                        message.text.push_str(STREAM_INTERRUPTED_NOTICE);
                    }
                    break;
                }
                None => break,
            }
        }
        // One write for the whole stream keeps write volume bounded.
        message.meta = meta.clone();
        self.store.patch(
            thread_id,
            &message.id,
            MessagePatch::text(message.text.clone()).with_meta(meta.clone()),
        )?;
        self.observer.on_bot_message_complete(&message);
        metrics::record_bot_message();

        self.attach_available_tasks(thread_id, &message.id, available_tasks)?;
        self.run_next_tasks(thread_id, task, Some(&message.id), next_tasks)
            .await?;
        Ok(meta)
    }

    async fn run_normal(
        &self,
        thread_id: &str,
        task: &Task,
        normal: NormalResponse,
    ) -> Result<Meta> {
        let NormalResponse {
            full_message,
            is_html,
            meta,
            available_tasks,
            next_tasks,
        } = normal;

        let message = Message::bot(thread_id, full_message)
            .with_html(is_html)
            .with_meta(meta.clone());
        self.store.append(thread_id, &message)?;
        metrics::record_bot_message();
        // Already complete on arrival; is_streaming=false tells the host
        // not to wait for appends.
        self.observer.on_bot_message_start(&message, false);

        self.attach_available_tasks(thread_id, &message.id, available_tasks)?;
        self.run_next_tasks(thread_id, task, Some(&message.id), next_tasks)
            .await?;
        Ok(meta)
    }

    /// Silent path: no message is created. Available tasks attach to the
    /// message the task was stamped with; next-task chaining still applies.
    async fn run_silent(
        &self,
        thread_id: &str,
        task: &Task,
        meta: Meta,
        available_tasks: Vec<AvailableTask>,
        next_tasks: Vec<Task>,
        chunks: Option<ChunkStream>,
    ) -> Result<Meta> {
        if let Some(mut chunks) = chunks {
            while let Some(chunk) = chunks.next().await {
                if let Err(e) = chunk {
                    tracing::warn!(thread_id = %thread_id, error = %e, "Silent stream failed");
                    break;
                }
            }
        }

        let target = task.target_message_id().map(str::to_string);
        if !available_tasks.is_empty() {
            match target.as_deref() {
                Some(message_id) => {
                    self.attach_available_tasks(thread_id, message_id, available_tasks)?
                }
                None => tracing::warn!(
                    thread_id = %thread_id,
                    task = %task.name,
                    "Silent task produced available tasks but has no target message"
                ),
            }
        }

        self.run_next_tasks(thread_id, task, target.as_deref(), next_tasks)
            .await?;
        Ok(meta)
    }

    fn attach_available_tasks(
        &self,
        thread_id: &str,
        message_id: &str,
        tasks: Vec<AvailableTask>,
    ) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        self.store.patch(
            thread_id,
            message_id,
            MessagePatch::default().with_available_tasks(tasks.clone()),
        )?;
        self.observer.on_available_tasks_added(message_id, &tasks);
        Ok(())
    }

    /// Auto-chain follow-up tasks after a response, stamping each with the
    /// id of the message just produced so silent steps can find it.
    async fn run_next_tasks(
        &self,
        thread_id: &str,
        parent: &Task,
        message_id: Option<&str>,
        next_tasks: Vec<Task>,
    ) -> Result<()> {
        for mut next in next_tasks {
            next.host_utils = parent.host_utils.clone();
            if let Some(id) = message_id {
                next.meta
                    .insert("messageId".to_string(), serde_json::json!(id));
            }
            self.execute(thread_id, next).await?;
        }
        Ok(())
    }
}
