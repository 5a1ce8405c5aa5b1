// ABOUTME: Host-agnostic conversation orchestration for AI agents.
// ABOUTME: Thread persistence, task processing, streaming, and cancellation.

pub mod cancel;
pub mod composer;
pub mod metrics;
pub mod notify;
pub mod processor;
pub mod store;

pub use cancel::CancellationRegistry;
pub use notify::{NullObserver, ThreadObserver};
pub use processor::{HandleOutcome, Processor};
pub use store::{MessagePatch, ThreadStore};

// Re-export the shared agent vocabulary for convenient access
pub use parley_agent::{
    Agent, AgentProvider, AgentRegistry, AvailableTask, Message, Meta, Response, Sender, Task,
    TaskKind, Thread, ThreadSummary,
};
