// ABOUTME: Pluggable conversational agent abstraction for parley.
// ABOUTME: Shared Task/Response/Thread vocabulary plus trait-based agents with a registry.

pub mod agents;
pub mod provider;
pub mod response;
pub mod task;
pub mod testing;
pub mod thread;
pub mod traits;

pub use provider::{AgentFactory, AgentProvider, AgentRegistry};
pub use response::{
    chunk_channel, AvailableTask, ChunkSender, ChunkStream, NormalResponse, PlanResponse,
    PlanStep, Response, StreamResponse,
};
pub use task::{merge_meta, HostUtils, Meta, Task, TaskKind};
pub use thread::{Message, Sender, Thread, ThreadSummary};
pub use traits::Agent;
