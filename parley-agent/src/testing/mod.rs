// ABOUTME: Test utilities for exercising orchestration without real agents.
// ABOUTME: Public so downstream crates can use them in integration tests.

pub mod mock;

pub use mock::{CallKind, MockAgent, RecordedCall};
