// ABOUTME: Built-in agent implementations.
// ABOUTME: Real deployments register their own factories alongside these.

pub mod echo;
