// ABOUTME: Per-thread stop flags, polled cooperatively by the streaming loop.
// ABOUTME: Flags never leak across turns; a stop request with nothing in flight is a no-op.

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct CancelState {
    /// Threads with a generation currently in flight
    active: HashSet<String>,
    /// Threads whose in-flight generation should stop
    stop: HashSet<String>,
}

/// Registry of threads whose in-flight generation should stop.
///
/// Purely cooperative: the streaming loop polls the flag before each
/// chunk; nothing here touches the stream itself.
#[derive(Default)]
pub struct CancellationRegistry {
    state: Mutex<CancelState>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a generation as in flight for the thread
    pub fn begin(&self, thread_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.insert(thread_id.to_string());
    }

    /// Generation finished (success, error, or cancellation): drop the
    /// active mark and clear any pending flag so it cannot leak into the
    /// next turn.
    pub fn finish(&self, thread_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.remove(thread_id);
        state.stop.remove(thread_id);
    }

    /// Request that the thread's in-flight generation stop. Idempotent; a
    /// request for a thread with nothing in flight is a no-op.
    pub fn request_stop(&self, thread_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.active.contains(thread_id) {
            tracing::debug!(thread_id = %thread_id, "Stop requested with nothing in flight");
            return;
        }
        if state.stop.insert(thread_id.to_string()) {
            tracing::info!(thread_id = %thread_id, "Stop requested");
        }
    }

    pub fn is_stop_requested(&self, thread_id: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stop
            .contains(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_during_active_generation() {
        let registry = CancellationRegistry::new();
        registry.begin("t1");
        assert!(!registry.is_stop_requested("t1"));

        registry.request_stop("t1");
        assert!(registry.is_stop_requested("t1"));
        assert!(!registry.is_stop_requested("t2"));

        registry.finish("t1");
        assert!(!registry.is_stop_requested("t1"));
    }

    #[test]
    fn test_request_stop_idempotent() {
        let registry = CancellationRegistry::new();
        registry.begin("t1");
        registry.request_stop("t1");
        registry.request_stop("t1");
        assert!(registry.is_stop_requested("t1"));
    }

    #[test]
    fn test_request_without_active_generation_is_noop() {
        let registry = CancellationRegistry::new();
        registry.request_stop("t1");
        assert!(!registry.is_stop_requested("t1"));
    }

    #[test]
    fn test_flag_does_not_leak_across_turns() {
        let registry = CancellationRegistry::new();
        registry.begin("t1");
        registry.request_stop("t1");
        registry.finish("t1");

        // A stop request after the generation finished must not affect
        // the next one.
        registry.request_stop("t1");
        registry.begin("t1");
        assert!(!registry.is_stop_requested("t1"));
        registry.finish("t1");
    }

    #[test]
    fn test_threads_are_independent() {
        let registry = CancellationRegistry::new();
        registry.begin("t1");
        registry.begin("t2");
        registry.request_stop("t1");
        assert!(registry.is_stop_requested("t1"));
        assert!(!registry.is_stop_requested("t2"));
        registry.finish("t1");
        registry.finish("t2");
    }
}
