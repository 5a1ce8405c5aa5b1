// ABOUTME: Metrics helpers recorded throughout the processor.
// ABOUTME: Thin wrappers over the metrics facade; exporters are wired by the host.

/// Record one task dispatch by kind ("message" or "action")
pub fn record_task(kind: &str) {
    metrics::counter!("parley_tasks_total", "kind" => kind.to_string()).increment(1);
}

/// Record one streamed chunk
pub fn record_chunk() {
    metrics::counter!("parley_stream_chunks_total").increment(1);
}

/// Record a persisted bot message
pub fn record_bot_message() {
    metrics::counter!("parley_bot_messages_total").increment(1);
}

/// Record an error by category
pub fn record_error(category: &str) {
    metrics::counter!("parley_errors_total", "category" => category.to_string()).increment(1);
}

/// Record a cancelled generation
pub fn record_cancellation() {
    metrics::counter!("parley_cancellations_total").increment(1);
}

/// Record end-to-end duration of a top-level handle call
pub fn record_handle_duration(seconds: f64) {
    metrics::histogram!("parley_handle_duration_seconds").record(seconds);
}
