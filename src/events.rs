//! Progress events for the host UI
//!
//! The core reports what it is doing through this narrow sink so a GUI, a
//! log pane or a test harness can observe it without the core knowing who
//! is listening.

/// Collaborator sink for operational events.
///
/// Implementations must be cheap and non-blocking; they are invoked from
/// request workers.
pub trait EventSink: Send + Sync {
    /// A human-readable log line (already localized).
    fn log_message(&self, message: &str);

    /// A request entered the translation pipeline.
    fn work_started(&self) {}

    /// A request left the pipeline; `success` is false for failures and
    /// aborted work.
    fn work_finished(&self, success: bool) {
        let _ = success;
    }

    /// Token accounting reported by the upstream response.
    fn token_usage(&self, prompt_tokens: u64, completion_tokens: u64) {
        let _ = (prompt_tokens, completion_tokens);
    }
}

/// Default sink that forwards everything to `tracing`.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log_message(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn work_started(&self) {
        tracing::debug!("translation work started");
    }

    fn work_finished(&self, success: bool) {
        tracing::debug!(success, "translation work finished");
    }

    fn token_usage(&self, prompt_tokens: u64, completion_tokens: u64) {
        tracing::info!(prompt_tokens, completion_tokens, "upstream token usage");
    }
}
