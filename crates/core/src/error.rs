//! Error taxonomy (§7).
//!
//! Capability-trait implementations (the AWS adapters, the YouTube HTTP
//! client) return [`OrchestratorError`] so callers can match on variant to
//! decide whether to recover locally or surface a hard failure, per the
//! propagation policy in §7. Binaries themselves use `eyre::Result` the way
//! the teacher's `main.rs` does, wrapping an [`OrchestratorError`] with
//! `.context(...)` as it crosses into orchestration logic.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// (a)-(e) in §7's taxonomy.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Network timeout, HTTP 5xx, XML/JSON parse failure. Recoverable:
    /// log and move to the next item.
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    /// Missing video, quota exceeded, credential failure. Not expected to
    /// succeed on immediate retry.
    #[error("upstream permanent error: {0}")]
    UpstreamPermanent(String),

    /// A conditional-write miss. Never actually an error condition — kept
    /// as a variant so call sites can match it out explicitly rather than
    /// treating every `Result::Err` the same way.
    #[error("conditional check failed for {table}/{key}")]
    ConditionalCheckFailed { table: &'static str, key: String },

    /// State-store throttling. Recoverable with backoff.
    #[error("state store throttled: {0}")]
    StateStoreThrottled(String),

    /// Any other state-store failure that is not a throttle or a benign
    /// conditional-check miss.
    #[error("state store error: {0}")]
    StateStore(String),

    /// Launch rejected, or stop of an already-gone task (the latter is
    /// benign and handled by callers before it reaches here in most
    /// paths, but adapters may still surface it for visibility).
    #[error("worker runtime error: {0}")]
    WorkerRuntime(String),

    /// Malformed queue message, missing required configuration. Surfaced
    /// as a hard failure of the whole invocation so it retries (§7).
    #[error("programmer error: {0}")]
    Programmer(String),
}

impl OrchestratorError {
    /// Whether a control loop should log-and-continue (true) or propagate
    /// as a hard failure of the invocation (false), per §7's propagation
    /// policy.
    pub fn is_recoverable_per_item(&self) -> bool {
        matches!(
            self,
            OrchestratorError::UpstreamTransient(_)
                | OrchestratorError::UpstreamPermanent(_)
                | OrchestratorError::ConditionalCheckFailed { .. }
                | OrchestratorError::StateStoreThrottled(_)
                | OrchestratorError::StateStore(_)
                | OrchestratorError::WorkerRuntime(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmer_errors_are_not_recoverable_per_item() {
        let err = OrchestratorError::Programmer("missing TASK_CONTROL_QUEUE_URL".into());
        assert!(!err.is_recoverable_per_item());
    }

    #[test]
    fn upstream_and_store_errors_are_recoverable_per_item() {
        assert!(OrchestratorError::UpstreamTransient("timeout".into()).is_recoverable_per_item());
        assert!(OrchestratorError::StateStoreThrottled("429".into()).is_recoverable_per_item());
        assert!(OrchestratorError::ConditionalCheckFailed {
            table: "Broadcasts",
            key: "v1".into()
        }
        .is_recoverable_per_item());
    }
}
