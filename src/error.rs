//! Error taxonomy for the tracing core
//!
//! Every variant is an instrumentation-internal condition. None of them
//! may ever propagate into the operation being traced: the interceptor
//! catches all of these at its boundary and degrades to an untraced call.

use thiserror::Error;

/// Errors raised inside the tracing core
#[derive(Debug, Error)]
pub enum TraceError {
    /// No execution context was active when an interceptor fired.
    /// Non-fatal: the call simply proceeds unobserved.
    #[error("no active trace context")]
    PropagationMiss,

    /// A segment already exists for this logical operation; creating
    /// another would duplicate it in the tree.
    #[error("operation already attributed to segment `{0}`")]
    DuplicateAttribution(String),

    /// A segment was created but never ended. Always a defect in the
    /// instrumentation, never a recoverable runtime condition.
    #[error("segment `{0}` was created but never ended")]
    UnterminatedSegment(String),

    /// The per-transaction segment cap was reached; the tree is marked
    /// truncated and no further segments are recorded.
    #[error("segment limit reached ({0}), tree truncated")]
    SegmentLimit(usize),

    /// Any other failure internal to the tracing logic
    #[error(transparent)]
    Instrumentation(#[from] anyhow::Error),
}
