//! Tracer configuration
//!
//! Controls whether instrumentation is active and how large a single
//! transaction's segment tree may grow.

/// Default cap on segments per transaction.
///
/// A runaway transaction (retry storms, long-polling loops) would
/// otherwise grow its tree without bound; past the cap new segments are
/// refused and the tree is marked truncated.
pub const DEFAULT_MAX_SEGMENTS: usize = 900;

/// Configuration for transaction tracing
#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Whether outbound-call instrumentation is active
    pub enabled: bool,
    /// Maximum number of segments per transaction (root included)
    pub max_segments: usize,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            enabled: true,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl TracerConfig {
    /// Create a configuration with a custom segment cap
    pub fn new(max_segments: usize) -> Self {
        TracerConfig {
            enabled: true,
            max_segments,
        }
    }

    /// Disable instrumentation wholesale (segment trees are still built
    /// for explicitly created transactions, but interceptors stand down)
    pub fn disabled() -> Self {
        TracerConfig {
            enabled: false,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}
