//! Outbound call interceptor
//!
//! The hook binding that turns client extension-point invocations into
//! segments. One External segment per logical call, with connection,
//! resolution, and timer children attributed through the execution
//! context that is current when each hook fires.
//!
//! Tracing is strictly best-effort instrumentation layered over working
//! functionality. Every internal failure is contained here: the hook
//! returns `None`, a diagnostic is logged, and the real operation
//! proceeds untouched.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::completion::Completion;
use crate::config::TracerConfig;
use crate::context::{self, ContextScope};
use crate::error::TraceError;
use crate::hooks::{ConnectionKind, OutboundCall, OutboundHooks, RESOLVE_LABEL, TIMER_LABEL};
use crate::segment::SegmentHandle;

/// Hook implementation that records outbound calls into the current
/// transaction's segment tree
#[derive(Debug, Clone)]
pub struct OutboundInterceptor {
    config: TracerConfig,
}

impl OutboundInterceptor {
    /// Interceptor with default configuration
    pub fn new() -> Self {
        OutboundInterceptor::with_config(TracerConfig::default())
    }

    /// Interceptor with explicit configuration
    pub fn with_config(config: TracerConfig) -> Self {
        OutboundInterceptor { config }
    }

    /// Create the External segment for a call and make it current.
    fn start_external(&self, call: &OutboundCall) -> Result<ContextScope, TraceError> {
        let context = context::current_context().ok_or(TraceError::PropagationMiss)?;

        // A layered client may observe the same logical call twice; the
        // marker carries the segment created the first time around.
        if let Some(existing) = call.marker() {
            let name = existing.name().unwrap_or_else(|| "<released>".to_string());
            return Err(TraceError::DuplicateAttribution(name));
        }

        let name = call.destination().external_name();
        let segment = context
            .transaction()
            .create_segment(context.current_segment(), name)?;
        call.set_marker(segment.clone());
        Self::end_on_settle(&segment, call.completion());

        ContextScope::enter_segment(segment.id()).ok_or(TraceError::PropagationMiss)
    }

    /// Create a child segment under the current segment for a nested
    /// sub-operation.
    fn start_child(&self, label: &str, done: &Rc<Completion>) -> Result<ContextScope, TraceError> {
        let context = context::current_context().ok_or(TraceError::PropagationMiss)?;
        let segment = context
            .transaction()
            .create_segment(context.current_segment(), label)?;
        Self::end_on_settle(&segment, done);

        ContextScope::enter_segment(segment.id()).ok_or(TraceError::PropagationMiss)
    }

    /// Pair success and failure termination at creation time: whichever
    /// terminal event settles the completion ends the segment, and the
    /// other becomes a no-op.
    fn end_on_settle(segment: &SegmentHandle, done: &Rc<Completion>) {
        let handle = segment.clone();
        done.subscribe(move |_outcome| handle.end());
    }

    /// Contain an instrumentation result at the hook boundary.
    fn contain(&self, operation: &str, result: Result<ContextScope, TraceError>) -> Option<ContextScope> {
        match result {
            Ok(scope) => Some(scope),
            Err(TraceError::PropagationMiss) => {
                debug!(operation, "no active trace context, call proceeds untraced");
                None
            }
            Err(TraceError::DuplicateAttribution(segment)) => {
                debug!(operation, %segment, "duplicate observation suppressed");
                None
            }
            Err(TraceError::SegmentLimit(cap)) => {
                debug!(operation, cap, "segment cap reached, call proceeds untraced");
                None
            }
            Err(error) => {
                warn!(operation, %error, "instrumentation failure contained");
                None
            }
        }
    }
}

impl Default for OutboundInterceptor {
    fn default() -> Self {
        OutboundInterceptor::new()
    }
}

impl OutboundHooks for OutboundInterceptor {
    fn call_started(&self, call: &OutboundCall) -> Option<ContextScope> {
        if !self.config.enabled {
            return None;
        }
        self.contain("external", self.start_external(call))
    }

    fn connection_started(
        &self,
        _call: &OutboundCall,
        kind: ConnectionKind,
        done: &Rc<Completion>,
    ) -> Option<ContextScope> {
        if !self.config.enabled {
            return None;
        }
        self.contain("connection", self.start_child(kind.label(), done))
    }

    fn resolution_started(
        &self,
        _call: &OutboundCall,
        host: &str,
        done: &Rc<Completion>,
    ) -> Option<ContextScope> {
        if !self.config.enabled {
            return None;
        }
        debug!(host, "name resolution observed");
        self.contain("resolution", self.start_child(RESOLVE_LABEL, done))
    }

    fn timer_scheduled(&self, _call: &OutboundCall, done: &Rc<Completion>) -> Option<ContextScope> {
        if !self.config.enabled {
            return None;
        }
        self.contain("timer", self.start_child(TIMER_LABEL, done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::in_transaction;
    use crate::hooks::CONNECT_SOCKET_LABEL;
    use crate::naming::{Destination, Scheme};

    fn call_to(host: &str, port: u16, path: &str) -> OutboundCall {
        OutboundCall::new(Destination::new(Scheme::Http, host, port, path))
    }

    #[test]
    fn test_no_context_means_no_segment() {
        context::clear_current();
        let interceptor = OutboundInterceptor::new();
        let call = call_to("localhost", 8080, "/");

        assert!(interceptor.call_started(&call).is_none());
        assert!(call.marker().is_none());
    }

    #[test]
    fn test_call_started_builds_external_under_current() {
        let interceptor = OutboundInterceptor::new();
        in_transaction(&TracerConfig::default(), |tx| {
            let call = call_to("localhost", 8080, "/some/path");
            let scope = interceptor.call_started(&call);
            assert!(scope.is_some());

            let context = context::current_context().expect("context active");
            let external = context.current_handle();
            assert_eq!(
                external.name().as_deref(),
                Some("External/localhost:8080/some/path")
            );
            assert!(!external.has_ended());

            drop(scope);
            let restored = context::current_context().expect("context active");
            assert_eq!(restored.current_segment(), tx.root_id());

            // paired termination: the terminal event ends the segment
            call.completion().settle_ok();
            assert!(external.has_ended());
        });
    }

    #[test]
    fn test_error_terminal_event_also_ends_segment() {
        let interceptor = OutboundInterceptor::new();
        in_transaction(&TracerConfig::default(), |_| {
            let call = call_to("localhost", 8080, "/");
            let scope = interceptor.call_started(&call);
            drop(scope);

            let external = call.marker().expect("marker set");
            call.completion().settle_err();
            assert!(external.has_ended());

            // late success signal is a no-op
            call.completion().settle_ok();
            assert!(external.has_ended());
        });
    }

    #[test]
    fn test_duplicate_observation_is_suppressed() {
        let interceptor = OutboundInterceptor::new();
        in_transaction(&TracerConfig::default(), |tx| {
            let call = call_to("localhost", 8080, "/");
            let first = interceptor.call_started(&call);
            assert!(first.is_some());
            drop(first);

            let second = interceptor.call_started(&call);
            assert!(second.is_none());

            // only the one External child under the root
            tx.with_tree(|tree| {
                assert_eq!(tree.get(tree.root()).expect("root").children().len(), 1);
            });
        });
    }

    #[test]
    fn test_nested_hooks_attribute_to_current_segment() {
        let interceptor = OutboundInterceptor::new();
        in_transaction(&TracerConfig::default(), |tx| {
            let call = call_to("localhost", 8080, "/");
            let call_scope = interceptor.call_started(&call);

            let conn_done = Rc::new(Completion::new());
            let conn_scope =
                interceptor.connection_started(&call, ConnectionKind::SocketConnect, &conn_done);
            assert!(conn_scope.is_some());

            let res_done = Rc::new(Completion::new());
            let res_scope = interceptor.resolution_started(&call, "localhost", &res_done);
            assert!(res_scope.is_some());

            drop(res_scope);
            drop(conn_scope);
            drop(call_scope);

            tx.with_tree(|tree| {
                let root = tree.get(tree.root()).expect("root");
                assert_eq!(root.children().len(), 1);
                let external = tree.get(root.children()[0]).expect("external");
                assert_eq!(external.children().len(), 1);
                let connection = tree.get(external.children()[0]).expect("connection");
                assert_eq!(connection.name(), CONNECT_SOCKET_LABEL);
                let resolution = tree.get(connection.children()[0]).expect("resolution");
                assert_eq!(resolution.name(), RESOLVE_LABEL);
            });

            res_done.settle_ok();
            conn_done.settle_ok();
            call.completion().settle_ok();
            tx.end();
            assert!(tx.is_complete());
        });
    }

    #[test]
    fn test_disabled_interceptor_stands_down() {
        let interceptor = OutboundInterceptor::with_config(TracerConfig::disabled());
        in_transaction(&TracerConfig::default(), |tx| {
            let call = call_to("localhost", 8080, "/");
            assert!(interceptor.call_started(&call).is_none());
            assert!(call.marker().is_none());
            assert_eq!(tx.segment_count(), 1);
        });
    }

    #[test]
    fn test_segment_cap_leaves_call_untraced() {
        let interceptor = OutboundInterceptor::new();
        // room for the root only
        in_transaction(&TracerConfig::new(1), |tx| {
            let call = call_to("localhost", 8080, "/");
            assert!(interceptor.call_started(&call).is_none());
            assert!(call.marker().is_none());
            tx.with_tree(|tree| assert!(tree.truncated()));
        });
    }
}
