//! Instrumentation target contract
//!
//! The network client being traced is constructed with an implementation
//! of [`OutboundHooks`] and invokes it at its extension points: call
//! creation, connection establishment, name resolution, post-response
//! timer scheduling. The hooks observe; they never alter the semantics
//! of the operation.
//!
//! Every hook returns an optional [`ContextScope`]. `Some` means "a
//! segment was created and is current until you drop this guard"; `None`
//! means the operation proceeds unobserved. The client behaves
//! identically either way.
//!
//! The client's remaining obligations are to settle each operation's
//! [`Completion`] on exactly one terminal event and to route every
//! callback registration through [`crate::context::bind`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::completion::Completion;
use crate::context::ContextScope;
use crate::naming::Destination;
use crate::segment::SegmentHandle;

/// Segment label for pooled connection checkout
pub const CONNECT_POOLED_LABEL: &str = "client.create_connection";
/// Segment label for a raw socket connect
pub const CONNECT_SOCKET_LABEL: &str = "socket.connect";
/// Segment label for name resolution
pub const RESOLVE_LABEL: &str = "dns.lookup";
/// Segment label for a post-response bookkeeping timer
pub const TIMER_LABEL: &str = "timer.delay";

/// Concrete binding of the abstract connection-establishment hook.
///
/// The two kinds are mutually exclusive alternatives for the same
/// logical step; which one a client reports depends on how it manages
/// connections, and a single call never produces both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Connection obtained through a pooling layer
    PooledCheckout,
    /// Direct socket connect
    SocketConnect,
}

impl ConnectionKind {
    /// Segment label for this binding
    pub fn label(self) -> &'static str {
        match self {
            ConnectionKind::PooledCheckout => CONNECT_POOLED_LABEL,
            ConnectionKind::SocketConnect => CONNECT_SOCKET_LABEL,
        }
    }
}

/// One logical outbound call as seen through the hook contract
///
/// Layered clients may present the same `OutboundCall` to the hooks more
/// than once (a transport layer and a client-facing layer both observe
/// it). The `marker` slot carries the segment already created for it so
/// the second observation is recognized and suppressed.
#[derive(Debug)]
pub struct OutboundCall {
    destination: Destination,
    completion: Rc<Completion>,
    marker: RefCell<Option<SegmentHandle>>,
}

impl OutboundCall {
    /// Describe an outbound call about to be issued
    pub fn new(destination: Destination) -> Self {
        OutboundCall {
            destination,
            completion: Rc::new(Completion::new()),
            marker: RefCell::new(None),
        }
    }

    /// Where the call is going
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// The call's terminal event: settled on response end-of-stream or
    /// transport error, whichever fires first
    pub fn completion(&self) -> &Rc<Completion> {
        &self.completion
    }

    /// The segment already attributed to this call, if any
    pub fn marker(&self) -> Option<SegmentHandle> {
        self.marker.borrow().clone()
    }

    /// Tag this call with its segment. Later observations of the same
    /// call must not create another one.
    pub fn set_marker(&self, segment: SegmentHandle) {
        *self.marker.borrow_mut() = Some(segment);
    }
}

/// Extension points the traced client invokes
///
/// Implementations must be infallible from the client's point of view:
/// any internal failure surfaces as a `None` scope, never as a panic or
/// error the client could observe.
pub trait OutboundHooks {
    /// A logical outbound call is being issued. The returned scope keeps
    /// the call's External segment current while the client registers
    /// its sub-operations.
    fn call_started(&self, call: &OutboundCall) -> Option<ContextScope>;

    /// Connection establishment began; `done` settles when the
    /// connection is ready or has failed.
    fn connection_started(
        &self,
        call: &OutboundCall,
        kind: ConnectionKind,
        done: &Rc<Completion>,
    ) -> Option<ContextScope>;

    /// Name resolution began for `host`; `done` settles when it
    /// resolves or fails.
    fn resolution_started(
        &self,
        call: &OutboundCall,
        host: &str,
        done: &Rc<Completion>,
    ) -> Option<ContextScope>;

    /// A bookkeeping timer related to the call was scheduled; `done`
    /// settles when it fires or is cancelled.
    fn timer_scheduled(&self, call: &OutboundCall, done: &Rc<Completion>) -> Option<ContextScope>;
}

/// Hook binding for clients running without instrumentation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl OutboundHooks for NoopHooks {
    fn call_started(&self, _call: &OutboundCall) -> Option<ContextScope> {
        None
    }

    fn connection_started(
        &self,
        _call: &OutboundCall,
        _kind: ConnectionKind,
        _done: &Rc<Completion>,
    ) -> Option<ContextScope> {
        None
    }

    fn resolution_started(
        &self,
        _call: &OutboundCall,
        _host: &str,
        _done: &Rc<Completion>,
    ) -> Option<ContextScope> {
        None
    }

    fn timer_scheduled(
        &self,
        _call: &OutboundCall,
        _done: &Rc<Completion>,
    ) -> Option<ContextScope> {
        None
    }
}
