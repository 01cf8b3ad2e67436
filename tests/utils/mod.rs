// Integration test utilities
//
// A scripted client that honors the instrumentation target contract:
// it invokes the hooks at its extension points, settles one completion
// per operation on exactly one terminal event, and routes every
// callback registration through `context::bind`. Server behavior is
// scripted so interleavings are deterministic.

#![allow(dead_code)]

use std::rc::Rc;

use urdimbre::completion::Completion;
use urdimbre::context;
use urdimbre::event_loop::EventLoop;
use urdimbre::hooks::{ConnectionKind, OutboundCall, OutboundHooks};
use urdimbre::naming::Destination;
use urdimbre::segment::SegmentId;
use urdimbre::transaction::Transaction;

/// Opt-in log output while debugging tests (RUST_LOG=debug)
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// What the far end does with the request
#[derive(Debug, Clone, Copy)]
pub enum ServerBehavior {
    /// The transport aborts before any response arrives
    AbortOnConnect,
    /// Connect (resolving the hostname first when asked), stream a
    /// response to end-of-stream, then optionally schedule a
    /// bookkeeping timer for `post_delay` ticks
    Respond {
        resolve: bool,
        post_delay: Option<u64>,
    },
}

/// Scripted outbound client wired to the hook contract
pub struct SimClient {
    event_loop: Rc<EventLoop>,
    hooks: Rc<dyn OutboundHooks>,
    connection_kind: ConnectionKind,
    double_observe: bool,
}

impl SimClient {
    pub fn new(event_loop: Rc<EventLoop>, hooks: Rc<dyn OutboundHooks>) -> Self {
        SimClient {
            event_loop,
            hooks,
            connection_kind: ConnectionKind::SocketConnect,
            double_observe: false,
        }
    }

    /// Use a specific binding of the connection-establishment hook
    pub fn with_connection_kind(mut self, kind: ConnectionKind) -> Self {
        self.connection_kind = kind;
        self
    }

    /// Present each call to the hooks twice, the way a layered client
    /// observed at both the transport and client-facing layer does
    pub fn observing_both_layers(mut self) -> Self {
        self.double_observe = true;
        self
    }

    /// Issue a request. Nothing has actually run until the event loop
    /// is driven; the returned call exposes the terminal completion.
    pub fn get(&self, destination: Destination, behavior: ServerBehavior) -> Rc<OutboundCall> {
        let call = Rc::new(OutboundCall::new(destination));

        // the transport layer observes the call first
        let scope = self.hooks.call_started(&call);
        if self.double_observe {
            // the client-facing layer presents the same logical call again
            let _second = self.hooks.call_started(&call);
        }

        match behavior {
            ServerBehavior::AbortOnConnect => {
                let failing = call.clone();
                self.event_loop.schedule(context::bind(move || {
                    failing.completion().settle_err();
                }));
            }
            ServerBehavior::Respond {
                resolve,
                post_delay,
            } => {
                // the response handler is registered now, while the
                // external segment is current
                let respond = self.make_response_task(&call, post_delay);
                self.schedule_connect(&call, resolve, respond);
            }
        }

        drop(scope);
        call
    }

    /// Connection establishment, with name resolution nested inside it
    /// when requested. Runs on a later loop turn, in the context bound
    /// at registration time.
    fn schedule_connect(&self, call: &Rc<OutboundCall>, resolve: bool, respond: Box<dyn FnOnce()>) {
        let hooks = self.hooks.clone();
        let event_loop = self.event_loop.clone();
        let kind = self.connection_kind;
        let call = call.clone();

        self.event_loop.schedule(context::bind(move || {
            let conn_done = Rc::new(Completion::new());
            {
                // connection ready: the response starts streaming
                let event_loop = event_loop.clone();
                conn_done.subscribe(move |_| {
                    event_loop.schedule(respond);
                });
            }

            let scope = hooks.connection_started(&call, kind, &conn_done);
            if resolve {
                // lookup is issued while the connection segment is current
                let resolve_done = Rc::new(Completion::new());
                {
                    let conn_done = conn_done.clone();
                    resolve_done.subscribe(move |_| {
                        conn_done.settle_ok();
                    });
                }

                let hooks = hooks.clone();
                let lookup_call = call.clone();
                let lookup_loop = event_loop.clone();
                event_loop.schedule(context::bind(move || {
                    let host = lookup_call.destination().host.clone();
                    let rscope = hooks.resolution_started(&lookup_call, &host, &resolve_done);
                    // the resolver answers on a later turn
                    let answered = resolve_done.clone();
                    lookup_loop.schedule(context::bind(move || {
                        answered.settle_ok();
                    }));
                    drop(rscope);
                }));
            } else {
                let connected = conn_done.clone();
                event_loop.schedule(context::bind(move || {
                    connected.settle_ok();
                }));
            }
            drop(scope);
        }));
    }

    /// End-of-stream handling: schedule any bookkeeping timer, then
    /// signal the call's terminal event. Bound at call time, so it runs
    /// with the external segment current.
    fn make_response_task(
        &self,
        call: &Rc<OutboundCall>,
        post_delay: Option<u64>,
    ) -> Box<dyn FnOnce()> {
        let hooks = self.hooks.clone();
        let event_loop = self.event_loop.clone();
        let call = call.clone();

        Box::new(context::bind(move || {
            if let Some(delay) = post_delay {
                let timer_done = Rc::new(Completion::new());
                let tscope = hooks.timer_scheduled(&call, &timer_done);
                drop(tscope);

                let fired = timer_done.clone();
                event_loop.schedule_after(
                    delay,
                    context::bind(move || {
                        fired.settle_ok();
                    }),
                );
            }
            call.completion().settle_ok();
        }))
    }
}

/// Names of a segment's children, in creation order
pub fn child_names(tx: &Transaction, parent: SegmentId) -> Vec<String> {
    tx.with_tree(|tree| {
        tree.get(parent)
            .map(|node| {
                node.children()
                    .iter()
                    .filter_map(|&id| tree.get(id).map(|child| child.name().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    })
}

/// Id of the n-th child of `parent`
pub fn nth_child(tx: &Transaction, parent: SegmentId, n: usize) -> Option<SegmentId> {
    tx.with_tree(|tree| {
        tree.get(parent)
            .and_then(|node| node.children().get(n).copied())
    })
}

/// Whether the segment's timer has both endpoints recorded
pub fn started_and_ended(tx: &Transaction, id: SegmentId) -> bool {
    tx.with_tree(|tree| {
        tree.get(id)
            .map(|node| node.timer().has_start() && node.timer().has_ended())
            .unwrap_or(false)
    })
}
