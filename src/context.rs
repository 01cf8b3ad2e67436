//! Execution-context propagation
//!
//! The registry mapping the presently running continuation to its
//! `(Transaction, current segment)` pair. Nothing restores this mapping
//! across an asynchronous boundary automatically: every handoff to the
//! event loop must go through [`bind`], which captures the context at
//! registration time and reinstalls it for the duration of the callback.
//! A callback handed to a timer or socket therefore sees the same
//! current segment that was active when it was registered, not whatever
//! happens to be active when the event fires.
//!
//! The registry is thread-local. The execution model is single-threaded
//! cooperative scheduling, so this is a bookkeeping artifact rather than
//! a synchronization concern.

use std::cell::RefCell;

use crate::config::TracerConfig;
use crate::segment::{SegmentHandle, SegmentId};
use crate::transaction::Transaction;

/// Propagation token binding a unit of work to a transaction and the
/// segment that new child segments should attach to
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    transaction: Transaction,
    current: SegmentId,
}

impl ExecutionContext {
    /// Context at transaction start: current segment is the root
    pub fn new(transaction: Transaction) -> Self {
        let current = transaction.root_id();
        ExecutionContext {
            transaction,
            current,
        }
    }

    /// The owning transaction
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Id of the segment new children currently attach to
    pub fn current_segment(&self) -> SegmentId {
        self.current
    }

    /// Handle to the current segment
    pub fn current_handle(&self) -> SegmentHandle {
        self.transaction.segment(self.current)
    }

    /// Copy of this context with the cursor moved to `id`
    pub fn with_current(&self, id: SegmentId) -> Self {
        ExecutionContext {
            transaction: self.transaction.clone(),
            current: id,
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// Start a transaction with default configuration and make its context
/// current. See [`in_transaction`] for the scoped form.
pub fn start_transaction() -> Transaction {
    start_transaction_with(&TracerConfig::default())
}

/// Start a transaction and make its context current until replaced or
/// cleared
pub fn start_transaction_with(config: &TracerConfig) -> Transaction {
    let transaction = Transaction::start(config);
    let context = ExecutionContext::new(transaction.clone());
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(context);
    });
    transaction
}

/// Start a transaction, run `f` inside its context, then restore
/// whatever context was current before.
///
/// Asynchronous continuations registered inside `f` keep the
/// transaction alive and correctly attributed through [`bind`]; only
/// the synchronous scope ends when `f` returns.
pub fn in_transaction<R>(config: &TracerConfig, f: impl FnOnce(&Transaction) -> R) -> R {
    let transaction = Transaction::start(config);
    let context = ExecutionContext::new(transaction.clone());
    let _scope = ContextScope::enter(context);
    f(&transaction)
}

/// The context bound to the presently executing continuation, if any.
///
/// Returns `None` outside any monitored flow; callers treat that as
/// "proceed untraced", never as an error.
pub fn current_context() -> Option<ExecutionContext> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Run `f` with `context` current, restoring the previous context after
pub fn run_in_context<R>(context: &ExecutionContext, f: impl FnOnce() -> R) -> R {
    let _scope = ContextScope::enter(context.clone());
    f()
}

/// Rebind the current context's segment cursor in place.
///
/// Returns false (and does nothing) when no context is active.
pub fn set_current_segment(id: SegmentId) -> bool {
    CURRENT.with(|current| match &mut *current.borrow_mut() {
        Some(context) => {
            context.current = id;
            true
        }
        None => false,
    })
}

/// Drop the current context, leaving the continuation unmonitored
pub fn clear_current() {
    CURRENT.with(|current| {
        *current.borrow_mut() = None;
    });
}

/// Wrap a callback so that invoking it reinstalls the context that was
/// current at wrap time, restoring the invoker's context afterwards.
///
/// A callback bound outside any transaction runs with no context even
/// if one happens to be active when it fires: the snapshot is restored
/// exactly, absent included.
pub fn bind(f: impl FnOnce() + 'static) -> impl FnOnce() + 'static {
    let snapshot = current_context();
    move || {
        let _scope = ContextScope::swap_in(snapshot);
        f()
    }
}

/// RAII guard installing a context for the span of a scope
///
/// Dropping the guard restores the context that was current when the
/// guard was created.
#[derive(Debug)]
pub struct ContextScope {
    previous: Option<ExecutionContext>,
}

impl ContextScope {
    /// Install `context`, remembering the previous one
    pub fn enter(context: ExecutionContext) -> Self {
        Self::swap_in(Some(context))
    }

    /// Install a copy of the current context with its cursor moved to
    /// `id`. Returns `None` when no context is active.
    pub fn enter_segment(id: SegmentId) -> Option<Self> {
        let context = current_context()?;
        Some(Self::enter(context.with_current(id)))
    }

    fn swap_in(next: Option<ExecutionContext>) -> Self {
        let previous = CURRENT.with(|current| {
            std::mem::replace(&mut *current.borrow_mut(), next)
        });
        ContextScope { previous }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}
