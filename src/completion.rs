//! Single-fire completion handles
//!
//! Every traced operation terminates through exactly one of two events:
//! success or failure. A `Completion` collapses however many underlying
//! signals exist (stream end, transport error, cancellation) into one
//! settle that fires observers exactly once; whichever terminal event
//! arrives second is a no-op.
//!
//! Observers are always invoked outside the internal borrow, so an
//! observer may subscribe to or settle other completions freely.

use std::cell::RefCell;
use std::fmt;

/// How an operation terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation completed normally
    Success,
    /// The operation aborted, errored, or was cancelled
    Failure,
}

impl Outcome {
    /// Whether this outcome is `Success`
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

enum State {
    Pending {
        observers: Vec<Box<dyn FnOnce(Outcome)>>,
    },
    Settled(Outcome),
}

/// A success-xor-failure handle that settles exactly once
pub struct Completion {
    state: RefCell<State>,
}

impl Completion {
    /// Create an unsettled completion
    pub fn new() -> Self {
        Completion {
            state: RefCell::new(State::Pending {
                observers: Vec::new(),
            }),
        }
    }

    /// Settle with the given outcome. The first settle wins; returns
    /// false if the completion was already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let observers = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Settled(_) => return false,
                State::Pending { observers } => {
                    let taken = std::mem::take(observers);
                    *state = State::Settled(outcome);
                    taken
                }
            }
        };
        for observer in observers {
            observer(outcome);
        }
        true
    }

    /// Settle successfully
    pub fn settle_ok(&self) -> bool {
        self.settle(Outcome::Success)
    }

    /// Settle as failed
    pub fn settle_err(&self) -> bool {
        self.settle(Outcome::Failure)
    }

    /// Register an observer for the settled outcome.
    ///
    /// Observers registered before settlement fire once, at settle time,
    /// in registration order. An observer registered after settlement
    /// fires immediately.
    pub fn subscribe(&self, f: impl FnOnce(Outcome) + 'static) {
        let outcome = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Pending { observers } => {
                    observers.push(Box::new(f));
                    return;
                }
                State::Settled(outcome) => *outcome,
            }
        };
        f(outcome);
    }

    /// Whether the completion has settled
    pub fn is_settled(&self) -> bool {
        matches!(&*self.state.borrow(), State::Settled(_))
    }

    /// The settled outcome, if any
    pub fn outcome(&self) -> Option<Outcome> {
        match &*self.state.borrow() {
            State::Settled(outcome) => Some(*outcome),
            State::Pending { .. } => None,
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Completion::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            State::Pending { observers } => f
                .debug_struct("Completion")
                .field("state", &"pending")
                .field("observers", &observers.len())
                .finish(),
            State::Settled(outcome) => f
                .debug_struct("Completion")
                .field("state", &"settled")
                .field("outcome", outcome)
                .finish(),
        }
    }
}
