//! Transaction: one logical monitored unit of work
//!
//! A transaction owns exactly one segment tree, rooted at a segment that
//! is created when the transaction starts and never replaced. Cloning a
//! `Transaction` clones the handle, not the tree: all clones observe and
//! mutate the same trace.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::TracerConfig;
use crate::error::TraceError;
use crate::segment::{SegmentHandle, SegmentId, SegmentTree};

/// Random 64-bit transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        TransactionId(rand::random())
    }

    /// Render as 16 lowercase hex characters
    pub fn as_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

/// One monitored unit of work owning a segment tree
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TransactionId,
    tree: Rc<RefCell<SegmentTree>>,
}

impl Transaction {
    /// Start a transaction: creates the root segment with its timer
    /// running.
    pub fn start(config: &TracerConfig) -> Self {
        Transaction {
            id: TransactionId::generate(),
            tree: Rc::new(RefCell::new(SegmentTree::new(config))),
        }
    }

    /// The transaction's identifier
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Handle to the root segment
    pub fn root(&self) -> SegmentHandle {
        let root = self.tree.borrow().root();
        SegmentHandle::new(&self.tree, root)
    }

    /// Id of the root segment
    pub fn root_id(&self) -> SegmentId {
        self.tree.borrow().root()
    }

    /// Create a segment under `parent` and return a handle to it
    pub fn create_segment(
        &self,
        parent: SegmentId,
        name: impl Into<String>,
    ) -> Result<SegmentHandle, TraceError> {
        let id = self.tree.borrow_mut().create_child(parent, name)?;
        Ok(SegmentHandle::new(&self.tree, id))
    }

    /// Handle to an existing segment
    pub fn segment(&self, id: SegmentId) -> SegmentHandle {
        SegmentHandle::new(&self.tree, id)
    }

    /// End the transaction's root segment. Descendants are not touched:
    /// each one is ended by its own paired termination handler.
    pub fn end(&self) {
        let root = self.tree.borrow().root();
        self.tree.borrow_mut().end_segment(root);
    }

    /// Whether every segment in the tree has ended, making the
    /// transaction eligible for reporting
    pub fn is_complete(&self) -> bool {
        self.tree.borrow().is_complete()
    }

    /// Number of segments recorded so far (root included)
    pub fn segment_count(&self) -> usize {
        self.tree.borrow().len()
    }

    /// Read access to the underlying tree
    pub fn with_tree<R>(&self, f: impl FnOnce(&SegmentTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    /// Mutable access to the underlying tree
    pub(crate) fn with_tree_mut<R>(&self, f: impl FnOnce(&mut SegmentTree) -> R) -> R {
        f(&mut self.tree.borrow_mut())
    }

    /// Whether two handles refer to the same underlying transaction
    pub fn same_as(&self, other: &Transaction) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}
