//! Segment tree: one node per traced operation
//!
//! The tree is arena-backed: a transaction owns a flat `Vec<SegmentNode>`
//! and nodes reference each other by index. Child lists are append-only
//! and creation-ordered, so sibling order always reflects causal order
//! regardless of which operation completes first.
//!
//! `SegmentHandle` is the piece a callback keeps: it holds only a weak
//! reference to the tree, so a handle retained by a late-firing event
//! cannot keep a finished transaction alive, and ending a segment after
//! its transaction is gone is a silent no-op.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::TracerConfig;
use crate::error::TraceError;
use crate::timer::Timer;

/// Index of a segment within its transaction's tree
pub type SegmentId = usize;

/// Name of the root segment created when a transaction starts
pub const ROOT_SEGMENT_NAME: &str = "ROOT";

/// A single traced operation: name, clock, and tree links
#[derive(Debug)]
pub struct SegmentNode {
    name: String,
    timer: Timer,
    parent: Option<SegmentId>,
    children: Vec<SegmentId>,
}

impl SegmentNode {
    fn new(name: String, parent: Option<SegmentId>) -> Self {
        SegmentNode {
            name,
            timer: Timer::started(),
            parent,
            children: Vec::new(),
        }
    }

    /// Segment name, fixed at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The segment's clock
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Back-reference to the parent segment (`None` for the root)
    pub fn parent(&self) -> Option<SegmentId> {
        self.parent
    }

    /// Child segments in creation order
    pub fn children(&self) -> &[SegmentId] {
        &self.children
    }
}

/// Arena holding every segment of one transaction
#[derive(Debug)]
pub struct SegmentTree {
    segments: Vec<SegmentNode>,
    max_segments: usize,
    truncated: bool,
}

impl SegmentTree {
    /// Create a tree containing only the root segment, timer running
    pub fn new(config: &TracerConfig) -> Self {
        SegmentTree {
            segments: vec![SegmentNode::new(ROOT_SEGMENT_NAME.to_string(), None)],
            max_segments: config.max_segments,
            truncated: false,
        }
    }

    /// Id of the root segment
    pub fn root(&self) -> SegmentId {
        0
    }

    /// Create a child segment under `parent` with its timer started.
    ///
    /// Appends the new id to the parent's child list, preserving causal
    /// creation order. Refused once the segment cap is reached; the tree
    /// is then marked truncated.
    pub fn create_child(
        &mut self,
        parent: SegmentId,
        name: impl Into<String>,
    ) -> Result<SegmentId, TraceError> {
        if parent >= self.segments.len() {
            return Err(TraceError::Instrumentation(anyhow::anyhow!(
                "parent segment {} does not exist",
                parent
            )));
        }
        if self.segments.len() >= self.max_segments {
            self.truncated = true;
            return Err(TraceError::SegmentLimit(self.max_segments));
        }

        let id = self.segments.len();
        self.segments.push(SegmentNode::new(name.into(), Some(parent)));
        self.segments[parent].children.push(id);
        Ok(id)
    }

    /// Stop a segment's timer. Idempotent; unknown ids are ignored.
    pub fn end_segment(&mut self, id: SegmentId) {
        if let Some(node) = self.segments.get_mut(id) {
            node.timer.end();
        }
    }

    /// Look up a segment by id
    pub fn get(&self, id: SegmentId) -> Option<&SegmentNode> {
        self.segments.get(id)
    }

    /// Number of segments in the tree (root included)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the tree holds no segments (a live transaction always
    /// has at least its root)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether segment creation was ever refused by the cap
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Whether every segment in the tree has ended
    pub fn is_complete(&self) -> bool {
        self.segments.iter().all(|node| node.timer.has_ended())
    }

    /// Force-end every still-running segment, returning their names.
    ///
    /// A non-empty result means the instrumentation failed to pair a
    /// termination handler somewhere; callers surface it to diagnostics.
    pub fn end_all_running(&mut self) -> Vec<String> {
        let mut forced = Vec::new();
        for node in &mut self.segments {
            if node.timer.has_start() && !node.timer.has_ended() {
                node.timer.end();
                forced.push(node.name.clone());
            }
        }
        forced
    }
}

/// Weak handle to one segment, safe to hold across any number of
/// asynchronous hops
#[derive(Debug, Clone)]
pub struct SegmentHandle {
    tree: Weak<RefCell<SegmentTree>>,
    id: SegmentId,
}

impl SegmentHandle {
    pub(crate) fn new(tree: &Rc<RefCell<SegmentTree>>, id: SegmentId) -> Self {
        SegmentHandle {
            tree: Rc::downgrade(tree),
            id,
        }
    }

    /// Id of the segment this handle points at
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Stop the segment's timer. Idempotent, and a no-op once the owning
    /// transaction has been dropped.
    pub fn end(&self) {
        if let Some(tree) = self.tree.upgrade() {
            tree.borrow_mut().end_segment(self.id);
        }
    }

    /// Whether the segment has ended. Reports true once the owning
    /// transaction is gone: nothing is left running.
    pub fn has_ended(&self) -> bool {
        match self.tree.upgrade() {
            Some(tree) => tree
                .borrow()
                .get(self.id)
                .map(|node| node.timer().has_ended())
                .unwrap_or(true),
            None => true,
        }
    }

    /// Segment name, if the owning transaction is still alive
    pub fn name(&self) -> Option<String> {
        let tree = self.tree.upgrade()?;
        let name = tree.borrow().get(self.id)?.name().to_string();
        Some(name)
    }
}
