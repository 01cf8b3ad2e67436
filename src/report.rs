//! Transaction reports for the reporting sink
//!
//! A report is an immutable snapshot of a transaction's segment tree:
//! nested records preserving causal child order, with timings flattened
//! to microseconds. Snapshotting force-ends anything still running.
//! An unterminated segment at report time is an instrumentation defect,
//! so it is counted and logged rather than silently carried along.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::segment::{SegmentId, SegmentTree};
use crate::transaction::Transaction;

/// One segment in a report, children in creation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Segment name (for externals: `External/<host>[:<port>]/<path>`)
    pub name: String,
    /// Wall-clock start, microseconds since the Unix epoch
    pub start_micros: Option<u64>,
    /// Monotonic duration in microseconds
    pub duration_micros: Option<u64>,
    /// Child segments in causal creation order
    pub children: Vec<SegmentRecord>,
}

/// Snapshot of one ended transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReport {
    /// Transaction id as 16 hex characters
    pub transaction_id: String,
    /// The root segment with the full subtree beneath it
    pub root: SegmentRecord,
    /// Total number of segments in the tree
    pub segment_count: usize,
    /// Whether segment creation was ever refused by the cap
    pub truncated: bool,
    /// Segments that had to be force-ended at snapshot time
    pub unterminated_segments: usize,
}

impl TransactionReport {
    /// Snapshot a transaction.
    ///
    /// Ends the root if the caller has not already done so, force-ends
    /// any still-running descendants (surfacing them as diagnostics),
    /// and walks the tree into nested records.
    pub fn snapshot(transaction: &Transaction) -> Self {
        transaction.end();
        let forced = transaction.with_tree_mut(|tree| tree.end_all_running());
        for name in &forced {
            warn!(segment = %name, "segment never ended, forced at report time");
        }

        transaction.with_tree(|tree| TransactionReport {
            transaction_id: transaction.id().as_hex(),
            root: record_subtree(tree, tree.root()),
            segment_count: tree.len(),
            truncated: tree.truncated(),
            unterminated_segments: forced.len(),
        })
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to human-readable JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to compact MessagePack
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }
}

fn record_subtree(tree: &SegmentTree, id: SegmentId) -> SegmentRecord {
    match tree.get(id) {
        Some(node) => SegmentRecord {
            name: node.name().to_string(),
            start_micros: node.timer().start_epoch_micros(),
            duration_micros: node.timer().duration_micros(),
            children: node
                .children()
                .iter()
                .map(|&child| record_subtree(tree, child))
                .collect(),
        },
        // unreachable for ids taken from the tree itself
        None => SegmentRecord {
            name: String::new(),
            start_micros: None,
            duration_micros: None,
            children: Vec::new(),
        },
    }
}
