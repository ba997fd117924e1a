//! Graph store contract and the interchangeable relationship-store
//! strategies.
//!
//! Three strategies share one external contract ([`GraphStore`]), one
//! node-file abstraction and one record-file abstraction:
//!
//! - [`edge_list::EdgeListStore`]: flat append log, the baseline.
//! - [`linked_list::LinkedListStore`]: singly-linked adjacency chains.
//! - [`native::NativeStore`]: doubly-linked bidirectional chains,
//!   Neo4j-style.
//!
//! A store instance owns two files in a caller-supplied directory
//! (default names [`DEFAULT_NODES_FILE`] / [`DEFAULT_EDGES_FILE`]).
//! Writes go through both; reads, iteration and sampling are served by
//! the strategy's lazy iterators over the shared record files.

pub mod edge_list;
pub mod linked_list;
pub mod native;

use crate::error::Result;

/// Externally supplied node identifier. Identifiers are assumed to be
/// dense-ish small non-negative integers: slot-addressed strategies
/// use the id as a slot index, so sparse or large ids waste disk
/// proportionally to the largest id seen.
pub type NodeId = u64;

/// Default node file name inside the store directory.
pub const DEFAULT_NODES_FILE: &str = "nodes.dat";

/// Default edge file name inside the store directory.
pub const DEFAULT_EDGES_FILE: &str = "edges.dat";

/// Label reported for relationships read from strategies whose record
/// format does not store one (the chain strategies).
pub(crate) const UNLABELED: &str = "default";

/// A directed, labeled relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Relationship label
    pub label: String,
}

impl Edge {
    /// Create an edge.
    pub fn new(source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        Self {
            source,
            target,
            label: label.into(),
        }
    }
}

/// Store statistics: header counts plus file sizes.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of successful `add_node` calls
    pub node_count: u32,
    /// Number of successful `add_relationship` calls
    pub relationship_count: u32,
    /// Size of the node file in bytes
    pub nodes_file_size: u64,
    /// Size of the edge file in bytes
    pub edges_file_size: u64,
}

/// The storage interface consumed by importers, exporters and the
/// community-detection algorithm.
///
/// Single-threaded, synchronous, blocking I/O throughout: every record
/// read or write is a blocking file operation paid for by the caller.
/// The stores internally serialize file access behind one coarse lock
/// per file so that lazy iterators can share the handle; the on-disk
/// contract assumes exactly one writer and no concurrent readers
/// during mutation.
pub trait GraphStore {
    /// Add a node. A no-op when the node already exists.
    fn add_node(&self, id: NodeId) -> Result<()>;

    /// Add a directed relationship. Fails with
    /// [`crate::Error::NodeNotFound`] when either endpoint is absent;
    /// endpoints are never auto-created, and a failed call leaves the
    /// edge-file record count unchanged. Duplicates are not detected.
    fn add_relationship(&self, label: &str, source: NodeId, target: NodeId) -> Result<()>;

    /// Lazy, finite, restartable sequence of node ids.
    fn nodes(&self) -> Result<Box<dyn Iterator<Item = Result<NodeId>>>>;

    /// Lazy sequence of the relationships where `node` is the source.
    fn relationships(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = Result<Edge>>>>;

    /// Uniformly random node, `Ok(None)` on an empty store.
    fn random_node(&self) -> Result<Option<NodeId>>;

    /// Reservoir-sampled relationship of `node`, `Ok(None)` when the
    /// node has none.
    fn random_relationship(&self, node: NodeId) -> Result<Option<Edge>>;

    /// Header counts and file sizes.
    fn stats(&self) -> Result<StoreStats>;

    /// Flush both files to disk.
    fn flush(&self) -> Result<()>;

    /// Destructively reset both files to their empty, zero-count
    /// state. Not atomic with respect to outstanding iterators;
    /// callers must serialize around it.
    fn clear(&self) -> Result<()>;

    /// Final flush before the store is dropped. File handles are
    /// scoped resources released on drop on every exit path.
    fn close(&mut self) -> Result<()>;
}
