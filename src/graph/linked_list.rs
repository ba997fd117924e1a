//! Singly-linked adjacency-chain strategy.
//!
//! Each node slot carries the head of its outgoing chain as a file
//! offset into the edge file. Adding a relationship is a stack push:
//! the new record's `next` takes the old head, then the node slot is
//! rewritten to point at the new record, so traversal yields edges in
//! reverse insertion order (LIFO). Traversal is lazy, O(degree), one
//! record read per hop.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::graph::{
    Edge, GraphStore, NodeId, StoreStats, DEFAULT_EDGES_FILE, DEFAULT_NODES_FILE, UNLABELED,
};
use crate::sampling::reservoir_sample;
use crate::storage::node_store::{NodeStore, SlotRecord};
use crate::storage::record::{check_len, FixedRecord, NO_POINTER};
use crate::storage::record_file::RecordFile;

/// Node slot record: in-use flag, the node's own id, and the offset of
/// the newest outgoing relationship (or [`NO_POINTER`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedNodeRecord {
    /// Whether this slot holds an allocated node
    pub in_use: bool,
    /// The node id, redundant with the slot index
    pub node_id: u64,
    /// Offset of the chain head in the edge file, or [`NO_POINTER`]
    pub head: i64,
}

impl LinkedNodeRecord {
    /// Fresh record for a newly allocated node with an empty chain.
    pub fn fresh(node_id: NodeId) -> Self {
        Self {
            in_use: true,
            node_id,
            head: NO_POINTER,
        }
    }
}

impl FixedRecord for LinkedNodeRecord {
    const SIZE: usize = 17;

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.push(u8::from(self.in_use));
        bytes.extend_from_slice(&self.node_id.to_le_bytes());
        bytes.extend_from_slice(&self.head.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(Self::SIZE, bytes.len())?;
        Ok(Self {
            in_use: bytes[0] != 0,
            node_id: u64::from_le_bytes(bytes[1..9].try_into().unwrap()),
            head: i64::from_le_bytes(bytes[9..17].try_into().unwrap()),
        })
    }
}

impl SlotRecord for LinkedNodeRecord {
    fn in_use(&self) -> bool {
        self.in_use
    }
}

/// Edge record: the target node and the offset of the next record in
/// the source's outgoing chain (or [`NO_POINTER`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedEdgeRecord {
    /// Target node id
    pub target: u64,
    /// Offset of the next chain record, or [`NO_POINTER`]
    pub next: i64,
}

impl FixedRecord for LinkedEdgeRecord {
    const SIZE: usize = 16;

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.target.to_le_bytes());
        bytes.extend_from_slice(&self.next.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(Self::SIZE, bytes.len())?;
        Ok(Self {
            target: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            next: i64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        })
    }
}

/// Singly-linked chain relationship store.
pub struct LinkedListStore {
    nodes: NodeStore<LinkedNodeRecord>,
    edges: Arc<RwLock<RecordFile>>,
    rng: Mutex<StdRng>,
}

impl LinkedListStore {
    /// Open a store in `dir` with the default file names.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_files(dir, DEFAULT_NODES_FILE, DEFAULT_EDGES_FILE)
    }

    /// Open a store in `dir` with caller-chosen file names.
    pub fn open_with_files<P: AsRef<Path>>(
        dir: P,
        nodes_file: &str,
        edges_file: &str,
    ) -> Result<Self> {
        Self::build(dir, nodes_file, edges_file, StdRng::from_entropy())
    }

    /// Open a store with an injected random-number generator.
    pub fn open_with_rng<P: AsRef<Path>>(dir: P, rng: StdRng) -> Result<Self> {
        Self::build(dir, DEFAULT_NODES_FILE, DEFAULT_EDGES_FILE, rng)
    }

    fn build<P: AsRef<Path>>(
        dir: P,
        nodes_file: &str,
        edges_file: &str,
        rng: StdRng,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let nodes = NodeStore::open(dir.join(nodes_file))?;
        let edges = Arc::new(RwLock::new(RecordFile::open(dir.join(edges_file))?));
        debug!(dir = %dir.display(), "opened linked-list store");
        Ok(Self {
            nodes,
            edges,
            rng: Mutex::new(rng),
        })
    }
}

impl GraphStore for LinkedListStore {
    fn add_node(&self, id: NodeId) -> Result<()> {
        self.nodes.add(id, LinkedNodeRecord::fresh(id))?;
        Ok(())
    }

    fn add_relationship(&self, _label: &str, source: NodeId, target: NodeId) -> Result<()> {
        let mut source_record = self
            .nodes
            .get(source)?
            .ok_or(Error::NodeNotFound(source))?;
        if !self.nodes.exists(target)? {
            return Err(Error::NodeNotFound(target));
        }

        // Stack push: the new record takes the old head as its next,
        // then becomes the new head.
        let record = LinkedEdgeRecord {
            target,
            next: source_record.head,
        };
        let offset = {
            let mut edges = self.edges.write();
            let offset = edges.seek_to_end()?;
            edges.write_record(&record)?;
            offset
        };
        source_record.head = offset as i64;
        self.nodes.put(source, &source_record)?;
        self.edges.write().increment_record_count()?;
        trace!(source, target, offset, "pushed chain head");
        Ok(())
    }

    fn nodes(&self) -> Result<Box<dyn Iterator<Item = Result<NodeId>>>> {
        Ok(Box::new(self.nodes.iter()))
    }

    fn relationships(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = Result<Edge>>>> {
        let record = self.nodes.get(node)?.ok_or(Error::NodeNotFound(node))?;
        Ok(Box::new(ChainIter {
            node,
            file: Arc::clone(&self.edges),
            next_pos: record.head,
        }))
    }

    fn random_node(&self) -> Result<Option<NodeId>> {
        self.nodes.random(&mut *self.rng.lock())
    }

    fn random_relationship(&self, node: NodeId) -> Result<Option<Edge>> {
        let iter = self.relationships(node)?;
        reservoir_sample(iter, &mut *self.rng.lock())
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut edges = self.edges.write();
        Ok(StoreStats {
            node_count: self.nodes.count()?,
            relationship_count: edges.record_count()?,
            nodes_file_size: self.nodes.handle().write().len()?,
            edges_file_size: edges.len()?,
        })
    }

    fn flush(&self) -> Result<()> {
        self.nodes.handle().write().sync()?;
        self.edges.write().sync()
    }

    fn clear(&self) -> Result<()> {
        self.nodes.clear()?;
        self.edges.write().clear()
    }

    fn close(&mut self) -> Result<()> {
        debug!("closing linked-list store");
        self.flush()
    }
}

/// Lazy walk of one node's outgoing chain, one record read per hop.
struct ChainIter {
    node: NodeId,
    file: Arc<RwLock<RecordFile>>,
    next_pos: i64,
}

impl ChainIter {
    fn advance(&mut self) -> Result<Edge> {
        let mut file = self.file.write();
        file.seek(self.next_pos as u64)?;
        let record: LinkedEdgeRecord = file.read_record()?;
        self.next_pos = record.next;
        Ok(Edge::new(self.node, record.target, UNLABELED))
    }
}

impl Iterator for ChainIter {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_pos == NO_POINTER {
            return None;
        }
        match self.advance() {
            Ok(edge) => Some(Ok(edge)),
            Err(e) => {
                self.next_pos = NO_POINTER;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (LinkedListStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store =
            LinkedListStore::open_with_rng(dir.path(), StdRng::seed_from_u64(7)).unwrap();
        (store, dir)
    }

    fn targets(store: &LinkedListStore, node: NodeId) -> Vec<NodeId> {
        store
            .relationships(node)
            .unwrap()
            .map(|r| r.unwrap().target)
            .collect()
    }

    #[test]
    fn node_record_round_trip() {
        for record in [
            LinkedNodeRecord::fresh(42),
            LinkedNodeRecord {
                in_use: false,
                node_id: 0,
                head: NO_POINTER,
            },
            LinkedNodeRecord {
                in_use: true,
                node_id: u64::MAX,
                head: i64::MAX,
            },
        ] {
            let decoded = LinkedNodeRecord::decode(&record.encode()).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn edge_record_round_trip() {
        for record in [
            LinkedEdgeRecord {
                target: 0,
                next: NO_POINTER,
            },
            LinkedEdgeRecord {
                target: u64::MAX,
                next: 0,
            },
        ] {
            let decoded = LinkedEdgeRecord::decode(&record.encode()).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = LinkedEdgeRecord::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::RecordSizeMismatch { .. }));
    }

    #[test]
    fn chain_order_is_lifo() {
        let (store, _dir) = open_store();
        for id in 0..4 {
            store.add_node(id).unwrap();
        }
        store.add_relationship("l", 0, 1).unwrap();
        store.add_relationship("l", 0, 2).unwrap();
        store.add_relationship("l", 0, 3).unwrap();
        assert_eq!(targets(&store, 0), vec![3, 2, 1]);
    }

    #[test]
    fn example_scenario() {
        let (store, _dir) = open_store();
        for id in 0..4 {
            store.add_node(id).unwrap();
        }
        store.add_relationship("l", 0, 1).unwrap();
        store.add_relationship("l", 0, 2).unwrap();
        store.add_relationship("l", 1, 2).unwrap();
        store.add_relationship("l", 2, 3).unwrap();

        assert_eq!(targets(&store, 0), vec![2, 1]);
        assert_eq!(targets(&store, 2), vec![3]);
        assert_eq!(targets(&store, 3), Vec::<NodeId>::new());
    }

    #[test]
    fn traversing_missing_node_is_an_error() {
        let (store, _dir) = open_store();
        assert!(matches!(
            store.relationships(9).err().unwrap(),
            Error::NodeNotFound(9)
        ));
    }

    #[test]
    fn missing_endpoint_leaves_count_unchanged() {
        let (store, _dir) = open_store();
        store.add_node(1).unwrap();
        let err = store.add_relationship("l", 1, 2).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(2)));
        assert_eq!(store.stats().unwrap().relationship_count, 0);
        assert!(targets(&store, 1).is_empty());
    }

    #[test]
    fn self_loop_is_traversable() {
        let (store, _dir) = open_store();
        store.add_node(0).unwrap();
        store.add_relationship("l", 0, 0).unwrap();
        assert_eq!(targets(&store, 0), vec![0]);
    }

    #[test]
    fn reopen_preserves_chains() {
        let dir = TempDir::new().unwrap();
        {
            let store =
                LinkedListStore::open_with_rng(dir.path(), StdRng::seed_from_u64(1)).unwrap();
            store.add_node(0).unwrap();
            store.add_node(1).unwrap();
            store.add_relationship("l", 0, 1).unwrap();
        }
        let store = LinkedListStore::open_with_rng(dir.path(), StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(targets(&store, 0), vec![1]);
        assert_eq!(store.stats().unwrap().node_count, 2);
    }
}
