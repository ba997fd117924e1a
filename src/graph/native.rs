//! Doubly-linked chain strategy - the "native store", Neo4j-style.
//!
//! Each node slot carries two independent chain heads: `outgoing`
//! (relationships where the node is source) and `incoming` (where it
//! is target). Every relationship record sits on both its source's
//! outgoing chain and its target's incoming chain simultaneously, with
//! next/prev offsets for each dimension, so a future reverse traversal
//! can be added without rescanning the file. Prepends are stack
//! pushes applied independently per dimension: traversal order is the
//! reverse of insertion order.
//!
//! All pointers are plain file offsets. Every traversal hop asserts
//! that the record's stored source matches the traversed node; a
//! mismatch means file corruption and fails loudly rather than being
//! silently skipped.

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

/// Node slot record: in-use flag plus the heads of the outgoing and
/// incoming chains (each a file offset or [`NO_POINTER`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeNodeRecord {
    /// Whether this slot holds an allocated node
    pub in_use: bool,
    /// Head of the outgoing chain, or [`NO_POINTER`]
    pub outgoing: i64,
    /// Head of the incoming chain, or [`NO_POINTER`]
    pub incoming: i64,
}

impl NativeNodeRecord {
    /// Fresh record for a newly allocated node with empty chains.
    pub fn fresh() -> Self {
        Self {
            in_use: true,
            outgoing: NO_POINTER,
            incoming: NO_POINTER,
        }
    }
}

impl FixedRecord for NativeNodeRecord {
    const SIZE: usize = 17;

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.push(u8::from(self.in_use));
        bytes.extend_from_slice(&self.outgoing.to_le_bytes());
        bytes.extend_from_slice(&self.incoming.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(Self::SIZE, bytes.len())?;
        Ok(Self {
            in_use: bytes[0] != 0,
            outgoing: i64::from_le_bytes(bytes[1..9].try_into().unwrap()),
            incoming: i64::from_le_bytes(bytes[9..17].try_into().unwrap()),
        })
    }
}

impl SlotRecord for NativeNodeRecord {
    fn in_use(&self) -> bool {
        self.in_use
    }
}

/// Relationship record with four chain pointers.
///
/// `chain_flag` is computed once at insertion (`true` iff both chains
/// were empty) and never read back; it is preserved for format
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeEdgeRecord {
    /// Source node id
    pub source: u64,
    /// Target node id
    pub target: u64,
    /// Next record in the source's outgoing chain, or [`NO_POINTER`]
    pub outgoing_next: i64,
    /// Previous record in the source's outgoing chain, or [`NO_POINTER`]
    pub outgoing_prev: i64,
    /// Next record in the target's incoming chain, or [`NO_POINTER`]
    pub incoming_next: i64,
    /// Previous record in the target's incoming chain, or [`NO_POINTER`]
    pub incoming_prev: i64,
    /// Set when this record started both of its chains
    pub chain_flag: bool,
}

impl FixedRecord for NativeEdgeRecord {
    const SIZE: usize = 49;

    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.source.to_le_bytes());
        bytes.extend_from_slice(&self.target.to_le_bytes());
        bytes.extend_from_slice(&self.outgoing_next.to_le_bytes());
        bytes.extend_from_slice(&self.outgoing_prev.to_le_bytes());
        bytes.extend_from_slice(&self.incoming_next.to_le_bytes());
        bytes.extend_from_slice(&self.incoming_prev.to_le_bytes());
        bytes.push(u8::from(self.chain_flag));
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        check_len(Self::SIZE, bytes.len())?;
        Ok(Self {
            source: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            target: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            outgoing_next: i64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            outgoing_prev: i64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            incoming_next: i64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            incoming_prev: i64::from_le_bytes(bytes[40..48].try_into().unwrap()),
            chain_flag: bytes[48] != 0,
        })
    }
}

/// Doubly-linked chain relationship store.
pub struct NativeStore {
    nodes: NodeStore<NativeNodeRecord>,
    edges: Arc<RwLock<RecordFile>>,
    rng: Mutex<StdRng>,
}

impl NativeStore {
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
        debug!(dir = %dir.display(), "opened native store");
        Ok(Self {
            nodes,
            edges,
            rng: Mutex::new(rng),
        })
    }

    fn read_edge(&self, offset: i64) -> Result<NativeEdgeRecord> {
        let mut edges = self.edges.write();
        edges.seek(offset as u64)?;
        edges.read_record()
    }

    fn write_edge(&self, offset: i64, record: &NativeEdgeRecord) -> Result<()> {
        let mut edges = self.edges.write();
        edges.seek(offset as u64)?;
        edges.write_record(record)
    }
}

impl GraphStore for NativeStore {
    fn add_node(&self, id: NodeId) -> Result<()> {
        self.nodes.add(id, NativeNodeRecord::fresh())?;
        Ok(())
    }

    fn add_relationship(&self, _label: &str, source: NodeId, target: NodeId) -> Result<()> {
        let source_head = self
            .nodes
            .get(source)?
            .ok_or(Error::NodeNotFound(source))?
            .outgoing;
        let target_head = self
            .nodes
            .get(target)?
            .ok_or(Error::NodeNotFound(target))?
            .incoming;

        let record = NativeEdgeRecord {
            source,
            target,
            outgoing_next: source_head,
            outgoing_prev: NO_POINTER,
            incoming_next: target_head,
            incoming_prev: NO_POINTER,
            chain_flag: source_head == NO_POINTER && target_head == NO_POINTER,
        };
        let offset = {
            let mut edges = self.edges.write();
            let offset = edges.seek_to_end()?;
            edges.write_record(&record)?;
            offset as i64
        };

        // Prepend to the source's outgoing chain. Node slots are
        // re-read at each fixup so a self-loop's second rewrite sees
        // the first one.
        let mut source_record = self.nodes.get(source)?.ok_or(Error::NodeNotFound(source))?;
        source_record.outgoing = offset;
        self.nodes.put(source, &source_record)?;

        // Complete the doubly-linked prepend on the target's incoming
        // chain: either the new record is the sole member, or the old
        // head's back-pointer is linked to it.
        if target_head == NO_POINTER {
            let mut target_record =
                self.nodes.get(target)?.ok_or(Error::NodeNotFound(target))?;
            target_record.incoming = offset;
            self.nodes.put(target, &target_record)?;
        } else {
            let mut old_head = self.read_edge(target_head)?;
            old_head.incoming_prev = offset;
            self.write_edge(target_head, &old_head)?;
        }

        self.edges.write().increment_record_count()?;
        trace!(source, target, offset, "linked relationship record");
        Ok(())
    }

    fn nodes(&self) -> Result<Box<dyn Iterator<Item = Result<NodeId>>>> {
        Ok(Box::new(self.nodes.iter()))
    }

    fn relationships(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = Result<Edge>>>> {
        let record = self.nodes.get(node)?.ok_or(Error::NodeNotFound(node))?;
        Ok(Box::new(OutgoingChainIter {
            node,
            file: Arc::clone(&self.edges),
            next_pos: record.outgoing,
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
        debug!("closing native store");
        self.flush()
    }
}

/// Lazy walk of one node's outgoing chain with a same-node invariant
/// check at every hop.
struct OutgoingChainIter {
    node: NodeId,
    file: Arc<RwLock<RecordFile>>,
    next_pos: i64,
}

impl OutgoingChainIter {
    fn advance(&mut self) -> Result<Edge> {
        let pos = self.next_pos;
        let mut file = self.file.write();
        file.seek(pos as u64)?;
        let record: NativeEdgeRecord = file.read_record()?;
        if record.source != self.node {
            return Err(Error::corruption(format!(
                "outgoing chain of node {} reached record at offset {pos} owned by node {}",
                self.node, record.source
            )));
        }
        self.next_pos = record.outgoing_next;
        Ok(Edge::new(record.source, record.target, UNLABELED))
    }
}

impl Iterator for OutgoingChainIter {
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

    fn open_store() -> (NativeStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = NativeStore::open_with_rng(dir.path(), StdRng::seed_from_u64(3)).unwrap();
        (store, dir)
    }

    fn targets(store: &NativeStore, node: NodeId) -> Vec<NodeId> {
        store
            .relationships(node)
            .unwrap()
            .map(|r| r.unwrap().target)
            .collect()
    }

    /// Walk a node's incoming chain directly off the record file.
    fn incoming_records(store: &NativeStore, node: NodeId) -> Vec<(i64, NativeEdgeRecord)> {
        let mut records = Vec::new();
        let mut pos = store.nodes.get(node).unwrap().unwrap().incoming;
        while pos != NO_POINTER {
            let record = store.read_edge(pos).unwrap();
            assert_eq!(record.target, node, "incoming chain owner mismatch");
            records.push((pos, record));
            pos = record.incoming_next;
        }
        records
    }

    #[test]
    fn node_record_round_trip() {
        for record in [
            NativeNodeRecord::fresh(),
            NativeNodeRecord {
                in_use: false,
                outgoing: NO_POINTER,
                incoming: NO_POINTER,
            },
            NativeNodeRecord {
                in_use: true,
                outgoing: i64::MAX,
                incoming: 4,
            },
        ] {
            assert_eq!(NativeNodeRecord::decode(&record.encode()).unwrap(), record);
        }
    }

    #[test]
    fn edge_record_round_trip() {
        let all_sentinel = NativeEdgeRecord {
            source: 0,
            target: 0,
            outgoing_next: NO_POINTER,
            outgoing_prev: NO_POINTER,
            incoming_next: NO_POINTER,
            incoming_prev: NO_POINTER,
            chain_flag: true,
        };
        let mixed = NativeEdgeRecord {
            source: u64::MAX,
            target: 7,
            outgoing_next: 53,
            outgoing_prev: 102,
            incoming_next: NO_POINTER,
            incoming_prev: 4,
            chain_flag: false,
        };
        for record in [all_sentinel, mixed] {
            assert_eq!(NativeEdgeRecord::decode(&record.encode()).unwrap(), record);
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = NativeEdgeRecord::decode(&[0u8; 48]).unwrap_err();
        assert!(matches!(
            err,
            Error::RecordSizeMismatch {
                expected: 49,
                actual: 48
            }
        ));
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
    fn incoming_chain_links_back_pointers() {
        let (store, _dir) = open_store();
        for id in [0, 1, 2, 9] {
            store.add_node(id).unwrap();
        }
        // (A,B), (A,C), (X,B) with A=0, B=1, C=2, X=9.
        store.add_relationship("l", 0, 1).unwrap();
        store.add_relationship("l", 0, 2).unwrap();
        store.add_relationship("l", 9, 1).unwrap();

        let chain = incoming_records(&store, 1);
        let sources: Vec<NodeId> = chain.iter().map(|(_, r)| r.source).collect();
        assert_eq!(sources, vec![9, 0]);

        // The record for (A,B) points back at the record for (X,B).
        let (xb_offset, xb) = chain[0];
        let (_, ab) = chain[1];
        assert_eq!(ab.incoming_prev, xb_offset);
        assert_eq!(xb.incoming_prev, NO_POINTER);
    }

    #[test]
    fn chain_flag_set_only_when_both_chains_empty() {
        let (store, _dir) = open_store();
        for id in 0..3 {
            store.add_node(id).unwrap();
        }
        store.add_relationship("l", 0, 1).unwrap();
        store.add_relationship("l", 0, 2).unwrap();

        let first = store
            .read_edge(store.nodes.get(1).unwrap().unwrap().incoming)
            .unwrap();
        assert!(first.chain_flag);
        let second = store
            .read_edge(store.nodes.get(0).unwrap().unwrap().outgoing)
            .unwrap();
        assert!(!second.chain_flag);
    }

    #[test]
    fn self_loop_joins_both_chains() {
        let (store, _dir) = open_store();
        store.add_node(0).unwrap();
        store.add_relationship("l", 0, 0).unwrap();

        let node = store.nodes.get(0).unwrap().unwrap();
        assert_eq!(node.outgoing, node.incoming);
        assert_eq!(targets(&store, 0), vec![0]);
        let incoming: Vec<NodeId> = incoming_records(&store, 0)
            .iter()
            .map(|(_, r)| r.source)
            .collect();
        assert_eq!(incoming, vec![0]);
    }

    #[test]
    fn repeated_self_loops_keep_both_chains() {
        let (store, _dir) = open_store();
        store.add_node(0).unwrap();
        store.add_relationship("l", 0, 0).unwrap();
        store.add_relationship("l", 0, 0).unwrap();
        assert_eq!(targets(&store, 0), vec![0, 0]);
        assert_eq!(incoming_records(&store, 0).len(), 2);
    }

    #[test]
    fn corrupted_chain_fails_loudly() {
        let (store, _dir) = open_store();
        store.add_node(0).unwrap();
        store.add_node(1).unwrap();
        store.add_relationship("l", 0, 1).unwrap();

        // Overwrite the record's source field in place.
        let offset = store.nodes.get(0).unwrap().unwrap().outgoing;
        let mut record = store.read_edge(offset).unwrap();
        record.source = 999;
        store.write_edge(offset, &record).unwrap();

        let err = store
            .relationships(0)
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn missing_endpoint_leaves_count_unchanged() {
        let (store, _dir) = open_store();
        store.add_node(1).unwrap();
        let err = store.add_relationship("l", 1, 2).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(2)));
        assert_eq!(store.stats().unwrap().relationship_count, 0);
    }

    #[test]
    fn reopen_preserves_both_chains() {
        let dir = TempDir::new().unwrap();
        {
            let store =
                NativeStore::open_with_rng(dir.path(), StdRng::seed_from_u64(1)).unwrap();
            for id in 0..3 {
                store.add_node(id).unwrap();
            }
            store.add_relationship("l", 0, 2).unwrap();
            store.add_relationship("l", 1, 2).unwrap();
        }
        let store = NativeStore::open_with_rng(dir.path(), StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(targets(&store, 0), vec![2]);
        let sources: Vec<NodeId> = incoming_records(&store, 2)
            .iter()
            .map(|(_, r)| r.source)
            .collect();
        assert_eq!(sources, vec![1, 0]);
    }
}
