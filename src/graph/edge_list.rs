//! Flat append-log strategy - the baseline for comparison.
//!
//! The node file is a parallel array of `u64` ids appended in
//! insertion order; existence is a linear scan. The edge file holds
//! variable-size records `{source: u64, target: u64, label: u16-length
//! prefixed UTF-8}` appended in insertion order with no pointers and
//! no dedup. Reading the relationships of one node scans the entire
//! edge file filtering on the source field, O(total edges) regardless
//! of the node's degree: write simplicity traded for read cost.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::graph::{Edge, GraphStore, NodeId, StoreStats, DEFAULT_EDGES_FILE, DEFAULT_NODES_FILE};
use crate::sampling::reservoir_sample;
use crate::storage::record_file::{RecordFile, HEADER_SIZE};

/// Size in bytes of one node entry in the flat node file.
const NODE_ENTRY_SIZE: u64 = 8;

/// Flat append-log relationship store.
pub struct EdgeListStore {
    nodes: Arc<RwLock<RecordFile>>,
    edges: Arc<RwLock<RecordFile>>,
    rng: Mutex<StdRng>,
}

impl EdgeListStore {
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

    /// Open a store with an injected random-number generator, so tests
    /// can supply a seeded, deterministic one.
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
        let nodes = Arc::new(RwLock::new(RecordFile::open(dir.join(nodes_file))?));
        let edges = Arc::new(RwLock::new(RecordFile::open(dir.join(edges_file))?));
        debug!(dir = %dir.display(), "opened edge-list store");
        Ok(Self {
            nodes,
            edges,
            rng: Mutex::new(rng),
        })
    }

    fn node_exists(&self, id: NodeId) -> Result<bool> {
        let mut file = self.nodes.write();
        let len = file.len()?;
        file.seek(HEADER_SIZE)?;
        while file.position()? < len {
            if file.read_u64()? == id {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl GraphStore for EdgeListStore {
    fn add_node(&self, id: NodeId) -> Result<()> {
        if self.node_exists(id)? {
            return Ok(());
        }
        let mut file = self.nodes.write();
        file.seek_to_end()?;
        file.write_u64(id)?;
        file.increment_record_count()?;
        trace!(id, "appended node");
        Ok(())
    }

    fn add_relationship(&self, label: &str, source: NodeId, target: NodeId) -> Result<()> {
        if !self.node_exists(source)? {
            return Err(Error::NodeNotFound(source));
        }
        if !self.node_exists(target)? {
            return Err(Error::NodeNotFound(target));
        }
        let mut file = self.edges.write();
        file.seek_to_end()?;
        file.write_u64(source)?;
        file.write_u64(target)?;
        file.write_string(label)?;
        file.increment_record_count()?;
        trace!(source, target, label, "appended relationship");
        Ok(())
    }

    fn nodes(&self) -> Result<Box<dyn Iterator<Item = Result<NodeId>>>> {
        let remaining = self.nodes.write().record_count()?;
        Ok(Box::new(FlatNodeIter {
            file: Arc::clone(&self.nodes),
            pos: HEADER_SIZE,
            remaining,
        }))
    }

    fn relationships(&self, node: NodeId) -> Result<Box<dyn Iterator<Item = Result<Edge>>>> {
        let remaining = self.edges.write().record_count()?;
        Ok(Box::new(FlatRelationshipIter {
            node,
            file: Arc::clone(&self.edges),
            pos: HEADER_SIZE,
            remaining,
        }))
    }

    fn random_node(&self) -> Result<Option<NodeId>> {
        let mut file = self.nodes.write();
        let count = file.record_count()?;
        if count == 0 {
            return Ok(None);
        }
        // The id array is dense, so direct indexing is uniform.
        let index = self.rng.lock().gen_range(0..u64::from(count));
        file.seek(HEADER_SIZE + index * NODE_ENTRY_SIZE)?;
        Ok(Some(file.read_u64()?))
    }

    fn random_relationship(&self, node: NodeId) -> Result<Option<Edge>> {
        let iter = self.relationships(node)?;
        reservoir_sample(iter, &mut *self.rng.lock())
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut nodes = self.nodes.write();
        let mut edges = self.edges.write();
        Ok(StoreStats {
            node_count: nodes.record_count()?,
            relationship_count: edges.record_count()?,
            nodes_file_size: nodes.len()?,
            edges_file_size: edges.len()?,
        })
    }

    fn flush(&self) -> Result<()> {
        self.nodes.write().sync()?;
        self.edges.write().sync()
    }

    fn clear(&self) -> Result<()> {
        self.nodes.write().clear()?;
        self.edges.write().clear()
    }

    fn close(&mut self) -> Result<()> {
        debug!("closing edge-list store");
        self.flush()
    }
}

/// Sequential scan over the flat node-id array.
struct FlatNodeIter {
    file: Arc<RwLock<RecordFile>>,
    pos: u64,
    remaining: u32,
}

impl FlatNodeIter {
    fn advance(&mut self) -> Result<NodeId> {
        let mut file = self.file.write();
        file.seek(self.pos)?;
        let id = file.read_u64()?;
        self.pos = file.position()?;
        self.remaining -= 1;
        Ok(id)
    }
}

impl Iterator for FlatNodeIter {
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.advance() {
            Ok(id) => Some(Ok(id)),
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Full-file scan over the edge log, filtering by source node.
struct FlatRelationshipIter {
    node: NodeId,
    file: Arc<RwLock<RecordFile>>,
    pos: u64,
    remaining: u32,
}

impl FlatRelationshipIter {
    fn advance(&mut self) -> Result<Option<Edge>> {
        while self.remaining > 0 {
            let mut file = self.file.write();
            file.seek(self.pos)?;
            let source = file.read_u64()?;
            let target = file.read_u64()?;
            let label = file.read_string()?;
            self.pos = file.position()?;
            self.remaining -= 1;
            if source == self.node {
                return Ok(Some(Edge::new(source, target, label)));
            }
        }
        Ok(None)
    }
}

impl Iterator for FlatRelationshipIter {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(edge)) => Some(Ok(edge)),
            Ok(None) => None,
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}
