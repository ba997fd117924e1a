//! Slot-addressed node store.
//!
//! Maps an externally supplied node id to a fixed-offset slot in the
//! node file: `offset = HEADER_SIZE + id * R::SIZE`. The id *is* the
//! slot index, so sparse or large ids waste disk proportionally to the
//! largest id seen. That is a property of the format, not a bug.
//!
//! The header count tracks the number of successful `add` calls, not
//! the highest id. Iteration scans that many logical slots and may
//! therefore stop before sparse high-numbered slots; see [`NodeStore::iter`].

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use tracing::trace;

use crate::error::Result;
use crate::graph::NodeId;
use crate::storage::record::FixedRecord;
use crate::storage::record_file::{RecordFile, HEADER_SIZE};

/// A node record that occupies a slot and knows whether that slot has
/// ever been allocated. Never-written space reads back as not in use.
pub trait SlotRecord: FixedRecord {
    /// Whether the slot holds an allocated node.
    fn in_use(&self) -> bool;
}

/// Slot-addressed node file shared between a store and its iterators.
pub struct NodeStore<R: SlotRecord> {
    file: Arc<RwLock<RecordFile>>,
    _marker: PhantomData<R>,
}

impl<R: SlotRecord> NodeStore<R> {
    /// Open (or create) the node file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: Arc::new(RwLock::new(RecordFile::open(path)?)),
            _marker: PhantomData,
        })
    }

    /// Shared handle to the underlying record file.
    pub fn handle(&self) -> Arc<RwLock<RecordFile>> {
        Arc::clone(&self.file)
    }

    fn slot_offset(id: NodeId) -> u64 {
        HEADER_SIZE + id * R::SIZE as u64
    }

    /// Read the slot for `id`. `None` when the slot lies beyond the
    /// end of the file or has never been allocated.
    pub fn get(&self, id: NodeId) -> Result<Option<R>> {
        let mut file = self.file.write();
        let offset = Self::slot_offset(id);
        if offset >= file.len()? {
            return Ok(None);
        }
        file.seek(offset)?;
        let record: R = file.read_record()?;
        Ok(record.in_use().then_some(record))
    }

    /// Whether the slot for `id` is within bounds and in use.
    pub fn exists(&self, id: NodeId) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Allocate the slot for `id`, writing `record` and incrementing
    /// the header count. A no-op when the slot is already in use.
    /// Returns whether a slot was allocated.
    ///
    /// Writing past the current end of file leaves implicit holes that
    /// the file system zero-fills; they read back as not in use.
    pub fn add(&self, id: NodeId, record: R) -> Result<bool> {
        if self.exists(id)? {
            return Ok(false);
        }
        let mut file = self.file.write();
        file.seek(Self::slot_offset(id))?;
        file.write_record(&record)?;
        file.increment_record_count()?;
        trace!(id, "allocated node slot");
        Ok(true)
    }

    /// Rewrite the slot for `id`. Used for chain-head pointer fixups;
    /// the caller is responsible for the slot already being allocated.
    pub fn put(&self, id: NodeId, record: &R) -> Result<()> {
        let mut file = self.file.write();
        file.seek(Self::slot_offset(id))?;
        file.write_record(record)
    }

    /// Number of successful `add` calls recorded in the header.
    pub fn count(&self) -> Result<u32> {
        self.file.write().record_count()
    }

    /// Lazy, restartable scan over slots `0..count`, emitting the ids
    /// of in-use slots only.
    ///
    /// This walks `count` logical slots, not the whole file: when
    /// holes push in-use slots beyond index `count`, those slots are
    /// never reached and the scan undercounts. Preserved as a
    /// documented characteristic of the format.
    pub fn iter(&self) -> NodeIter<R> {
        NodeIter {
            file: Arc::clone(&self.file),
            slot: 0,
            total: None,
            _marker: PhantomData,
        }
    }

    /// Uniformly random slot index in `[0, count)`, probing linearly
    /// forward over unallocated slots (wrapping to the first slot past
    /// the header at end-of-file) until an in-use slot is found.
    ///
    /// The probing is *not* uniform when in-use slots are unevenly
    /// spaced: a run of holes biases selection toward the slot right
    /// after the run. Kept as a documented property of the format.
    pub fn random<G: Rng>(&self, rng: &mut G) -> Result<Option<NodeId>> {
        let mut file = self.file.write();
        let count = file.record_count()?;
        if count == 0 {
            return Ok(None);
        }
        let len = file.len()?;
        let mut index = rng.gen_range(0..u64::from(count));
        loop {
            let mut offset = Self::slot_offset(index);
            if offset >= len {
                index = 0;
                offset = HEADER_SIZE;
            }
            file.seek(offset)?;
            if file.read_bool()? {
                return Ok(Some(index));
            }
            index += 1;
        }
    }

    /// Truncate the node file back to an empty, zero-count state.
    pub fn clear(&self) -> Result<()> {
        self.file.write().clear()
    }
}

/// Lazy scan over the in-use slots of a [`NodeStore`].
///
/// The header count is read on the first pull, so the iterator is
/// cheap to construct and restartable by calling [`NodeStore::iter`]
/// again.
pub struct NodeIter<R: SlotRecord> {
    file: Arc<RwLock<RecordFile>>,
    slot: u64,
    total: Option<u64>,
    _marker: PhantomData<R>,
}

impl<R: SlotRecord> NodeIter<R> {
    fn advance(&mut self) -> Result<Option<NodeId>> {
        let mut file = self.file.write();
        let total = match self.total {
            Some(total) => total,
            None => {
                let total = u64::from(file.record_count()?);
                self.total = Some(total);
                total
            }
        };
        while self.slot < total {
            let id = self.slot;
            self.slot += 1;
            let offset = HEADER_SIZE + id * R::SIZE as u64;
            if offset >= file.len()? {
                return Ok(None);
            }
            file.seek(offset)?;
            let record: R = file.read_record()?;
            if record.in_use() {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

impl<R: SlotRecord> Iterator for NodeIter<R> {
    type Item = Result<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(id)) => Some(Ok(id)),
            Ok(None) => None,
            Err(e) => {
                // Fuse after an error: a failed read leaves the scan
                // position unreliable.
                self.slot = u64::MAX;
                Some(Err(e))
            }
        }
    }
}
