//! Storage layer - binary record files and the slot-addressed node store
//!
//! The pieces every relationship-store strategy is built on:
//!
//! - [`RecordFile`]: a random-access file reserving a 4-byte record
//!   count header; no graph semantics.
//! - [`FixedRecord`]: the capability every on-disk struct implements -
//!   it knows its encoded byte length and serializes itself.
//! - [`NodeStore`]: maps a node id to a fixed-offset slot in the node
//!   file; owns node existence and random-node sampling.

pub mod node_store;
pub mod record;
pub mod record_file;

pub use node_store::{NodeIter, NodeStore, SlotRecord};
pub use record::{FixedRecord, NO_POINTER};
pub use record_file::{RecordFile, HEADER_SIZE};
