//! Diskgraph - Disk-Resident Relationship Store Testbed
//!
//! This crate implements a family of disk-resident graph storage
//! engines that mimic how embedded graph databases lay out nodes and
//! relationships on disk:
//! - A generic fixed-size binary record file with a 4-byte count header
//! - A slot-addressed node store (the node id *is* the slot index)
//! - Three interchangeable relationship-store strategies behind one
//!   contract: flat append log, singly-linked adjacency chains, and
//!   doubly-linked bidirectional chains (Neo4j-style "native store")
//! - Lazy pull-based chain iterators and single-pass reservoir
//!   sampling for random relationship selection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            GraphStore contract               │
//! │  (add, iterate, random selection, clear)    │
//! └──────┬──────────────┬──────────────┬────────┘
//!        │              │              │
//! ┌──────┴─────┐ ┌──────┴─────┐ ┌──────┴─────┐
//! │  EdgeList  │ │ LinkedList │ │   Native    │
//! │ (flat log) │ │ (1-linked) │ │ (2-linked)  │
//! └──────┬─────┘ └──────┬─────┘ └──────┬─────┘
//!        │              │              │
//! ┌──────┴──────────────┴──────────────┴────────┐
//! │   NodeStore (slot-addressed node file)       │
//! │   RecordFile (count header + records)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Single-threaded, synchronous, blocking I/O throughout. There is no
//! write-ahead log, no crash recovery, no deletion and no compaction:
//! files are append-only and never shrink except through `clear()`.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod sampling;
pub mod storage;

pub use error::{Error, Result};
pub use graph::edge_list::EdgeListStore;
pub use graph::linked_list::LinkedListStore;
pub use graph::native::NativeStore;
pub use graph::{Edge, GraphStore, NodeId, StoreStats};
