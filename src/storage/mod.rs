//! Storage layer
//!
//! # Architecture
//!
//! Feature stores live in a backing document index:
//!
//! ```text
//! Indices (name → IndexMetadata)
//!   └─→ Documents (id → versioned JSON source)
//! ```
//!
//! ## Document Index
//!
//! The `DocumentIndex` trait is the contract this crate needs from a search
//! engine: index provisioning, point lookups and versioned conditional
//! writes. Durability and replication belong to the implementation.
//!
//! ## Implementation
//!
//! `InMemoryIndex` keeps every index in a `DashMap` and is used for embedding
//! and tests.

pub mod engine;
pub mod memory;

pub use engine::{
    DocumentIndex, IndexMetadata, IndexWriteResponse, IndexedDocument, WriteCondition,
    WriteResult,
};
pub use memory::InMemoryIndex;
