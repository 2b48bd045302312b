//! Durable key-value state for Parley.
//!
//! Stores small per-installation records (settings snapshots, remembered
//! layout state) that must survive process restarts. Values are arbitrary
//! JSON; a record is either present or absent, and clearing a record is the
//! same operation as writing one.
//!
//! Two backends:
//! - [`FileStore`]: a single JSON document on disk, rewritten atomically.
//! - [`MemoryStore`]: in-process map, for tests and embedders without a
//!   disk scope.

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{FileStore, KeyValueStore};
