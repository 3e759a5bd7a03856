// # Record Store Implementations
//
// Implementations of the RecordStore trait that ship with the core.
// Provider-backed stores live in their own crates.

pub mod memory;

pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory, register};
