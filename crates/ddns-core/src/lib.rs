// # ddns-core
//
// Core library for the DDNS resolver pool and record reconciliation.
//
// ## Architecture Overview
//
// This library keeps a set of DNS A records pointed at the host's current
// public addresses:
// - **ResolverPool**: discovers the host's addresses through a rotating,
//   TTL-bounded set of name servers (`resolver`)
// - **Reconciler**: diffs desired records against an authoritative zone and
//   issues the minimal set of upserts (`reconcile`)
// - **DdnsEngine**: the driver loop tying the two together (`engine`)
// - **RecordStore** / **DnsClient**: traits implemented by provider and
//   resolver crates
// - **ProviderRegistry**: plugin-based registry for record stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Minimal Writes**: Records are only written when the zone diverges
// 3. **Failure Isolation**: A failed cycle or zone never stops the loop
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Testability**: Time and network access sit behind traits

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod time;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, ProviderConfig, TimeSpec, ZoneNames};
pub use engine::{DdnsEngine, EngineEvent};
pub use error::{Error, Result};
pub use model::{AddressSet, ChangeSet, DesiredRecord, DesiredState, ZoneRecord};
pub use reconcile::{ReconcileReport, Reconciler, ZoneOutcome};
pub use registry::ProviderRegistry;
pub use resolver::{ResolverPool, ServerRefresher, ServerSet};
pub use store::MemoryRecordStore;
pub use time::{Clock, SystemClock};
pub use traits::{DnsClient, RecordStore};
