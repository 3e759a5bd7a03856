//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsClient`]: A-record lookups for bootstrap servers and discovery
//! - [`RecordStore`]: List and upsert records in an authoritative zone

pub mod dns_client;
pub mod record_store;

pub use dns_client::{ALookup, DnsClient};
pub use record_store::{RecordStore, RecordStoreFactory};
