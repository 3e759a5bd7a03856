// # DNS Client Trait
//
// Defines the A-record lookups the resolver pool needs.
//
// ## Implementations
//
// - hickory-resolver: `ddns-resolver-hickory` crate
//
// Two kinds of lookup exist:
//
// - **bootstrap**: resolve a name-server hostname with the system resolver.
//   This never goes through the pool's own server set, so refreshing the pool
//   cannot depend on the pool.
// - **via**: resolve a name against an explicit list of name-server addresses.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Instant;

/// Answer to an A-record lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ALookup {
    /// Addresses in answer order
    pub addresses: Vec<Ipv4Addr>,
    /// When the answer's shortest TTL runs out
    pub valid_until: Instant,
}

impl ALookup {
    /// Create a lookup answer
    pub fn new(addresses: Vec<Ipv4Addr>, valid_until: Instant) -> Self {
        Self {
            addresses,
            valid_until,
        }
    }
}

/// Trait for DNS client implementations
///
/// Implementations must not retry on their own and must report every
/// failure as [`crate::Error::Resolution`] naming the queried name.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Resolve `host` to A records using the system resolver
    async fn lookup_bootstrap(&self, host: &str) -> Result<ALookup, crate::Error>;

    /// Resolve `name` to A records by querying `servers` directly
    async fn lookup_via(&self, name: &str, servers: &[Ipv4Addr])
    -> Result<ALookup, crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
