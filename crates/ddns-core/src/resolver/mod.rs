//! Self-refreshing resolver pool
//!
//! The pool answers "what are the A records for this name right now?" by
//! querying a set of name servers that is itself discovered through DNS:
//!
//! ```text
//! bootstrap hostnames ──(system resolver)──► ServerSet { servers, expires_at }
//!                                                   │
//!                 target name ──(query servers)─────┴──► AddressSet
//! ```
//!
//! The server set is rebuilt lazily once `now >= expires_at`. `expires_at` is
//! the earliest expiry among the bootstrap answers that produced the set, so
//! no server is used past the shortest TTL that vouched for it.
//!
//! The pool takes `&mut self` for every query. Callers sharing one pool
//! between tasks must wrap it in a mutex so a reader never observes a
//! half-rebuilt server list.

use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::AddressSet;
use crate::time::{Clock, SystemClock};
use crate::traits::DnsClient;

/// Name servers currently used for discovery queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSet {
    servers: Vec<Ipv4Addr>,
    expires_at: Instant,
}

impl ServerSet {
    /// Server addresses in bootstrap order
    pub fn servers(&self) -> &[Ipv4Addr] {
        &self.servers
    }

    /// When this set must be rebuilt
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the set is stale at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Resolves bootstrap hostnames into the pool's [`ServerSet`]
#[derive(Debug, Clone)]
pub struct ServerRefresher {
    bootstrap: Vec<String>,
    current: Option<ServerSet>,
}

impl ServerRefresher {
    /// Create a refresher for the given bootstrap hostnames
    pub fn new(bootstrap: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            bootstrap: bootstrap.into_iter().map(Into::into).collect(),
            current: None,
        }
    }

    /// Configured bootstrap hostnames
    pub fn bootstrap(&self) -> &[String] {
        &self.bootstrap
    }

    /// The committed server set, if any refresh has succeeded
    pub fn current(&self) -> Option<&ServerSet> {
        self.current.as_ref()
    }

    /// Whether a refresh is due at `now`
    pub fn needs_refresh(&self, now: Instant) -> bool {
        self.current.as_ref().is_none_or(|set| set.is_expired(now))
    }

    /// Return the server set, refreshing it first when stale
    pub async fn servers(&mut self, client: &dyn DnsClient, now: Instant) -> Result<&ServerSet> {
        if self.needs_refresh(now) {
            self.refresh(client).await?;
        }
        self.current
            .as_ref()
            .ok_or_else(|| Error::resolution("No name server set available"))
    }

    /// Rebuild the server set from every bootstrap hostname
    ///
    /// A failed lookup does not stop the others. If the rebuilt list is empty
    /// the last lookup error is returned and the previous set is kept as is.
    pub async fn refresh(&mut self, client: &dyn DnsClient) -> Result<&ServerSet> {
        debug!("Refreshing name servers from {:?}", self.bootstrap);

        let mut servers: Vec<Ipv4Addr> = Vec::new();
        let mut expires_at: Option<Instant> = None;
        let mut last_error: Option<Error> = None;

        for host in &self.bootstrap {
            match client.lookup_bootstrap(host).await {
                Ok(lookup) if lookup.addresses.is_empty() => {
                    warn!("Name server {} resolved to no addresses", host);
                }
                Ok(lookup) => {
                    expires_at = Some(match expires_at {
                        Some(current) => current.min(lookup.valid_until),
                        None => lookup.valid_until,
                    });
                    for addr in lookup.addresses {
                        if !servers.contains(&addr) {
                            servers.push(addr);
                        }
                    }
                }
                Err(e) => {
                    warn!("Could not resolve name server {}: {}", host, e);
                    last_error = Some(e);
                }
            }
        }

        let expires_at = match expires_at {
            Some(expires_at) if !servers.is_empty() => expires_at,
            _ => {
                return Err(last_error.unwrap_or_else(|| {
                    Error::resolution(format!(
                        "Bootstrap servers {:?} yielded no addresses",
                        self.bootstrap
                    ))
                }));
            }
        };

        debug!(
            "Discovery using name servers {:?} for {:?}",
            servers,
            expires_at.saturating_duration_since(Instant::now())
        );

        Ok(&*self.current.insert(ServerSet {
            servers,
            expires_at,
        }))
    }
}

/// A-record resolution against a self-refreshing server set
pub struct ResolverPool {
    refresher: ServerRefresher,
    client: Box<dyn DnsClient>,
    clock: Box<dyn Clock>,
}

impl ResolverPool {
    /// Create a pool using the system clock
    pub fn new(
        bootstrap: impl IntoIterator<Item = impl Into<String>>,
        client: Box<dyn DnsClient>,
    ) -> Self {
        Self::with_clock(bootstrap, client, Box::new(SystemClock))
    }

    /// Create a pool reading time from `clock`
    pub fn with_clock(
        bootstrap: impl IntoIterator<Item = impl Into<String>>,
        client: Box<dyn DnsClient>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            refresher: ServerRefresher::new(bootstrap),
            client,
            clock,
        }
    }

    /// Resolve `target` to its current A records
    ///
    /// Refreshes the server set first if it has expired. Fails with
    /// [`Error::Resolution`] when no server set can be built, when the query
    /// fails, or when the answer holds no A records.
    pub async fn resolve(&mut self, target: &str) -> Result<AddressSet> {
        let now = self.clock.now();
        let server_set = self.refresher.servers(self.client.as_ref(), now).await?;

        let lookup = self
            .client
            .lookup_via(target, server_set.servers())
            .await?;

        let addresses = AddressSet::from_addrs(lookup.addresses);
        if addresses.is_empty() {
            return Err(Error::resolution(format!("No A records found for {target}")));
        }

        debug!("{} resolved to {}", target, addresses);
        Ok(addresses)
    }

    /// The committed server set, if any
    pub fn server_set(&self) -> Option<&ServerSet> {
        self.refresher.current()
    }

    /// Name of the underlying DNS client
    pub fn client_name(&self) -> &'static str {
        self.client.client_name()
    }
}

impl std::fmt::Debug for ResolverPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverPool")
            .field("refresher", &self.refresher)
            .field("client", &self.client.client_name())
            .finish()
    }
}
