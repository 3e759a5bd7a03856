// # Hickory DNS Client
//
// This crate provides the DnsClient used by the resolver pool, backed by
// hickory-resolver.
//
// ## Lookups
//
// - Bootstrap lookups go through the system resolver (`/etc/resolv.conf`).
//   The resolver is built once and reused.
// - Discovery lookups build a throwaway resolver pointed at exactly the
//   servers handed in by the pool (UDP and TCP, port 53). Nothing is cached
//   between discovery queries, so every cycle sees the live answer.
//
// ## Expiry
//
// `ALookup::valid_until` is hickory's own answer expiry, i.e. the query time
// plus the smallest TTL in the answer.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{Resolver, TokioResolver};
use tracing::{debug, trace};

use ddns_core::traits::{ALookup, DnsClient};
use ddns_core::{Error, Result};

/// Port discovery queries are sent to
pub const DNS_PORT: u16 = 53;

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// DnsClient backed by hickory-resolver
pub struct HickoryDnsClient {
    /// System resolver for bootstrap lookups
    system: TokioResolver,

    /// Per-query timeout applied to discovery resolvers
    timeout: Duration,
}

impl HickoryDnsClient {
    /// Create a client using the host's resolver configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be read.
    pub fn from_system(timeout: Duration) -> Result<Self> {
        let mut builder = TokioResolver::builder_tokio()
            .map_err(|e| Error::config(format!("Failed to read system resolver config: {e}")))?;
        builder.options_mut().timeout = timeout;

        Ok(Self::with_system_resolver(builder.build(), timeout))
    }

    /// Create a client around an already-built bootstrap resolver
    pub fn with_system_resolver(system: TokioResolver, timeout: Duration) -> Self {
        Self { system, timeout }
    }

    /// Per-query timeout for discovery lookups
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn discovery_resolver(&self, servers: &[Ipv4Addr]) -> TokioResolver {
        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        // The pool decides when to retry
        opts.attempts = 1;

        Resolver::builder_with_config(discovery_config(servers), TokioConnectionProvider::default())
            .with_options(opts)
            .build()
    }
}

/// Resolver configuration that queries exactly `servers`
pub fn discovery_config(servers: &[Ipv4Addr]) -> ResolverConfig {
    let ips: Vec<IpAddr> = servers.iter().copied().map(IpAddr::V4).collect();
    ResolverConfig::from_parts(
        None,
        vec![],
        NameServerConfigGroup::from_ips_clear(&ips, DNS_PORT, true),
    )
}

async fn lookup_a(resolver: &TokioResolver, name: &str) -> Result<ALookup> {
    let lookup = resolver
        .ipv4_lookup(name)
        .await
        .map_err(|e| Error::resolution(format!("Lookup of {name} failed: {e}")))?;

    let addresses: Vec<Ipv4Addr> = lookup.iter().map(|a| a.0).collect();
    trace!("{} -> {:?}", name, addresses);

    Ok(ALookup::new(addresses, lookup.valid_until()))
}

#[async_trait]
impl DnsClient for HickoryDnsClient {
    async fn lookup_bootstrap(&self, host: &str) -> Result<ALookup> {
        debug!("Resolving name server {} via system resolver", host);
        lookup_a(&self.system, host).await
    }

    async fn lookup_via(&self, name: &str, servers: &[Ipv4Addr]) -> Result<ALookup> {
        if servers.is_empty() {
            return Err(Error::resolution(format!(
                "Lookup of {name} failed: no name servers given"
            )));
        }

        debug!("Resolving {} via {:?}", name, servers);
        let resolver = self.discovery_resolver(servers);
        lookup_a(&resolver, name).await
    }

    fn client_name(&self) -> &'static str {
        "hickory"
    }
}

impl std::fmt::Debug for HickoryDnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryDnsClient")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HickoryDnsClient {
        let system = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        HickoryDnsClient::with_system_resolver(system, Duration::from_secs(2))
    }

    #[test]
    fn discovery_config_targets_given_servers_on_port_53() {
        let servers = [Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)];
        let config = discovery_config(&servers);

        assert!(!config.name_servers().is_empty());
        for ns in config.name_servers() {
            assert_eq!(ns.socket_addr.port(), DNS_PORT);
            match ns.socket_addr.ip() {
                IpAddr::V4(ip) => assert!(servers.contains(&ip)),
                other => panic!("unexpected server {other}"),
            }
        }
        assert!(config.search().is_empty());
        assert!(config.domain().is_none());
    }

    #[tokio::test]
    async fn lookup_via_without_servers_fails_fast() {
        let err = client().lookup_via("myip.test", &[]).await.unwrap_err();
        assert!(err.is_resolution());
        assert!(err.to_string().contains("myip.test"));
    }

    #[tokio::test]
    async fn client_reports_name_and_timeout() {
        let client = client();
        assert_eq!(client.client_name(), "hickory");
        assert_eq!(client.timeout(), Duration::from_secs(2));
    }
}
