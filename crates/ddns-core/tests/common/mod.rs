//! Test doubles and common utilities for the contract tests
//!
//! This module provides scripted stand-ins for the network-facing traits and
//! a controllable clock.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{DdnsConfig, EngineConfig, ProviderConfig, TimeSpec, ZoneNames};
use ddns_core::error::{Error, Result};
use ddns_core::model::{PageToken, RecordPage, ZoneRecord};
use ddns_core::store::MemoryRecordStore;
use ddns_core::time::Clock;
use ddns_core::traits::{ALookup, DnsClient, RecordStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that only moves when told to
#[derive(Clone)]
pub struct MockClock {
    now: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Clone)]
enum Scripted {
    Answer { addresses: Vec<Ipv4Addr>, ttl: Duration },
    Fail,
}

struct Script {
    bootstrap: HashMap<String, Scripted>,
    discovery: Scripted,
    last_servers: Vec<Ipv4Addr>,
}

/// A DnsClient whose answers are scripted by the test
///
/// Expirations are computed from the shared [`MockClock`], the way a real
/// resolver derives them from the answer TTL.
#[derive(Clone)]
pub struct ScriptedDnsClient {
    clock: MockClock,
    script: Arc<Mutex<Script>>,
    bootstrap_calls: Arc<AtomicUsize>,
    discovery_calls: Arc<AtomicUsize>,
}

impl ScriptedDnsClient {
    pub fn new(clock: MockClock) -> Self {
        Self {
            clock,
            script: Arc::new(Mutex::new(Script {
                bootstrap: HashMap::new(),
                discovery: Scripted::Fail,
                last_servers: Vec::new(),
            })),
            bootstrap_calls: Arc::new(AtomicUsize::new(0)),
            discovery_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer bootstrap lookups for `host` with `addresses` valid for `ttl_secs`
    pub fn answer_bootstrap(&self, host: &str, addresses: &[Ipv4Addr], ttl_secs: u64) {
        self.script.lock().unwrap().bootstrap.insert(
            host.to_string(),
            Scripted::Answer {
                addresses: addresses.to_vec(),
                ttl: Duration::from_secs(ttl_secs),
            },
        );
    }

    /// Make bootstrap lookups for `host` fail
    pub fn fail_bootstrap(&self, host: &str) {
        self.script
            .lock()
            .unwrap()
            .bootstrap
            .insert(host.to_string(), Scripted::Fail);
    }

    /// Answer discovery queries with `addresses`
    pub fn answer_discovery(&self, addresses: &[Ipv4Addr]) {
        self.script.lock().unwrap().discovery = Scripted::Answer {
            addresses: addresses.to_vec(),
            ttl: Duration::from_secs(0),
        };
    }

    /// Make discovery queries fail
    pub fn fail_discovery(&self) {
        self.script.lock().unwrap().discovery = Scripted::Fail;
    }

    pub fn bootstrap_calls(&self) -> usize {
        self.bootstrap_calls.load(Ordering::SeqCst)
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    /// Servers passed to the latest discovery query
    pub fn last_servers(&self) -> Vec<Ipv4Addr> {
        self.script.lock().unwrap().last_servers.clone()
    }

    fn answer(&self, scripted: Option<Scripted>, name: &str) -> Result<ALookup> {
        match scripted {
            Some(Scripted::Answer { addresses, ttl }) => {
                Ok(ALookup::new(addresses, self.clock.now() + ttl))
            }
            Some(Scripted::Fail) | None => Err(Error::resolution(format!("SERVFAIL for {name}"))),
        }
    }
}

#[async_trait]
impl DnsClient for ScriptedDnsClient {
    async fn lookup_bootstrap(&self, host: &str) -> Result<ALookup> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().bootstrap.get(host).cloned();
        self.answer(scripted, host)
    }

    async fn lookup_via(&self, name: &str, servers: &[Ipv4Addr]) -> Result<ALookup> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = {
            let mut script = self.script.lock().unwrap();
            script.last_servers = servers.to_vec();
            script.discovery.clone()
        };
        self.answer(Some(scripted), name)
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// A MemoryRecordStore that fails chosen zone lookups, listings or upserts
#[derive(Clone)]
pub struct FaultyRecordStore {
    inner: MemoryRecordStore,
    reject_upserts: Arc<Mutex<HashSet<String>>>,
    reject_listings: Arc<Mutex<HashSet<String>>>,
    throttle_lookups: Arc<Mutex<HashSet<String>>>,
}

impl FaultyRecordStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            reject_upserts: Arc::new(Mutex::new(HashSet::new())),
            reject_listings: Arc::new(Mutex::new(HashSet::new())),
            throttle_lookups: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn reject_upserts_for(&self, zone_id: &str) {
        self.reject_upserts.lock().unwrap().insert(zone_id.to_string());
    }

    pub fn reject_listings_for(&self, zone_id: &str) {
        self.reject_listings.lock().unwrap().insert(zone_id.to_string());
    }

    /// Zone lookups for `zone_name` fail as rate limited
    pub fn throttle_lookups_for(&self, zone_name: &str) {
        self.throttle_lookups.lock().unwrap().insert(zone_name.to_string());
    }

    pub fn accept_all(&self) {
        self.reject_upserts.lock().unwrap().clear();
        self.reject_listings.lock().unwrap().clear();
        self.throttle_lookups.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordStore for FaultyRecordStore {
    async fn find_zone_id(&self, zone_name: &str) -> Result<String> {
        if self.throttle_lookups.lock().unwrap().contains(zone_name) {
            return Err(Error::rate_limited("zone lookup throttled"));
        }
        self.inner.find_zone_id(zone_name).await
    }

    async fn list_records(&self, zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage> {
        if self.reject_listings.lock().unwrap().contains(zone_id) {
            return Err(Error::provider("faulty", "listing unavailable"));
        }
        self.inner.list_records(zone_id, start).await
    }

    async fn upsert_records(&self, zone_id: &str, records: &[ZoneRecord]) -> Result<()> {
        if self.reject_upserts.lock().unwrap().contains(zone_id) {
            return Err(Error::provider("faulty", "InvalidChangeBatch"));
        }
        self.inner.upsert_records(zone_id, records).await
    }

    fn provider_name(&self) -> &'static str {
        "faulty"
    }
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(zones: &[(&str, &[&str])]) -> DdnsConfig {
    let zones: BTreeMap<String, ZoneNames> = zones
        .iter()
        .map(|(zone, names)| {
            (
                zone.to_string(),
                ZoneNames::Many(names.iter().map(|n| n.to_string()).collect()),
            )
        })
        .collect();

    DdnsConfig {
        servers: vec!["ns1.test".to_string(), "ns2.test".to_string()],
        domain: "myip.test".to_string(),
        zones,
        ttl: TimeSpec::from(300),
        interval: TimeSpec::from(60),
        log_levels: BTreeMap::new(),
        provider: ProviderConfig::Memory,
        engine: EngineConfig::default(),
    }
}
