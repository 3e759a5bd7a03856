// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides an authoritative zone that lives inside the process. Nothing is
// published anywhere, which makes it useful for:
//
// - Dry runs of a configuration (`provider: { type: memory }`)
// - Embedding the engine in tests
//
// ## Pagination
//
// Listings are served in (name, type) order, `page_size` records at a time.
// A small page size exercises the reconciler's continuation handling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Error;
use crate::config::ProviderConfig;
use crate::model::{PageToken, RECORD_TYPE_A, RecordPage, ZoneRecord};
use crate::registry::ProviderRegistry;
use crate::traits::{RecordStore, RecordStoreFactory};

/// Default number of records per listing page
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct Zone {
    id: String,
    records: BTreeMap<(String, String), ZoneRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    zones: BTreeMap<String, Zone>,
    upserts: Vec<(String, Vec<ZoneRecord>)>,
}

impl Inner {
    fn zone_by_id_mut(&mut self, zone_id: &str) -> Option<&mut Zone> {
        self.zones.values_mut().find(|zone| zone.id == zone_id)
    }
}

/// In-memory record store implementation
///
/// Cloning shares the underlying zones and counters.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::store::MemoryRecordStore;
/// use ddns_core::model::ZoneRecord;
/// use ddns_core::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     store.add_zone("example.com").await;
///
///     let zone_id = store.find_zone_id("example.com").await?;
///     store
///         .upsert_records(&zone_id, &[ZoneRecord::a("host.example.com.", 300, ["10.0.0.5"])])
///         .await?;
///
///     assert!(store.record("example.com", "host.example.com.").await.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Inner>>,
    page_size: usize,
    auto_create_zones: bool,
    list_calls: Arc<AtomicUsize>,
    upsert_calls: Arc<AtomicUsize>,
}

impl MemoryRecordStore {
    /// Create an empty store with no zones
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            page_size: DEFAULT_PAGE_SIZE,
            auto_create_zones: false,
            list_calls: Arc::new(AtomicUsize::new(0)),
            upsert_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve listings `page_size` records at a time
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Create zones on first lookup instead of failing
    pub fn with_auto_create_zones(mut self) -> Self {
        self.auto_create_zones = true;
        self
    }

    /// Add an empty zone and return its id
    pub async fn add_zone(&self, zone_name: &str) -> String {
        let mut guard = self.inner.write().await;
        Self::ensure_zone(&mut guard, zone_name)
    }

    /// Insert or replace a record set in `zone_name`, creating the zone if needed
    pub async fn insert_record(&self, zone_name: &str, record: ZoneRecord) {
        let mut guard = self.inner.write().await;
        let id = Self::ensure_zone(&mut guard, zone_name);
        if let Some(zone) = guard.zone_by_id_mut(&id) {
            zone.records
                .insert((record.name.clone(), record.record_type.clone()), record);
        }
    }

    /// The A record set named `name` in `zone_name`, if present
    pub async fn record(&self, zone_name: &str, name: &str) -> Option<ZoneRecord> {
        let guard = self.inner.read().await;
        guard
            .zones
            .get(&zone_key(zone_name))?
            .records
            .get(&(name.to_string(), RECORD_TYPE_A.to_string()))
            .cloned()
    }

    /// Number of list_records() calls served
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of upsert_records() calls served
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Every accepted upsert batch as `(zone_id, records)`
    pub async fn upserts(&self) -> Vec<(String, Vec<ZoneRecord>)> {
        self.inner.read().await.upserts.clone()
    }

    fn ensure_zone(inner: &mut Inner, zone_name: &str) -> String {
        let next_id = format!("Z{:04}", inner.zones.len() + 1);
        inner
            .zones
            .entry(zone_key(zone_name))
            .or_insert_with(|| Zone {
                id: next_id,
                records: BTreeMap::new(),
            })
            .id
            .clone()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn zone_key(zone_name: &str) -> String {
    zone_name.trim_end_matches('.').to_ascii_lowercase()
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_zone_id(&self, zone_name: &str) -> Result<String, Error> {
        if self.auto_create_zones {
            return Ok(self.add_zone(zone_name).await);
        }

        let guard = self.inner.read().await;
        guard
            .zones
            .get(&zone_key(zone_name))
            .map(|zone| zone.id.clone())
            .ok_or_else(|| Error::zone_lookup(zone_name, "no such hosted zone"))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        start: Option<&PageToken>,
    ) -> Result<RecordPage, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match start {
            Some(PageToken(token)) => token
                .parse::<usize>()
                .map_err(|_| Error::invalid_input(format!("Bad page token: {token}")))?,
            None => 0,
        };

        let guard = self.inner.read().await;
        let zone = guard
            .zones
            .values()
            .find(|zone| zone.id == zone_id)
            .ok_or_else(|| Error::not_found(format!("Zone id {zone_id}")))?;

        let records: Vec<ZoneRecord> = zone
            .records
            .values()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();

        let consumed = offset + records.len();
        let next = (consumed < zone.records.len()).then(|| PageToken(consumed.to_string()));

        Ok(RecordPage { records, next })
    }

    async fn upsert_records(&self, zone_id: &str, records: &[ZoneRecord]) -> Result<(), Error> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let mut guard = self.inner.write().await;
        let zone = guard
            .zone_by_id_mut(zone_id)
            .ok_or_else(|| Error::not_found(format!("Zone id {zone_id}")))?;

        for record in records {
            debug!("Upserting {} {} {:?}", record.name, record.record_type, record.values);
            zone.records
                .insert((record.name.clone(), record.record_type.clone()), record.clone());
        }

        guard.upserts.push((zone_id.to_string(), records.to_vec()));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory record stores
pub struct MemoryRecordStoreFactory;

impl RecordStoreFactory for MemoryRecordStoreFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            ProviderConfig::Memory => {
                Ok(Box::new(MemoryRecordStore::new().with_auto_create_zones()))
            }
            _ => Err(Error::config("Invalid config for memory record store")),
        }
    }
}

/// Register the memory record store with a registry
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_zones() {
        let store = MemoryRecordStore::new();

        let id = store.add_zone("Example.com.").await;
        assert_eq!(store.add_zone("example.com").await, id);
        assert_eq!(store.find_zone_id("example.com").await.unwrap(), id);

        let err = store.find_zone_id("example.org").await.unwrap_err();
        assert!(matches!(err, Error::ZoneLookup { .. }));
    }

    #[tokio::test]
    async fn test_memory_store_auto_zones() {
        let store = MemoryRecordStore::new().with_auto_create_zones();
        let id = store.find_zone_id("example.org").await.unwrap();
        assert_eq!(store.find_zone_id("example.org").await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_memory_store_pagination() {
        let store = MemoryRecordStore::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            store
                .insert_record(
                    "example.com",
                    ZoneRecord::a(format!("{name}.example.com."), 300, ["10.0.0.1"]),
                )
                .await;
        }
        let zone_id = store.find_zone_id("example.com").await.unwrap();

        let mut names = Vec::new();
        let mut token = None;
        loop {
            let page = store.list_records(&zone_id, token.as_ref()).await.unwrap();
            names.extend(page.records.into_iter().map(|r| r.name));
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "a.example.com.");
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_upsert_replaces() {
        let store = MemoryRecordStore::new();
        let zone_id = store.add_zone("example.com").await;

        store
            .upsert_records(&zone_id, &[ZoneRecord::a("h.example.com.", 60, ["10.0.0.1"])])
            .await
            .unwrap();
        store
            .upsert_records(&zone_id, &[ZoneRecord::a("h.example.com.", 300, ["10.0.0.2"])])
            .await
            .unwrap();

        assert_eq!(
            store.record("example.com", "h.example.com.").await,
            Some(ZoneRecord::a("h.example.com.", 300, ["10.0.0.2"]))
        );
        assert_eq!(store.upsert_calls(), 2);
        assert_eq!(store.upserts().await.len(), 2);
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        let factory = MemoryRecordStoreFactory;
        assert!(factory.create(&ProviderConfig::Memory).is_ok());
        assert!(
            factory
                .create(&ProviderConfig::Cloudflare {
                    api_token: "token".to_string(),
                    base_url: None,
                })
                .is_err()
        );
    }
}
