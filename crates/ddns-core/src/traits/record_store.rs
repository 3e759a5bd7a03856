// # Record Store Trait
//
// Defines the interface to an authoritative zone provider.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
// - In-process: `ddns_core::store::MemoryRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::RecordStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//
//     let zone_id = store.find_zone_id("example.com").await?;
//
//     let mut page = store.list_records(&zone_id, None).await?;
//     loop {
//         for record in &page.records {
//             println!("{} {} {:?}", record.name, record.record_type, record.values);
//         }
//         match page.next.take() {
//             Some(token) => page = store.list_records(&zone_id, Some(&token)).await?,
//             None => break,
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{PageToken, RecordPage, ZoneRecord};

/// Trait for authoritative zone providers
///
/// # Trust Level: Untrusted
///
/// Record stores are isolated, stateless adapters:
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to their own endpoints
/// - ✅ Translate provider payloads into [`ZoneRecord`]s
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the next cycle retries from scratch)
/// - ❌ Spawn tasks or threads
/// - ❌ Decide whether a record needs an update (owned by `Reconciler`)
/// - ❌ Cache listings across calls
///
/// Every name a store returns must be fully qualified with a trailing dot
/// and lower-cased, and record values of equal content must come back in the
/// same order every time (sorting them is the simplest way to ensure this).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Resolve a zone name to the provider's zone identifier
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The provider-specific zone id
    /// - `Err(Error::ZoneLookup)`: If no zone matches
    /// - Any other error (authentication, rate limiting, transport) as is
    async fn find_zone_id(&self, zone_name: &str) -> Result<String, crate::Error>;

    /// List one page of records in a zone
    ///
    /// Pass `None` for the first page and the previous page's
    /// [`RecordPage::next`] for the following ones. A record set is never
    /// split between pages: every returned record carries all of its values.
    async fn list_records(
        &self,
        zone_id: &str,
        start: Option<&PageToken>,
    ) -> Result<RecordPage, crate::Error>;

    /// Create or replace every record set in `records` as one batch
    ///
    /// # Idempotency
    ///
    /// Upserting a record set that already exists with the same values must
    /// leave the zone unchanged.
    async fn upsert_records(
        &self,
        zone_id: &str,
        records: &[ZoneRecord],
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
