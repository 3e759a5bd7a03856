// # Cloudflare Record Store
//
// This crate provides a Cloudflare-backed RecordStore for the DDNS system.
//
// ## Behaviour
//
// - Zones are looked up by name once per reconciliation pass
// - Listings are paged with Cloudflare's `page` / `per_page` parameters,
//   ordered by name. A name whose entries run past the end of a page is
//   completed from the following page, so every listed record set is whole.
//   The continuation token is `page:skip`, where `skip` counts the entries
//   of that page already returned
// - Cloudflare stores one entry per value. Entries sharing a name and type are
//   grouped into one `ZoneRecord` with sorted values
// - Upserts replace each record set atomically through a single
//   `POST /zones/:zone_id/dns_records/batch` (deletes + posts)
// - No retries and no caching: the driver loop retries on its next cycle
//
// ## Trust Level: Untrusted (Record Store)
//
// The store performs HTTP calls to its API endpoint only. It never spawns
// tasks and never holds state beyond a single call.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - API token SHOULD be provided via `DDNS_PROVIDER_API_TOKEN`
// - Store construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?order=name&page=...`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::model::{PageToken, RecordPage, ZoneRecord};
use ddns_core::traits::{RecordStore, RecordStoreFactory};
use ddns_core::{Error, ProviderRegistry, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
pub const PAGE_SIZE: u32 = 100;

const PROVIDER: &str = "cloudflare";

/// Envelope shared by every Cloudflare API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

/// One Cloudflare DNS entry (a single value)
#[derive(Debug, Clone, Deserialize)]
struct DnsEntry {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct EntryId {
    id: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct NewEntry {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
}

/// Body of `POST /zones/:zone_id/dns_records/batch`
#[derive(Debug, Default, Serialize, PartialEq)]
struct BatchRequest {
    deletes: Vec<EntryId>,
    posts: Vec<NewEntry>,
}

/// Cloudflare record store
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all GET requests (zone lookup, listings, existing entries)
/// - Log the intended batch payload
/// - **NOT** modify any record
pub struct CloudflareRecordStore {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareRecordStore")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareRecordStore {
    /// Create a new Cloudflare record store
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the store at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<ApiResponse<T>> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{context}: request failed: {e}")))?;

        parse_response(response, context).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<ApiResponse<T>> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("{context}: request failed: {e}")))?;

        parse_response(response, context).await
    }

    /// One page of the zone listing, ordered by name, and the page after it
    async fn fetch_listing(
        &self,
        zone_id: &str,
        page: u32,
    ) -> Result<(Vec<DnsEntry>, Option<u32>)> {
        let response: ApiResponse<Vec<DnsEntry>> = self
            .get(
                &format!("/zones/{zone_id}/dns_records"),
                &[
                    ("order", "name".to_string()),
                    ("direction", "asc".to_string()),
                    ("page", page.to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                ],
                "Record listing",
            )
            .await?;

        let following = next_page(response.result_info.as_ref());
        Ok((response.result.unwrap_or_default(), following))
    }

    /// Every existing entry of `name` / `record_type` in the zone
    async fn existing_entries(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<DnsEntry>> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let response: ApiResponse<Vec<DnsEntry>> = self
                .get(
                    &format!("/zones/{zone_id}/dns_records"),
                    &[
                        ("name", name.trim_end_matches('.').to_string()),
                        ("type", record_type.to_string()),
                        ("page", page.to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                    ],
                    "Record lookup",
                )
                .await?;

            entries.extend(response.result.unwrap_or_default());
            match next_page(response.result_info.as_ref()) {
                Some(next) => page = next,
                None => return Ok(entries),
            }
        }
    }
}

/// Map a Cloudflare response to its envelope or a typed error
async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<ApiResponse<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status.as_u16(), context, &body));
    }

    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| {
            Error::provider(PROVIDER, format!("{context}: failed to parse response: {e}"))
        })?;

    if !envelope.success {
        let messages: Vec<String> = envelope
            .errors
            .iter()
            .map(|m| format!("{} ({})", m.message, m.code))
            .collect();
        return Err(Error::provider(
            PROVIDER,
            format!("{context}: {}", messages.join("; ")),
        ));
    }

    Ok(envelope)
}

/// Map an HTTP error status to an error
fn status_error(status: u16, context: &str, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{context}: invalid API token or insufficient permissions. Status: {status}"
        )),
        404 => Error::not_found(format!("{context}: {body}")),
        429 => Error::rate_limited(format!("{context}: retry later. Status: {status}")),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{context}: Cloudflare server error (transient): {status} - {body}"),
        ),
        _ => Error::provider(PROVIDER, format!("{context}: {status} - {body}")),
    }
}

/// Page to request after the one described by `info`, if any
fn next_page(info: Option<&ResultInfo>) -> Option<u32> {
    info.filter(|info| info.page < info.total_pages)
        .map(|info| info.page + 1)
}

/// Decode a listing token into (page, entries of that page to skip)
fn parse_token(start: Option<&PageToken>) -> Result<(u32, usize)> {
    let Some(PageToken(token)) = start else {
        return Ok((1, 0));
    };
    let bad = || Error::invalid_input(format!("Bad page token: {token}"));
    let (page, skip) = token.split_once(':').unwrap_or((token.as_str(), "0"));
    Ok((page.parse().map_err(|_| bad())?, skip.parse().map_err(|_| bad())?))
}

fn page_token(page: u32, skip: usize) -> PageToken {
    PageToken(format!("{page}:{skip}"))
}

/// Cloudflare names carry no trailing dot; ours always do
fn qualify(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.').to_ascii_lowercase())
}

/// Group per-value entries into record sets keyed by (name, type)
fn group_entries(entries: Vec<DnsEntry>) -> Vec<ZoneRecord> {
    let mut sets: BTreeMap<(String, String), ZoneRecord> = BTreeMap::new();

    for entry in entries {
        let name = qualify(&entry.name);
        let record_type = entry.record_type.to_ascii_uppercase();
        let set = sets
            .entry((name.clone(), record_type.clone()))
            .or_insert_with(|| ZoneRecord {
                name,
                record_type,
                ttl: entry.ttl,
                values: Vec::new(),
            });
        // Mixed TTLs never match a desired TTL
        if set.ttl != entry.ttl {
            set.ttl = 0;
        }
        set.values.push(entry.content);
    }

    sets.into_values()
        .map(|mut set| {
            set.values.sort();
            set
        })
        .collect()
}

#[async_trait]
impl RecordStore for CloudflareRecordStore {
    async fn find_zone_id(&self, zone_name: &str) -> Result<String> {
        let name = zone_name.trim_end_matches('.');
        tracing::debug!("Looking up zone ID for {}", name);

        let response: ApiResponse<Vec<Zone>> = self
            .get("/zones", &[("name", name.to_string())], "Zone lookup")
            .await?;

        let zone = response
            .result
            .and_then(|zones| zones.into_iter().next())
            .ok_or_else(|| Error::zone_lookup(zone_name, "no such zone in this account"))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    async fn list_records(&self, zone_id: &str, start: Option<&PageToken>) -> Result<RecordPage> {
        let (page, skip) = parse_token(start)?;
        let (listed, mut following) = self.fetch_listing(zone_id, page).await?;
        let mut entries: Vec<DnsEntry> = listed.into_iter().skip(skip).collect();

        // Pull the rest of the last name's entries off the following pages
        let next = loop {
            let Some(page) = following else {
                break None;
            };
            let Some(last) = entries.last().map(|entry| qualify(&entry.name)) else {
                break Some(page_token(page, 0));
            };

            let (listed, after) = self.fetch_listing(zone_id, page).await?;
            let carried = listed
                .iter()
                .take_while(|entry| qualify(&entry.name) == last)
                .count();
            if carried < listed.len() {
                entries.extend(listed.into_iter().take(carried));
                break Some(page_token(page, carried));
            }
            entries.extend(listed);
            following = after;
        };

        Ok(RecordPage {
            records: group_entries(entries),
            next,
        })
    }

    async fn upsert_records(&self, zone_id: &str, records: &[ZoneRecord]) -> Result<()> {
        let mut batch = BatchRequest::default();

        for record in records {
            let existing = self
                .existing_entries(zone_id, &record.name, &record.record_type)
                .await?;
            batch
                .deletes
                .extend(existing.into_iter().map(|entry| EntryId { id: entry.id }));
            batch.posts.extend(record.values.iter().map(|value| NewEntry {
                name: record.name.trim_end_matches('.').to_string(),
                record_type: record.record_type.clone(),
                content: value.clone(),
                ttl: record.ttl,
            }));
        }

        tracing::info!(
            "{} {} record set(s) in zone {} [mode: {}]",
            if self.dry_run { "Would replace" } else { "Replacing" },
            records.len(),
            zone_id,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send batch to zone {}: {}",
                zone_id,
                serde_json::to_string(&batch)?
            );
            return Ok(());
        }

        let _: ApiResponse<serde_json::Value> = self
            .post(
                &format!("/zones/{zone_id}/dns_records/batch"),
                &batch,
                "Batch update",
            )
            .await?;

        tracing::debug!("Batch applied to zone {}", zone_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare record stores
pub struct CloudflareFactory;

impl RecordStoreFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                base_url,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                // Check for dry-run mode environment variable
                let dry_run = std::env::var("DDNS_MODE")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("dry-run");

                if dry_run {
                    tracing::warn!(
                        "Cloudflare record store running in DRY-RUN mode - no changes will be made"
                    );
                }

                let mut store = CloudflareRecordStore::new(api_token.clone(), dry_run)?;
                if let Some(base_url) = base_url {
                    store = store.with_base_url(base_url.clone());
                }
                Ok(Box::new(store))
            }
            _ => Err(Error::config("Invalid config for Cloudflare record store")),
        }
    }
}

/// Register the Cloudflare record store with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&mut registry);
/// assert!(registry.has_store("cloudflare"));
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_store(PROVIDER, Box::new(CloudflareFactory));
}
