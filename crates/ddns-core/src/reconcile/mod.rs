//! Record reconciliation
//!
//! The [`Reconciler`] brings each configured zone's A records in line with
//! the addresses discovered this cycle, writing only what is out of date:
//!
//! 1. Resolve the zone to its provider id
//! 2. Page through the zone's records; every A record whose name is still
//!    pending and whose values and TTL already match is dropped from the
//!    pending set. Listing stops as soon as nothing is pending.
//! 3. Upsert all remaining names (stale or missing) in one batch per zone
//!
//! Failures are isolated per zone: a zone that cannot be found, listed or
//! written is reported and the remaining zones still run.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::model::{AddressSet, ChangeSet, DesiredRecord, DesiredState};
use crate::traits::RecordStore;

/// Outcome of reconciling one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneOutcome {
    /// Every name already had the desired values and TTL
    UpToDate,
    /// These names were upserted
    Updated(BTreeSet<String>),
}

/// Result of one reconciliation pass over all zones
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Names upserted per zone
    pub applied: ChangeSet,
    /// Zones that needed no write
    pub up_to_date: Vec<String>,
    /// Zones that failed, with the reason
    pub failures: BTreeMap<String, Error>,
}

impl ReconcileReport {
    /// Whether every zone was reconciled
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Diffs desired records against a [`RecordStore`] and applies the minimum
pub struct Reconciler {
    store: Box<dyn RecordStore>,
}

impl Reconciler {
    /// Create a reconciler over `store`
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Name of the underlying record store
    pub fn provider_name(&self) -> &'static str {
        self.store.provider_name()
    }

    /// Reconcile every zone in `desired` against `addresses` and `ttl`
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
        ttl: u32,
        addresses: &AddressSet,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (zone, names) in desired.zones() {
            match self.reconcile_zone(zone, names, ttl, addresses).await {
                Ok(ZoneOutcome::UpToDate) => {
                    report.up_to_date.push(zone.to_string());
                }
                Ok(ZoneOutcome::Updated(updated)) => {
                    report.applied.insert(zone, updated);
                }
                Err(e) => {
                    error!("Failed to reconcile zone {}: {}", zone, e);
                    report.failures.insert(zone.to_string(), e);
                }
            }
        }

        report
    }

    /// Reconcile a single zone
    ///
    /// `names` must be fully qualified (see [`crate::model::fqdn`]).
    pub async fn reconcile_zone(
        &self,
        zone: &str,
        names: &BTreeSet<String>,
        ttl: u32,
        addresses: &AddressSet,
    ) -> Result<ZoneOutcome> {
        let zone_id = self
            .store
            .find_zone_id(zone)
            .await
            .map_err(|e| match e {
                Error::NotFound(message) => Error::zone_lookup(zone, message),
                other => other,
            })?;
        debug!("Zone {} has id {}", zone, zone_id);

        let pending = self.pending_names(&zone_id, names, ttl, addresses).await?;
        if pending.is_empty() {
            debug!("Zone {} is up to date", zone);
            return Ok(ZoneOutcome::UpToDate);
        }

        let records: Vec<_> = pending
            .iter()
            .map(|name| {
                DesiredRecord {
                    zone: zone.to_string(),
                    name: name.clone(),
                    ttl,
                    addresses: addresses.clone(),
                }
                .to_zone_record()
            })
            .collect();

        info!("Updating {} names {:?} to {}", zone, pending, addresses);
        debug!("Changes {:?}", records);

        self.store
            .upsert_records(&zone_id, &records)
            .await
            .map_err(|e| Error::update(zone, pending.iter().cloned(), e.to_string()))?;

        Ok(ZoneOutcome::Updated(pending))
    }

    /// Names in `names` whose A record is missing or differs from the target
    async fn pending_names(
        &self,
        zone_id: &str,
        names: &BTreeSet<String>,
        ttl: u32,
        addresses: &AddressSet,
    ) -> Result<BTreeSet<String>> {
        let mut pending = names.clone();
        if pending.is_empty() {
            return Ok(pending);
        }
        let mut token = None;

        loop {
            let page = self.store.list_records(zone_id, token.as_ref()).await?;

            for record in page.records.iter().filter(|r| r.is_a()) {
                let name = record.name.to_ascii_lowercase();
                if !pending.contains(&name) {
                    continue;
                }
                if record.matches(addresses, ttl) {
                    debug!("{} still good", name);
                    pending.remove(&name);
                    if pending.is_empty() {
                        return Ok(pending);
                    }
                } else {
                    info!(
                        "Old record found for {}: {:?} TTL: {} (want {} TTL: {})",
                        name, record.values, record.ttl, addresses, ttl
                    );
                }
            }

            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(pending),
            }
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store.provider_name())
            .finish()
    }
}
