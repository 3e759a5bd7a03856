//! Data model shared by the resolver pool, the reconciler and record stores
//!
//! - [`AddressSet`]: the host's current public IPv4 addresses
//! - [`DesiredState`] / [`DesiredRecord`]: what the zones should contain
//! - [`ZoneRecord`] / [`RecordPage`]: what a record store reports and accepts
//! - [`ChangeSet`]: names upserted during one reconciliation pass

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::config::ZoneNames;

/// Record type managed by this system
pub const RECORD_TYPE_A: &str = "A";

/// Sorted, deduplicated set of IPv4 address strings
///
/// Ordering is lexicographic on the textual form (`"10.0.0.10"` sorts before
/// `"10.0.0.9"`). Record values are compared against [`AddressSet::values`]
/// verbatim, so this ordering must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct AddressSet(Vec<String>);

impl AddressSet {
    /// Build from resolved addresses
    pub fn from_addrs(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        addrs.into_iter().map(|addr| addr.to_string()).collect()
    }

    /// Address strings in comparison order
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Number of distinct addresses
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no address was discovered
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check membership by textual form
    pub fn contains(&self, addr: &str) -> bool {
        self.0.binary_search_by(|v| v.as_str().cmp(addr)).is_ok()
    }
}

impl<S: Into<String>> FromIterator<S> for AddressSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let set: BTreeSet<String> = iter.into_iter().map(Into::into).collect();
        Self(set.into_iter().collect())
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Fully-qualified record name for `name` inside `zone`
///
/// `@` or an empty name denotes the zone apex. The result is lower-cased and
/// always carries exactly one trailing dot.
pub fn fqdn(name: &str, zone: &str) -> String {
    let zone = zone.trim_end_matches('.');
    let qualified = match name.trim_end_matches('.') {
        "" | "@" => format!("{zone}."),
        name => format!("{name}.{zone}."),
    };
    qualified.to_ascii_lowercase()
}

/// Desired record names per zone, derived from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    zones: BTreeMap<String, BTreeSet<String>>,
}

impl DesiredState {
    /// Build from the configured `zone -> name | [names]` mapping
    pub fn from_zones(zones: &BTreeMap<String, ZoneNames>) -> Self {
        let zones = zones
            .iter()
            .map(|(zone, names)| {
                let names = names.iter().map(|name| fqdn(name, zone)).collect();
                (zone.clone(), names)
            })
            .collect();
        Self { zones }
    }

    /// Add a single name (mostly useful for embedding and tests)
    pub fn with_name(mut self, zone: impl Into<String>, name: &str) -> Self {
        let zone = zone.into();
        let qualified = fqdn(name, &zone);
        self.zones.entry(zone).or_default().insert(qualified);
        self
    }

    /// Iterate `(zone, fully-qualified names)`
    pub fn zones(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.zones.iter().map(|(zone, names)| (zone.as_str(), names))
    }

    /// Number of zones
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Every fully-qualified name across all zones
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.zones.values().flatten().map(String::as_str)
    }

    /// Expand into concrete records for one cycle
    pub fn records(&self, ttl: u32, addresses: &AddressSet) -> Vec<DesiredRecord> {
        self.zones()
            .flat_map(|(zone, names)| {
                names.iter().map(move |name| DesiredRecord {
                    zone: zone.to_string(),
                    name: name.clone(),
                    ttl,
                    addresses: addresses.clone(),
                })
            })
            .collect()
    }
}

/// A single A record the zone should hold this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    /// Zone name as configured
    pub zone: String,
    /// Fully-qualified record name (trailing dot)
    pub name: String,
    /// TTL in seconds
    pub ttl: u32,
    /// Addresses the record should resolve to
    pub addresses: AddressSet,
}

impl DesiredRecord {
    /// Convert into the record store's upsert shape
    pub fn to_zone_record(&self) -> ZoneRecord {
        ZoneRecord {
            name: self.name.clone(),
            record_type: RECORD_TYPE_A.to_string(),
            ttl: self.ttl,
            values: self.addresses.values().to_vec(),
        }
    }
}

/// A record set as listed from, or written to, an authoritative zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Fully-qualified name (trailing dot)
    pub name: String,
    /// Record type (`A`, `AAAA`, `MX`, ...)
    pub record_type: String,
    /// TTL in seconds
    pub ttl: u32,
    /// Record values in provider order
    pub values: Vec<String>,
}

impl ZoneRecord {
    /// Create an A record set
    pub fn a(
        name: impl Into<String>,
        ttl: u32,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: RECORD_TYPE_A.to_string(),
            ttl,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this is an A record
    pub fn is_a(&self) -> bool {
        self.record_type.eq_ignore_ascii_case(RECORD_TYPE_A)
    }

    /// Whether the record already holds exactly `addresses` with `ttl`
    pub fn matches(&self, addresses: &AddressSet, ttl: u32) -> bool {
        self.ttl == ttl && self.values.as_slice() == addresses.values()
    }
}

/// Opaque continuation cursor for record listings
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(pub String);

/// One page of a zone listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    /// Records on this page
    pub records: Vec<ZoneRecord>,
    /// Cursor for the next page, `None` when the listing is exhausted
    pub next: Option<PageToken>,
}

/// Names upserted per zone during one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    zones: BTreeMap<String, BTreeSet<String>>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `names` in `zone` were upserted
    pub fn insert(&mut self, zone: impl Into<String>, names: impl IntoIterator<Item = String>) {
        self.zones.entry(zone.into()).or_default().extend(names);
    }

    /// Names upserted in `zone`
    pub fn names(&self, zone: &str) -> Option<&BTreeSet<String>> {
        self.zones.get(zone)
    }

    /// Zones that received an upsert
    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// Whether nothing was upserted
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Total upserted names across zones
    pub fn name_count(&self) -> usize {
        self.zones.values().map(BTreeSet::len).sum()
    }
}
