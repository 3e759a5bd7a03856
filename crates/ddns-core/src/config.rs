//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them from disk is the daemon's job; the core only consumes the
//! deserialized structures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::fqdn;

/// Largest TTL accepted by authoritative providers (RFC 2181)
pub const MAX_TTL_SECS: u64 = 2_147_483_647;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Bootstrap name-server hostnames used to build the resolver pool
    pub servers: Vec<String>,

    /// Name queried to discover this host's public address
    pub domain: String,

    /// Records to manage: zone name -> single name or list of names
    pub zones: BTreeMap<String, ZoneNames>,

    /// TTL written to managed records
    pub ttl: TimeSpec,

    /// Delay between reconciliation cycles
    pub interval: TimeSpec,

    /// Per-target log levels (e.g. `ddns_core::resolver: DEBUG`)
    #[serde(default)]
    pub log_levels: BTreeMap<String, String>,

    /// Record store configuration
    pub provider: ProviderConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("No bootstrap servers configured"));
        }
        for server in &self.servers {
            validate_domain_name(server)?;
        }

        if self.domain.trim().is_empty() {
            return Err(Error::config("Discovery domain cannot be empty"));
        }
        validate_domain_name(&self.domain)?;

        if self.zones.is_empty() {
            return Err(Error::config("No zones configured"));
        }
        for (zone, names) in &self.zones {
            validate_domain_name(zone)?;
            if names.is_empty() {
                return Err(Error::config(format!("Zone {zone} has no names configured")));
            }
            for name in names.iter() {
                validate_domain_name(&fqdn(name, zone))?;
            }
        }

        let ttl = self.ttl.as_secs()?;
        if ttl == 0 || ttl > MAX_TTL_SECS {
            return Err(Error::config(format!(
                "ttl must be between 1 and {MAX_TTL_SECS} seconds. Got: {ttl}"
            )));
        }

        if self.interval.as_secs()? == 0 {
            return Err(Error::config("interval must be at least 1 second"));
        }

        self.provider.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// Record TTL in seconds
    pub fn ttl_secs(&self) -> Result<u32> {
        let ttl = self.ttl.as_secs()?;
        u32::try_from(ttl).map_err(|_| Error::config(format!("ttl out of range: {ttl}")))
    }

    /// Delay between cycles
    pub fn interval(&self) -> Result<Duration> {
        self.interval.as_secs().map(Duration::from_secs)
    }
}

/// Names managed inside one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneNames {
    /// A single bare name
    Single(String),
    /// A list of bare names
    Many(Vec<String>),
}

impl ZoneNames {
    /// Iterate the bare names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let names: &[String] = match self {
            ZoneNames::Single(name) => std::slice::from_ref(name),
            ZoneNames::Many(names) => names,
        };
        names.iter().map(String::as_str)
    }

    /// Whether no name is configured
    pub fn is_empty(&self) -> bool {
        match self {
            ZoneNames::Single(_) => false,
            ZoneNames::Many(names) => names.is_empty(),
        }
    }
}

/// A span of time given as plain seconds or as duration components
///
/// ```yaml
/// ttl: 300
/// interval:
///   minutes: 5
///   seconds: 30
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Seconds (fractions are truncated)
    Seconds(f64),
    /// Duration components, summed
    Components(TimeComponents),
}

impl TimeSpec {
    /// Whole seconds, truncated toward zero
    pub fn as_secs(&self) -> Result<u64> {
        let secs = match self {
            TimeSpec::Seconds(secs) => *secs,
            TimeSpec::Components(parts) => parts.total_secs(),
        };
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::config(format!("Invalid time span: {secs}")));
        }
        // Truncation matches integer conversion of a fractional span
        Ok(secs.trunc() as u64)
    }
}

impl From<u64> for TimeSpec {
    fn from(secs: u64) -> Self {
        TimeSpec::Seconds(secs as f64)
    }
}

/// Duration components of a [`TimeSpec`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeComponents {
    pub weeks: f64,
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub milliseconds: f64,
    pub microseconds: f64,
}

impl TimeComponents {
    fn total_secs(&self) -> f64 {
        self.weeks * 604_800.0
            + self.days * 86_400.0
            + self.hours * 3_600.0
            + self.minutes * 60.0
            + self.seconds
            + self.milliseconds / 1_000.0
            + self.microseconds / 1_000_000.0
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// Cloudflare API token (usually supplied via environment)
        #[serde(default)]
        api_token: String,
        /// API base URL override
        #[serde(default)]
        base_url: Option<String>,
    },

    /// In-process store (dry runs and demos)
    Memory,

    /// Custom record store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Memory => Ok(()),
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Memory => "memory",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Per-query DNS timeout (in seconds)
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be > 0"));
        }
        if !(1..=60).contains(&self.query_timeout_secs) {
            return Err(Error::config(format!(
                "query_timeout_secs must be between 1 and 60. Got: {}",
                self.query_timeout_secs
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_query_timeout_secs() -> u64 {
    5
}

/// Validate that a string is a syntactically valid domain name
///
/// Basic RFC 1035 checks, with a trailing dot and `_`/`*` labels tolerated.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    let trimmed = domain.strip_suffix('.').unwrap_or(domain);

    if trimmed.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if trimmed.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            trimmed.len(),
            domain
        )));
    }

    for label in trimmed.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!("Domain name has empty label: '{domain}'")));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if label == "*" {
            continue;
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{label}'. \
                 Valid: alphanumeric, hyphen and underscore only."
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{label}'"
            )));
        }
    }

    Ok(())
}
