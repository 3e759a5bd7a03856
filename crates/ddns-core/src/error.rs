//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// No usable name server, or the discovery query failed
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A configured zone could not be found by the record store
    #[error("Zone lookup failed for {zone}: {message}")]
    ZoneLookup {
        /// Zone name as configured
        zone: String,
        /// Provider message
        message: String,
    },

    /// The record store rejected an upsert
    #[error("Update of {names:?} in zone {zone} failed: {message}")]
    Update {
        /// Zone name as configured
        zone: String,
        /// Fully-qualified names in the rejected batch
        names: Vec<String>,
        /// Provider message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a zone lookup error
    pub fn zone_lookup(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ZoneLookup {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create an update error for a rejected batch
    pub fn update(
        zone: impl Into<String>,
        names: impl IntoIterator<Item = String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Update {
            zone: zone.into(),
            names: names.into_iter().collect(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error stops discovery for the current cycle
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}
