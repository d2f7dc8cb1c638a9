//! Contract configuration
//!
//! Limits and fallbacks for the text entry points. Wire defaults such as
//! `timeout_seconds` are part of the contract and are never configurable.

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ContractResult};

/// Default upper bound for a single envelope document (16 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

/// Validator version stamped by constructors when the caller gives none.
pub const DEFAULT_VALIDATOR_VERSION: &str = "1.0.0";

/// Configuration for parsing and constructing envelopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Documents larger than this are rejected before parsing
    pub max_document_bytes: usize,

    /// Version used by job constructors without an explicit version
    pub default_validator_version: String,

    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            default_validator_version: DEFAULT_VALIDATOR_VERSION.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl ContractConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(max) = lookup("ENVELOPE_MAX_DOCUMENT_BYTES") {
            if let Ok(n) = max.parse() {
                config.max_document_bytes = n;
            }
        }
        if let Some(version) = lookup("ENVELOPE_DEFAULT_VALIDATOR_VERSION") {
            if !version.trim().is_empty() {
                config.default_validator_version = version;
            }
        }
        if let Some(filter) = lookup("ENVELOPE_LOG") {
            config.log_filter = filter;
        }

        config
    }

    /// Reject a document whose size exceeds `max_document_bytes`
    pub fn check_size(&self, text: &str) -> ContractResult<()> {
        if text.len() > self.max_document_bytes {
            return Err(ContractError::DocumentTooLarge {
                size: text.len(),
                limit: self.max_document_bytes,
            });
        }
        Ok(())
    }
}
