//! Storage boundary
//!
//! Envelopes travel as documents at rest (`input.json`, `output.json`) under
//! the run's `execution_bundle_uri`. This module defines the collaborator
//! interface and helpers that move envelopes through it using the contract's
//! own encoder and decoders.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::config::ContractConfig;
use crate::error::{ContractError, ContractResult};
use crate::registry::{self, FamilyInputEnvelope, FamilyOutputEnvelope};

/// Conventional document name for the input envelope in a bundle.
pub const INPUT_DOCUMENT: &str = "input.json";

/// Conventional document name for the output envelope in a bundle.
pub const OUTPUT_DOCUMENT: &str = "output.json";

/// Location of a named document inside an execution bundle.
pub fn bundle_document_uri(execution_bundle_uri: &str, document: &str) -> String {
    format!("{}/{}", execution_bundle_uri.trim_end_matches('/'), document)
}

/// Object storage holding envelope documents.
pub trait StorageClient: Send + Sync {
    fn upload(&self, uri: &str, bytes: &[u8]) -> ContractResult<()>;

    fn download(&self, uri: &str) -> ContractResult<Vec<u8>>;
}

/// Write-once in-process store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(uri))
            .unwrap_or(false)
    }
}

impl StorageClient for InMemoryStorage {
    fn upload(&self, uri: &str, bytes: &[u8]) -> ContractResult<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| ContractError::storage(uri, "store lock poisoned"))?;
        if objects.contains_key(uri) {
            return Err(ContractError::storage(uri, "document already exists"));
        }
        objects.insert(uri.to_string(), bytes.to_vec());
        Ok(())
    }

    fn download(&self, uri: &str) -> ContractResult<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| ContractError::storage(uri, "store lock poisoned"))?;
        objects
            .get(uri)
            .cloned()
            .ok_or_else(|| ContractError::storage(uri, "no such document"))
    }
}

/// Encode `envelope` and upload it to `uri`.
pub fn store_envelope<T: Serialize>(client: &dyn StorageClient, uri: &str, envelope: &T) -> ContractResult<()> {
    let bytes = serde_json::to_vec_pretty(envelope)?;
    debug!(uri, bytes = bytes.len(), "storing envelope");
    client.upload(uri, &bytes)
}

fn download_text(client: &dyn StorageClient, uri: &str) -> ContractResult<String> {
    let bytes = client.download(uri)?;
    String::from_utf8(bytes).map_err(|e| ContractError::storage(uri, format!("document is not UTF-8: {}", e)))
}

/// Download and dispatch an input envelope.
pub fn load_input(client: &dyn StorageClient, uri: &str, config: &ContractConfig) -> ContractResult<FamilyInputEnvelope> {
    registry::parse_input_str(&download_text(client, uri)?, config)
}

/// Download and dispatch an output envelope.
pub fn load_output(
    client: &dyn StorageClient,
    uri: &str,
    config: &ContractConfig,
) -> ContractResult<FamilyOutputEnvelope> {
    registry::parse_output_str(&download_text(client, uri)?, config)
}
