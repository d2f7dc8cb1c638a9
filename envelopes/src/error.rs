//! Contract error types
//!
//! Three failure classes exist. Malformed envelopes (`Schema`) and malformed
//! family payloads (`UnknownFamily`, `FamilyPayload`, `FamilyMismatch`) are
//! errors of this crate. Business failures are not: an output envelope with
//! `status = failed_runtime` is a valid document.

use thiserror::Error;

use crate::decode::{Violation, ViolationReport};
use crate::registry::Family;
use crate::types::ValidatorType;

/// Result type alias for contract operations
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors raised while reading, dispatching or storing envelopes
#[derive(Error, Debug)]
pub enum ContractError {
    /// Text is not JSON at all
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Text exceeds the configured size limit
    #[error("Document of {size} bytes exceeds limit of {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },

    /// Envelope-level schema violations
    #[error("Envelope rejected: {violations}")]
    Schema { violations: ViolationReport },

    /// `validator.type` names no registered family. Base envelope
    /// violations found in the same document ride along in `envelope`.
    #[error("No family registered for validator type '{validator_type}'")]
    UnknownFamily {
        validator_type: ValidatorType,
        envelope: ViolationReport,
    },

    /// Caller expected one family, document names another
    #[error("Expected a {expected} envelope, document names validator type '{found}'")]
    FamilyMismatch {
        expected: Family,
        found: ValidatorType,
    },

    /// The family payload failed its schema. Envelope violations found in
    /// the same pass ride along in `envelope`.
    #[error("{family} payload rejected: {payload}")]
    FamilyPayload {
        family: Family,
        payload: ViolationReport,
        envelope: ViolationReport,
    },

    /// Storage collaborator failure
    #[error("Storage error at {uri}: {message}")]
    Storage { uri: String, message: String },
}

impl ContractError {
    /// Create a schema error
    pub fn schema(violations: ViolationReport) -> Self {
        Self::Schema { violations }
    }

    /// Create a storage error
    pub fn storage(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedJson(_) => "MALFORMED_JSON",
            Self::DocumentTooLarge { .. } => "DOCUMENT_TOO_LARGE",
            Self::Schema { .. } => "SCHEMA_VIOLATION",
            Self::UnknownFamily { .. } => "UNKNOWN_FAMILY",
            Self::FamilyMismatch { .. } => "FAMILY_MISMATCH",
            Self::FamilyPayload { .. } => "FAMILY_PAYLOAD_VIOLATION",
            Self::Storage { .. } => "STORAGE",
        }
    }

    /// Whether the document itself was rejected (as opposed to I/O failure)
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage { .. })
    }

    /// Every collected violation. Envelope-level violations precede payload ones.
    pub fn violations(&self) -> Vec<&Violation> {
        match self {
            Self::Schema { violations } | Self::UnknownFamily { envelope: violations, .. } => {
                violations.iter().collect()
            }
            Self::FamilyPayload {
                payload, envelope, ..
            } => envelope.iter().chain(payload.iter()).collect(),
            _ => Vec::new(),
        }
    }

    /// Consume the error, keeping only its collected violations.
    pub fn into_report(self) -> ViolationReport {
        match self {
            Self::Schema { violations } | Self::UnknownFamily { envelope: violations, .. } => violations,
            Self::FamilyPayload {
                payload,
                mut envelope,
                ..
            } => {
                envelope.extend(payload);
                envelope
            }
            _ => ViolationReport::default(),
        }
    }
}

impl From<ViolationReport> for ContractError {
    fn from(violations: ViolationReport) -> Self {
        Self::Schema { violations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{FieldPath, ViolationKind};

    fn report(paths: &[&str]) -> ViolationReport {
        let mut report = ViolationReport::default();
        for path in paths {
            report.push(FieldPath::root().key(path), ViolationKind::Missing);
        }
        report
    }

    #[test]
    fn test_codes_are_distinct() {
        let schema = ContractError::schema(report(&["run_id"]));
        let unknown = ContractError::UnknownFamily {
            validator_type: ValidatorType::Basic,
            envelope: ViolationReport::default(),
        };
        let payload = ContractError::FamilyPayload {
            family: Family::Fmu,
            payload: report(&["inputs"]),
            envelope: ViolationReport::default(),
        };
        assert_eq!(schema.code(), "SCHEMA_VIOLATION");
        assert_eq!(unknown.code(), "UNKNOWN_FAMILY");
        assert_eq!(payload.code(), "FAMILY_PAYLOAD_VIOLATION");
        assert_eq!(ContractError::storage("mem://x", "gone").code(), "STORAGE");
    }

    #[test]
    fn test_violations_merge_payload_and_envelope() {
        let err = ContractError::FamilyPayload {
            family: Family::EnergyPlus,
            payload: report(&["outputs"]),
            envelope: report(&["run_id"]),
        };
        let paths: Vec<String> = err.violations().iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, vec!["run_id", "outputs"]);
    }

    #[test]
    fn test_unknown_family_keeps_envelope_violations() {
        let err = ContractError::UnknownFamily {
            validator_type: ValidatorType::Unrecognized("CUSTOM".into()),
            envelope: report(&["run_id", "org"]),
        };
        assert_eq!(err.violations().len(), 2);
        let paths: Vec<String> = err.into_report().iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, vec!["run_id", "org"]);
    }

    #[test]
    fn test_display_lists_violations() {
        let err = ContractError::schema(report(&["run_id", "validator"]));
        let message = err.to_string();
        assert!(message.contains("run_id: field required"));
        assert!(message.contains("validator: field required"));
        assert!(!ContractError::storage("mem://x", "gone").is_rejection());
    }
}
