//! Completion callbacks
//!
//! The callback is the only message pushed over the network; everything else
//! is a document at rest. It is a hint: the output envelope at `result_uri`
//! is the source of truth and must exist before the callback is sent.
//!
//! Delivery is at-least-once. Receivers deduplicate on `callback_id` through
//! a [`CallbackLedger`].

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::decode::{Decode, FieldPath, Fields, ViolationReport};
use crate::deserialize_via_decode;
use crate::envelope::{OutputEnvelope, ResultsPayload};
use crate::records::ExecutionContext;
use crate::types::ValidationStatus;

/// Body POSTed to `ExecutionContext::callback_url` when a job ends.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidationCallback {
    pub run_id: String,
    /// Echo of `ExecutionContext::callback_id`.
    pub callback_id: Option<String>,
    pub status: ValidationStatus,
    /// Location of the output envelope.
    pub result_uri: String,
}

impl ValidationCallback {
    /// Callback announcing `output`, or `None` when the job asked to skip it.
    /// The idempotency token is copied verbatim from `context`.
    pub fn for_output<R: ResultsPayload>(
        output: &OutputEnvelope<R>,
        context: &ExecutionContext,
        result_uri: impl Into<String>,
    ) -> Option<Self> {
        if context.skip_callback {
            debug!(run_id = %output.run_id, "callback skipped by execution context");
            return None;
        }
        Some(Self {
            run_id: output.run_id.clone(),
            callback_id: context.callback_id.clone(),
            status: output.status,
            result_uri: result_uri.into(),
        })
    }
}

impl Decode for ValidationCallback {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let run_id = f.required("run_id", "string");
        let callback_id = f.optional("callback_id", "string");
        let status = f.enumerated("status");
        let result_uri = f.non_empty("result_uri");
        f.finish();
        Some(Self {
            run_id: run_id?,
            callback_id: callback_id?,
            status: status?,
            result_uri: result_uri?,
        })
    }
}

deserialize_via_decode!(ValidationCallback);

/// Outcome of recording one callback delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First delivery of this token; process it.
    Accepted,
    /// Token already seen; drop it.
    Duplicate,
}

/// Receiver-side record of processed callback tokens.
///
/// Callbacks without a `callback_id` cannot be deduplicated and are always
/// accepted.
#[derive(Debug, Default)]
pub struct CallbackLedger {
    seen: Mutex<HashSet<String>>,
}

impl CallbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, callback: &ValidationCallback) -> Delivery {
        let Some(token) = &callback.callback_id else {
            return Delivery::Accepted;
        };
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.insert(token.clone()) {
            info!(run_id = %callback.run_id, callback_id = %token, status = %callback.status, "callback accepted");
            Delivery::Accepted
        } else {
            debug!(run_id = %callback.run_id, callback_id = %token, "duplicate callback dropped");
            Delivery::Duplicate
        }
    }

    pub fn contains(&self, callback_id: &str) -> bool {
        match self.seen.lock() {
            Ok(seen) => seen.contains(callback_id),
            Err(poisoned) => poisoned.into_inner().contains(callback_id),
        }
    }

    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::BaseOutputEnvelope;
    use crate::records::{ValidationTiming, ValidatorIdentity};
    use crate::types::ValidatorType;
    use serde_json::json;
    use std::sync::Arc;

    fn output(status: ValidationStatus) -> BaseOutputEnvelope {
        BaseOutputEnvelope::new(
            "run-1",
            ValidatorIdentity::new("v-1", ValidatorType::Fmu, "1.0.0"),
            status,
            ValidationTiming::default(),
        )
    }

    fn context() -> ExecutionContext {
        let mut context = ExecutionContext::new("gs://bucket/runs/run-1/");
        context.callback_id = Some("cb-42".into());
        context
    }

    // -- Derivation --

    #[test]
    fn test_callback_echoes_token() {
        let callback = ValidationCallback::for_output(
            &output(ValidationStatus::Success),
            &context(),
            "gs://bucket/runs/run-1/output.json",
        )
        .unwrap();
        assert_eq!(callback.callback_id.as_deref(), Some("cb-42"));
        assert_eq!(callback.status, ValidationStatus::Success);
        assert_eq!(callback.run_id, "run-1");
    }

    #[test]
    fn test_skip_callback() {
        let mut context = context();
        context.skip_callback = true;
        assert!(ValidationCallback::for_output(&output(ValidationStatus::Cancelled), &context, "x").is_none());
    }

    // -- Wire form --

    #[test]
    fn test_callback_closed_schema() {
        let report = ValidationCallback::decode(&json!({
            "run_id": "run-1",
            "status": "success",
            "result_uri": "gs://b/o.json",
            "retry": 2
        }))
        .unwrap_err();
        assert_eq!(report.at("retry").unwrap().reason(), "unknown_field");

        let report = ValidationCallback::decode(&json!({"run_id": "run-1", "status": "done"})).unwrap_err();
        assert_eq!(report.at("status").unwrap().reason(), "invalid_enum");
        assert_eq!(report.at("result_uri").unwrap().reason(), "missing");
    }

    // -- Ledger --

    #[test]
    fn test_ledger_deduplicates_on_token() {
        let ledger = CallbackLedger::new();
        let callback = ValidationCallback::for_output(&output(ValidationStatus::Success), &context(), "u").unwrap();
        assert_eq!(ledger.record(&callback), Delivery::Accepted);
        assert_eq!(ledger.record(&callback), Delivery::Duplicate);
        assert!(ledger.contains("cb-42"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_ledger_accepts_tokenless_callbacks() {
        let ledger = CallbackLedger::new();
        let callback = ValidationCallback::for_output(
            &output(ValidationStatus::Success),
            &ExecutionContext::new("gs://b/r/"),
            "u",
        )
        .unwrap();
        assert_eq!(ledger.record(&callback), Delivery::Accepted);
        assert_eq!(ledger.record(&callback), Delivery::Accepted);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ledger_concurrent_redelivery_accepts_once() {
        let ledger = Arc::new(CallbackLedger::new());
        let callback = ValidationCallback::for_output(&output(ValidationStatus::Success), &context(), "u").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let callback = callback.clone();
                std::thread::spawn(move || ledger.record(&callback))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d == Delivery::Accepted)
            .count();
        assert_eq!(accepted, 1);
    }
}
