//! Generic sub-entities composed by every envelope
//!
//! Each record is closed: unknown keys are rejected. Optional fields
//! serialize as explicit `null`, sequences are always present.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::decode::{Decode, FieldPath, Fields, ViolationKind, ViolationReport};
use crate::deserialize_via_decode;
use crate::types::{RawOutputFormat, Severity, SupportedMimeType, ValidatorType};

/// Default execution budget in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 3600;

// ============================================================================
// Identities
// ============================================================================

/// Which validator runs the job; `validator_type` selects the family schema.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidatorIdentity {
    pub id: String,
    #[serde(rename = "type")]
    pub validator_type: ValidatorType,
    pub version: String,
}

impl ValidatorIdentity {
    pub fn new(id: impl Into<String>, validator_type: ValidatorType, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            validator_type,
            version: version.into(),
        }
    }
}

impl Decode for ValidatorIdentity {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let id = f.required("id", "string");
        let validator_type = f.required("type", "string");
        let version = f.required("version", "string");
        f.finish();
        Some(Self {
            id: id?,
            validator_type: validator_type?,
            version: version?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct OrganizationIdentity {
    pub id: String,
    pub name: String,
}

impl OrganizationIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Decode for OrganizationIdentity {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let id = f.required("id", "string");
        let name = f.required("name", "string");
        f.finish();
        Some(Self { id: id?, name: name? })
    }
}

/// Workflow step a job originated from.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct WorkflowIdentity {
    pub id: String,
    pub step_id: String,
    pub step_name: Option<String>,
}

impl WorkflowIdentity {
    pub fn new(id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_id: step_id.into(),
            step_name: None,
        }
    }

    pub fn with_step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }
}

impl Decode for WorkflowIdentity {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let id = f.required("id", "string");
        let step_id = f.required("step_id", "string");
        let step_name = f.optional("step_name", "string");
        f.finish();
        Some(Self {
            id: id?,
            step_id: step_id?,
            step_name: step_name?,
        })
    }
}

// ============================================================================
// Files
// ============================================================================

/// A user-submitted file. `role` is interpreted by the consuming family.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FileReference {
    pub name: String,
    pub mime_type: SupportedMimeType,
    pub role: Option<String>,
    /// Storage location; any non-empty URI or path form.
    pub uri: String,
}

impl FileReference {
    pub fn new(name: impl Into<String>, mime_type: SupportedMimeType, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            role: None,
            uri: uri.into(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

impl Decode for FileReference {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let name = f.required("name", "string");
        let mime_type = f.enumerated("mime_type");
        let role = f.optional("role", "string");
        let uri = f.non_empty("uri");
        f.finish();
        Some(Self {
            name: name?,
            mime_type: mime_type?,
            role: role?,
            uri: uri?,
        })
    }
}

/// Admin-managed auxiliary file, reusable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ResourceReference {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub uri: String,
}

impl ResourceReference {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            uri: uri.into(),
        }
    }
}

impl Decode for ResourceReference {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let id = f.required("id", "string");
        let resource_type = f.required("type", "string");
        let uri = f.non_empty("uri");
        f.finish();
        Some(Self {
            id: id?,
            resource_type: resource_type?,
            uri: uri?,
        })
    }
}

// ============================================================================
// Execution context
// ============================================================================

/// How and where a job executes.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ExecutionContext {
    /// Idempotency token echoed by the eventual callback.
    pub callback_id: Option<String>,
    /// http or https endpoint receiving the callback.
    pub callback_url: Option<Url>,
    #[schemars(default)]
    pub skip_callback: bool,
    /// Root of all job I/O for this run.
    pub execution_bundle_uri: String,
    /// Declared budget, enforced by the executor.
    #[schemars(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[schemars(default)]
    pub tags: Vec<String>,
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl ExecutionContext {
    pub fn new(execution_bundle_uri: impl Into<String>) -> Self {
        Self {
            callback_id: None,
            callback_url: None,
            skip_callback: false,
            execution_bundle_uri: execution_bundle_uri.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            tags: Vec::new(),
        }
    }

    pub fn with_callback(mut self, url: Url, callback_id: Option<String>) -> Self {
        self.callback_url = Some(url);
        self.callback_id = callback_id;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: i64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

fn http_url(f: &mut Fields<'_>, key: &'static str) -> Option<Option<Url>> {
    let raw: Option<String> = f.optional(key, "string")?;
    let Some(raw) = raw else {
        return Some(None);
    };
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(Some(url)),
        Ok(url) => {
            f.reject(key, format!("URL scheme '{}' is not http or https", url.scheme()));
            None
        }
        Err(e) => {
            f.reject(key, format!("invalid URL: {}", e));
            None
        }
    }
}

impl Decode for ExecutionContext {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let callback_id = f.optional("callback_id", "string");
        let callback_url = http_url(&mut f, "callback_url");
        let skip_callback = f.defaulted("skip_callback", "boolean", || false);
        let execution_bundle_uri = f.non_empty("execution_bundle_uri");
        let timeout_seconds = f.number_or("timeout_seconds", DEFAULT_TIMEOUT_SECONDS, None);
        let tags = f.defaulted("tags", "array of strings", Vec::new);
        f.finish();
        Some(Self {
            callback_id: callback_id?,
            callback_url: callback_url?,
            skip_callback: skip_callback?,
            execution_bundle_uri: execution_bundle_uri?,
            timeout_seconds: timeout_seconds?,
            tags: tags?,
        })
    }
}

// ============================================================================
// Messages and metrics
// ============================================================================

/// Anchors a message to a file and position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct MessageLocation {
    /// Matches a `FileReference::role` by convention.
    pub file_role: Option<String>,
    pub line: Option<i64>,
    pub column: Option<i64>,
    /// Path inside a structured document, e.g. a JSON pointer or XPath.
    pub path: Option<String>,
}

impl Decode for MessageLocation {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let file_role = f.optional("file_role", "string");
        let line = f.optional_number("line", None);
        let column = f.optional_number("column", None);
        let location_path = f.optional("path", "string");
        f.finish();
        Some(Self {
            file_role: file_role?,
            line: line?,
            column: column?,
            path: location_path?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub code: Option<String>,
    pub text: String,
    pub location: Option<MessageLocation>,
    #[schemars(default)]
    pub tags: Vec<String>,
}

impl ValidationMessage {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            text: text.into(),
            location: None,
            tags: Vec::new(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn at(mut self, location: MessageLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl Decode for ValidationMessage {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let severity = f.enumerated("severity");
        let code = f.optional("code", "string");
        let text = f.required("text", "string");
        let location = f.optional_record("location");
        let tags = f.defaulted("tags", "array of strings", Vec::new);
        f.finish();
        Some(Self {
            severity: severity?,
            code: code?,
            text: text?,
            location: location?,
            tags: tags?,
        })
    }
}

/// Metric value: integer, float or string.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl Decode for MetricValue {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        match value {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Some(Self::Integer(i)),
                (None, Some(x)) => Some(Self::Float(x)),
                (None, None) => {
                    report.push(
                        path.clone(),
                        ViolationKind::InvalidValue {
                            reason: format!("number {} is not representable", n),
                        },
                    );
                    None
                }
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => {
                report.push(
                    path.clone(),
                    ViolationKind::WrongType {
                        expected: "number or string",
                    },
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidationMetric {
    pub name: String,
    pub value: MetricValue,
    pub unit: Option<String>,
    pub category: Option<String>,
    #[schemars(default)]
    pub tags: Vec<String>,
}

impl ValidationMetric {
    pub fn new(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
            category: None,
            tags: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

impl Decode for ValidationMetric {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let name = f.required("name", "string");
        let metric_value = f.record("value");
        let unit = f.optional("unit", "string");
        let category = f.optional("category", "string");
        let tags = f.defaulted("tags", "array of strings", Vec::new);
        f.finish();
        Some(Self {
            name: name?,
            value: metric_value?,
            unit: unit?,
            category: category?,
            tags: tags?,
        })
    }
}

// ============================================================================
// Artifacts, raw outputs, timing
// ============================================================================

/// A file produced by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidationArtifact {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub mime_type: Option<String>,
    pub uri: String,
    pub size_bytes: Option<i64>,
}

impl ValidationArtifact {
    pub fn new(name: impl Into<String>, artifact_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact_type: artifact_type.into(),
            mime_type: None,
            uri: uri.into(),
            size_bytes: None,
        }
    }
}

impl Decode for ValidationArtifact {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let name = f.required("name", "string");
        let artifact_type = f.required("type", "string");
        let mime_type = f.optional("mime_type", "string");
        let uri = f.non_empty("uri");
        let size_bytes = f.optional_number("size_bytes", None);
        f.finish();
        Some(Self {
            name: name?,
            artifact_type: artifact_type?,
            mime_type: mime_type?,
            uri: uri?,
            size_bytes: size_bytes?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct RawOutputs {
    pub format: RawOutputFormat,
    pub manifest_uri: String,
}

impl Decode for RawOutputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let format = f.enumerated("format");
        let manifest_uri = f.non_empty("manifest_uri");
        f.finish();
        Some(Self {
            format: format?,
            manifest_uri: manifest_uri?,
        })
    }
}

/// Lifecycle timestamps. No ordering between them is enforced; any may be
/// null when the event never happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ValidationTiming {
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Decode for ValidationTiming {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let queued_at = f.optional("queued_at", "RFC 3339 timestamp");
        let started_at = f.optional("started_at", "RFC 3339 timestamp");
        let finished_at = f.optional("finished_at", "RFC 3339 timestamp");
        f.finish();
        Some(Self {
            queued_at: queued_at?,
            started_at: started_at?,
            finished_at: finished_at?,
        })
    }
}

deserialize_via_decode!(
    ValidatorIdentity,
    OrganizationIdentity,
    WorkflowIdentity,
    FileReference,
    ResourceReference,
    ExecutionContext,
    MessageLocation,
    ValidationMessage,
    MetricValue,
    ValidationMetric,
    ValidationArtifact,
    RawOutputs,
    ValidationTiming,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- File references --

    #[test]
    fn test_file_reference_accepts_any_uri_form() {
        for uri in ["gs://bucket/model.idf", "file:///tmp/model.idf", "/tmp/model.idf"] {
            let file = FileReference::decode(&json!({
                "name": "model.idf",
                "mime_type": "application/vnd.energyplus.idf",
                "uri": uri
            }))
            .unwrap();
            assert_eq!(file.uri, uri);
            assert_eq!(file.role, None);
        }
    }

    #[test]
    fn test_file_reference_rejects_extra_field_and_empty_uri() {
        let report = FileReference::decode(&json!({
            "name": "model.idf",
            "mime_type": "application/vnd.energyplus.idf",
            "uri": "",
            "extra_field": 1
        }))
        .unwrap_err();
        assert_eq!(report.at("extra_field").unwrap().reason(), "unknown_field");
        assert_eq!(report.at("uri").unwrap().reason(), "invalid_value");
    }

    #[test]
    fn test_file_reference_rejects_unknown_mime() {
        let report = FileReference::decode(&json!({
            "name": "a.pdf",
            "mime_type": "application/pdf",
            "uri": "gs://b/a.pdf"
        }))
        .unwrap_err();
        assert_eq!(report.at("mime_type").unwrap().reason(), "invalid_enum");
    }

    // -- Execution context --

    #[test]
    fn test_execution_context_defaults() {
        let context = ExecutionContext::decode(&json!({
            "execution_bundle_uri": "gs://bucket/runs/1/"
        }))
        .unwrap();
        assert_eq!(context, ExecutionContext::new("gs://bucket/runs/1/"));
        assert_eq!(context.timeout_seconds, 3600);
        assert!(!context.skip_callback);
        assert!(context.tags.is_empty());
    }

    #[test]
    fn test_execution_context_requires_bundle_uri() {
        let report = ExecutionContext::decode(&json!({"callback_id": "cb-1"})).unwrap_err();
        assert_eq!(
            report.at("execution_bundle_uri").unwrap().kind,
            ViolationKind::Missing
        );
    }

    #[test]
    fn test_callback_url_must_be_http() {
        let ok = ExecutionContext::decode(&json!({
            "callback_url": "https://orchestrator.example.com/callbacks/",
            "execution_bundle_uri": "gs://b/r/"
        }))
        .unwrap();
        assert_eq!(ok.callback_url.unwrap().host_str(), Some("orchestrator.example.com"));

        for bad in ["ftp://example.com/cb", "not a url"] {
            let report = ExecutionContext::decode(&json!({
                "callback_url": bad,
                "execution_bundle_uri": "gs://b/r/"
            }))
            .unwrap_err();
            assert_eq!(report.at("callback_url").unwrap().reason(), "invalid_value");
        }
    }

    #[test]
    fn test_execution_context_serializes_nulls() {
        let encoded = serde_json::to_value(ExecutionContext::new("gs://b/r/")).unwrap();
        assert_eq!(encoded["callback_id"], Value::Null);
        assert_eq!(encoded["callback_url"], Value::Null);
        assert_eq!(encoded["tags"], json!([]));
    }

    // -- Messages and metrics --

    #[test]
    fn test_message_rejects_fatal_severity_and_extra_field() {
        let report = ValidationMessage::decode(&json!({
            "severity": "fatal",
            "text": "boom",
            "extra_field": true
        }))
        .unwrap_err();
        assert_eq!(report.at("severity").unwrap().reason(), "invalid_enum");
        assert_eq!(report.at("extra_field").unwrap().reason(), "unknown_field");
    }

    #[test]
    fn test_message_nested_location_paths() {
        let report = ValidationMessage::decode(&json!({
            "severity": "ERROR",
            "text": "bad",
            "location": {"line": "ten", "col": 3}
        }))
        .unwrap_err();
        assert_eq!(report.at("location.line").unwrap().reason(), "wrong_type");
        assert_eq!(report.at("location.col").unwrap().reason(), "unknown_field");
    }

    #[test]
    fn test_metric_value_variants() {
        let int = ValidationMetric::decode(&json!({"name": "zones", "value": 12})).unwrap();
        assert_eq!(int.value, MetricValue::Integer(12));
        let float = ValidationMetric::decode(&json!({"name": "eui", "value": 51.5})).unwrap();
        assert_eq!(float.value, MetricValue::Float(51.5));
        let text = ValidationMetric::decode(&json!({"name": "grade", "value": "A"})).unwrap();
        assert_eq!(text.value, MetricValue::Text("A".into()));

        let report = ValidationMetric::decode(&json!({"name": "x", "value": [1]})).unwrap_err();
        assert_eq!(report.at("value").unwrap().reason(), "wrong_type");
    }

    // -- Timing and raw outputs --

    #[test]
    fn test_timing_is_unconstrained() {
        let timing = ValidationTiming::decode(&json!({
            "queued_at": "2024-05-01T12:00:00Z",
            "started_at": "2024-05-01T11:00:00Z",
            "finished_at": null
        }))
        .unwrap();
        assert!(timing.started_at < timing.queued_at);
        assert_eq!(timing.finished_at, None);
        assert_eq!(ValidationTiming::decode(&json!({})).unwrap(), ValidationTiming::default());
    }

    #[test]
    fn test_timing_rejects_garbage_timestamp() {
        let report = ValidationTiming::decode(&json!({"queued_at": "yesterday"})).unwrap_err();
        assert_eq!(report.at("queued_at").unwrap().reason(), "wrong_type");
    }

    #[test]
    fn test_raw_outputs_format() {
        let raw = RawOutputs::decode(&json!({"format": "archive", "manifest_uri": "gs://b/m.json"}))
            .unwrap();
        assert_eq!(raw.format, RawOutputFormat::Archive);
        let report =
            RawOutputs::decode(&json!({"format": "tarball", "manifest_uri": "gs://b/m.json"}))
                .unwrap_err();
        assert_eq!(report.at("format").unwrap().reason(), "invalid_enum");
    }

    #[test]
    fn test_serde_from_str_uses_same_rules() {
        let err = serde_json::from_str::<WorkflowIdentity>(r#"{"id": "w", "step_id": "s", "x": 1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("x: unknown field"));
    }
}
