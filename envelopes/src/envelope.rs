//! Input and output envelopes
//!
//! One record type per envelope kind, generic over its payload slot:
//!
//! ```text
//! InputEnvelope<P>   inputs:  P          (base: open map, family: config model)
//! OutputEnvelope<R>  outputs: Option<R>  (base: open map or null, family: results model)
//! ```
//!
//! Every other field is identical across families. A family envelope can
//! always be viewed as a base envelope through `to_base()`.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::decode::{Decode, FieldPath, Fields, ViolationKind, ViolationReport};
use crate::error::{ContractError, ContractResult};
use crate::records::{
    ExecutionContext, FileReference, OrganizationIdentity, RawOutputs, ResourceReference,
    ValidationArtifact, ValidationMessage, ValidationMetric, ValidationTiming, ValidatorIdentity,
    WorkflowIdentity,
};
use crate::registry::Family;
use crate::types::{InputSchemaVersion, OutputSchemaVersion, Severity, ValidationStatus, ValidatorType};

/// Untyped payload used by the base envelopes.
pub type OpenMap = Map<String, Value>;

/// A type that may occupy the `inputs` slot.
pub trait InputPayload: Decode + Serialize + JsonSchema + Clone + fmt::Debug {
    /// Family that owns this payload; `None` for the base map.
    const FAMILY: Option<Family> = None;

    /// Payload used when `inputs` is absent. `None` makes the slot required.
    fn when_absent() -> Option<Self> {
        None
    }
}

/// A type that may occupy the `outputs` slot.
pub trait ResultsPayload: Decode + Serialize + JsonSchema + Clone + fmt::Debug {
    const FAMILY: Option<Family> = None;

    /// Whether `outputs` may be absent or null.
    const NULLABLE: bool;
}

impl InputPayload for OpenMap {
    fn when_absent() -> Option<Self> {
        Some(Map::new())
    }
}

impl ResultsPayload for OpenMap {
    const NULLABLE: bool = true;
}

/// Sort a rejected document's violations into envelope vs payload failures.
pub(crate) fn rejection(report: ViolationReport, slot: &str, family: Option<Family>) -> ContractError {
    let Some(family) = family else {
        return ContractError::schema(report);
    };
    let (payload, envelope) = report.partition_by_key(slot);
    if payload.is_empty() {
        ContractError::schema(envelope)
    } else {
        ContractError::FamilyPayload {
            family,
            payload,
            envelope,
        }
    }
}

/// A family-typed envelope only admits its own `validator.type`.
fn family_tag_matches(
    validator: Option<&ValidatorIdentity>,
    family: Option<Family>,
    path: &FieldPath,
    report: &mut ViolationReport,
) -> Option<()> {
    let (Some(identity), Some(family)) = (validator, family) else {
        return Some(());
    };
    if identity.validator_type == family.validator_type() {
        return Some(());
    }
    report.push(
        path.key("validator").key("type"),
        ViolationKind::InvalidValue {
            reason: format!(
                "{} envelope requires validator type '{}', got '{}'",
                family,
                family.validator_type(),
                identity.validator_type
            ),
        },
    );
    None
}

fn payload_as_map<T: Serialize>(payload: &T) -> ContractResult<OpenMap> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut report = ViolationReport::default();
            report.push(
                FieldPath::root(),
                ViolationKind::WrongType { expected: "object" },
            );
            tracing::warn!(payload = %other, "payload does not encode as an object");
            Err(ContractError::schema(report))
        }
    }
}

fn parse_json(text: &str) -> ContractResult<Value> {
    Ok(serde_json::from_str(text)?)
}

// ============================================================================
// Input envelope
// ============================================================================

/// The job document the orchestrator writes for an executor.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct InputEnvelope<P> {
    #[schemars(default)]
    pub schema_version: InputSchemaVersion,
    /// Correlates this input with its output.
    pub run_id: String,
    pub validator: ValidatorIdentity,
    pub org: OrganizationIdentity,
    pub workflow: WorkflowIdentity,
    #[schemars(default)]
    pub input_files: Vec<FileReference>,
    #[schemars(default)]
    pub resource_files: Vec<ResourceReference>,
    /// Family configuration; an open map in the base envelope.
    pub inputs: P,
    pub context: ExecutionContext,
}

/// Input envelope with an untyped `inputs` map.
pub type BaseInputEnvelope = InputEnvelope<OpenMap>;

impl<P: InputPayload> Decode for InputEnvelope<P> {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let schema_version = f.literal("schema_version", InputSchemaVersion::LITERAL);
        let run_id = f.required("run_id", "string");
        let validator: Option<ValidatorIdentity> = f.record("validator");
        let org = f.record("org");
        let workflow = f.record("workflow");
        let input_files = f.list("input_files");
        let resource_files = f.list("resource_files");
        let inputs = f.record_or("inputs", P::when_absent());
        let context = f.record("context");
        f.finish();
        let tagged = family_tag_matches(validator.as_ref(), P::FAMILY, path, report);
        schema_version?;
        tagged?;
        Some(Self {
            schema_version: InputSchemaVersion,
            run_id: run_id?,
            validator: validator?,
            org: org?,
            workflow: workflow?,
            input_files: input_files?,
            resource_files: resource_files?,
            inputs: inputs?,
            context: context?,
        })
    }
}

impl<'de, P: InputPayload> Deserialize<'de> for InputEnvelope<P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value).map_err(serde::de::Error::custom)
    }
}

impl<P: InputPayload> InputEnvelope<P> {
    /// Decode an already-parsed document.
    pub fn from_value(value: &Value) -> ContractResult<Self> {
        Self::decode(value).map_err(|report| rejection(report, "inputs", P::FAMILY))
    }

    pub fn from_json_str(text: &str) -> ContractResult<Self> {
        Self::from_value(&parse_json(text)?)
    }

    pub fn to_value(&self) -> ContractResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> ContractResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validator_type(&self) -> &ValidatorType {
        &self.validator.validator_type
    }

    /// First input file carrying `role`.
    pub fn file_by_role(&self, role: &str) -> Option<&FileReference> {
        self.input_files
            .iter()
            .find(|file| file.role.as_deref() == Some(role))
    }

    /// The same envelope with `inputs` re-encoded as an open map.
    pub fn to_base(&self) -> ContractResult<BaseInputEnvelope> {
        Ok(InputEnvelope {
            schema_version: InputSchemaVersion,
            run_id: self.run_id.clone(),
            validator: self.validator.clone(),
            org: self.org.clone(),
            workflow: self.workflow.clone(),
            input_files: self.input_files.clone(),
            resource_files: self.resource_files.clone(),
            inputs: payload_as_map(&self.inputs)?,
            context: self.context.clone(),
        })
    }

    /// Reinterpret `inputs` under another payload schema.
    pub fn narrow<Q: InputPayload>(&self) -> ContractResult<InputEnvelope<Q>> {
        InputEnvelope::<Q>::from_value(&self.to_value()?)
    }
}

// ============================================================================
// Output envelope
// ============================================================================

/// The result document an executor writes when a job ends.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct OutputEnvelope<R> {
    #[schemars(default)]
    pub schema_version: OutputSchemaVersion,
    pub run_id: String,
    pub validator: ValidatorIdentity,
    pub status: ValidationStatus,
    pub timing: ValidationTiming,
    #[schemars(default)]
    pub messages: Vec<ValidationMessage>,
    #[schemars(default)]
    pub metrics: Vec<ValidationMetric>,
    #[schemars(default)]
    pub artifacts: Vec<ValidationArtifact>,
    pub raw_outputs: Option<RawOutputs>,
    /// Family results; `None` when the executor produced none.
    pub outputs: Option<R>,
}

/// Output envelope with an untyped `outputs` map.
pub type BaseOutputEnvelope = OutputEnvelope<OpenMap>;

impl<R: ResultsPayload> Decode for OutputEnvelope<R> {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let schema_version = f.literal("schema_version", OutputSchemaVersion::LITERAL);
        let run_id = f.required("run_id", "string");
        let validator: Option<ValidatorIdentity> = f.record("validator");
        let status = f.enumerated("status");
        let timing = f.record("timing");
        let messages = f.list("messages");
        let metrics = f.list("metrics");
        let artifacts = f.list("artifacts");
        let raw_outputs = f.optional_record("raw_outputs");
        let outputs = f.nullable_record("outputs", R::NULLABLE);
        f.finish();
        let tagged = family_tag_matches(validator.as_ref(), R::FAMILY, path, report);
        schema_version?;
        tagged?;
        Some(Self {
            schema_version: OutputSchemaVersion,
            run_id: run_id?,
            validator: validator?,
            status: status?,
            timing: timing?,
            messages: messages?,
            metrics: metrics?,
            artifacts: artifacts?,
            raw_outputs: raw_outputs?,
            outputs: outputs?,
        })
    }
}

impl<'de, R: ResultsPayload> Deserialize<'de> for OutputEnvelope<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value).map_err(serde::de::Error::custom)
    }
}

impl<R: ResultsPayload> OutputEnvelope<R> {
    /// An envelope with empty message, metric and artifact lists and no results.
    pub fn new(
        run_id: impl Into<String>,
        validator: ValidatorIdentity,
        status: ValidationStatus,
        timing: ValidationTiming,
    ) -> Self {
        Self {
            schema_version: OutputSchemaVersion,
            run_id: run_id.into(),
            validator,
            status,
            timing,
            messages: Vec::new(),
            metrics: Vec::new(),
            artifacts: Vec::new(),
            raw_outputs: None,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: R) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn with_message(mut self, message: ValidationMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn from_value(value: &Value) -> ContractResult<Self> {
        Self::decode(value).map_err(|report| rejection(report, "outputs", R::FAMILY))
    }

    pub fn from_json_str(text: &str) -> ContractResult<Self> {
        Self::from_value(&parse_json(text)?)
    }

    pub fn to_value(&self) -> ContractResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> ContractResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validator_type(&self) -> &ValidatorType {
        &self.validator.validator_type
    }

    pub fn results(&self) -> Option<&R> {
        self.outputs.as_ref()
    }

    /// Whether any message carries `ERROR` severity.
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }

    /// The same envelope with `outputs` re-encoded as an open map.
    pub fn to_base(&self) -> ContractResult<BaseOutputEnvelope> {
        let outputs = match &self.outputs {
            Some(results) => Some(payload_as_map(results)?),
            None => None,
        };
        Ok(OutputEnvelope {
            schema_version: OutputSchemaVersion,
            run_id: self.run_id.clone(),
            validator: self.validator.clone(),
            status: self.status,
            timing: self.timing.clone(),
            messages: self.messages.clone(),
            metrics: self.metrics.clone(),
            artifacts: self.artifacts.clone(),
            raw_outputs: self.raw_outputs.clone(),
            outputs,
        })
    }

    /// Reinterpret `outputs` under another results schema.
    pub fn narrow<Q: ResultsPayload>(&self) -> ContractResult<OutputEnvelope<Q>> {
        OutputEnvelope::<Q>::from_value(&self.to_value()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input_doc() -> Value {
        json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "BASIC", "version": "1.0.0"},
            "org": {"id": "org-1", "name": "Acme"},
            "workflow": {"id": "wf-1", "step_id": "step-1"},
            "context": {"execution_bundle_uri": "gs://bucket/runs/run-1/"}
        })
    }

    fn output_doc() -> Value {
        json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "BASIC", "version": "1.0.0"},
            "status": "success",
            "timing": {}
        })
    }

    // -- Input envelope --

    #[test]
    fn test_base_input_defaults() {
        let envelope = BaseInputEnvelope::from_value(&input_doc()).unwrap();
        assert_eq!(envelope.schema_version.to_string(), "validibot.input.v1");
        assert!(envelope.inputs.is_empty());
        assert!(envelope.input_files.is_empty());
        assert!(envelope.resource_files.is_empty());
        assert_eq!(envelope.context.timeout_seconds, 3600);
        assert_eq!(envelope.workflow.step_name, None);
    }

    #[test]
    fn test_base_input_rejects_wrong_schema_version() {
        let mut doc = input_doc();
        doc["schema_version"] = json!("validibot.input.v2");
        let err = BaseInputEnvelope::from_value(&doc).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VIOLATION");
        assert_eq!(err.violations()[0].reason(), "invalid_literal");
    }

    #[test]
    fn test_base_input_collects_all_violations() {
        let doc = json!({
            "run_id": 7,
            "validator": {"id": "v-1", "type": "BASIC"},
            "org": {"id": "org-1", "name": "Acme"},
            "workflow": {"id": "wf-1", "step_id": "step-1"},
            "input_files": [
                {"name": "a", "mime_type": "text/xml", "uri": "gs://b/a"},
                {"name": "b", "mime_type": "text/xml", "uri": "gs://b/b", "extra_field": 1}
            ],
            "context": {},
            "surprise": true
        });
        let err = BaseInputEnvelope::from_value(&doc).unwrap_err();
        let paths: Vec<String> = err.violations().iter().map(|v| v.path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "run_id",
                "validator.version",
                "input_files[1].extra_field",
                "context.execution_bundle_uri",
                "surprise"
            ]
        );
    }

    #[test]
    fn test_base_input_accepts_unrecognized_validator_type() {
        let mut doc = input_doc();
        doc["validator"]["type"] = json!("THERMAL_COMFORT");
        let envelope = BaseInputEnvelope::from_value(&doc).unwrap();
        assert!(!envelope.validator_type().is_recognized());
    }

    #[test]
    fn test_input_encode_decode_stable() {
        let envelope = BaseInputEnvelope::from_value(&input_doc()).unwrap();
        let encoded = envelope.to_value().unwrap();
        assert_eq!(encoded["schema_version"], "validibot.input.v1");
        assert_eq!(encoded["inputs"], json!({}));
        assert_eq!(BaseInputEnvelope::from_value(&encoded).unwrap(), envelope);
    }

    #[test]
    fn test_file_by_role() {
        let mut doc = input_doc();
        doc["input_files"] = json!([
            {"name": "w.epw", "mime_type": "application/vnd.energyplus.epw", "role": "weather", "uri": "gs://b/w.epw"},
            {"name": "m.idf", "mime_type": "application/vnd.energyplus.idf", "role": "primary-model", "uri": "gs://b/m.idf"}
        ]);
        let envelope = BaseInputEnvelope::from_value(&doc).unwrap();
        assert_eq!(envelope.file_by_role("primary-model").unwrap().name, "m.idf");
        assert!(envelope.file_by_role("fmu").is_none());
    }

    // -- Output envelope --

    #[test]
    fn test_base_output_defaults() {
        let envelope = BaseOutputEnvelope::from_value(&output_doc()).unwrap();
        assert_eq!(envelope.outputs, None);
        assert!(envelope.messages.is_empty());
        assert_eq!(envelope.raw_outputs, None);
        assert!(!envelope.has_errors());
    }

    #[test]
    fn test_base_output_rejects_bad_status() {
        let mut doc = output_doc();
        doc["status"] = json!("bad-status");
        let err = BaseOutputEnvelope::from_value(&doc).unwrap_err();
        assert_eq!(err.violations()[0].path.to_string(), "status");
        assert_eq!(err.violations()[0].reason(), "invalid_enum");
    }

    #[test]
    fn test_base_output_requires_timing() {
        let mut doc = output_doc();
        doc.as_object_mut().unwrap().remove("timing");
        let err = BaseOutputEnvelope::from_value(&doc).unwrap_err();
        assert_eq!(err.violations()[0].path.to_string(), "timing");
    }

    #[test]
    fn test_failed_runtime_is_data_not_error() {
        let mut doc = output_doc();
        doc["status"] = json!("failed_runtime");
        doc["messages"] = json!([{"severity": "ERROR", "text": "engine crashed"}]);
        let envelope = BaseOutputEnvelope::from_value(&doc).unwrap();
        assert_eq!(envelope.status, ValidationStatus::FailedRuntime);
        assert!(envelope.has_errors());
    }

    #[test]
    fn test_output_builder_serializes_null_outputs() {
        let envelope = BaseOutputEnvelope::new(
            "run-1",
            ValidatorIdentity::new("v-1", ValidatorType::Basic, "1.0.0"),
            ValidationStatus::Cancelled,
            ValidationTiming::default(),
        )
        .with_message(ValidationMessage::new(Severity::Info, "cancelled by user"));
        let encoded = envelope.to_value().unwrap();
        assert_eq!(encoded["outputs"], Value::Null);
        assert_eq!(encoded["status"], "cancelled");
        assert_eq!(BaseOutputEnvelope::from_value(&encoded).unwrap(), envelope);
    }

    // -- Family tag --

    #[test]
    fn test_family_input_rejects_foreign_tag() {
        use crate::energyplus::EnergyPlusInputEnvelope;

        let mut doc = input_doc();
        doc["validator"]["type"] = json!("FMU");
        doc["inputs"] = json!({});

        let err = EnergyPlusInputEnvelope::from_value(&doc).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VIOLATION");
        assert_eq!(err.violations()[0].path.to_string(), "validator.type");
        assert_eq!(err.violations()[0].reason(), "invalid_value");

        let serde_err = serde_json::from_value::<EnergyPlusInputEnvelope>(doc.clone()).unwrap_err();
        assert!(serde_err.to_string().contains("validator.type"));

        let base = BaseInputEnvelope::from_value(&doc).unwrap();
        assert!(base.narrow::<crate::fmu::FmuInputs>().is_ok());
        assert!(base.narrow::<crate::energyplus::EnergyPlusInputs>().is_err());
    }

    #[test]
    fn test_family_output_rejects_foreign_tag() {
        use crate::fmu::FmuOutputEnvelope;

        let mut doc = output_doc();
        doc["validator"]["type"] = json!("ENERGYPLUS");
        let err = FmuOutputEnvelope::from_value(&doc).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].path.to_string(), "validator.type");

        doc["validator"]["type"] = json!("FMU");
        assert!(FmuOutputEnvelope::from_value(&doc).is_ok());
    }

    #[test]
    fn test_malformed_json_text() {
        let err = BaseOutputEnvelope::from_json_str("{not json").unwrap_err();
        assert_eq!(err.code(), "MALFORMED_JSON");
    }
}
