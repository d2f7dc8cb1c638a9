//! Family registry and dispatch
//!
//! A fixed table maps each validator type tag to the schemas that narrow
//! its `inputs` and `outputs`. The table is built at compile time and never
//! mutated. Dispatch reads `validator.type` from the raw document, selects
//! the family and decodes the whole envelope under that family's schema.
//!
//! ```text
//! raw ──peek validator.type──▶ FAMILIES lookup ──▶ family decode
//!            │                      │                    │
//!        missing/invalid       unregistered        payload vs envelope
//!            ▼                      ▼                    ▼
//!         Schema             UnknownFamily     FamilyPayload / Schema
//! ```

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::ContractConfig;
use crate::decode::{FieldPath, ViolationKind, ViolationReport};
use crate::energyplus::{EnergyPlusInputEnvelope, EnergyPlusOutputEnvelope};
use crate::envelope::{BaseInputEnvelope, BaseOutputEnvelope};
use crate::error::{ContractError, ContractResult};
use crate::fmu::{FmuInputEnvelope, FmuOutputEnvelope};
use crate::records::ExecutionContext;
use crate::types::{ValidationStatus, ValidatorType};

/// Executor families with a registered payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    EnergyPlus,
    Fmu,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::EnergyPlus, Family::Fmu];

    /// The `validator.type` tag this family answers to.
    pub fn validator_type(&self) -> ValidatorType {
        match self {
            Self::EnergyPlus => ValidatorType::EnergyPlus,
            Self::Fmu => ValidatorType::Fmu,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnergyPlus => "energyplus",
            Self::Fmu => "fmu",
        }
    }

    pub fn schema(&self) -> &'static FamilySchema {
        match self {
            Self::EnergyPlus => &FAMILIES[0],
            Self::Fmu => &FAMILIES[1],
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnergyPlus => write!(f, "EnergyPlus"),
            Self::Fmu => write!(f, "FMU"),
        }
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energyplus" => Ok(Self::EnergyPlus),
            "fmu" => Ok(Self::Fmu),
            other => Err(format!("unknown family '{}': expected energyplus or fmu", other)),
        }
    }
}

impl Serialize for Family {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Family envelopes
// ============================================================================

/// An input envelope decoded under its family's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyInputEnvelope {
    EnergyPlus(EnergyPlusInputEnvelope),
    Fmu(FmuInputEnvelope),
}

impl FamilyInputEnvelope {
    pub fn family(&self) -> Family {
        match self {
            Self::EnergyPlus(_) => Family::EnergyPlus,
            Self::Fmu(_) => Family::Fmu,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::EnergyPlus(envelope) => &envelope.run_id,
            Self::Fmu(envelope) => &envelope.run_id,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        match self {
            Self::EnergyPlus(envelope) => &envelope.context,
            Self::Fmu(envelope) => &envelope.context,
        }
    }

    pub fn to_base(&self) -> ContractResult<BaseInputEnvelope> {
        match self {
            Self::EnergyPlus(envelope) => envelope.to_base(),
            Self::Fmu(envelope) => envelope.to_base(),
        }
    }
}

impl Serialize for FamilyInputEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::EnergyPlus(envelope) => envelope.serialize(serializer),
            Self::Fmu(envelope) => envelope.serialize(serializer),
        }
    }
}

/// An output envelope decoded under its family's schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FamilyOutputEnvelope {
    EnergyPlus(EnergyPlusOutputEnvelope),
    Fmu(FmuOutputEnvelope),
}

impl FamilyOutputEnvelope {
    pub fn family(&self) -> Family {
        match self {
            Self::EnergyPlus(_) => Family::EnergyPlus,
            Self::Fmu(_) => Family::Fmu,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::EnergyPlus(envelope) => &envelope.run_id,
            Self::Fmu(envelope) => &envelope.run_id,
        }
    }

    pub fn status(&self) -> ValidationStatus {
        match self {
            Self::EnergyPlus(envelope) => envelope.status,
            Self::Fmu(envelope) => envelope.status,
        }
    }

    pub fn to_base(&self) -> ContractResult<BaseOutputEnvelope> {
        match self {
            Self::EnergyPlus(envelope) => envelope.to_base(),
            Self::Fmu(envelope) => envelope.to_base(),
        }
    }
}

impl Serialize for FamilyOutputEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::EnergyPlus(envelope) => envelope.serialize(serializer),
            Self::Fmu(envelope) => envelope.serialize(serializer),
        }
    }
}

// ============================================================================
// Registry table
// ============================================================================

/// Decoders for one family.
pub struct FamilySchema {
    pub family: Family,
    pub validator_type: ValidatorType,
    decode_input: fn(&Value) -> ContractResult<FamilyInputEnvelope>,
    decode_output: fn(&Value) -> ContractResult<FamilyOutputEnvelope>,
}

impl FamilySchema {
    pub fn decode_input(&self, raw: &Value) -> ContractResult<FamilyInputEnvelope> {
        (self.decode_input)(raw)
    }

    pub fn decode_output(&self, raw: &Value) -> ContractResult<FamilyOutputEnvelope> {
        (self.decode_output)(raw)
    }
}

impl fmt::Debug for FamilySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilySchema")
            .field("family", &self.family)
            .field("validator_type", &self.validator_type)
            .finish()
    }
}

fn energyplus_input(raw: &Value) -> ContractResult<FamilyInputEnvelope> {
    EnergyPlusInputEnvelope::from_value(raw).map(FamilyInputEnvelope::EnergyPlus)
}

fn energyplus_output(raw: &Value) -> ContractResult<FamilyOutputEnvelope> {
    EnergyPlusOutputEnvelope::from_value(raw).map(FamilyOutputEnvelope::EnergyPlus)
}

fn fmu_input(raw: &Value) -> ContractResult<FamilyInputEnvelope> {
    FmuInputEnvelope::from_value(raw).map(FamilyInputEnvelope::Fmu)
}

fn fmu_output(raw: &Value) -> ContractResult<FamilyOutputEnvelope> {
    FmuOutputEnvelope::from_value(raw).map(FamilyOutputEnvelope::Fmu)
}

/// Every registered family, in [`Family::ALL`] order.
pub static FAMILIES: [FamilySchema; 2] = [
    FamilySchema {
        family: Family::EnergyPlus,
        validator_type: ValidatorType::EnergyPlus,
        decode_input: energyplus_input,
        decode_output: energyplus_output,
    },
    FamilySchema {
        family: Family::Fmu,
        validator_type: ValidatorType::Fmu,
        decode_input: fmu_input,
        decode_output: fmu_output,
    },
];

/// Registered schema for a validator type tag.
pub fn lookup(validator_type: &ValidatorType) -> Option<&'static FamilySchema> {
    FAMILIES.iter().find(|schema| &schema.validator_type == validator_type)
}

// ============================================================================
// Dispatch
// ============================================================================

enum Tag {
    /// `validator.type` is absent or not a string.
    Unreadable,
    Found(ValidatorType),
}

fn peek_validator_type(raw: &Value) -> Tag {
    match raw
        .get("validator")
        .and_then(|validator| validator.get("type"))
        .and_then(Value::as_str)
    {
        Some(tag) => Tag::Found(ValidatorType::from_wire(tag)),
        None => Tag::Unreadable,
    }
}

/// Run the base decoder to explain why no family tag could be read.
fn untagged_rejection<T>(decode_base: impl FnOnce() -> ContractResult<T>) -> ContractError {
    match decode_base() {
        Err(err) => err,
        Ok(_) => {
            let mut report = ViolationReport::default();
            report.push(
                FieldPath::root().key("validator").key("type"),
                ViolationKind::WrongType { expected: "string" },
            );
            ContractError::schema(report)
        }
    }
}

/// Pick the schema registered for `validator_type`. An unregistered tag still
/// runs the base decoder so the rejection carries every envelope violation.
fn select<T>(
    validator_type: ValidatorType,
    decode_base: impl FnOnce() -> ContractResult<T>,
) -> ContractResult<&'static FamilySchema> {
    if let Some(schema) = lookup(&validator_type) {
        debug!(family = %schema.family, "selected family schema");
        return Ok(schema);
    }
    let envelope = match decode_base() {
        Ok(_) => ViolationReport::default(),
        Err(err) => err.into_report(),
    };
    warn!(
        validator_type = %validator_type,
        violations = envelope.len(),
        "no family registered for validator type"
    );
    Err(ContractError::UnknownFamily {
        validator_type,
        envelope,
    })
}

fn expect_family(raw: &Value, family: Family) -> ContractResult<()> {
    match peek_validator_type(raw) {
        Tag::Found(found) if found != family.validator_type() => {
            warn!(expected = %family, found = %found, "validator type does not match expected family");
            Err(ContractError::FamilyMismatch {
                expected: family,
                found,
            })
        }
        _ => Ok(()),
    }
}

fn logged<T>(result: ContractResult<T>, family: Family) -> ContractResult<T> {
    if let Err(err) = &result {
        warn!(
            family = %family,
            code = err.code(),
            violations = err.violations().len(),
            "envelope rejected"
        );
    }
    result
}

/// Decode an input envelope under the family named by its `validator.type`.
pub fn parse_input(raw: &Value) -> ContractResult<FamilyInputEnvelope> {
    let validator_type = match peek_validator_type(raw) {
        Tag::Found(validator_type) => validator_type,
        Tag::Unreadable => return Err(untagged_rejection(|| BaseInputEnvelope::from_value(raw))),
    };
    let schema = select(validator_type, || BaseInputEnvelope::from_value(raw))?;
    logged(schema.decode_input(raw), schema.family)
}

/// Decode an output envelope under the family named by its `validator.type`.
pub fn parse_output(raw: &Value) -> ContractResult<FamilyOutputEnvelope> {
    let validator_type = match peek_validator_type(raw) {
        Tag::Found(validator_type) => validator_type,
        Tag::Unreadable => return Err(untagged_rejection(|| BaseOutputEnvelope::from_value(raw))),
    };
    let schema = select(validator_type, || BaseOutputEnvelope::from_value(raw))?;
    logged(schema.decode_output(raw), schema.family)
}

/// Decode an input envelope that must belong to `family`.
pub fn parse_input_as(raw: &Value, family: Family) -> ContractResult<FamilyInputEnvelope> {
    expect_family(raw, family)?;
    logged(family.schema().decode_input(raw), family)
}

/// Decode an output envelope that must belong to `family`.
pub fn parse_output_as(raw: &Value, family: Family) -> ContractResult<FamilyOutputEnvelope> {
    expect_family(raw, family)?;
    logged(family.schema().decode_output(raw), family)
}

fn parse_text(text: &str, config: &ContractConfig) -> ContractResult<Value> {
    config.check_size(text)?;
    Ok(serde_json::from_str(text)?)
}

/// [`parse_input`] over JSON text, enforcing the configured size limit.
pub fn parse_input_str(text: &str, config: &ContractConfig) -> ContractResult<FamilyInputEnvelope> {
    parse_input(&parse_text(text, config)?)
}

/// [`parse_output`] over JSON text, enforcing the configured size limit.
pub fn parse_output_str(text: &str, config: &ContractConfig) -> ContractResult<FamilyOutputEnvelope> {
    parse_output(&parse_text(text, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fmu_input_doc() -> Value {
        json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "FMU", "version": "1.0.0"},
            "org": {"id": "org-1", "name": "Acme"},
            "workflow": {"id": "wf-1", "step_id": "step-1"},
            "input_files": [{
                "name": "model.fmu",
                "mime_type": "application/vnd.fmi.fmu",
                "role": "fmu",
                "uri": "gs://bucket/model.fmu"
            }],
            "inputs": {"output_variables": ["y"]},
            "context": {"execution_bundle_uri": "gs://bucket/runs/run-1/"}
        })
    }

    // -- Table --

    #[test]
    fn test_table_matches_family_order() {
        for family in Family::ALL {
            assert_eq!(family.schema().family, family);
            assert_eq!(lookup(&family.validator_type()).unwrap().family, family);
        }
        assert!(lookup(&ValidatorType::Basic).is_none());
        assert!(lookup(&ValidatorType::Unrecognized("X".into())).is_none());
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!("EnergyPlus".parse::<Family>().unwrap(), Family::EnergyPlus);
        assert_eq!("fmu".parse::<Family>().unwrap(), Family::Fmu);
        assert!("basic".parse::<Family>().is_err());
    }

    // -- Dispatch --

    #[test]
    fn test_parse_input_selects_family() {
        let envelope = parse_input(&fmu_input_doc()).unwrap();
        assert_eq!(envelope.family(), Family::Fmu);
        let FamilyInputEnvelope::Fmu(fmu) = envelope else {
            panic!("expected FMU envelope");
        };
        assert_eq!(fmu.inputs.output_variables, vec!["y".to_string()]);
    }

    #[test]
    fn test_parse_input_unknown_family() {
        let mut doc = fmu_input_doc();
        doc["validator"]["type"] = json!("JSON_SCHEMA");
        let err = parse_input(&doc).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_FAMILY");
        assert!(err.violations().is_empty());
    }

    #[test]
    fn test_unknown_family_reports_envelope_violations() {
        let mut doc = fmu_input_doc();
        doc["validator"]["type"] = json!("BASIC");
        doc.as_object_mut().unwrap().remove("run_id");
        doc["org"].as_object_mut().unwrap().remove("name");
        doc["context"] = json!({});
        doc["surprise"] = json!(true);

        let err = parse_input(&doc).unwrap_err();
        let ContractError::UnknownFamily { validator_type, envelope } = &err else {
            panic!("expected UnknownFamily, got {err}");
        };
        assert_eq!(*validator_type, ValidatorType::Basic);
        assert_eq!(envelope.at("run_id").unwrap().reason(), "missing");
        assert_eq!(envelope.at("org.name").unwrap().reason(), "missing");
        assert_eq!(envelope.at("context.execution_bundle_uri").unwrap().reason(), "missing");
        assert_eq!(envelope.at("surprise").unwrap().reason(), "unknown_field");
        assert_eq!(err.violations().len(), 4);
    }

    #[test]
    fn test_unknown_output_family_reports_envelope_violations() {
        let doc = json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "AI_ASSIST", "version": "1.0.0"},
            "status": "finished",
            "timing": {}
        });
        let err = parse_output(&doc).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_FAMILY");
        assert_eq!(err.violations()[0].path.to_string(), "status");
    }

    #[test]
    fn test_parse_input_missing_type_reports_base_violations() {
        let mut doc = fmu_input_doc();
        doc["validator"].as_object_mut().unwrap().remove("type");
        doc.as_object_mut().unwrap().remove("run_id");
        let err = parse_input(&doc).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VIOLATION");
        let paths: Vec<String> = err.violations().iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, vec!["run_id", "validator.type"]);
    }

    #[test]
    fn test_parse_input_splits_payload_from_envelope() {
        let mut doc = fmu_input_doc();
        doc["inputs"]["simulation"] = json!({"stop_time": 0});
        doc["context"]["timeout_seconds"] = json!("soon");
        let err = parse_input(&doc).unwrap_err();
        match err {
            ContractError::FamilyPayload {
                family,
                payload,
                envelope,
            } => {
                assert_eq!(family, Family::Fmu);
                assert_eq!(payload.at("inputs.simulation.stop_time").unwrap().reason(), "out_of_range");
                assert_eq!(envelope.at("context.timeout_seconds").unwrap().reason(), "wrong_type");
            }
            other => panic!("expected payload rejection, got {other}"),
        }
    }

    #[test]
    fn test_envelope_only_failure_is_schema_error() {
        let mut doc = fmu_input_doc();
        doc["surprise"] = json!(1);
        let err = parse_input(&doc).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VIOLATION");
    }

    #[test]
    fn test_parse_input_as_mismatch() {
        let err = parse_input_as(&fmu_input_doc(), Family::EnergyPlus).unwrap_err();
        assert_eq!(err.code(), "FAMILY_MISMATCH");
        assert!(parse_input_as(&fmu_input_doc(), Family::Fmu).is_ok());
    }

    #[test]
    fn test_parse_output_allows_missing_fmu_outputs() {
        let doc = json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "FMU", "version": "1.0.0"},
            "status": "failed_runtime",
            "timing": {"finished_at": "2024-05-01T12:00:00Z"},
            "messages": [{"severity": "ERROR", "text": "FMU crashed"}]
        });
        let envelope = parse_output(&doc).unwrap();
        assert_eq!(envelope.status(), ValidationStatus::FailedRuntime);
        assert!(envelope.to_base().unwrap().outputs.is_none());
    }

    #[test]
    fn test_parse_output_requires_energyplus_outputs() {
        let doc = json!({
            "run_id": "run-1",
            "validator": {"id": "v-1", "type": "ENERGYPLUS", "version": "1.0.0"},
            "status": "success",
            "timing": {}
        });
        let err = parse_output(&doc).unwrap_err();
        assert_eq!(err.code(), "FAMILY_PAYLOAD_VIOLATION");
        assert_eq!(err.violations()[0].path.to_string(), "outputs");
    }

    #[test]
    fn test_text_entry_points() {
        let config = ContractConfig {
            max_document_bytes: 10,
            ..Default::default()
        };
        let text = fmu_input_doc().to_string();
        assert_eq!(parse_input_str(&text, &config).unwrap_err().code(), "DOCUMENT_TOO_LARGE");
        assert_eq!(
            parse_input_str("[", &ContractConfig::default()).unwrap_err().code(),
            "MALFORMED_JSON"
        );
        assert!(parse_input_str(&text, &ContractConfig::default()).is_ok());
    }
}
