//! FMU results carried in `outputs`

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::decode::{Bound, Decode, FieldPath, Fields, ViolationReport};
use crate::deserialize_via_decode;
use crate::envelope::OpenMap;

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FmuOutputs {
    /// Output values keyed by catalog slug.
    #[schemars(default)]
    pub output_values: OpenMap,
    pub fmu_guid: Option<String>,
    pub fmi_version: Option<String>,
    pub model_name: Option<String>,
    #[schemars(schema_with = "crate::schema::non_negative_number")]
    pub execution_seconds: f64,
    /// Simulation time the run actually reached.
    #[schemars(schema_with = "crate::schema::non_negative_number")]
    pub simulation_time_reached: f64,
    /// Raw FMU log text.
    pub fmu_log: Option<String>,
}

impl FmuOutputs {
    pub fn new(execution_seconds: f64, simulation_time_reached: f64) -> Self {
        Self {
            output_values: OpenMap::new(),
            fmu_guid: None,
            fmi_version: None,
            model_name: None,
            execution_seconds,
            simulation_time_reached,
            fmu_log: None,
        }
    }

    pub fn value(&self, slug: &str) -> Option<&Value> {
        self.output_values.get(slug)
    }
}

impl Decode for FmuOutputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let output_values = f.record_or("output_values", Some(OpenMap::new()));
        let fmu_guid = f.optional("fmu_guid", "string");
        let fmi_version = f.optional("fmi_version", "string");
        let model_name = f.optional("model_name", "string");
        let execution_seconds = f.number("execution_seconds", Some(Bound::NON_NEGATIVE));
        let simulation_time_reached = f.number("simulation_time_reached", Some(Bound::NON_NEGATIVE));
        let fmu_log = f.optional("fmu_log", "string");
        f.finish();
        Some(Self {
            output_values: output_values?,
            fmu_guid: fmu_guid?,
            fmi_version: fmi_version?,
            model_name: model_name?,
            execution_seconds: execution_seconds?,
            simulation_time_reached: simulation_time_reached?,
            fmu_log: fmu_log?,
        })
    }
}

deserialize_via_decode!(FmuOutputs);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outputs_minimal() {
        let outputs = FmuOutputs::decode(&json!({
            "output_values": {"y": 0.75, "status": "ok"},
            "execution_seconds": 0.4,
            "simulation_time_reached": 1.0
        }))
        .unwrap();
        assert_eq!(outputs.value("y"), Some(&json!(0.75)));
        assert_eq!(outputs.fmu_guid, None);
    }

    #[test]
    fn test_outputs_required_and_bounded() {
        let report = FmuOutputs::decode(&json!({
            "execution_seconds": -0.1,
            "fmu_log": 3
        }))
        .unwrap_err();
        assert_eq!(report.at("execution_seconds").unwrap().reason(), "out_of_range");
        assert_eq!(report.at("simulation_time_reached").unwrap().reason(), "missing");
        assert_eq!(report.at("fmu_log").unwrap().reason(), "wrong_type");
    }

    #[test]
    fn test_outputs_encode_decode_stable() {
        let mut outputs = FmuOutputs::new(0.2, 10.0);
        outputs.output_values.insert("y".into(), json!(1));
        outputs.fmi_version = Some("2.0".into());
        let encoded = serde_json::to_value(&outputs).unwrap();
        assert_eq!(FmuOutputs::decode(&encoded).unwrap(), outputs);
    }
}
