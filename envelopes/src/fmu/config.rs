//! FMU simulation configuration carried in `inputs`

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::decode::{Bound, Decode, FieldPath, Fields, ViolationReport};
use crate::deserialize_via_decode;
use crate::envelope::OpenMap;

pub const DEFAULT_START_TIME: f64 = 0.0;
pub const DEFAULT_STOP_TIME: f64 = 1.0;
pub const DEFAULT_STEP_SIZE: f64 = 0.01;

/// Time-stepping controls for a co-simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FmuSimulationConfig {
    #[schemars(default = "default_start_time", schema_with = "crate::schema::non_negative_number")]
    pub start_time: f64,
    #[schemars(default = "default_stop_time", schema_with = "crate::schema::positive_number")]
    pub stop_time: f64,
    #[schemars(default = "default_step_size", schema_with = "crate::schema::positive_number")]
    pub step_size: f64,
    /// Solver tolerance; the FMU default when unset.
    #[schemars(default, schema_with = "crate::schema::optional_positive_number")]
    pub tolerance: Option<f64>,
}

fn default_start_time() -> f64 {
    DEFAULT_START_TIME
}

fn default_stop_time() -> f64 {
    DEFAULT_STOP_TIME
}

fn default_step_size() -> f64 {
    DEFAULT_STEP_SIZE
}

impl Default for FmuSimulationConfig {
    fn default() -> Self {
        Self {
            start_time: DEFAULT_START_TIME,
            stop_time: DEFAULT_STOP_TIME,
            step_size: DEFAULT_STEP_SIZE,
            tolerance: None,
        }
    }
}

impl Decode for FmuSimulationConfig {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let start_time = f.number_or("start_time", DEFAULT_START_TIME, Some(Bound::NON_NEGATIVE));
        let stop_time = f.number_or("stop_time", DEFAULT_STOP_TIME, Some(Bound::POSITIVE));
        let step_size = f.number_or("step_size", DEFAULT_STEP_SIZE, Some(Bound::POSITIVE));
        let tolerance = f.optional_number("tolerance", Some(Bound::POSITIVE));
        f.finish();
        Some(Self {
            start_time: start_time?,
            stop_time: stop_time?,
            step_size: step_size?,
            tolerance: tolerance?,
        })
    }
}

/// Resolved inputs for one FMU run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FmuInputs {
    /// Input values keyed by catalog slug.
    #[schemars(default)]
    pub input_values: OpenMap,
    #[schemars(default)]
    pub simulation: FmuSimulationConfig,
    /// Catalog slugs to capture; empty captures every output.
    #[schemars(default)]
    pub output_variables: Vec<String>,
}

impl Decode for FmuInputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let input_values = f.record_or("input_values", Some(OpenMap::new()));
        let simulation = f.record_or("simulation", Some(FmuSimulationConfig::default()));
        let output_variables = f.defaulted("output_variables", "array of strings", Vec::new);
        f.finish();
        Some(Self {
            input_values: input_values?,
            simulation: simulation?,
            output_variables: output_variables?,
        })
    }
}

deserialize_via_decode!(FmuSimulationConfig, FmuInputs);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simulation_defaults() {
        let config = FmuSimulationConfig::decode(&json!({})).unwrap();
        assert_eq!(config, FmuSimulationConfig::default());
        assert_eq!(config.stop_time, 1.0);
        assert_eq!(config.step_size, 0.01);
    }

    #[test]
    fn test_simulation_bounds() {
        let report = FmuSimulationConfig::decode(&json!({
            "start_time": -1.0,
            "stop_time": 0,
            "step_size": 0.0,
            "tolerance": -1e-6
        }))
        .unwrap_err();
        assert_eq!(report.len(), 4);
        for field in ["start_time", "stop_time", "step_size", "tolerance"] {
            assert_eq!(report.at(field).unwrap().reason(), "out_of_range", "{field}");
        }
    }

    #[test]
    fn test_start_time_zero_is_allowed() {
        let config = FmuSimulationConfig::decode(&json!({"start_time": 0, "tolerance": 1e-6})).unwrap();
        assert_eq!(config.start_time, 0.0);
        assert_eq!(config.tolerance, Some(1e-6));
    }

    #[test]
    fn test_inputs_defaults_and_nested_paths() {
        let inputs = FmuInputs::decode(&json!({})).unwrap();
        assert!(inputs.input_values.is_empty());
        assert!(inputs.output_variables.is_empty());

        let report = FmuInputs::decode(&json!({
            "input_values": {"u": 1.5},
            "simulation": {"step_size": 0, "solver": "cvode"}
        }))
        .unwrap_err();
        assert_eq!(report.at("simulation.step_size").unwrap().reason(), "out_of_range");
        assert_eq!(report.at("simulation.solver").unwrap().reason(), "unknown_field");
    }
}
