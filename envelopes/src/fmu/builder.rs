//! One-step construction of FMU input envelopes

use serde_json::{json, Value};
use tracing::debug;

use super::{FmuInputEnvelope, FmuSimulationConfig};
use crate::config::ContractConfig;
use crate::decode::Decode;
use crate::envelope::{rejection, OpenMap};
use crate::error::{ContractError, ContractResult};
use crate::registry::Family;
use crate::types::SupportedMimeType;

/// Role of the FMU archive in `input_files`.
pub const FMU_ROLE: &str = "fmu";

/// File name given to the FMU archive in `input_files`.
pub const FMU_FILE_NAME: &str = "model.fmu";

/// Call-site values for an FMU job.
#[derive(Debug, Clone, Default)]
pub struct FmuJobRequest {
    pub run_id: String,
    pub validator_id: String,
    pub validator_version: Option<String>,
    pub org_id: String,
    pub org_name: String,
    pub workflow_id: String,
    pub step_id: String,
    pub step_name: Option<String>,
    /// `gs://` URI or local path of the FMU archive.
    pub fmu_uri: String,
    /// Resolved inputs keyed by catalog slug.
    pub input_values: OpenMap,
    pub callback_url: String,
    pub callback_id: Option<String>,
    pub execution_bundle_uri: String,
    /// Default simulation controls when `None`.
    pub simulation: Option<FmuSimulationConfig>,
    /// Empty captures every output.
    pub output_variables: Vec<String>,
}

impl FmuJobRequest {
    pub fn build(&self) -> ContractResult<FmuInputEnvelope> {
        self.build_with(&ContractConfig::default())
    }

    /// Assemble and validate the envelope. Nothing is returned unless every
    /// nested record is valid.
    pub fn build_with(&self, config: &ContractConfig) -> ContractResult<FmuInputEnvelope> {
        let simulation = match &self.simulation {
            Some(simulation) => serde_json::to_value(simulation)?,
            None => serde_json::to_value(FmuSimulationConfig::default())?,
        };
        let version = self
            .validator_version
            .as_deref()
            .unwrap_or(&config.default_validator_version);

        let document = json!({
            "run_id": self.run_id,
            "validator": {"id": self.validator_id, "type": "FMU", "version": version},
            "org": {"id": self.org_id, "name": self.org_name},
            "workflow": {"id": self.workflow_id, "step_id": self.step_id, "step_name": self.step_name},
            "input_files": [{
                "name": FMU_FILE_NAME,
                "mime_type": SupportedMimeType::Fmu.as_str(),
                "role": FMU_ROLE,
                "uri": self.fmu_uri,
            }],
            "inputs": {
                "input_values": Value::Object(self.input_values.clone()),
                "simulation": simulation,
                "output_variables": self.output_variables,
            },
            "context": {
                "callback_id": self.callback_id,
                "callback_url": self.callback_url,
                "execution_bundle_uri": self.execution_bundle_uri,
            },
        });

        let envelope = FmuInputEnvelope::decode(&document)
            .map_err(|report| rejection(report, "inputs", Some(Family::Fmu)))?;
        debug!(run_id = %envelope.run_id, outputs = envelope.inputs.output_variables.len(), "built FMU input envelope");
        Ok(envelope)
    }
}

impl TryFrom<FmuJobRequest> for FmuInputEnvelope {
    type Error = ContractError;

    fn try_from(request: FmuJobRequest) -> Result<Self, Self::Error> {
        request.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorType;

    fn request() -> FmuJobRequest {
        FmuJobRequest {
            run_id: "run-9".into(),
            validator_id: "v-fmu".into(),
            org_id: "org-1".into(),
            org_name: "Acme".into(),
            workflow_id: "wf-1".into(),
            step_id: "step-2".into(),
            fmu_uri: "gs://bucket/fmus/thermostat.fmu".into(),
            callback_url: "https://orchestrator.example.com/callbacks/".into(),
            execution_bundle_uri: "gs://bucket/runs/run-9/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_default_simulation() {
        let envelope = request().build().unwrap();
        assert_eq!(envelope.validator.validator_type, ValidatorType::Fmu);
        assert_eq!(envelope.inputs.simulation, FmuSimulationConfig::default());
        assert!(envelope.inputs.output_variables.is_empty());

        let fmu = &envelope.input_files[0];
        assert_eq!(fmu.name, "model.fmu");
        assert_eq!(fmu.mime_type, SupportedMimeType::Fmu);
        assert_eq!(fmu.role.as_deref(), Some("fmu"));
        assert_eq!(fmu.uri, "gs://bucket/fmus/thermostat.fmu");
    }

    #[test]
    fn test_build_rejects_bad_simulation_and_callback() {
        let mut req = request();
        req.simulation = Some(FmuSimulationConfig {
            step_size: 0.0,
            ..Default::default()
        });
        req.callback_url = "not-a-url".into();

        let err = req.build().unwrap_err();
        assert_eq!(err.code(), "FAMILY_PAYLOAD_VIOLATION");
        let paths: Vec<String> = err.violations().iter().map(|v| v.path.to_string()).collect();
        assert!(paths.contains(&"inputs.simulation.step_size".to_string()));
        assert!(paths.contains(&"context.callback_url".to_string()));
    }

    #[test]
    fn test_try_from_request() {
        let envelope = FmuInputEnvelope::try_from(request()).unwrap();
        assert_eq!(envelope.run_id, "run-9");
    }
}
