//! One-step construction of EnergyPlus input envelopes

use serde_json::{json, Value};
use tracing::debug;

use super::EnergyPlusInputEnvelope;
use crate::config::ContractConfig;
use crate::decode::{Decode, FieldPath, ViolationKind, ViolationReport};
use crate::envelope::{rejection, OpenMap};
use crate::error::ContractResult;
use crate::records::DEFAULT_TIMEOUT_SECONDS;
use crate::registry::Family;
use crate::types::SupportedMimeType;

/// Role of the building model in `input_files`.
pub const PRIMARY_MODEL_ROLE: &str = "primary-model";

/// `type` of the weather file in `resource_files`.
pub const WEATHER_RESOURCE_TYPE: &str = "weather";

/// Call-site values for an EnergyPlus job.
///
/// `config` holds raw configuration values; omitted keys take the
/// `EnergyPlusInputs` defaults.
#[derive(Debug, Clone, Default)]
pub struct EnergyPlusJobRequest {
    pub run_id: String,
    pub validator_id: String,
    pub validator_version: Option<String>,
    pub org_id: String,
    pub org_name: String,
    pub workflow_id: String,
    pub step_id: String,
    pub step_name: Option<String>,
    pub model_uri: String,
    /// Inferred from the model URI extension when `None`.
    pub model_mime_type: Option<SupportedMimeType>,
    pub weather_uri: Option<String>,
    pub weather_resource_id: Option<String>,
    pub config: OpenMap,
    pub callback_url: Option<String>,
    pub callback_id: Option<String>,
    pub execution_bundle_uri: String,
    pub timeout_seconds: Option<i64>,
}

fn model_mime_from_uri(uri: &str) -> Option<SupportedMimeType> {
    let lower = uri.to_ascii_lowercase();
    if lower.ends_with(".idf") {
        Some(SupportedMimeType::EnergyPlusIdf)
    } else if lower.ends_with(".epjson") {
        Some(SupportedMimeType::EnergyPlusEpJson)
    } else {
        None
    }
}

/// Last path segment of a URI, if any.
pub(crate) fn file_name(uri: &str) -> Option<&str> {
    uri.rsplit('/').next().filter(|name| !name.is_empty())
}

impl EnergyPlusJobRequest {
    pub fn build(&self) -> ContractResult<EnergyPlusInputEnvelope> {
        self.build_with(&ContractConfig::default())
    }

    /// Assemble and validate the envelope. Nothing is returned unless every
    /// nested record is valid.
    pub fn build_with(&self, config: &ContractConfig) -> ContractResult<EnergyPlusInputEnvelope> {
        let mut report = ViolationReport::default();
        let mime_path = FieldPath::root().key("input_files").index(0).key("mime_type");

        let mime = match self.model_mime_type.or_else(|| model_mime_from_uri(&self.model_uri)) {
            Some(mime @ (SupportedMimeType::EnergyPlusIdf | SupportedMimeType::EnergyPlusEpJson)) => {
                Some(mime)
            }
            Some(other) => {
                report.push(
                    mime_path,
                    ViolationKind::InvalidValue {
                        reason: format!("{} is not an EnergyPlus model type", other),
                    },
                );
                None
            }
            None => {
                report.push(
                    mime_path,
                    ViolationKind::InvalidValue {
                        reason: format!("cannot infer model type from '{}'", self.model_uri),
                    },
                );
                None
            }
        };

        let input_files: Vec<Value> = mime
            .map(|mime| {
                json!({
                    "name": file_name(&self.model_uri).unwrap_or("model.idf"),
                    "mime_type": mime.as_str(),
                    "role": PRIMARY_MODEL_ROLE,
                    "uri": self.model_uri,
                })
            })
            .into_iter()
            .collect();

        // Resource ids are assigned by the orchestrator.
        let resource_files: Vec<Value> = match (&self.weather_uri, &self.weather_resource_id) {
            (Some(uri), Some(id)) => vec![json!({
                "id": id,
                "type": WEATHER_RESOURCE_TYPE,
                "uri": uri,
            })],
            (Some(_), None) => {
                report.push(
                    FieldPath::root().key("resource_files").index(0).key("id"),
                    ViolationKind::Missing,
                );
                Vec::new()
            }
            (None, _) => Vec::new(),
        };

        let version = self
            .validator_version
            .as_deref()
            .unwrap_or(&config.default_validator_version);

        let document = json!({
            "run_id": self.run_id,
            "validator": {"id": self.validator_id, "type": "ENERGYPLUS", "version": version},
            "org": {"id": self.org_id, "name": self.org_name},
            "workflow": {"id": self.workflow_id, "step_id": self.step_id, "step_name": self.step_name},
            "input_files": input_files,
            "resource_files": resource_files,
            "inputs": Value::Object(self.config.clone()),
            "context": {
                "callback_id": self.callback_id,
                "callback_url": self.callback_url,
                "execution_bundle_uri": self.execution_bundle_uri,
                "timeout_seconds": self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            },
        });

        match EnergyPlusInputEnvelope::decode(&document) {
            Ok(envelope) if report.is_empty() => {
                debug!(run_id = %envelope.run_id, "built EnergyPlus input envelope");
                Ok(envelope)
            }
            Ok(_) => Err(rejection(report, "inputs", Some(Family::EnergyPlus))),
            Err(decoded) => {
                report.extend(decoded);
                Err(rejection(report, "inputs", Some(Family::EnergyPlus)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;
    use crate::types::ValidatorType;

    fn request() -> EnergyPlusJobRequest {
        EnergyPlusJobRequest {
            run_id: "run-1".into(),
            validator_id: "v-1".into(),
            org_id: "org-1".into(),
            org_name: "Acme".into(),
            workflow_id: "wf-1".into(),
            step_id: "step-1".into(),
            model_uri: "gs://bucket/runs/run-1/office.idf".into(),
            execution_bundle_uri: "gs://bucket/runs/run-1/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_minimal() {
        let envelope = request().build().unwrap();
        assert_eq!(envelope.validator.validator_type, ValidatorType::EnergyPlus);
        assert_eq!(envelope.validator.version, "1.0.0");
        assert_eq!(envelope.input_files.len(), 1);

        let model = envelope.file_by_role(PRIMARY_MODEL_ROLE).unwrap();
        assert_eq!(model.name, "office.idf");
        assert_eq!(model.mime_type, SupportedMimeType::EnergyPlusIdf);
        assert_eq!(envelope.inputs.timestep_per_hour, 4);
        assert!(envelope.resource_files.is_empty());
        assert_eq!(envelope.context.timeout_seconds, 3600);
    }

    #[test]
    fn test_build_with_weather_and_config() {
        let mut req = request();
        req.weather_uri = Some("gs://bucket/weather/chicago.epw".into());
        req.weather_resource_id = Some("7d0c1c1e-weather".into());
        req.config.insert("timestep_per_hour".into(), json!(6));
        req.callback_url = Some("https://orchestrator.example.com/cb".into());
        req.callback_id = Some("cb-1".into());

        let envelope = req.build().unwrap();
        assert_eq!(envelope.inputs.timestep_per_hour, 6);
        assert_eq!(envelope.resource_files[0].resource_type, "weather");
        assert_eq!(envelope.resource_files[0].id, "7d0c1c1e-weather");
        assert_eq!(envelope.context.callback_id.as_deref(), Some("cb-1"));
    }

    #[test]
    fn test_build_requires_weather_resource_id() {
        let mut req = request();
        req.weather_uri = Some("gs://bucket/weather/chicago.epw".into());

        let err = req.build().unwrap_err();
        assert_eq!(err.code(), "SCHEMA_VIOLATION");
        assert_eq!(err.violations().len(), 1);
        let violation = err.violations()[0];
        assert_eq!(violation.path.to_string(), "resource_files[0].id");
        assert_eq!(violation.reason(), "missing");

        // An id without a weather file adds nothing.
        let mut req = request();
        req.weather_resource_id = Some("unused".into());
        assert!(req.build().unwrap().resource_files.is_empty());
    }

    #[test]
    fn test_build_uses_configured_version() {
        let config = ContractConfig {
            default_validator_version: "9.4.0".into(),
            ..Default::default()
        };
        assert_eq!(request().build_with(&config).unwrap().validator.version, "9.4.0");
    }

    #[test]
    fn test_build_fails_atomically() {
        let mut req = request();
        req.model_uri = "gs://bucket/model.fmu".into();
        req.config.insert("timestep_per_hour".into(), json!(0));
        req.execution_bundle_uri = String::new();

        let (payload, envelope) = match req.build().unwrap_err() {
            ContractError::FamilyPayload {
                payload, envelope, ..
            } => (payload, envelope),
            other => panic!("expected payload rejection, got {other}"),
        };
        assert_eq!(payload.at("inputs.timestep_per_hour").unwrap().reason(), "out_of_range");
        assert!(envelope.at("input_files[0].mime_type").is_some());
        assert!(envelope.at("context.execution_bundle_uri").is_some());
    }
}
