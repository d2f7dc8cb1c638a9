//! FMU probe results
//!
//! A probe reads `modelDescription.xml` without executing the FMU and lists
//! the variables it declares. Results are only built through
//! [`ProbeResult::success`] and [`ProbeResult::failure`]; decoding checks the
//! same consistency rules, so a document claiming `success` with errors is
//! rejected.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::decode::{Decode, FieldPath, Fields, ViolationKind, ViolationReport, WireEnum};
use crate::deserialize_via_decode;
use crate::error::{ContractError, ContractResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Success,
    Error,
}

impl WireEnum for ProbeStatus {
    const VARIANTS: &'static [&'static str] = &["success", "error"];
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One variable declared by the FMU.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FmiVariable {
    pub name: String,
    /// input, output, parameter, ...
    pub causality: String,
    pub variability: Option<String>,
    pub value_reference: i64,
    /// Real, Integer, Boolean, String
    pub value_type: String,
    pub unit: Option<String>,
}

impl FmiVariable {
    pub fn new(name: impl Into<String>, causality: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            causality: causality.into(),
            variability: None,
            value_reference: 0,
            value_type: value_type.into(),
            unit: None,
        }
    }
}

impl Decode for FmiVariable {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let name = f.required("name", "string");
        let causality = f.required("causality", "string");
        let variability = f.optional("variability", "string");
        let value_reference = f.number_or("value_reference", 0, None);
        let value_type = f.required("value_type", "string");
        let unit = f.optional("unit", "string");
        f.finish();
        Some(Self {
            name: name?,
            causality: causality?,
            variability: variability?,
            value_reference: value_reference?,
            value_type: value_type?,
            unit: unit?,
        })
    }
}

/// Outcome of a probe: either variables or errors, never both.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct ProbeResult {
    status: ProbeStatus,
    variables: Vec<FmiVariable>,
    errors: Vec<String>,
    messages: Vec<String>,
    execution_seconds: Option<f64>,
}

impl ProbeResult {
    pub fn success(
        variables: Vec<FmiVariable>,
        execution_seconds: Option<f64>,
        messages: Vec<String>,
    ) -> Self {
        Self {
            status: ProbeStatus::Success,
            variables,
            errors: Vec::new(),
            messages,
            execution_seconds,
        }
    }

    /// Fails when `errors` is empty: an error result must say what went wrong.
    pub fn failure(errors: Vec<String>, messages: Vec<String>) -> ContractResult<Self> {
        if errors.is_empty() {
            let mut report = ViolationReport::default();
            report.push(
                FieldPath::root().key("errors"),
                ViolationKind::InvalidValue {
                    reason: "an error result needs at least one error".to_string(),
                },
            );
            return Err(ContractError::schema(report));
        }
        Ok(Self {
            status: ProbeStatus::Error,
            variables: Vec::new(),
            errors,
            messages,
            execution_seconds: None,
        })
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ProbeStatus::Success
    }

    pub fn variables(&self) -> &[FmiVariable] {
        &self.variables
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn execution_seconds(&self) -> Option<f64> {
        self.execution_seconds
    }

    /// Variables with the given causality, e.g. `"input"`.
    pub fn variables_with_causality<'a>(&'a self, causality: &'a str) -> impl Iterator<Item = &'a FmiVariable> + 'a {
        self.variables.iter().filter(move |v| v.causality == causality)
    }
}

impl Decode for ProbeResult {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let status = f.enumerated_or("status", ProbeStatus::Error);
        let variables: Option<Vec<FmiVariable>> = f.list("variables");
        let errors: Option<Vec<String>> = f.defaulted("errors", "array of strings", Vec::new);
        let messages = f.defaulted("messages", "array of strings", Vec::new);
        let execution_seconds = f.optional_number("execution_seconds", None);

        match (status, variables.as_deref(), errors.as_deref()) {
            (Some(ProbeStatus::Success), _, Some(errors)) if !errors.is_empty() => {
                f.reject("errors", "a success result carries no errors");
            }
            (Some(ProbeStatus::Error), _, Some([])) => {
                f.reject("errors", "an error result needs at least one error");
            }
            (Some(ProbeStatus::Error), Some(variables), _) if !variables.is_empty() => {
                f.reject("variables", "an error result carries no variables");
            }
            _ => {}
        }
        f.finish();

        let result = Self {
            status: status?,
            variables: variables?,
            errors: errors?,
            messages: messages?,
            execution_seconds: execution_seconds?,
        };
        let consistent = match result.status {
            ProbeStatus::Success => result.errors.is_empty(),
            ProbeStatus::Error => !result.errors.is_empty() && result.variables.is_empty(),
        };
        consistent.then_some(result)
    }
}

deserialize_via_decode!(FmiVariable, ProbeResult);
