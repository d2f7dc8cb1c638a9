//! Primitive value types shared by every envelope
//!
//! Closed enumerations carry their exact wire strings. `ValidatorType` is the
//! one open enumeration: unknown tags decode into [`ValidatorType::Unrecognized`]
//! and are only rejected when family dispatch needs them.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Metadata, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::decode::WireEnum;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl WireEnum for Severity {
    const VARIANTS: &'static [&'static str] = &["INFO", "WARNING", "ERROR"];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ============================================================================
// Validator type
// ============================================================================

/// Tag naming the executor family that runs a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValidatorType {
    Basic,
    JsonSchema,
    XmlSchema,
    EnergyPlus,
    Fmu,
    CustomValidator,
    AiAssist,
    /// A tag this build does not know. Kept verbatim so newer producers
    /// do not break older consumers of the base envelope.
    Unrecognized(String),
}

impl ValidatorType {
    pub const KNOWN: &'static [&'static str] = &[
        "BASIC",
        "JSON_SCHEMA",
        "XML_SCHEMA",
        "ENERGYPLUS",
        "FMU",
        "CUSTOM_VALIDATOR",
        "AI_ASSIST",
    ];

    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "BASIC" => Self::Basic,
            "JSON_SCHEMA" => Self::JsonSchema,
            "XML_SCHEMA" => Self::XmlSchema,
            "ENERGYPLUS" => Self::EnergyPlus,
            "FMU" => Self::Fmu,
            "CUSTOM_VALIDATOR" => Self::CustomValidator,
            "AI_ASSIST" => Self::AiAssist,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Basic => "BASIC",
            Self::JsonSchema => "JSON_SCHEMA",
            Self::XmlSchema => "XML_SCHEMA",
            Self::EnergyPlus => "ENERGYPLUS",
            Self::Fmu => "FMU",
            Self::CustomValidator => "CUSTOM_VALIDATOR",
            Self::AiAssist => "AI_ASSIST",
            Self::Unrecognized(tag) => tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for ValidatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ValidatorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValidatorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&tag))
    }
}

impl JsonSchema for ValidatorType {
    fn schema_name() -> String {
        "ValidatorType".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            metadata: Some(Box::new(Metadata {
                description: Some(
                    "Validator family tag. Unknown tags are accepted by the base envelope."
                        .to_string(),
                ),
                examples: Self::KNOWN.iter().map(|t| (*t).into()).collect(),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

// ============================================================================
// Closed enums
// ============================================================================

/// MIME types accepted for user-submitted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SupportedMimeType {
    #[serde(rename = "application/xml")]
    ApplicationXml,
    #[serde(rename = "text/xml")]
    TextXml,
    #[serde(rename = "application/vnd.energyplus.idf")]
    EnergyPlusIdf,
    #[serde(rename = "application/vnd.energyplus.epjson")]
    EnergyPlusEpJson,
    #[serde(rename = "application/vnd.energyplus.epw")]
    EnergyPlusEpw,
    #[serde(rename = "application/vnd.fmi.fmu")]
    Fmu,
}

impl SupportedMimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationXml => "application/xml",
            Self::TextXml => "text/xml",
            Self::EnergyPlusIdf => "application/vnd.energyplus.idf",
            Self::EnergyPlusEpJson => "application/vnd.energyplus.epjson",
            Self::EnergyPlusEpw => "application/vnd.energyplus.epw",
            Self::Fmu => "application/vnd.fmi.fmu",
        }
    }
}

impl WireEnum for SupportedMimeType {
    const VARIANTS: &'static [&'static str] = &[
        "application/xml",
        "text/xml",
        "application/vnd.energyplus.idf",
        "application/vnd.energyplus.epjson",
        "application/vnd.energyplus.epw",
        "application/vnd.fmi.fmu",
    ];
}

impl fmt::Display for SupportedMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of a job.
///
/// `FailedValidation` and `FailedRuntime` are business outcomes carried as
/// data; an envelope reporting them is still a valid document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    FailedValidation,
    FailedRuntime,
    Cancelled,
}

impl ValidationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl WireEnum for ValidationStatus {
    const VARIANTS: &'static [&'static str] =
        &["success", "failed_validation", "failed_runtime", "cancelled"];
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::FailedValidation => write!(f, "failed_validation"),
            Self::FailedRuntime => write!(f, "failed_runtime"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Layout of a job's raw output bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RawOutputFormat {
    Directory,
    Archive,
}

impl WireEnum for RawOutputFormat {
    const VARIANTS: &'static [&'static str] = &["directory", "archive"];
}

/// How a simulation engine was driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    PythonApi,
    #[default]
    Cli,
}

impl WireEnum for InvocationMode {
    const VARIANTS: &'static [&'static str] = &["python_api", "cli"];
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PythonApi => write!(f, "python_api"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

// ============================================================================
// Schema version markers
// ============================================================================

macro_rules! schema_version_marker {
    ($(#[$meta:meta])* $name:ident, $literal:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            pub const LITERAL: &'static str = $literal;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", Self::LITERAL)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(Self::LITERAL)
            }
        }

        impl JsonSchema for $name {
            fn schema_name() -> String {
                stringify!($name).to_string()
            }

            fn is_referenceable() -> bool {
                false
            }

            fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
                SchemaObject {
                    instance_type: Some(InstanceType::String.into()),
                    const_value: Some(Self::LITERAL.into()),
                    ..Default::default()
                }
                .into()
            }
        }
    };
}

schema_version_marker!(
    /// `schema_version` of every input envelope.
    InputSchemaVersion,
    "validibot.input.v1"
);

schema_version_marker!(
    /// `schema_version` of every output envelope.
    OutputSchemaVersion,
    "validibot.output.v1"
);
