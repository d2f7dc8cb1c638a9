//! Job envelope contract
//!
//! Typed, validated documents exchanged between an orchestrator and
//! independently deployed validator executors:
//!
//! - [`envelope`]: base input/output envelopes, generic over their payload slot
//! - [`records`]: identities, file references, execution context, messages,
//!   metrics, artifacts and timing
//! - [`energyplus`] and [`fmu`]: families that narrow `inputs`/`outputs`
//! - [`registry`]: dispatch on `validator.type` to the right family schema
//! - [`callback`]: completion callbacks and receiver-side deduplication
//! - [`decode`]: the validation engine collecting every violation in one pass
//!
//! ```no_run
//! use job_envelopes::registry::{parse_output, FamilyOutputEnvelope};
//!
//! let raw: serde_json::Value = serde_json::from_str(r#"{"run_id": "r"}"#).unwrap();
//! match parse_output(&raw) {
//!     Ok(FamilyOutputEnvelope::EnergyPlus(envelope)) => println!("{}", envelope.status),
//!     Ok(other) => println!("{} results", other.family()),
//!     Err(err) => {
//!         for violation in err.violations() {
//!             eprintln!("{violation}");
//!         }
//!     }
//! }
//! ```

pub mod boundary;
pub mod callback;
pub mod config;
pub mod decode;
pub mod energyplus;
pub mod envelope;
pub mod error;
pub mod fmu;
pub mod records;
pub mod registry;
pub mod schema;
pub mod types;

pub use callback::{CallbackLedger, Delivery, ValidationCallback};
pub use config::ContractConfig;
pub use decode::{Decode, FieldPath, Violation, ViolationKind, ViolationReport};
pub use envelope::{
    BaseInputEnvelope, BaseOutputEnvelope, InputEnvelope, InputPayload, OpenMap, OutputEnvelope,
    ResultsPayload,
};
pub use error::{ContractError, ContractResult};
pub use records::{
    ExecutionContext, FileReference, MessageLocation, MetricValue, OrganizationIdentity,
    RawOutputs, ResourceReference, ValidationArtifact, ValidationMessage, ValidationMetric,
    ValidationTiming, ValidatorIdentity, WorkflowIdentity,
};
pub use registry::{
    parse_input, parse_input_as, parse_output, parse_output_as, Family, FamilyInputEnvelope,
    FamilyOutputEnvelope,
};
pub use types::{
    InvocationMode, RawOutputFormat, Severity, SupportedMimeType, ValidationStatus, ValidatorType,
};
