//! FMU (co-simulation) family
//!
//! Narrows `inputs` to [`FmuInputs`] and `outputs` to [`FmuOutputs`].
//! An FMU output envelope may omit `outputs` when the run produced none.
//! [`probe`] holds the metadata scan used before any job runs.

pub mod builder;
pub mod config;
pub mod probe;
pub mod results;

pub use builder::{FmuJobRequest, FMU_FILE_NAME, FMU_ROLE};
pub use config::{FmuInputs, FmuSimulationConfig};
pub use probe::{FmiVariable, ProbeResult, ProbeStatus};
pub use results::FmuOutputs;

use crate::envelope::{InputEnvelope, InputPayload, OutputEnvelope, ResultsPayload};
use crate::registry::Family;

pub type FmuInputEnvelope = InputEnvelope<FmuInputs>;
pub type FmuOutputEnvelope = OutputEnvelope<FmuOutputs>;

impl InputPayload for FmuInputs {
    const FAMILY: Option<Family> = Some(Family::Fmu);
}

impl ResultsPayload for FmuOutputs {
    const FAMILY: Option<Family> = Some(Family::Fmu);
    const NULLABLE: bool = true;
}
