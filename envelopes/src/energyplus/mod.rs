//! EnergyPlus family
//!
//! Narrows `inputs` to [`EnergyPlusInputs`] and `outputs` to
//! [`EnergyPlusOutputs`]. Results are mandatory: an EnergyPlus output
//! envelope always carries `outputs`, even when the run failed.

pub mod builder;
pub mod config;
pub mod results;

pub use builder::{EnergyPlusJobRequest, PRIMARY_MODEL_ROLE, WEATHER_RESOURCE_TYPE};
pub use config::EnergyPlusInputs;
pub use results::{
    EnergyPlusOutputs, EnergyPlusSimulationLogs, EnergyPlusSimulationMetrics,
    EnergyPlusSimulationOutputs, LOG_TAIL_LINES, STDOUT_TAIL_CHARS,
};

use crate::envelope::{InputEnvelope, InputPayload, OutputEnvelope, ResultsPayload};
use crate::registry::Family;

pub type EnergyPlusInputEnvelope = InputEnvelope<EnergyPlusInputs>;
pub type EnergyPlusOutputEnvelope = OutputEnvelope<EnergyPlusOutputs>;

impl InputPayload for EnergyPlusInputs {
    const FAMILY: Option<Family> = Some(Family::EnergyPlus);
}

impl ResultsPayload for EnergyPlusOutputs {
    const FAMILY: Option<Family> = Some(Family::EnergyPlus);
    const NULLABLE: bool = false;
}
