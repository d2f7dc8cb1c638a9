//! EnergyPlus run configuration carried in `inputs`

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::decode::{Bound, Decode, FieldPath, Fields, ViolationReport};
use crate::deserialize_via_decode;
use crate::types::InvocationMode;

pub const DEFAULT_TIMESTEP_PER_HOUR: i64 = 4;

/// Allowed range of `timestep_per_hour`, inclusive.
pub const TIMESTEP_PER_HOUR_RANGE: Bound = Bound::Between(1.0, 60.0);

/// Simulation settings for one EnergyPlus run. Output signals are not
/// requested here; every catalog signal is extracted.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct EnergyPlusInputs {
    /// Timesteps per simulated hour (4 = 15-minute steps).
    #[schemars(default = "default_timestep_per_hour", range(min = 1, max = 60))]
    pub timestep_per_hour: i64,
    /// Overrides the run period length in days.
    pub run_period_days: Option<i64>,
    #[schemars(default)]
    pub invocation_mode: InvocationMode,
}

fn default_timestep_per_hour() -> i64 {
    DEFAULT_TIMESTEP_PER_HOUR
}

impl Default for EnergyPlusInputs {
    fn default() -> Self {
        Self {
            timestep_per_hour: DEFAULT_TIMESTEP_PER_HOUR,
            run_period_days: None,
            invocation_mode: InvocationMode::Cli,
        }
    }
}

impl Decode for EnergyPlusInputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let timestep_per_hour = f.number_or(
            "timestep_per_hour",
            DEFAULT_TIMESTEP_PER_HOUR,
            Some(TIMESTEP_PER_HOUR_RANGE),
        );
        let run_period_days = f.optional_number("run_period_days", None);
        let invocation_mode = f.enumerated_or("invocation_mode", InvocationMode::Cli);
        f.finish();
        Some(Self {
            timestep_per_hour: timestep_per_hour?,
            run_period_days: run_period_days?,
            invocation_mode: invocation_mode?,
        })
    }
}

deserialize_via_decode!(EnergyPlusInputs);
