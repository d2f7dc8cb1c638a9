//! EnergyPlus results carried in `outputs`
//!
//! Composed from three reusable sub-models: output file locations,
//! extracted metrics and log tails.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::decode::{Bound, Decode, FieldPath, Fields, ViolationReport};
use crate::deserialize_via_decode;
use crate::types::InvocationMode;

/// Characters of stdout/stderr kept in a log tail.
pub const STDOUT_TAIL_CHARS: usize = 4000;

/// Lines of `eplusout.err` kept in a log tail.
pub const LOG_TAIL_LINES: usize = 200;

/// Last `limit` characters of `text`.
pub fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}

/// Last `limit` lines of `text`.
pub fn tail_lines(text: &str, limit: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].join("\n")
}

// ============================================================================
// Sub-models
// ============================================================================

/// Locations of files EnergyPlus wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct EnergyPlusSimulationOutputs {
    pub eplusout_sql: Option<PathBuf>,
    pub eplusout_err: Option<PathBuf>,
    pub eplusout_csv: Option<PathBuf>,
    pub eplusout_eso: Option<PathBuf>,
}

impl Decode for EnergyPlusSimulationOutputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let eplusout_sql = f.optional("eplusout_sql", "path string");
        let eplusout_err = f.optional("eplusout_err", "path string");
        let eplusout_csv = f.optional("eplusout_csv", "path string");
        let eplusout_eso = f.optional("eplusout_eso", "path string");
        f.finish();
        Some(Self {
            eplusout_sql: eplusout_sql?,
            eplusout_err: eplusout_err?,
            eplusout_csv: eplusout_csv?,
            eplusout_eso: eplusout_eso?,
        })
    }
}

/// Output signals extracted from the simulation database. Every value is
/// optional and non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields, default)]
pub struct EnergyPlusSimulationMetrics {
    // Site energy
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub site_electricity_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub site_natural_gas_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub site_district_cooling_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub site_district_heating_kwh: Option<f64>,
    /// Site energy use intensity.
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub site_eui_kwh_m2: Option<f64>,

    // End uses
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub heating_energy_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub cooling_energy_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub interior_lighting_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub fans_energy_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub pumps_energy_kwh: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub water_systems_kwh: Option<f64>,

    // Comfort and demand
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub unmet_heating_hours: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub unmet_cooling_hours: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub peak_electric_demand_w: Option<f64>,

    // Building
    #[schemars(schema_with = "crate::schema::optional_non_negative_number")]
    pub floor_area_m2: Option<f64>,
    #[schemars(schema_with = "crate::schema::optional_non_negative_integer")]
    pub zone_count: Option<i64>,
}

impl Decode for EnergyPlusSimulationMetrics {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let bound = Some(Bound::NON_NEGATIVE);
        let mut f = Fields::open(value, path, report)?;
        let site_electricity_kwh = f.optional_number("site_electricity_kwh", bound);
        let site_natural_gas_kwh = f.optional_number("site_natural_gas_kwh", bound);
        let site_district_cooling_kwh = f.optional_number("site_district_cooling_kwh", bound);
        let site_district_heating_kwh = f.optional_number("site_district_heating_kwh", bound);
        let site_eui_kwh_m2 = f.optional_number("site_eui_kwh_m2", bound);
        let heating_energy_kwh = f.optional_number("heating_energy_kwh", bound);
        let cooling_energy_kwh = f.optional_number("cooling_energy_kwh", bound);
        let interior_lighting_kwh = f.optional_number("interior_lighting_kwh", bound);
        let fans_energy_kwh = f.optional_number("fans_energy_kwh", bound);
        let pumps_energy_kwh = f.optional_number("pumps_energy_kwh", bound);
        let water_systems_kwh = f.optional_number("water_systems_kwh", bound);
        let unmet_heating_hours = f.optional_number("unmet_heating_hours", bound);
        let unmet_cooling_hours = f.optional_number("unmet_cooling_hours", bound);
        let peak_electric_demand_w = f.optional_number("peak_electric_demand_w", bound);
        let floor_area_m2 = f.optional_number("floor_area_m2", bound);
        let zone_count = f.optional_number("zone_count", bound);
        f.finish();
        Some(Self {
            site_electricity_kwh: site_electricity_kwh?,
            site_natural_gas_kwh: site_natural_gas_kwh?,
            site_district_cooling_kwh: site_district_cooling_kwh?,
            site_district_heating_kwh: site_district_heating_kwh?,
            site_eui_kwh_m2: site_eui_kwh_m2?,
            heating_energy_kwh: heating_energy_kwh?,
            cooling_energy_kwh: cooling_energy_kwh?,
            interior_lighting_kwh: interior_lighting_kwh?,
            fans_energy_kwh: fans_energy_kwh?,
            pumps_energy_kwh: pumps_energy_kwh?,
            water_systems_kwh: water_systems_kwh?,
            unmet_heating_hours: unmet_heating_hours?,
            unmet_cooling_hours: unmet_cooling_hours?,
            peak_electric_demand_w: peak_electric_demand_w?,
            floor_area_m2: floor_area_m2?,
            zone_count: zone_count?,
        })
    }
}

/// Tails of the engine's logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct EnergyPlusSimulationLogs {
    pub stdout_tail: Option<String>,
    pub stderr_tail: Option<String>,
    /// Tail of `eplusout.err`.
    pub err_tail: Option<String>,
}

impl EnergyPlusSimulationLogs {
    /// Tail full captured logs down to [`STDOUT_TAIL_CHARS`] characters for
    /// stdout/stderr and [`LOG_TAIL_LINES`] lines for the err file.
    pub fn from_raw(stdout: Option<&str>, stderr: Option<&str>, err_file: Option<&str>) -> Self {
        Self {
            stdout_tail: stdout.map(|s| tail_chars(s, STDOUT_TAIL_CHARS)),
            stderr_tail: stderr.map(|s| tail_chars(s, STDOUT_TAIL_CHARS)),
            err_tail: err_file.map(|s| tail_lines(s, LOG_TAIL_LINES)),
        }
    }
}

impl Decode for EnergyPlusSimulationLogs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let stdout_tail = f.optional("stdout_tail", "string");
        let stderr_tail = f.optional("stderr_tail", "string");
        let err_tail = f.optional("err_tail", "string");
        f.finish();
        Some(Self {
            stdout_tail: stdout_tail?,
            stderr_tail: stderr_tail?,
            err_tail: err_tail?,
        })
    }
}

// ============================================================================
// Results model
// ============================================================================

/// EnergyPlus-specific results. Generic messages, metrics and artifacts
/// live on the envelope itself.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct EnergyPlusOutputs {
    #[schemars(default)]
    pub outputs: EnergyPlusSimulationOutputs,
    #[schemars(default)]
    pub metrics: EnergyPlusSimulationMetrics,
    pub logs: Option<EnergyPlusSimulationLogs>,
    pub energyplus_returncode: i64,
    /// Wall-clock seconds spent running the engine.
    #[schemars(schema_with = "crate::schema::non_negative_number")]
    pub execution_seconds: f64,
    pub invocation_mode: InvocationMode,
}

impl EnergyPlusOutputs {
    pub fn new(energyplus_returncode: i64, execution_seconds: f64, invocation_mode: InvocationMode) -> Self {
        Self {
            outputs: EnergyPlusSimulationOutputs::default(),
            metrics: EnergyPlusSimulationMetrics::default(),
            logs: None,
            energyplus_returncode,
            execution_seconds,
            invocation_mode,
        }
    }

    pub fn engine_succeeded(&self) -> bool {
        self.energyplus_returncode == 0
    }
}

impl Decode for EnergyPlusOutputs {
    fn decode_at(value: &Value, path: &FieldPath, report: &mut ViolationReport) -> Option<Self> {
        let mut f = Fields::open(value, path, report)?;
        let outputs = f.record_or("outputs", Some(EnergyPlusSimulationOutputs::default()));
        let metrics = f.record_or("metrics", Some(EnergyPlusSimulationMetrics::default()));
        let logs = f.optional_record("logs");
        let energyplus_returncode = f.number("energyplus_returncode", None);
        let execution_seconds = f.number("execution_seconds", Some(Bound::NON_NEGATIVE));
        let invocation_mode = f.enumerated("invocation_mode");
        f.finish();
        Some(Self {
            outputs: outputs?,
            metrics: metrics?,
            logs: logs?,
            energyplus_returncode: energyplus_returncode?,
            execution_seconds: execution_seconds?,
            invocation_mode: invocation_mode?,
        })
    }
}

deserialize_via_decode!(
    EnergyPlusSimulationOutputs,
    EnergyPlusSimulationMetrics,
    EnergyPlusSimulationLogs,
    EnergyPlusOutputs,
);
