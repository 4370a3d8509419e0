//! Defines the `ScenarioParameters` struct, which represents the contents of `scenario.toml`.
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

/// The file name for the scenario parameters
pub const SCENARIO_PARAMETERS_FILE_NAME: &str = "scenario.toml";

/// The smallest lookahead window the forecast-driven controller may use
pub const MIN_WINDOW_HOURS: usize = 12;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_methane_storage_gwh, f64, 270_000.0);
define_param_default!(default_battery_efficiency, f64, 0.95);
define_param_default!(default_battery_initial_fraction, f64, 0.05);
define_param_default!(default_methane_efficiency, f64, 0.45);
define_param_default!(default_biomethane_capacity_factor, f64, 0.90);
define_param_default!(default_methane_initial_days, f64, 90.0);
define_param_default!(default_window_hours, usize, 48);
define_param_default!(default_load_margin, f64, 1.10);
define_param_default!(default_generation_margin, f64, 0.90);
define_param_default!(default_minimum_reserve_fraction, f64, 0.20);
define_param_default!(default_granularity_mw, f64, 1.0);
define_param_default!(default_seasonal_battery_threshold_gwh, f64, 100_000.0);

/// Represents the contents of the entire scenario file.
///
/// Capacities are given in GW (power) and GWh (energy).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ScenarioParameters {
    /// Factor by which the historic grid load is scaled
    pub load_factor: f64,
    /// Installed onshore wind capacity (GW)
    pub onshore_wind_gw: f64,
    /// Installed offshore wind capacity (GW)
    pub offshore_wind_gw: f64,
    /// Installed photovoltaic capacity (GW)
    pub solar_gw: f64,
    /// Grid level battery storage capacity (GWh)
    pub battery_storage_gwh: f64,
    /// Biomethane production capacity (GW of fuel)
    pub biomethane_gw: f64,
    /// Methane-fired electricity generation capacity (GW)
    pub methane_gw: f64,
    /// Geological methane storage capacity (GWh of fuel)
    #[serde(default = "default_methane_storage_gwh")]
    pub methane_storage_gwh: f64,
    /// Fraction of energy retained when charging the battery
    #[serde(default = "default_battery_efficiency")]
    pub battery_charge_efficiency: f64,
    /// Fraction of stored energy delivered when discharging the battery
    #[serde(default = "default_battery_efficiency")]
    pub battery_discharge_efficiency: f64,
    /// Fraction of battery capacity charged at the start of the run
    #[serde(default = "default_battery_initial_fraction")]
    pub battery_initial_fraction: f64,
    /// Electrical efficiency of methane-fired generation
    #[serde(default = "default_methane_efficiency")]
    pub methane_efficiency: f64,
    /// Fraction of biomethane production capacity realised every hour
    #[serde(default = "default_biomethane_capacity_factor")]
    pub biomethane_capacity_factor: f64,
    /// Days of biomethane production held in the methane store at the start of the run
    #[serde(default = "default_methane_initial_days")]
    pub methane_initial_days: f64,
    /// The last date to simulate (inclusive). If absent, the run ends with the actual data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Options for dispatching methane-fired generation
    #[serde(default)]
    pub dispatch: DispatchParameters,
}

/// Represents the `[dispatch]` section of the scenario file
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DispatchParameters {
    /// The policy used to decide how much methane to burn each hour
    #[serde(default)]
    pub policy: PolicyKind,
    /// Number of hours of forecast data to look ahead
    #[serde(default = "default_window_hours")]
    pub window_hours: usize,
    /// Factor applied to forecast load to guard against under-forecasting
    #[serde(default = "default_load_margin")]
    pub load_margin: f64,
    /// Factor applied to forecast generation to guard against over-forecasting
    #[serde(default = "default_generation_margin")]
    pub generation_margin: f64,
    /// Fraction of battery capacity the controller aims to hold at the end of its window
    #[serde(default = "default_minimum_reserve_fraction")]
    pub minimum_reserve_fraction: f64,
    /// Dispatched power is rounded up to a multiple of this value (MW)
    #[serde(default = "default_granularity_mw")]
    pub granularity_mw: f64,
    /// For the seasonal policy: methane is only burned while the battery holds less than this (GWh)
    #[serde(default = "default_seasonal_battery_threshold_gwh")]
    pub seasonal_battery_threshold_gwh: f64,
}

impl Default for DispatchParameters {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            window_hours: default_window_hours(),
            load_margin: default_load_margin(),
            generation_margin: default_generation_margin(),
            minimum_reserve_fraction: default_minimum_reserve_fraction(),
            granularity_mw: default_granularity_mw(),
            seasonal_battery_threshold_gwh: default_seasonal_battery_threshold_gwh(),
        }
    }
}

/// The policy used to dispatch methane-fired generation
#[derive(
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
    Debug,
    PartialEq,
    Eq,
    Default,
    Clone,
    Copy,
    clap::ValueEnum,
)]
pub enum PolicyKind {
    /// Look ahead at forecast deficits and burn just enough to keep the battery from running out
    #[default]
    #[string = "forecast"]
    Forecast,
    /// Burn biomethane plus stored methane in the winter months, store it in summer
    #[string = "seasonal"]
    Seasonal,
}

/// Check that a capacity or other quantity is a finite, non-negative number
fn check_non_negative(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero"
    );

    Ok(())
}

/// Check that an efficiency or factor lies in (0, 1]
fn check_efficiency(value: f64, name: &str) -> Result<()> {
    ensure!(
        value > 0.0 && value <= 1.0,
        "{name} must be greater than zero and less than or equal to one"
    );

    Ok(())
}

/// Check that a fraction lies in [0, 1]
fn check_fraction(value: f64, name: &str) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "{name} must be between zero and one"
    );

    Ok(())
}

impl DispatchParameters {
    /// Validate the dispatch options
    fn validate(&self) -> Result<()> {
        ensure!(
            self.window_hours >= MIN_WINDOW_HOURS,
            "window_hours must be at least {MIN_WINDOW_HOURS}"
        );
        ensure!(
            self.load_margin.is_finite() && self.load_margin >= 1.0,
            "load_margin must be a finite number greater than or equal to one"
        );
        ensure!(
            self.generation_margin > 0.0 && self.generation_margin <= 1.0,
            "generation_margin must be greater than zero and less than or equal to one"
        );
        check_fraction(self.minimum_reserve_fraction, "minimum_reserve_fraction")?;
        check_non_negative(self.granularity_mw, "granularity_mw")?;
        check_non_negative(
            self.seasonal_battery_threshold_gwh,
            "seasonal_battery_threshold_gwh",
        )?;

        Ok(())
    }
}

impl ScenarioParameters {
    /// Read a scenario file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `scenario_dir` - Folder containing the scenario files
    ///
    /// # Returns
    ///
    /// The file contents as a [`ScenarioParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(scenario_dir: P) -> Result<ScenarioParameters> {
        let file_path = scenario_dir.as_ref().join(SCENARIO_PARAMETERS_FILE_NAME);
        let params: ScenarioParameters = read_toml(&file_path)?;

        params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(params)
    }

    /// Validate parameters after reading in file (or after applying command-line overrides)
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.load_factor.is_finite() && self.load_factor > 0.0,
            "load_factor must be a finite number greater than zero"
        );
        check_non_negative(self.onshore_wind_gw, "onshore_wind_gw")?;
        check_non_negative(self.offshore_wind_gw, "offshore_wind_gw")?;
        check_non_negative(self.solar_gw, "solar_gw")?;
        check_non_negative(self.battery_storage_gwh, "battery_storage_gwh")?;
        check_non_negative(self.biomethane_gw, "biomethane_gw")?;
        check_non_negative(self.methane_gw, "methane_gw")?;
        check_non_negative(self.methane_storage_gwh, "methane_storage_gwh")?;
        check_non_negative(self.methane_initial_days, "methane_initial_days")?;
        check_efficiency(self.battery_charge_efficiency, "battery_charge_efficiency")?;
        check_efficiency(
            self.battery_discharge_efficiency,
            "battery_discharge_efficiency",
        )?;
        check_efficiency(self.methane_efficiency, "methane_efficiency")?;
        check_fraction(self.biomethane_capacity_factor, "biomethane_capacity_factor")?;
        check_fraction(self.battery_initial_fraction, "battery_initial_fraction")?;
        self.dispatch.validate()?;

        if self.battery_storage_gwh <= 0.0 {
            warn!("No battery storage configured: every hour's surplus will be wasted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, scenario_parameters};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_scenario_params_from_path_defaults() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "load_factor = 1.1
onshore_wind_gw = 115.0
offshore_wind_gw = 30.0
solar_gw = 215.0
battery_storage_gwh = 100.0
biomethane_gw = 10.0
methane_gw = 60.0"
            )
            .unwrap();
        }

        let params = ScenarioParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.solar_gw, 215.0);
        assert_eq!(params.methane_storage_gwh, 270_000.0);
        assert_eq!(params.battery_charge_efficiency, 0.95);
        assert_eq!(params.end_date, None);
        assert_eq!(params.dispatch, DispatchParameters::default());
        assert_eq!(params.dispatch.policy, PolicyKind::Forecast);
    }

    #[test]
    fn test_scenario_params_from_path_dispatch_section() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "load_factor = 1.0
onshore_wind_gw = 1.0
offshore_wind_gw = 1.0
solar_gw = 1.0
battery_storage_gwh = 1.0
biomethane_gw = 1.0
methane_gw = 1.0
end_date = \"2022-12-31\"

[dispatch]
policy = \"seasonal\"
window_hours = 24"
            )
            .unwrap();
        }

        let params = ScenarioParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.dispatch.policy, PolicyKind::Seasonal);
        assert_eq!(params.dispatch.window_hours, 24);
        assert_eq!(params.dispatch.load_margin, 1.10);
        assert_eq!(
            params.end_date,
            Some(NaiveDate::from_ymd_opt(2022, 12, 31).unwrap())
        );
    }

    #[test]
    fn test_scenario_params_from_path_invalid() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SCENARIO_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "load_factor = 0.0
onshore_wind_gw = 1.0
offshore_wind_gw = 1.0
solar_gw = 1.0
battery_storage_gwh = 1.0
biomethane_gw = 1.0
methane_gw = 1.0"
            )
            .unwrap();
        }

        let err = ScenarioParameters::from_path(dir.path()).unwrap_err();
        assert_eq!(
            err.chain().nth(1).unwrap().to_string(),
            "load_factor must be a finite number greater than zero"
        );
    }

    #[rstest]
    fn test_validate_ok(scenario_parameters: ScenarioParameters) {
        assert!(scenario_parameters.validate().is_ok());
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(1.5, true)]
    #[case(-1.0, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_non_negative(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(check_non_negative(value, "solar_gw").is_ok(), expected_valid);
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(0.45, true)]
    #[case(0.0, false)] // would cause division by zero in the storage ledger
    #[case(1.01, false)]
    #[case(f64::NAN, false)]
    fn test_check_efficiency(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(
            check_efficiency(value, "methane_efficiency").is_ok(),
            expected_valid
        );
    }

    #[rstest]
    fn test_validate_negative_capacity(mut scenario_parameters: ScenarioParameters) {
        scenario_parameters.offshore_wind_gw = -1.0;
        assert_error!(
            scenario_parameters.validate(),
            "offshore_wind_gw must be a finite number greater than or equal to zero"
        );
    }

    #[rstest]
    #[case(11, false)]
    #[case(12, true)]
    #[case(168, true)]
    fn test_validate_window_hours(
        mut scenario_parameters: ScenarioParameters,
        #[case] window_hours: usize,
        #[case] expected_valid: bool,
    ) {
        scenario_parameters.dispatch.window_hours = window_hours;
        assert_eq!(scenario_parameters.validate().is_ok(), expected_valid);
    }

    #[rstest]
    fn test_validate_margins(mut scenario_parameters: ScenarioParameters) {
        scenario_parameters.dispatch.load_margin = 0.9;
        assert_error!(
            scenario_parameters.validate(),
            "load_margin must be a finite number greater than or equal to one"
        );

        scenario_parameters.dispatch.load_margin = 1.1;
        scenario_parameters.dispatch.generation_margin = 1.1;
        assert_error!(
            scenario_parameters.validate(),
            "generation_margin must be greater than zero and less than or equal to one"
        );
    }
}
