//! Fixtures for tests

use crate::scenario::{DispatchParameters, Scenario, ScenarioParameters};
use crate::time_step::TimeStep;
use crate::units::{Dimensionless, Energy};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn scenario_parameters() -> ScenarioParameters {
    ScenarioParameters {
        load_factor: 1.5,
        onshore_wind_gw: 1.0,
        offshore_wind_gw: 0.5,
        solar_gw: 2.0,
        battery_storage_gwh: 10.0,
        biomethane_gw: 0.1,
        methane_gw: 2.0,
        methane_storage_gwh: 270_000.0,
        battery_charge_efficiency: 0.95,
        battery_discharge_efficiency: 0.95,
        battery_initial_fraction: 0.05,
        methane_efficiency: 0.45,
        biomethane_capacity_factor: 0.9,
        methane_initial_days: 90.0,
        end_date: None,
        dispatch: DispatchParameters {
            window_hours: 12,
            ..DispatchParameters::default()
        },
    }
}

#[fixture]
pub fn scenario(scenario_parameters: ScenarioParameters) -> Scenario {
    Scenario::from(&scenario_parameters)
}

#[fixture]
pub fn time_step() -> TimeStep {
    TimeStep {
        date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
        time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        load: Energy(2000.0),
        hydro: Energy(100.0),
        wind_onshore_fraction: Dimensionless(0.5),
        wind_offshore_fraction: Dimensionless(0.4),
        solar_fraction: Dimensionless(0.25),
    }
}

/// Parse a timestamp in the form `YYYY-MM-DD HH:MM`
pub fn timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

/// Copies of `template` for consecutive hours, starting at `start`
pub fn hourly_steps(start: &str, hours: usize, template: &TimeStep) -> Vec<TimeStep> {
    let start = timestamp(start);
    (0..hours)
        .map(|hour| {
            let at = start + Duration::hours(hour as i64);
            TimeStep {
                date: at.date(),
                time: at.time(),
                ..template.clone()
            }
        })
        .collect()
}

/// A record with only load and no generation at all
pub fn load_only(load: f64) -> TimeStep {
    TimeStep {
        date: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
        time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        load: Energy(load),
        hydro: Energy::ZERO,
        wind_onshore_fraction: Dimensionless(0.0),
        wind_offshore_fraction: Dimensionless(0.0),
        solar_fraction: Dimensionless(0.0),
    }
}
