//! Code for the scenario to be simulated: installed capacities, efficiencies and dispatch policy.
use crate::simulation::dispatch::{DispatchPolicy, ForecastDispatch, SeasonalDispatch};
use crate::simulation::storage::StorageState;
use crate::time_step::TimeStep;
use crate::units::{Dimensionless, Energy, MEGA_PER_GIGA, Power};
use chrono::NaiveDate;

pub mod parameters;
pub use parameters::{DispatchParameters, PolicyKind, ScenarioParameters};

/// Hours in a day, for converting the initial methane stock from days of production
const HOURS_PER_DAY: f64 = 24.0;

/// Factors applied to forecast data so that the dispatch controller errs on the safe side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastMargins {
    /// Number of hours of forecast the controller looks ahead
    pub window_hours: usize,
    /// Multiplier for forecast load (at least one)
    pub load_margin: Dimensionless,
    /// Multiplier for forecast generation (at most one)
    pub generation_margin: Dimensionless,
}

/// The capacity configuration for a simulation run.
///
/// All values are held constant for the whole horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Factor by which historic load is scaled
    pub load_factor: Dimensionless,
    /// Installed onshore wind capacity
    pub onshore_wind: Power,
    /// Installed offshore wind capacity
    pub offshore_wind: Power,
    /// Installed photovoltaic capacity
    pub solar: Power,
    /// Methane-fired generation capacity (electrical output)
    pub methane_generation: Power,
    /// Biomethane production capacity (fuel)
    pub biomethane_production: Power,
    /// Fraction of biomethane production capacity realised every hour
    pub biomethane_capacity_factor: Dimensionless,
    /// Battery energy capacity
    pub battery_capacity: Energy,
    /// Geological methane storage capacity (fuel)
    pub methane_storage_capacity: Energy,
    /// Fraction of energy retained when charging the battery
    pub battery_charge_efficiency: Dimensionless,
    /// Fraction of stored energy delivered when discharging the battery
    pub battery_discharge_efficiency: Dimensionless,
    /// Electrical efficiency of methane-fired generation
    pub methane_efficiency: Dimensionless,
    /// Fraction of battery capacity charged at the start
    pub battery_initial_fraction: Dimensionless,
    /// Days of biomethane production held in the methane store at the start
    pub methane_initial_days: f64,
    /// Last date to simulate, if bounded
    pub end_date: Option<NaiveDate>,
    /// Forecast lookahead settings
    pub forecast: ForecastMargins,
    /// How methane-fired generation is dispatched
    pub dispatch: DispatchPolicy,
}

/// Convert a GW (or GWh) figure from the scenario file into MW (or MWh)
fn from_giga(value: f64) -> f64 {
    value * MEGA_PER_GIGA
}

impl From<&ScenarioParameters> for Scenario {
    fn from(params: &ScenarioParameters) -> Self {
        let dispatch = match params.dispatch.policy {
            PolicyKind::Forecast => DispatchPolicy::Forecast(ForecastDispatch {
                minimum_reserve_fraction: Dimensionless(params.dispatch.minimum_reserve_fraction),
                granularity: Power(params.dispatch.granularity_mw),
            }),
            PolicyKind::Seasonal => DispatchPolicy::Seasonal(SeasonalDispatch {
                battery_threshold: Energy(from_giga(
                    params.dispatch.seasonal_battery_threshold_gwh,
                )),
            }),
        };

        Self {
            load_factor: Dimensionless(params.load_factor),
            onshore_wind: Power(from_giga(params.onshore_wind_gw)),
            offshore_wind: Power(from_giga(params.offshore_wind_gw)),
            solar: Power(from_giga(params.solar_gw)),
            methane_generation: Power(from_giga(params.methane_gw)),
            biomethane_production: Power(from_giga(params.biomethane_gw)),
            biomethane_capacity_factor: Dimensionless(params.biomethane_capacity_factor),
            battery_capacity: Energy(from_giga(params.battery_storage_gwh)),
            methane_storage_capacity: Energy(from_giga(params.methane_storage_gwh)),
            battery_charge_efficiency: Dimensionless(params.battery_charge_efficiency),
            battery_discharge_efficiency: Dimensionless(params.battery_discharge_efficiency),
            methane_efficiency: Dimensionless(params.methane_efficiency),
            battery_initial_fraction: Dimensionless(params.battery_initial_fraction),
            methane_initial_days: params.methane_initial_days,
            end_date: params.end_date,
            forecast: ForecastMargins {
                window_hours: params.dispatch.window_hours,
                load_margin: Dimensionless(params.dispatch.load_margin),
                generation_margin: Dimensionless(params.dispatch.generation_margin),
            },
            dispatch,
        }
    }
}

impl Scenario {
    /// The grid load for an hour, scaled by the load factor
    pub fn load(&self, step: &TimeStep) -> Energy {
        step.load * self.load_factor
    }

    /// Onshore wind generation for an hour
    pub fn onshore(&self, step: &TimeStep) -> Energy {
        (self.onshore_wind * step.wind_onshore_fraction).over_one_hour()
    }

    /// Offshore wind generation for an hour
    pub fn offshore(&self, step: &TimeStep) -> Energy {
        (self.offshore_wind * step.wind_offshore_fraction).over_one_hour()
    }

    /// Photovoltaic generation for an hour
    pub fn solar(&self, step: &TimeStep) -> Energy {
        (self.solar * step.solar_fraction).over_one_hour()
    }

    /// Generation from sources which can't be dispatched (hydro, wind and solar)
    pub fn renewable_generation(&self, step: &TimeStep) -> Energy {
        step.hydro + self.onshore(step) + self.offshore(step) + self.solar(step)
    }

    /// The deficit predicted for a forecast record, with the safety margins applied
    pub fn forecast_deficit(&self, step: &TimeStep) -> Energy {
        self.load(step) * self.forecast.load_margin
            - self.renewable_generation(step) * self.forecast.generation_margin
    }

    /// Biomethane fed into the methane system every hour
    pub fn biomethane_inflow(&self) -> Energy {
        (self.biomethane_production * self.biomethane_capacity_factor).over_one_hour()
    }

    /// The storage levels at the start of the run
    pub fn initial_storage(&self) -> StorageState {
        let methane =
            self.biomethane_inflow() * Dimensionless(self.methane_initial_days * HOURS_PER_DAY);

        StorageState {
            battery_level: self.battery_capacity * self.battery_initial_fraction,
            methane_level: methane.min(self.methane_storage_capacity),
        }
    }
}
