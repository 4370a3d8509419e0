//! The methane dispatch controller: decides how much methane-fired generation to run each hour.
//!
//! Two policies are supported. The forecast-driven policy is a receding-horizon controller: every
//! hour it looks at the predicted deficits in the forecast window and burns just enough methane to
//! keep the battery from running out before the worst point of the window and to finish the window
//! holding a minimum reserve. The seasonal policy burns methane in the winter months only.
use super::forecast::ForecastWindow;
use super::storage::StorageState;
use crate::scenario::Scenario;
use crate::time_step::TimeKey;
use crate::units::{Dimensionless, Energy, Power};
use chrono::Datelike;

/// The months in which the seasonal policy burns methane (October to March)
const WINTER_MONTHS: [u32; 6] = [10, 11, 12, 1, 2, 3];

/// Settings for the forecast-driven policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastDispatch {
    /// Fraction of battery capacity to hold at the end of the forecast window
    pub minimum_reserve_fraction: Dimensionless,
    /// Dispatched power is rounded up to a multiple of this
    pub granularity: Power,
}

/// Settings for the seasonal policy.
///
/// The decision doesn't use forecast data. A run with this policy still reads the forecast into
/// the window, though, since the window front is what each actual hour is checked against. So the
/// forecast must run `window_hours - 1` hours past the last simulated hour whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalDispatch {
    /// Methane is only burned while the battery holds less than this
    pub battery_threshold: Energy,
}

/// The policy used to dispatch methane-fired generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchPolicy {
    /// Receding-horizon control based on forecast deficits
    Forecast(ForecastDispatch),
    /// Burn in winter, store in summer
    Seasonal(SeasonalDispatch),
}

impl DispatchPolicy {
    /// Decide how much methane-fired power to request for the hour `key`.
    ///
    /// The forecast window's front entry is the forecast for `key`.
    pub fn decide(
        &self,
        scenario: &Scenario,
        window: &ForecastWindow,
        key: TimeKey,
        state: &StorageState,
    ) -> Power {
        match self {
            Self::Forecast(policy) => decide_dispatch(
                window.deficits(),
                state.battery_level,
                scenario.battery_capacity,
                scenario.battery_discharge_efficiency,
                policy,
                scenario.methane_generation,
            ),
            Self::Seasonal(policy) => policy.decide(
                key,
                state.battery_level,
                scenario.biomethane_inflow(),
                scenario.methane_efficiency,
                scenario.methane_generation,
            ),
        }
    }
}

/// The worst point of the forecast window
#[derive(Debug, PartialEq)]
struct WorstPoint {
    /// The largest cumulative deficit at any point in the window
    max_cumulative: Energy,
    /// The index of the last hour at which `max_cumulative` is reached
    index: usize,
    /// The cumulative deficit over the whole window
    total: Energy,
    /// Number of hours in the window
    len: usize,
}

/// Walk the window accumulating deficits, tracking the largest cumulative deficit.
///
/// Ties go to the later hour. Returns `None` for an empty window.
fn find_worst_point<I>(deficits: I) -> Option<WorstPoint>
where
    I: IntoIterator<Item = Energy>,
{
    let mut worst: Option<WorstPoint> = None;
    let mut cumulative = Energy::ZERO;
    for (index, deficit) in deficits.into_iter().enumerate() {
        cumulative += deficit;
        match worst.as_mut() {
            Some(worst) => {
                if cumulative >= worst.max_cumulative {
                    worst.max_cumulative = cumulative;
                    worst.index = index;
                }
                worst.total = cumulative;
                worst.len = index + 1;
            }
            None => {
                worst = Some(WorstPoint {
                    max_cumulative: cumulative,
                    index,
                    total: cumulative,
                    len: 1,
                });
            }
        }
    }

    worst
}

/// Decide the methane-fired power for the forecast-driven policy.
///
/// Two rates are calculated: the rate needed to keep the battery from running out before the
/// worst point of the window and the rate needed to end the window with the reserve target still
/// in the battery. The larger is dispatched, rounded up to the policy's granularity and limited to
/// the methane plants' nameplate capacity.
///
/// # Arguments
///
/// * `deficits` - Predicted deficits for each hour of the window, starting with this hour
/// * `battery_level` - Energy currently held in the battery
/// * `battery_capacity` - Battery energy capacity
/// * `discharge_efficiency` - Fraction of stored energy delivered when discharging
/// * `policy` - Reserve fraction and granularity
/// * `methane_capacity` - Nameplate capacity of methane-fired generation
pub fn decide_dispatch<I>(
    deficits: I,
    battery_level: Energy,
    battery_capacity: Energy,
    discharge_efficiency: Dimensionless,
    policy: &ForecastDispatch,
    methane_capacity: Power,
) -> Power
where
    I: IntoIterator<Item = Energy>,
{
    let Some(worst) = find_worst_point(deficits) else {
        return Power::ZERO;
    };

    // Surplus expected throughout
    if worst.max_cumulative <= Energy::ZERO {
        return Power::ZERO;
    }

    let available = battery_level * discharge_efficiency;
    let reserve_target = battery_capacity * policy.minimum_reserve_fraction * discharge_efficiency;

    let to_avoid_exhaustion = (worst.max_cumulative - available).spread_over(worst.index + 1);
    let to_reach_reserve_target = (worst.total + reserve_target - available).spread_over(worst.len);

    to_avoid_exhaustion
        .max(to_reach_reserve_target)
        .max(Power::ZERO)
        .ceil_to(policy.granularity)
        .min(methane_capacity)
}

impl SeasonalDispatch {
    /// Decide the methane-fired power for the seasonal policy.
    ///
    /// In winter, while the battery is below the threshold, this hour's biomethane is burned along
    /// with the same amount again from the methane store. Otherwise nothing is burned and the
    /// biomethane is stored.
    pub fn decide(
        &self,
        key: TimeKey,
        battery_level: Energy,
        inflow: Energy,
        methane_efficiency: Dimensionless,
        methane_capacity: Power,
    ) -> Power {
        if !WINTER_MONTHS.contains(&key.date.month()) || battery_level >= self.battery_threshold {
            return Power::ZERO;
        }

        (Dimensionless(2.0) * inflow * methane_efficiency)
            .per_hour()
            .min(methane_capacity)
    }
}
