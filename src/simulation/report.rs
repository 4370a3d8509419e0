//! Yearly and whole-run statistics accumulated from the hourly observations.
use super::HourlyObservation;
use crate::units::{Dimensionless, Energy, MEGA_PER_GIGA, MEGA_PER_TERA};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::mem;

/// Hours in a day
const HOURS_PER_DAY: f64 = 24.0;

/// Express `part` as a percentage of `whole`.
///
/// Returns `None` if `whole` is zero.
pub fn percentage(part: Energy, whole: Energy) -> Option<f64> {
    (whole > Energy::ZERO).then(|| 100.0 * (part / whole).value())
}

/// Format an optional percentage for the log
fn display_percentage(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".into(), |value| format!("{value:.2}%"))
}

/// Running sums over a period
#[derive(Debug, Default, Clone, PartialEq)]
struct Accumulator {
    hours: usize,
    load: Energy,
    hydro: Energy,
    onshore: Energy,
    offshore: Energy,
    solar: Energy,
    methane: Energy,
    battery_discharge: Energy,
    missing: Energy,
    wasted: Energy,
    imbalance: Energy,
}

impl Accumulator {
    fn add(&mut self, observation: &HourlyObservation) {
        self.hours += 1;
        self.load += observation.load;
        self.hydro += observation.hydro;
        self.onshore += observation.onshore;
        self.offshore += observation.offshore;
        self.solar += observation.solar;
        self.methane += observation.methane;
        self.battery_discharge += (-observation.battery_flow).max(Energy::ZERO);
        self.missing += observation.missing;
        self.wasted += observation.wasted;
        self.imbalance += observation.generation() - observation.load;
    }
}

/// Statistics for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    /// The calendar year
    pub year: i32,
    /// False if the data ended before Dec 31 23:00
    pub complete: bool,
    /// Number of hours simulated
    pub hours: usize,
    /// Number of days simulated
    pub days: f64,
    /// Total (scaled) load
    pub total_load: Energy,
    /// Average load per day
    pub average_daily_load: Energy,
    /// Average load per hour
    pub average_hourly_load: Energy,
    /// Demand which couldn't be met
    pub missing: Energy,
    /// Surplus which couldn't be stored
    pub wasted: Energy,
    /// Hydropower generation
    pub hydro: Energy,
    /// Onshore wind generation
    pub onshore: Energy,
    /// Offshore wind generation
    pub offshore: Energy,
    /// Photovoltaic generation
    pub solar: Energy,
    /// Methane-fired generation
    pub methane: Energy,
    /// Energy delivered by the battery
    pub battery_discharge: Energy,
    /// Missing energy as a percentage of load
    pub missing_percent: Option<f64>,
}

impl YearSummary {
    fn new(year: i32, complete: bool, acc: &Accumulator) -> Self {
        let hours = acc.hours as f64;
        let days = hours / HOURS_PER_DAY;
        Self {
            year,
            complete,
            hours: acc.hours,
            days,
            total_load: acc.load,
            average_daily_load: acc.load / Dimensionless(days),
            average_hourly_load: acc.load / Dimensionless(hours),
            missing: acc.missing,
            wasted: acc.wasted,
            hydro: acc.hydro,
            onshore: acc.onshore,
            offshore: acc.offshore,
            solar: acc.solar,
            methane: acc.methane,
            battery_discharge: acc.battery_discharge,
            missing_percent: percentage(acc.missing, acc.load),
        }
    }
}

impl Display for YearSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let twh = |energy: Energy| energy.value() / MEGA_PER_TERA;
        write!(
            f,
            "{}{}: load {:.2}TWh, missing {:.2}TWh ({}), wasted {:.2}TWh, methane {:.2}TWh",
            self.year,
            if self.complete { "" } else { " (partial)" },
            twh(self.total_load),
            twh(self.missing),
            display_percentage(self.missing_percent),
            twh(self.wasted),
            twh(self.methane)
        )
    }
}

/// Statistics for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Number of hours simulated
    pub hours: usize,
    /// Total (scaled) load
    pub load: Energy,
    /// Hydropower generation
    pub hydro: Energy,
    /// Onshore wind generation
    pub onshore: Energy,
    /// Offshore wind generation
    pub offshore: Energy,
    /// Photovoltaic generation
    pub solar: Energy,
    /// Methane-fired generation
    pub methane: Energy,
    /// Energy delivered by the battery
    pub battery_discharge: Energy,
    /// Demand which couldn't be met
    pub missing: Energy,
    /// Surplus which couldn't be stored
    pub wasted: Energy,
    /// Missing energy as a percentage of load
    pub missing_percent: Option<f64>,
    /// Mean of generation minus load over all hours
    pub average_hourly_imbalance: Option<Energy>,
}

impl From<&Accumulator> for Totals {
    fn from(acc: &Accumulator) -> Self {
        Self {
            hours: acc.hours,
            load: acc.load,
            hydro: acc.hydro,
            onshore: acc.onshore,
            offshore: acc.offshore,
            solar: acc.solar,
            methane: acc.methane,
            battery_discharge: acc.battery_discharge,
            missing: acc.missing,
            wasted: acc.wasted,
            missing_percent: percentage(acc.missing, acc.load),
            average_hourly_imbalance: (acc.hours > 0)
                .then(|| acc.imbalance / Dimensionless(acc.hours as f64)),
        }
    }
}

impl Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let twh = |energy: Energy| energy.value() / MEGA_PER_TERA;
        let imbalance = self.average_hourly_imbalance.map_or_else(
            || "n/a".into(),
            |energy| format!("{:.2}GW", energy.value() / MEGA_PER_GIGA),
        );
        write!(
            f,
            "{} hours: average difference {imbalance}, missing {:.2}TWh ({}), wasted {:.2}TWh",
            self.hours,
            twh(self.missing),
            display_percentage(self.missing_percent),
            twh(self.wasted)
        )
    }
}

/// The statistics produced by a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// One summary per calendar year, in order
    pub years: Vec<YearSummary>,
    /// Statistics for the whole run
    pub totals: Totals,
}

/// Accumulates hourly observations into yearly summaries and grand totals.
///
/// The yearly sums are flushed after the Dec 31 23:00 hour. Storage levels aren't tracked here, so
/// they carry over into the next year unaffected.
#[derive(Debug, Default)]
pub struct Reporter {
    current_year: Option<i32>,
    year: Accumulator,
    total: Accumulator,
    years: Vec<YearSummary>,
}

impl Reporter {
    /// Add an hour's observation.
    ///
    /// Returns the summary for the year if this was the last hour of the year.
    pub fn record(&mut self, observation: &HourlyObservation) -> Option<YearSummary> {
        self.current_year.get_or_insert(observation.key().year());
        self.year.add(observation);
        self.total.add(observation);

        if observation.key().is_year_end() {
            self.flush_year(true)
        } else {
            None
        }
    }

    /// Close the accumulators for the current year, if any hours have been added
    fn flush_year(&mut self, complete: bool) -> Option<YearSummary> {
        let year = self.current_year.take()?;
        let acc = mem::take(&mut self.year);
        if acc.hours == 0 {
            return None;
        }

        let summary = YearSummary::new(year, complete, &acc);
        self.years.push(summary.clone());
        Some(summary)
    }

    /// Finish the run, flushing any partial year
    pub fn finish(mut self) -> Report {
        self.flush_year(false);
        Report {
            years: self.years,
            totals: Totals::from(&self.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::timestamp;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn observation(at: &str, load: f64, solar: f64, battery_flow: f64) -> HourlyObservation {
        let at = timestamp(at);
        HourlyObservation {
            date: at.date(),
            time: at.time(),
            load: Energy(load),
            hydro: Energy(10.0),
            onshore: Energy::ZERO,
            offshore: Energy::ZERO,
            solar: Energy(solar),
            methane: Energy::ZERO,
            battery_flow: Energy(battery_flow),
            battery_level: Energy::ZERO,
            battery_percent: None,
            methane_level: Energy::ZERO,
            methane_percent: None,
            wasted: Energy::ZERO,
            missing: Energy((load - solar - 10.0 + battery_flow).max(0.0)),
        }
    }

    #[rstest]
    #[case(50.0, 200.0, Some(25.0))]
    #[case(0.0, 200.0, Some(0.0))]
    #[case(5.0, 0.0, None)]
    fn test_percentage(#[case] part: f64, #[case] whole: f64, #[case] expected: Option<f64>) {
        assert_eq!(percentage(Energy(part), Energy(whole)), expected);
    }

    #[test]
    fn test_year_rollover() {
        let mut reporter = Reporter::default();
        assert_eq!(
            reporter.record(&observation("2021-12-31 22:00", 100.0, 0.0, -50.0)),
            None
        );

        let summary = reporter
            .record(&observation("2021-12-31 23:00", 100.0, 0.0, -90.0))
            .unwrap();
        assert_eq!(summary.year, 2021);
        assert!(summary.complete);
        assert_eq!(summary.hours, 2);
        assert_eq!(summary.total_load, Energy(200.0));
        assert_eq!(summary.average_hourly_load, Energy(100.0));
        assert_approx_eq!(f64, summary.average_daily_load.value(), 2400.0, epsilon = 1e-9);
        assert_eq!(summary.battery_discharge, Energy(140.0));
        assert_eq!(summary.missing, Energy(40.0));
        assert_approx_eq!(f64, summary.missing_percent.unwrap(), 20.0);

        // The first hour of the new year starts from zero
        assert_eq!(
            reporter.record(&observation("2022-01-01 00:00", 50.0, 80.0, 40.0)),
            None
        );
        assert_eq!(reporter.year.hours, 1);
        assert_eq!(reporter.year.load, Energy(50.0));

        let report = reporter.finish();
        assert_eq!(report.years.len(), 2);
        assert_eq!(report.years[1].year, 2022);
        assert!(!report.years[1].complete);
        assert_eq!(report.years[1].hours, 1);
        assert_eq!(report.years[1].battery_discharge, Energy::ZERO);

        assert_eq!(report.totals.hours, 3);
        assert_eq!(report.totals.load, Energy(250.0));
        assert_eq!(report.totals.hydro, Energy(30.0));
        assert_eq!(report.totals.solar, Energy(80.0));
        // Generation 110 against load 250 over three hours
        assert_approx_eq!(
            f64,
            report.totals.average_hourly_imbalance.unwrap().value(),
            -140.0 / 3.0
        );
    }

    #[test]
    fn test_finish_without_trailing_hours() {
        let mut reporter = Reporter::default();
        reporter.record(&observation("2021-12-31 23:00", 100.0, 0.0, 0.0));
        let report = reporter.finish();
        assert_eq!(report.years.len(), 1);
        assert!(report.years[0].complete);
    }

    #[test]
    fn test_finish_empty() {
        let report = Reporter::default().finish();
        assert!(report.years.is_empty());
        assert_eq!(report.totals.hours, 0);
        assert_eq!(report.totals.missing_percent, None);
        assert_eq!(report.totals.average_hourly_imbalance, None);
    }

    #[test]
    fn test_zero_load_year() {
        let mut reporter = Reporter::default();
        reporter.record(&observation("2021-06-01 00:00", 0.0, 0.0, 0.0));
        let report = reporter.finish();
        assert_eq!(report.years[0].missing_percent, None);
        assert_eq!(
            report.years[0].to_string(),
            "2021 (partial): load 0.00TWh, missing 0.00TWh (n/a), wasted 0.00TWh, methane 0.00TWh"
        );
    }
}
