//! Functionality for running the grid balance simulation.
use crate::input::time_series::{ACTUAL_FILE_NAME, FORECAST_FILE_NAME, TimeSeriesReader};
use crate::output::DataWriter;
use crate::scenario::Scenario;
use crate::time_step::{TimeKey, TimeStep, serialise_hour_label};
use crate::units::Energy;
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::Path;

pub mod dispatch;
pub mod forecast;
use forecast::ForecastWindow;
pub mod report;
use report::{Report, Reporter, YearSummary, percentage};
pub mod storage;
use storage::{StorageState, apply_battery, apply_methane};

/// The name used for the forecast time series in error messages
pub const FORECAST_STREAM: &str = "forecast";

/// Fatal errors which can occur while simulating
#[derive(Debug, Clone, PartialEq, derive_more::Error)]
pub enum SimulationError {
    /// A time series ran out of records before the run was complete
    InputExhausted {
        /// Which time series ran out
        stream: &'static str,
        /// The last hour read from the time series, if any
        after: Option<TimeKey>,
    },
    /// The forecast and actual time series are not for the same hour
    AlignmentMismatch {
        /// The hour of the forecast record
        forecast: TimeKey,
        /// The hour of the actual record
        actual: TimeKey,
    },
}

impl Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputExhausted {
                stream,
                after: Some(after),
            } => write!(f, "The {stream} data ran out after {after}"),
            Self::InputExhausted {
                stream,
                after: None,
            } => write!(f, "The {stream} data contains no records"),
            Self::AlignmentMismatch { forecast, actual } => write!(
                f,
                "Forecast and actual data are misaligned: forecast is for {forecast} but actual is \
                for {actual}"
            ),
        }
    }
}

/// What happened in one simulated hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyObservation {
    /// Calendar date
    pub date: NaiveDate,
    /// Hour of day
    #[serde(
        serialize_with = "serialise_hour_label",
        deserialize_with = "crate::time_step::deserialise_hour_label"
    )]
    pub time: NaiveTime,
    /// Grid load, scaled by the load factor
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
    /// Energy taken from the grid by the battery (negative if delivered)
    pub battery_flow: Energy,
    /// Battery level at the end of the hour
    pub battery_level: Energy,
    /// Battery level as a percentage of capacity
    pub battery_percent: Option<f64>,
    /// Methane store level at the end of the hour
    pub methane_level: Energy,
    /// Methane store level as a percentage of capacity
    pub methane_percent: Option<f64>,
    /// Surplus which couldn't be stored
    pub wasted: Energy,
    /// Demand which couldn't be met
    pub missing: Energy,
}

impl HourlyObservation {
    /// The hour this observation is for
    pub fn key(&self) -> TimeKey {
        TimeKey::new(self.date, self.time)
    }

    /// Total generation from all sources
    pub fn generation(&self) -> Energy {
        self.hydro + self.onshore + self.offshore + self.solar + self.methane
    }
}

/// The outcome of simulating one hour
#[derive(Debug, Clone, PartialEq)]
pub struct HourStep {
    /// What happened in the hour
    pub observation: HourlyObservation,
    /// The summary for the year, if this was the last hour of the year
    pub year_summary: Option<YearSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Running,
    Exhausted,
}

/// A simulation run, advancing one hour at a time.
///
/// The forecast time series must run at least `window_hours - 1` hours beyond the last hour
/// simulated, because the forecast window always holds the forecast for the current hour and the
/// hours following it.
pub struct Simulation<'a, F, A>
where
    F: Iterator<Item = Result<TimeStep>>,
    A: Iterator<Item = Result<TimeStep>>,
{
    scenario: &'a Scenario,
    forecast: F,
    actual: A,
    window: ForecastWindow,
    state: StorageState,
    reporter: Reporter,
    phase: Phase,
    hours: usize,
}

impl<'a, F, A> Simulation<'a, F, A>
where
    F: Iterator<Item = Result<TimeStep>>,
    A: Iterator<Item = Result<TimeStep>>,
{
    /// Start a new run, filling the forecast window
    pub fn new(scenario: &'a Scenario, mut forecast: F, actual: A) -> Result<Self> {
        let window = ForecastWindow::fill(scenario, &mut forecast)?;

        Ok(Self {
            scenario,
            forecast,
            actual,
            window,
            state: scenario.initial_storage(),
            reporter: Reporter::default(),
            phase: Phase::Running,
            hours: 0,
        })
    }

    /// The current storage levels
    pub fn state(&self) -> &StorageState {
        &self.state
    }

    /// Number of hours simulated so far
    pub fn hours(&self) -> usize {
        self.hours
    }

    /// Read the next actual record, unless the run is over
    fn next_actual(&mut self) -> Result<Option<TimeStep>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }

        let actual = match self.actual.next() {
            Some(actual) => actual?,
            None => {
                self.phase = Phase::Exhausted;
                return Ok(None);
            }
        };

        if self
            .scenario
            .end_date
            .is_some_and(|end_date| actual.date > end_date)
        {
            self.phase = Phase::Exhausted;
            return Ok(None);
        }

        Ok(Some(actual))
    }

    /// Simulate the next hour.
    ///
    /// Returns `None` once the actual data (or the scenario's end date) has been reached.
    pub fn step(&mut self) -> Result<Option<HourStep>> {
        let Some(actual) = self.next_actual()? else {
            return Ok(None);
        };

        // The window already holds this hour's forecast for the first hour
        if self.hours > 0 {
            self.window.advance(self.scenario, &mut self.forecast)?;
        }

        let key = actual.key();
        if let Some(front) = self.window.front() {
            if front.key != key {
                return Err(SimulationError::AlignmentMismatch {
                    forecast: front.key,
                    actual: key,
                }
                .into());
            }
        }

        let scenario = self.scenario;
        let requested = scenario
            .dispatch
            .decide(scenario, &self.window, key, &self.state);
        let methane = apply_methane(
            requested,
            &mut self.state,
            scenario.biomethane_inflow(),
            scenario.methane_storage_capacity,
            scenario.methane_efficiency,
        )
        .over_one_hour();

        let load = scenario.load(&actual);
        let (onshore, offshore, solar) = (
            scenario.onshore(&actual),
            scenario.offshore(&actual),
            scenario.solar(&actual),
        );
        let generation = actual.hydro + onshore + offshore + solar + methane;
        let battery = apply_battery(
            generation - load,
            &mut self.state,
            scenario.battery_capacity,
            scenario.battery_charge_efficiency,
            scenario.battery_discharge_efficiency,
        );

        let observation = HourlyObservation {
            date: actual.date,
            time: actual.time,
            load,
            hydro: actual.hydro,
            onshore,
            offshore,
            solar,
            methane,
            battery_flow: battery.flow,
            battery_level: self.state.battery_level,
            battery_percent: percentage(self.state.battery_level, scenario.battery_capacity),
            methane_level: self.state.methane_level,
            methane_percent: percentage(
                self.state.methane_level,
                scenario.methane_storage_capacity,
            ),
            wasted: battery.wasted,
            missing: battery.missing,
        };
        debug!(
            "{key}: load {load}, generation {generation} (methane {methane}), battery {}, \
            methane store {}, wasted {}, missing {}",
            observation.battery_level,
            observation.methane_level,
            observation.wasted,
            observation.missing
        );

        let year_summary = self.reporter.record(&observation);
        if let Some(summary) = &year_summary {
            info!("{summary}");
        }
        self.hours += 1;

        Ok(Some(HourStep {
            observation,
            year_summary,
        }))
    }

    /// End the run, producing the yearly summaries and grand totals
    pub fn finish(self) -> Report {
        let report = self.reporter.finish();
        if let Some(partial) = report.years.last().filter(|year| !year.complete) {
            info!("{partial}");
        }

        report
    }
}

/// Run the simulation for the scenario in `scenario_dir`, writing results to `output_path`.
///
/// # Arguments:
///
/// * `scenario` - The scenario to simulate
/// * `scenario_dir` - Folder containing the forecast and actual time series
/// * `output_path` - Folder to write output files to
pub fn run(scenario: &Scenario, scenario_dir: &Path, output_path: &Path) -> Result<Report> {
    let forecast = TimeSeriesReader::from_path(&scenario_dir.join(FORECAST_FILE_NAME))?;
    let actual = TimeSeriesReader::from_path(&scenario_dir.join(ACTUAL_FILE_NAME))?;
    let mut writer = DataWriter::create(output_path)?;

    let mut simulation = Simulation::new(scenario, forecast, actual)?;
    while let Some(hour) = simulation.step()? {
        writer.write_hour(&hour.observation)?;
    }
    let state = *simulation.state();
    let report = simulation.finish();

    writer.write_years(&report.years)?;
    writer.write_totals(&report.totals)?;
    writer.flush()?;

    info!(
        "Final storage levels: battery {}MWh, methane {}MWh",
        state.battery_level, state.methane_level
    );
    info!("Totals: {}", report.totals);

    Ok(report)
}
