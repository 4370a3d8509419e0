//! The forecast deficit window: the predicted deficits for the hours the dispatch controller looks
//! ahead at.
use super::{FORECAST_STREAM, SimulationError};
use crate::scenario::Scenario;
use crate::time_step::{TimeKey, TimeStep};
use crate::units::Energy;
use anyhow::Result;
use std::collections::VecDeque;

/// The predicted deficit for one hour of the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastDeficit {
    /// The hour of the forecast record the deficit was calculated from
    pub key: TimeKey,
    /// Forecast load minus forecast generation, with safety margins applied
    pub deficit: Energy,
}

impl ForecastDeficit {
    fn new(scenario: &Scenario, step: &TimeStep) -> Self {
        Self {
            key: step.key(),
            deficit: scenario.forecast_deficit(step),
        }
    }
}

/// A fixed-length rolling buffer of forecast deficits.
///
/// The front of the window is the forecast for the hour currently being simulated.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastWindow {
    entries: VecDeque<ForecastDeficit>,
}

/// Read the next forecast record, failing if there are none left
fn next_forecast<I>(forecast: &mut I, last: Option<&ForecastDeficit>) -> Result<TimeStep>
where
    I: Iterator<Item = Result<TimeStep>>,
{
    forecast.next().unwrap_or_else(|| {
        Err(SimulationError::InputExhausted {
            stream: FORECAST_STREAM,
            after: last.map(|entry| entry.key),
        }
        .into())
    })
}

impl ForecastWindow {
    /// Create a window by reading as many forecast records as the scenario looks ahead
    pub fn fill<I>(scenario: &Scenario, forecast: &mut I) -> Result<Self>
    where
        I: Iterator<Item = Result<TimeStep>>,
    {
        let len = scenario.forecast.window_hours;
        let mut entries: VecDeque<ForecastDeficit> = VecDeque::with_capacity(len);
        for _ in 0..len {
            let step = next_forecast(forecast, entries.back())?;
            entries.push_back(ForecastDeficit::new(scenario, &step));
        }

        Ok(Self { entries })
    }

    /// Drop the oldest entry and append the deficit for the next forecast record
    pub fn advance<I>(&mut self, scenario: &Scenario, forecast: &mut I) -> Result<()>
    where
        I: Iterator<Item = Result<TimeStep>>,
    {
        let step = next_forecast(forecast, self.entries.back())?;
        self.entries.pop_front();
        self.entries.push_back(ForecastDeficit::new(scenario, &step));

        Ok(())
    }

    /// The forecast for the current hour
    pub fn front(&self) -> Option<&ForecastDeficit> {
        self.entries.front()
    }

    /// The predicted deficits, starting with the current hour
    pub fn deficits(&self) -> impl Iterator<Item = Energy> + '_ {
        self.entries.iter().map(|entry| entry.deficit)
    }

    /// Number of hours in the window
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
