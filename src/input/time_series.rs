//! Code for reading the hourly forecast and actual time series from CSV files.
use super::input_err_msg;
use crate::time_step::{TimeKey, TimeStep};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDate;
use itertools::{EitherOrBoth, Itertools};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// The file name for the forecast time series
pub const FORECAST_FILE_NAME: &str = "forecast.csv";

/// The file name for the actual time series
pub const ACTUAL_FILE_NAME: &str = "actual.csv";

/// A lazy, ordered sequence of [`TimeStep`]s read from a CSV file.
///
/// Records are deserialised and validated one at a time. Errors report the file and the row at
/// which they occurred.
pub struct TimeSeriesReader<R: Read = File> {
    source: PathBuf,
    records: csv::DeserializeRecordsIntoIter<R, TimeStep>,
    row: usize,
}

impl TimeSeriesReader<File> {
    /// Open a time series CSV file for reading
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(file_path)
            .with_context(|| input_err_msg(file_path))?;

        Ok(Self {
            source: file_path.to_path_buf(),
            records: reader.into_deserialize(),
            row: 0,
        })
    }
}

impl<R: Read> TimeSeriesReader<R> {
    /// Read a time series from an arbitrary reader.
    ///
    /// `source` is only used to describe where errors came from.
    pub fn from_reader(reader: R, source: &Path) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        Self {
            source: source.to_path_buf(),
            records: reader.into_deserialize(),
            row: 0,
        }
    }
}

impl<R: Read> Iterator for TimeSeriesReader<R> {
    type Item = Result<TimeStep>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row += 1;

        let step = record
            .map_err(anyhow::Error::from)
            .and_then(|step| {
                step.validate()
                    .with_context(|| format!("Invalid data for {}", step.key()))?;
                Ok(step)
            })
            .with_context(|| format!("{} (data row {})", input_err_msg(&self.source), self.row));

        Some(step)
    }
}

/// Row counts found when checking a pair of time series
#[derive(Debug, PartialEq)]
pub struct AlignmentReport {
    /// Number of rows present in both series with matching keys
    pub aligned_rows: usize,
    /// Number of forecast rows beyond the end of the actual series
    pub extra_forecast_rows: usize,
    /// Number of hours a run would simulate (those on or before the end date, if any)
    pub simulated_rows: usize,
    /// The last hour a run would simulate
    pub last_simulated: Option<TimeKey>,
}

impl AlignmentReport {
    /// Total number of forecast rows
    pub fn forecast_rows(&self) -> usize {
        self.aligned_rows + self.extra_forecast_rows
    }

    /// Check there is enough forecast to fill a window of `window_hours` at every simulated hour.
    ///
    /// The window is filled before the first hour and moves on by one row per later hour, so
    /// `window_hours - 1` rows are needed after the last simulated hour.
    pub fn check_lookahead(&self, window_hours: usize) -> Result<()> {
        let required = self.simulated_rows.max(1) + window_hours.saturating_sub(1);
        let available = self.forecast_rows();
        if available >= required {
            return Ok(());
        }

        match self.last_simulated {
            Some(last) => bail!(
                "The forecast runs {} hours beyond the last simulated hour ({last}), but the \
                {window_hours}-hour forecast window needs {}",
                available - self.simulated_rows,
                window_hours - 1
            ),
            None => bail!(
                "The forecast has {available} rows, but the {window_hours}-hour forecast window \
                needs {required}"
            ),
        }
    }
}

/// Read two time series in full, checking that their (date, time) keys line up row for row.
///
/// The forecast series may run beyond the end of the actual series (it is needed for lookahead),
/// but not the other way round. Actual rows dated after `end_date` are checked but not counted
/// as simulated.
pub fn check_alignment<F, A>(
    forecast: F,
    actual: A,
    end_date: Option<NaiveDate>,
) -> Result<AlignmentReport>
where
    F: Iterator<Item = Result<TimeStep>>,
    A: Iterator<Item = Result<TimeStep>>,
{
    let mut report = AlignmentReport {
        aligned_rows: 0,
        extra_forecast_rows: 0,
        simulated_rows: 0,
        last_simulated: None,
    };
    // A run stops at the first actual row past the end date
    let mut past_end = false;

    for pair in forecast.zip_longest(actual) {
        match pair {
            EitherOrBoth::Both(forecast, actual) => {
                let (forecast, actual) = (forecast?.key(), actual?.key());
                ensure!(
                    forecast == actual,
                    "Mismatched rows: forecast is for {forecast} but actual is for {actual}"
                );
                report.aligned_rows += 1;

                past_end = past_end || end_date.is_some_and(|end_date| actual.date > end_date);
                if !past_end {
                    report.simulated_rows += 1;
                    report.last_simulated = Some(actual);
                }
            }
            EitherOrBoth::Left(forecast) => {
                forecast?;
                report.extra_forecast_rows += 1;
            }
            EitherOrBoth::Right(actual) => {
                let actual = actual?.key();
                bail!("Forecast data ends before actual data (first unmatched row: {actual})");
            }
        }
    }

    ensure!(report.aligned_rows > 0, "Time series contain no data");

    Ok(report)
}
