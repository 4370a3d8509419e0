//! The module responsible for writing output data to disk.
use crate::simulation::HourlyObservation;
use crate::simulation::report::{Totals, YearSummary};
use anyhow::{Context, Result, ensure};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which scenario-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gridbalance_results";

/// The output file name for hourly observations
pub const HOURLY_FILE_NAME: &str = "hourly.csv";

/// The output file name for yearly summaries
pub const YEARLY_FILE_NAME: &str = "yearly.csv";

/// The output file name for the grand totals
pub const TOTALS_FILE_NAME: &str = "totals.csv";

/// Get the default output directory for the scenario at the specified path
pub fn get_output_dir(scenario_dir: &Path) -> Result<PathBuf> {
    // Get the scenario name from the dir path
    let scenario_dir = scenario_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to scenario")?;

    let scenario_name = scenario_dir
        .file_name()
        .context("Scenario cannot be in root folder")?
        .to_str()
        .context("Invalid chars in scenario dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect())
}

/// Create a new output directory at `output_dir`.
///
/// If the directory already exists and isn't empty, it is only replaced if `allow_overwrite` is
/// set.
///
/// # Returns
///
/// True if an existing folder was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// An object for writing simulation results to file
pub struct DataWriter {
    hourly_writer: csv::Writer<File>,
    yearly_writer: csv::Writer<File>,
    totals_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        Ok(Self {
            hourly_writer: new_writer(HOURLY_FILE_NAME)?,
            yearly_writer: new_writer(YEARLY_FILE_NAME)?,
            totals_writer: new_writer(TOTALS_FILE_NAME)?,
        })
    }

    /// Write an hourly observation to a CSV file
    pub fn write_hour(&mut self, observation: &HourlyObservation) -> Result<()> {
        self.hourly_writer.serialize(observation)?;

        Ok(())
    }

    /// Write yearly summaries to a CSV file
    pub fn write_years<'a, I>(&mut self, years: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a YearSummary>,
    {
        for year in years {
            self.yearly_writer.serialize(year)?;
        }

        Ok(())
    }

    /// Write the grand totals to a CSV file
    pub fn write_totals(&mut self, totals: &Totals) -> Result<()> {
        self.totals_writer.serialize(totals)?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.hourly_writer.flush()?;
        self.yearly_writer.flush()?;
        self.totals_writer.flush()?;

        Ok(())
    }
}
