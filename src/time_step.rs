//! Code for working with hourly time steps.
//!
//! Each simulated hour is described by a [`TimeStep`] record holding the load, hydropower output
//! and wind/solar generation as fractions of installed capacity. Forecast and actual data use the
//! same record shape.
use crate::input::deserialise_proportion;
use crate::units::{Dimensionless, Energy};
use anyhow::{Result, ensure};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serializer};
use std::fmt::Display;

/// The format used for the hour-of-day labels in input and output files
const HOUR_LABEL_FORMAT: &str = "%H:%M";

/// The (date, time) pair identifying an hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey {
    /// Calendar date
    pub date: NaiveDate,
    /// Hour-of-day label
    pub time: NaiveTime,
}

impl TimeKey {
    /// Create a new [`TimeKey`]
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Whether this is the last hour of the year (Dec 31, 23:00)
    pub fn is_year_end(&self) -> bool {
        self.date.month() == 12 && self.date.day() == 31 && self.time.hour() == 23
    }

    /// The calendar year of this hour
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

impl Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.time.format(HOUR_LABEL_FORMAT))
    }
}

/// The load and generation data for a single hour
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeStep {
    /// Calendar date
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Hour-of-day label
    #[serde(rename = "Time", deserialize_with = "deserialise_hour_label")]
    pub time: NaiveTime,
    /// Grid load for this hour
    #[serde(rename = "Load")]
    pub load: Energy,
    /// Hydropower generated in this hour
    #[serde(rename = "Hydropower")]
    pub hydro: Energy,
    /// Onshore wind generation as a fraction of installed capacity
    #[serde(rename = "Wind onshore", deserialize_with = "deserialise_proportion")]
    pub wind_onshore_fraction: Dimensionless,
    /// Offshore wind generation as a fraction of installed capacity
    #[serde(rename = "Wind offshore", deserialize_with = "deserialise_proportion")]
    pub wind_offshore_fraction: Dimensionless,
    /// Photovoltaic generation as a fraction of installed capacity
    #[serde(rename = "Photovoltaics", deserialize_with = "deserialise_proportion")]
    pub solar_fraction: Dimensionless,
}

impl TimeStep {
    /// The (date, time) key of this record
    pub fn key(&self) -> TimeKey {
        TimeKey::new(self.date, self.time)
    }

    /// Check the values which can't be checked while deserialising
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.load.is_finite() && self.load >= Energy::ZERO,
            "Load must be a finite, non-negative number"
        );
        ensure!(
            self.hydro.is_finite() && self.hydro >= Energy::ZERO,
            "Hydropower must be a finite, non-negative number"
        );

        Ok(())
    }
}

/// Read an hour-of-day label in the form `HH:MM`
pub fn deserialise_hour_label<'de, D>(deserialiser: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserialiser)?;
    NaiveTime::parse_from_str(s.trim(), HOUR_LABEL_FORMAT).map_err(|_| {
        serde::de::Error::custom(format!("Invalid time '{s}': should be in form HH:MM"))
    })
}

/// Write an hour-of-day label in the form `HH:MM`
pub fn serialise_hour_label<S>(time: &NaiveTime, serialiser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serialiser.collect_str(&time.format(HOUR_LABEL_FORMAT))
}
