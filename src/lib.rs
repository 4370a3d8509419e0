//! Common functionality for gridbalance, an hourly simulation of an electricity grid supplied by
//! renewables, with battery and methane storage to cover the gaps.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod input;
pub mod log;
pub mod output;
pub mod scenario;
pub mod settings;
pub mod simulation;
pub mod time_step;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory where the program's configuration files are stored.
///
/// Falls back to the current directory if the platform has no config directory.
pub fn get_gridbalance_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("gridbalance");
    path
}
