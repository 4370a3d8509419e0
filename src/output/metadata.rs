//! Writes `metadata.toml`, recording what was run, with which program build, and where.
//!
//! The scenario values are written as they were after any command-line overrides, so a run can
//! be reproduced from its output folder alone.
use crate::scenario::ScenarioParameters;
use anyhow::{Context, Result};
use chrono::Local;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// The output file name for metadata
pub const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build, generated by the build script
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    scenario: &'a ScenarioParameters,
    program: ProgramMetadata,
    platform: PlatformMetadata,
}

/// Where and when the scenario was run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Folder containing the scenario files
    scenario_path: &'a Path,
    /// Local time at which the run started (RFC 2822)
    started: String,
}

/// The program build which produced the results
#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    is_debug: bool,
    rustc_version: &'static str,
    build_time_utc: &'static str,
    /// Short commit hash, suffixed with `-dirty` for uncommitted changes
    git_commit_hash: String,
}

impl ProgramMetadata {
    fn current() -> Self {
        let git_commit_hash = match (built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY) {
            (Some(hash), Some(true)) => format!("{hash}-dirty"),
            (Some(hash), _) => hash.to_string(),
            (None, _) => UNKNOWN.to_string(),
        };

        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash,
        }
    }
}

/// Placeholder for values which couldn't be determined
const UNKNOWN: &str = "unknown";

/// The machine on which the scenario was run, as reported by `uname`
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn current() -> Self {
        let info = PlatformInfo::new().ok();
        let field = |get: fn(&PlatformInfo) -> &OsStr| {
            info.as_ref()
                .map_or_else(|| UNKNOWN.to_string(), |info| get(info).to_string_lossy().into())
        };

        Self {
            sysname: field(PlatformInfo::sysname),
            nodename: field(PlatformInfo::nodename),
            release: field(PlatformInfo::release),
            version: field(PlatformInfo::version),
            machine: field(PlatformInfo::machine),
            osname: field(PlatformInfo::osname),
        }
    }
}

/// Write `metadata.toml` to the output folder
///
/// # Arguments
///
/// * `output_path` - Folder where results are saved
/// * `scenario_path` - Folder the scenario was read from
/// * `params` - The scenario values used for the run
pub fn write_metadata(
    output_path: &Path,
    scenario_path: &Path,
    params: &ScenarioParameters,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            scenario_path,
            started: Local::now().to_rfc2822(),
        },
        scenario: params,
        program: ProgramMetadata::current(),
        platform: PlatformMetadata::current(),
    };

    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)
        .with_context(|| format!("Could not write {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::scenario_parameters;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_write_metadata(scenario_parameters: ScenarioParameters) {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), Path::new("demos/simple"), &scenario_parameters).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let metadata: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(
            metadata["run"]["scenario_path"].as_str(),
            Some("demos/simple")
        );
        assert_eq!(metadata["program"]["name"].as_str(), Some("gridbalance"));
        assert!(metadata.contains_key("platform"));

        // The scenario table can be read back as a scenario file
        let scenario: ScenarioParameters = metadata["scenario"].clone().try_into().unwrap();
        assert_eq!(scenario, scenario_parameters);
    }
}
