//! The command line interface for the simulation.
use crate::input::time_series::{
    ACTUAL_FILE_NAME, FORECAST_FILE_NAME, TimeSeriesReader, check_alignment,
};
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir};
use crate::scenario::{PolicyKind, Scenario, ScenarioParameters};
use crate::settings::Settings;
use crate::units::MEGA_PER_GIGA;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the simulation.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Scenario values which can be overridden from the command line
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct ScenarioOverrides {
    /// Factor by which the historic grid load is scaled
    #[arg(long)]
    pub load_factor: Option<f64>,
    /// Installed onshore wind capacity (GW)
    #[arg(long)]
    pub onshore_gw: Option<f64>,
    /// Installed offshore wind capacity (GW)
    #[arg(long)]
    pub offshore_gw: Option<f64>,
    /// Installed photovoltaic capacity (GW)
    #[arg(long)]
    pub solar_gw: Option<f64>,
    /// Grid level battery storage capacity (GWh)
    #[arg(long)]
    pub battery_gwh: Option<f64>,
    /// Biomethane production capacity (GW)
    #[arg(long)]
    pub biomethane_gw: Option<f64>,
    /// Methane-fired generation capacity (GW)
    #[arg(long)]
    pub methane_gw: Option<f64>,
    /// The policy for dispatching methane-fired generation
    #[arg(long, value_enum)]
    pub policy: Option<PolicyKind>,
}

impl ScenarioOverrides {
    /// Replace values in `params` with any which were given on the command line
    pub fn apply(&self, params: &mut ScenarioParameters) {
        let overrides = [
            (self.load_factor, &mut params.load_factor),
            (self.onshore_gw, &mut params.onshore_wind_gw),
            (self.offshore_gw, &mut params.offshore_wind_gw),
            (self.solar_gw, &mut params.solar_gw),
            (self.battery_gwh, &mut params.battery_storage_gwh),
            (self.biomethane_gw, &mut params.biomethane_gw),
            (self.methane_gw, &mut params.methane_gw),
        ];
        for (value, param) in overrides {
            if let Some(value) = value {
                *param = value;
            }
        }

        if let Some(policy) = self.policy {
            params.dispatch.policy = policy;
        }
    }
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Values overriding those in the scenario file
    #[command(flatten)]
    pub overrides: ScenarioOverrides,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a simulation scenario.
    Run {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example scenarios.
    Example {
        /// The available subcommands for managing example scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a scenario and its time series.
    Validate {
        /// The path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { scenario_dir, opts } => handle_run_command(&scenario_dir, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { scenario_dir } => handle_validate_command(&scenario_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ gridbalance --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Read the scenario parameters, applying any overrides from the command line
fn load_scenario_parameters(
    scenario_path: &Path,
    overrides: &ScenarioOverrides,
) -> Result<ScenarioParameters> {
    let mut params = ScenarioParameters::from_path(scenario_path)?;
    overrides.apply(&mut params);
    params
        .validate()
        .context("Invalid value given on the command line")?;

    Ok(params)
}

/// Describe the scenario in the log
fn log_scenario(scenario: &Scenario) {
    let gw = |value: f64| value / MEGA_PER_GIGA;
    info!("Simulating grid balance for:");
    info!(
        "  {:.2}x grid load over historic data",
        scenario.load_factor.value()
    );
    info!("  {:.1}GW of onshore wind", gw(scenario.onshore_wind.value()));
    info!("  {:.1}GW of offshore wind", gw(scenario.offshore_wind.value()));
    info!("  {:.1}GW of photovoltaics", gw(scenario.solar.value()));
    info!(
        "  {:.1}GW of biomethane production",
        gw(scenario.biomethane_production.value())
    );
    info!(
        "  {:.1}GW of methane-fired generation",
        gw(scenario.methane_generation.value())
    );
    info!(
        "  {:.1}GWh of grid level battery storage",
        gw(scenario.battery_capacity.value())
    );
    info!(
        "  {:.1}GWh of geological methane storage",
        gw(scenario.methane_storage_capacity.value())
    );
    info!("  Dispatch policy: {:?}", scenario.dispatch);
}

/// Handle the `run` command.
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(scenario_path)?;
        &pathbuf
    };

    let overwrite = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(&settings.log_level), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the scenario to run
    let params = load_scenario_parameters(scenario_path, &opts.overrides)
        .context("Failed to load scenario.")?;
    let scenario = Scenario::from(&params);
    info!("Loaded scenario from {}", scenario_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    log_scenario(&scenario);
    write_metadata(output_path, scenario_path, &params).context("Failed to save metadata.")?;

    // Run the simulation
    crate::simulation::run(&scenario, scenario_path, output_path)?;
    info!("Simulation complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    validate_scenario(scenario_path)?;
    info!("Scenario validation successful!");

    Ok(())
}

/// Check a scenario's parameters and time series without running it.
///
/// Fails if the run would stop with an error: misaligned rows, invalid values, or a forecast too
/// short to fill the forecast window at every simulated hour.
fn validate_scenario(scenario_path: &Path) -> Result<()> {
    let params =
        ScenarioParameters::from_path(scenario_path).context("Failed to validate scenario.")?;
    let forecast = TimeSeriesReader::from_path(&scenario_path.join(FORECAST_FILE_NAME))?;
    let actual = TimeSeriesReader::from_path(&scenario_path.join(ACTUAL_FILE_NAME))?;
    let report = check_alignment(forecast, actual, params.end_date)
        .context("Failed to validate time series.")?;
    info!(
        "{} aligned hours ({} to be simulated), with {} extra hours of forecast",
        report.aligned_rows, report.simulated_rows, report.extra_forecast_rows
    );

    report
        .check_lookahead(params.dispatch.window_hours)
        .context("Failed to validate time series.")?;

    Ok(())
}
