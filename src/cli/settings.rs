//! The `settings` subcommands, for inspecting and editing the program settings file.
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Open the settings file in a text editor, creating it first if needed
    Edit,
    /// Print the path the settings file is read from
    Path,
    /// Print the settings currently in effect
    Show,
    /// Print a placeholder `settings.toml` with every setting commented out
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Edit => edit_settings_file(&get_settings_file_path()),
            Self::Path => {
                println!("{}", get_settings_file_path().display());
                Ok(())
            }
            Self::Show => {
                let settings = Settings::load().context("Failed to load settings.")?;
                print!("{}", toml::to_string(&settings)?);
                Ok(())
            }
            Self::DumpDefault => {
                print!("{}", Settings::default_file_contents());
                Ok(())
            }
        }
    }
}

/// Write the placeholder settings file to `file_path` unless a file is already there
fn create_settings_file(file_path: &Path) -> Result<()> {
    if file_path.is_file() {
        return Ok(());
    }

    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path)
            .with_context(|| format!("Failed to create directory: {}", dir_path.display()))?;
    }
    fs::write(file_path, Settings::default_file_contents())
        .with_context(|| format!("Failed to write {}", file_path.display()))
}

/// Open the settings file in the user's editor
fn edit_settings_file(file_path: &Path) -> Result<()> {
    create_settings_file(file_path)?;
    println!("Opening settings file for editing: {}", file_path.display());
    edit::edit_file(file_path)?;

    Ok(())
}
