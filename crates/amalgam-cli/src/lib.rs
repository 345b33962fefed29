//! Library interface for amalgam CLI components

use std::fs;
use std::path::{Path, PathBuf};

use amalgam_core::model::{Unit, UnitRole};
use amalgam_core::MergeOptions;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Configuration flags shared by every subcommand
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Merge configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Internalize secondary types that the public surface does not expose
    #[arg(long)]
    pub internalize: bool,

    /// Keep types matching this regular expression public (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// File with one exclusion pattern per line
    #[arg(long, value_name = "PATH")]
    pub exclude_file: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the configuration file, if any, and overlay the flags on it
    pub fn resolve(&self) -> Result<MergeOptions> {
        let mut options = match &self.config {
            Some(path) => MergeOptions::from_file(path)
                .with_context(|| format!("Failed to load merge configuration {:?}", path))?,
            None => MergeOptions::default(),
        };

        if self.internalize {
            options.internalize = true;
        }
        options
            .exclude_internalize_matches
            .extend(self.exclude.iter().cloned());
        if let Some(path) = &self.exclude_file {
            options.exclude_file = Some(path.clone());
        }

        debug!("Resolved merge options: {:?}", options);
        Ok(options)
    }
}

/// Unit files taking part in a merge
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UnitArgs {
    /// Primary unit (JSON); its public surface is preserved
    #[arg(short, long)]
    pub primary: PathBuf,

    /// Secondary units (JSON), merged in the given order
    #[arg(short, long)]
    pub secondary: Vec<PathBuf>,
}

impl UnitArgs {
    /// Load every unit, forcing the role implied by the flag it came from
    pub fn load(&self) -> Result<Vec<Unit>> {
        let mut units = vec![load_unit(&self.primary, UnitRole::Primary)?];
        for path in &self.secondary {
            units.push(load_unit(path, UnitRole::Secondary)?);
        }
        info!("Loaded {} units", units.len());
        Ok(units)
    }
}

pub fn load_unit(path: &Path, role: UnitRole) -> Result<Unit> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read unit {:?}", path))?;
    let mut unit: Unit =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse unit {:?}", path))?;

    if unit.role != role {
        debug!("{} declared as {}, loading as {}", unit.name, unit.role, role);
        unit.role = role;
    }
    if unit.name.is_empty() {
        bail!("Unit {:?} has no name", path);
    }
    debug!("{}: {} types, {} forwarded types", unit.name, unit.types.len(), unit.forwarded_types.len());
    Ok(unit)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_overlay_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.toml");
        fs::write(&config, "internalize = false\nexclude_internalize_matches = ['^A$']\n").unwrap();

        let args = ConfigArgs {
            config: Some(config),
            internalize: true,
            exclude: vec!["^B$".to_string()],
            exclude_file: None,
        };
        let options = args.resolve().unwrap();
        assert!(options.internalize);
        assert_eq!(options.exclude_internalize_matches, vec!["^A$".to_string(), "^B$".to_string()]);
    }

    #[test]
    fn test_load_unit_forces_role() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.json");
        fs::write(&path, r#"{ "name": "Lib", "role": "primary" }"#).unwrap();

        let unit = load_unit(&path, UnitRole::Secondary).unwrap();
        assert_eq!(unit.role, UnitRole::Secondary);
        assert!(unit.types.is_empty());
    }

    #[test]
    fn test_load_unit_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_unit(&path, UnitRole::Primary).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse unit"));
    }
}
