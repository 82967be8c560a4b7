use crate::error::ConfigError;
use crate::simulator::runner::{RunOptions, StepMode};
use crate::trace::Workload;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Simulation section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub verbose: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
}

/// Input matrix generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkloadSection {
  #[serde(default)]
  pub deterministic: bool,
  #[serde(default)]
  pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationSection {
  #[serde(default = "default_validation_enabled")]
  pub enabled: bool,
  #[serde(default)]
  pub report_file: String,
}

fn default_validation_enabled() -> bool {
  true
}

impl Default for ValidationSection {
  fn default() -> Self {
    Self { enabled: default_validation_enabled(), report_file: String::new() }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub workload: WorkloadSection,
  #[serde(default)]
  pub validation: ValidationSection,
}

fn non_empty(path: &str) -> Option<PathBuf> {
  (!path.trim().is_empty()).then(|| PathBuf::from(path))
}

impl AppConfig {
  pub fn log_level(&self) -> LevelFilter {
    if self.simulation.verbose {
      LevelFilter::Debug
    } else if self.simulation.quiet {
      LevelFilter::Warn
    } else {
      LevelFilter::Info
    }
  }

  pub fn run_options(&self) -> RunOptions {
    RunOptions {
      step_mode: if self.simulation.step_mode { StepMode::Step } else { StepMode::Continuous },
      trace_file: non_empty(&self.simulation.trace_file),
      workload: if self.workload.deterministic {
        Workload::Deterministic
      } else {
        Workload::Random { seed: self.workload.seed }
      },
      validate: self.validation.enabled,
      report_file: non_empty(&self.validation.report_file),
    }
  }
}

/// Command line values that take precedence over every config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub verbose: bool,
  pub step: bool,
  pub trace_file: Option<String>,
  pub deterministic: bool,
  pub seed: Option<u64>,
  pub no_validate: bool,
  pub report_file: Option<String>,
}

fn parse_table(text: &str) -> Result<toml::Table, ConfigError> {
  Ok(toml::from_str::<toml::Table>(text)?)
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
  let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
  parse_table(&text)
}

fn into_config(table: toml::Table) -> Result<AppConfig, ConfigError> {
  Ok(toml::Value::Table(table).try_into::<AppConfig>()?)
}

pub fn load_default_config() -> Result<AppConfig, ConfigError> {
  into_config(parse_table(DEFAULT_CONFIG)?)
}

pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
  into_config(read_table(path)?)
}

/// Merge `overlay` into `base` key by key; nested tables merge recursively,
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_config(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
  for (key, value) in overlay {
    let merged = match (base.remove(&key), value) {
      (Some(toml::Value::Table(into)), toml::Value::Table(from)) => toml::Value::Table(merge_config(into, from)),
      (_, value) => value,
    };
    base.insert(key, merged);
  }
  base
}

pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if cli.quiet {
    config.simulation.quiet = true;
    config.simulation.verbose = false;
  }
  if cli.verbose {
    config.simulation.verbose = true;
    config.simulation.quiet = false;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
  if cli.deterministic {
    config.workload.deterministic = true;
  }
  if let Some(seed) = cli.seed {
    config.workload.seed = Some(seed);
  }
  if cli.no_validate {
    config.validation.enabled = false;
  }
  if let Some(file) = &cli.report_file {
    config.validation.report_file = file.clone();
  }
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
  if config.simulation.quiet && config.simulation.verbose {
    return Err(ConfigError::Invalid("quiet and verbose cannot both be enabled".to_string()));
  }
  if config.workload.deterministic && config.workload.seed.is_some() {
    return Err(ConfigError::Invalid("seed has no effect with deterministic matrices".to_string()));
  }
  Ok(())
}

/// Load and merge configuration
///
/// 1. built-in defaults
/// 2. optional user file merged over them
/// 3. command line overrides
/// 4. validation
pub fn load_and_merge_configs(custom_config_path: Option<&Path>, cli: &CliOverrides) -> Result<AppConfig, ConfigError> {
  let mut table = parse_table(DEFAULT_CONFIG)?;
  if let Some(path) = custom_config_path {
    table = merge_config(table, read_table(path)?);
  }
  let mut config = into_config(table)?;
  apply_cli_overrides(&mut config, cli);
  validate_config(&config)?;
  Ok(config)
}
