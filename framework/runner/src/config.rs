use std::path::{Path, PathBuf};

use perf_harness_core::tool_binary;
use perf_harness_instruments::HdcSamplerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::HarnessCli;

/// Environment variable selecting the device serial when neither the CLI nor the config file do.
pub const PH_DEVICE_SERIAL_ENV: &str = "PH_DEVICE_SERIAL";
/// Environment variable name to set a custom run summary file path
pub const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";
/// Default path for the run summary file
pub const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";

const DEFAULT_REPORT_ROOT: &str = "reports";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// What to do with the remaining steps when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the remaining steps as skipped and return an error from the run.
    #[default]
    Abort,
    /// Run the remaining steps anyway.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub enabled: bool,
    pub hiperf_frequency: u32,
    pub hiperf_event: String,
    pub hitrace_buffer_kb: u32,
    pub hitrace_tags: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let defaults = HdcSamplerConfig::default();
        Self {
            enabled: true,
            hiperf_frequency: defaults.hiperf_frequency,
            hiperf_event: defaults.hiperf_event,
            hitrace_buffer_kb: defaults.hitrace_buffer_kb,
            hitrace_tags: defaults.hitrace_tags,
        }
    }
}

/// The contents of a `--config` file. Every field is optional.
///
/// ```toml
/// device = "FMR0223C13000649"
/// report_root = "/data/perf-reports"
/// failure_policy = "continue"
///
/// [sampling]
/// hiperf_frequency = 2000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub device: Option<String>,
    pub hdc_path: Option<PathBuf>,
    pub trace_streamer_path: Option<PathBuf>,
    /// Parent directory for generated report directories
    pub report_root: Option<PathBuf>,
    pub failure_policy: Option<FailurePolicy>,
    pub sampling: SamplingConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Settings for one scenario run, resolved with the precedence: command line, config file,
/// environment, defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub device: Option<String>,
    pub hdc_path: Option<PathBuf>,
    pub trace_streamer_path: Option<PathBuf>,
    pub report_dir: PathBuf,
    pub history_path: PathBuf,
    pub sampling: SamplingConfig,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    pub no_progress: bool,
    /// Steps to run. Empty means all.
    pub step_filter: Vec<String>,
}

impl HarnessConfig {
    pub fn resolve(cli: &HarnessCli, scenario_name: &str) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        let report_dir = cli.report_path.clone().unwrap_or_else(|| {
            file.report_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_ROOT))
                .join(format!(
                    "{scenario_name}_{}",
                    chrono::Local::now().format("%Y%m%d%H%M%S")
                ))
        });

        let history_path = cli.history.clone().unwrap_or_else(|| {
            std::env::var(RUN_SUMMARY_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH))
        });

        let failure_policy = if cli.continue_on_failure {
            FailurePolicy::Continue
        } else {
            file.failure_policy.unwrap_or_default()
        };

        let mut sampling = file.sampling;
        if cli.no_sampling {
            sampling.enabled = false;
        }

        Ok(Self {
            device: cli
                .device
                .clone()
                .or(file.device)
                .or_else(|| std::env::var(PH_DEVICE_SERIAL_ENV).ok()),
            hdc_path: file.hdc_path,
            trace_streamer_path: file.trace_streamer_path,
            report_dir,
            history_path,
            sampling,
            failure_policy,
            dry_run: cli.dry_run,
            no_progress: cli.no_progress,
            step_filter: cli.steps.clone(),
        })
    }

    /// The `hdc` binary, from the config file or the environment.
    pub fn resolve_hdc_path(&self) -> anyhow::Result<PathBuf> {
        match &self.hdc_path {
            Some(path) => Ok(path.clone()),
            None => tool_binary::hdc_path(),
        }
    }

    pub fn sampler_config(&self) -> HdcSamplerConfig {
        HdcSamplerConfig {
            hiperf_frequency: self.sampling.hiperf_frequency,
            hiperf_event: self.sampling.hiperf_event.clone(),
            hitrace_buffer_kb: self.sampling.hitrace_buffer_kb,
            hitrace_tags: self.sampling.hitrace_tags.clone(),
            trace_streamer: self
                .trace_streamer_path
                .clone()
                .or_else(tool_binary::trace_streamer_path),
        }
    }

    pub fn includes_step(&self, name: &str) -> bool {
        self.step_filter.is_empty() || self.step_filter.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_without_config() {
        let config = HarnessConfig::resolve(&HarnessCli::default(), "demo").unwrap();

        assert!(config.sampling.enabled);
        assert_eq!(FailurePolicy::Abort, config.failure_policy);
        assert!(config.report_dir.starts_with("reports"));
        assert!(config
            .report_dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("demo_"));
        assert!(config.includes_step("anything"));
    }

    #[test]
    fn config_file_is_applied() {
        let (_dir, path) = write_config(
            r#"
            device = "FILE_SERIAL"
            report_root = "/data/reports"
            failure_policy = "continue"

            [sampling]
            hiperf_frequency = 2000
            "#,
        );
        let cli = HarnessCli {
            config: Some(path),
            ..Default::default()
        };

        let config = HarnessConfig::resolve(&cli, "demo").unwrap();

        assert_eq!(Some("FILE_SERIAL".to_string()), config.device);
        assert!(config.report_dir.starts_with("/data/reports"));
        assert_eq!(FailurePolicy::Continue, config.failure_policy);
        assert_eq!(2000, config.sampling.hiperf_frequency);
        assert_eq!(20480, config.sampling.hitrace_buffer_kb);
    }

    #[test]
    fn cli_overrides_config_file() {
        let (_dir, path) = write_config(
            r#"
            device = "FILE_SERIAL"
            [sampling]
            enabled = true
            "#,
        );
        let cli = HarnessCli {
            config: Some(path),
            device: Some("CLI_SERIAL".to_string()),
            report_path: Some(PathBuf::from("/tmp/explicit")),
            no_sampling: true,
            steps: vec!["open".to_string()],
            ..Default::default()
        };

        let config = HarnessConfig::resolve(&cli, "demo").unwrap();

        assert_eq!(Some("CLI_SERIAL".to_string()), config.device);
        assert_eq!(PathBuf::from("/tmp/explicit"), config.report_dir);
        assert!(!config.sampling.enabled);
        assert!(config.includes_step("open"));
        assert!(!config.includes_step("scroll"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let (_dir, path) = write_config("package = \"com.example\"\n");
        let cli = HarnessCli {
            config: Some(path),
            ..Default::default()
        };

        assert!(matches!(
            HarnessConfig::resolve(&cli, "demo"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = HarnessCli {
            config: Some(PathBuf::from("/non/existent/harness.toml")),
            ..Default::default()
        };

        assert!(matches!(
            HarnessConfig::resolve(&cli, "demo"),
            Err(ConfigError::Read { .. })
        ));
    }
}
