use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(about, long_about = None)]
pub struct HarnessCli {
    /// A TOML file with harness settings. Flags given on the command line take precedence over it.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Serial of the device to run against, passed to `hdc -t`. Uses the only connected device if
    /// not set.
    #[clap(short = 't', long)]
    pub device: Option<String>,

    /// Directory to write this run's artifacts and report into.
    ///
    /// Defaults to `reports/<scenario>_<timestamp>`.
    #[clap(long = "report-path", visible_alias = "rp")]
    pub report_path: Option<PathBuf>,

    /// Run the steps without capturing any performance data.
    #[clap(long, default_value = "false")]
    pub no_sampling: bool,

    /// Keep running the remaining steps after a step fails. By default the run stops at the first
    /// failed step.
    #[clap(long, default_value = "false")]
    pub continue_on_failure: bool,

    /// Drive a recording device instead of real hardware, to check a scenario's flow.
    #[clap(long, default_value = "false")]
    pub dry_run: bool,

    /// Do not show a progress bar while a step runs.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by
    /// anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Only run the named steps. Can be given multiple times. Other steps are recorded as skipped.
    #[clap(long = "step")]
    pub steps: Vec<String>,

    /// File to append the run summary to, one JSON object per line.
    ///
    /// Defaults to `$RUN_SUMMARY_PATH`, or `run_summary.jsonl` in the working directory.
    #[clap(long)]
    pub history: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_short_and_alias_flags() {
        let cli = HarnessCli::try_parse_from([
            "scenario",
            "-t",
            "SER123",
            "--rp",
            "/tmp/out",
            "--step",
            "open",
            "--step",
            "scroll",
            "--no-sampling",
        ])
        .unwrap();

        assert_eq!(Some("SER123".to_string()), cli.device);
        assert_eq!(Some(PathBuf::from("/tmp/out")), cli.report_path);
        assert_eq!(vec!["open".to_string(), "scroll".to_string()], cli.steps);
        assert!(cli.no_sampling);
        assert!(!cli.dry_run);
    }
}
