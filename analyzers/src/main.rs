use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use perf_harness_analyzers::{
    assemble_report, default_analyzers, filter, print_report, write_report, Analyzer,
};
use perf_harness_core::prelude::ReportLayout;
use perf_harness_summary_model::{load_run_summary, load_summary_runs};
use walkdir::WalkDir;

/// Environment variable name to set a custom run summary file path
const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";
/// Default path for the run summary file
const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";
const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Analyze the captured artifacts of scenario runs and write a report into each run's report
/// directory.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Report directories to analyze. A directory that is not itself a report directory is
    /// searched for report directories.
    ///
    /// When none are given, the latest run of each scenario in the run summary history is
    /// analyzed.
    report_dirs: Vec<PathBuf>,

    /// Run summary history to read when no report directories are given.
    ///
    /// Defaults to `$RUN_SUMMARY_PATH`, or `run_summary.jsonl` in the working directory.
    #[arg(long)]
    history: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let ignore_errors = std::env::var("IGNORE_ANALYZE_ERRORS").is_ok();

    let report_dirs = if args.report_dirs.is_empty() {
        report_dirs_from_history(args.history)?
    } else {
        args.report_dirs
            .iter()
            .flat_map(|dir| discover_report_dirs(dir))
            .collect()
    };

    if report_dirs.is_empty() {
        log::warn!("No report directories found");
        return Ok(());
    }

    let analyzers = default_analyzers();
    let total = report_dirs.len();
    let mut errors = vec![];
    for dir in report_dirs {
        match analyze_report_dir(&dir, &analyzers) {
            Ok(path) => log::info!("Wrote {}", path.display()),
            Err(e) => {
                log::error!("Failed to analyze {}: {e:?}", dir.display());
                errors.push((dir, e));
            }
        }
    }

    // If any of the reports failed and errors should not explicitly be ignored, return an error
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} reports failed:\n{:#?}",
            errors.len(),
            total,
            errors
        );

        if ignore_errors {
            log::warn!("{}", error_message);
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}

fn report_dirs_from_history(history: Option<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    let summary_path = history.unwrap_or_else(|| {
        std::env::var(RUN_SUMMARY_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH))
    });
    log::debug!("Loading summary from {}", summary_path.display());
    let summary_runs = load_summary_runs(&summary_path)
        .with_context(|| format!("Failed to load run summaries from {}", summary_path.display()))?;

    let latest = filter::latest_run_summaries_by_name_and_config(summary_runs);
    for (name, fingerprint, summary) in &latest {
        log::debug!("Selected run {} for {name} ({fingerprint})", summary.run_id);
    }

    Ok(latest
        .into_iter()
        .map(|(_, _, summary)| summary.report_dir)
        .collect())
}

fn discover_report_dirs(dir: &Path) -> Vec<PathBuf> {
    if dir.join(RUN_SUMMARY_FILE).is_file() {
        return vec![dir.to_path_buf()];
    }

    let mut found = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable path: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == RUN_SUMMARY_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect::<Vec<_>>();
    found.sort();
    found
}

fn analyze_report_dir(dir: &Path, analyzers: &[Box<dyn Analyzer>]) -> anyhow::Result<PathBuf> {
    let layout = ReportLayout::new(dir);
    let summary_file = layout.run_summary();
    let summary = load_run_summary(
        File::open(&summary_file)
            .with_context(|| format!("Failed to open {}", summary_file.display()))?,
    )?;

    let report = assemble_report(&layout, &summary, analyzers);
    let path = write_report(&layout, &report)?;
    print_report(&report);
    Ok(path)
}
