use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use perf_harness_core::prelude::ShutdownHandle;
use perf_harness_driver::{drive, read_case_list, ProcessCaseRunner, DEFAULT_ROUNDS};

/// Run every test case in a list for a number of rounds.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// File listing the test cases to run, one per line.
    case_list: PathBuf,

    /// The case runner program, invoked as `<runner> run -l <case> -tcpath <dir> -rp <dir>`.
    #[arg(long)]
    runner: PathBuf,

    /// How many times to run each case.
    #[arg(long, default_value_t = DEFAULT_ROUNDS)]
    rounds: usize,

    /// Directory containing the test cases, passed to the runner as `-tcpath`.
    #[arg(long, default_value = ".")]
    tc_path: PathBuf,

    /// Directory the runner writes reports into, passed as `-rp`.
    #[arg(long = "report-path", visible_alias = "rp", default_value = "reports")]
    report_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let cases = read_case_list(&args.case_list)?;
    if cases.is_empty() {
        log::warn!("No cases listed in {}", args.case_list.display());
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown = ShutdownHandle::new();
    let listener_handle = shutdown.clone();
    runtime.spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl-C: {e}");
            return;
        }
        log::warn!("Received shutdown signal, stopping the current case...");
        listener_handle.shutdown();
    });

    log::info!(
        "Running {} case(s) for {} round(s) each",
        cases.len(),
        args.rounds
    );
    let mut runner = ProcessCaseRunner::new(
        args.runner,
        args.tc_path,
        args.report_path,
        runtime.handle().clone(),
        shutdown.clone(),
    );
    let summary = drive(&cases, args.rounds, &mut runner, &shutdown);

    log::info!(
        "Finished {} run(s), {} failed",
        summary.invocations,
        summary.failures
    );
    if summary.failures > 0 {
        anyhow::bail!(
            "{} out of {} runs failed",
            summary.failures,
            summary.invocations
        );
    }
    Ok(())
}
