use std::any::Any;
use std::fs::File;
use std::io::BufWriter;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use perf_harness_core::prelude::{ReportLayout, ShutdownSignalError, StepAbortError};
use perf_harness_device::prelude::{Device, HdcConnection, HdcDevice, RecordingDevice};
use perf_harness_instruments::{
    report_step, HdcSampler, NoopSampler, Reporter, SampleWindow, Sampler, StepRecord,
    SummaryReportCollector,
};
use perf_harness_summary_model::{
    append_run_summary, store_run_summary, AppInfo, RunSummary, SampleScope, StepOutcome,
    StepSummary,
};
use serde::Serialize;

use crate::config::{FailurePolicy, HarnessConfig, PH_DEVICE_SERIAL_ENV};
use crate::context::{CurrentStep, RunnerContext, UserValuesConstraint};
use crate::definition::{ScenarioDefinition, ScenarioDefinitionBuilder, StepDefinition};
use crate::executor::Executor;
use crate::progress::StepProgress;
use crate::shutdown::start_shutdown_listener;
use crate::types::HarnessResult;

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Environment variables recorded in the run summary when they are set.
const RECORDED_ENV: [&str; 4] = [
    PH_DEVICE_SERIAL_ENV,
    perf_harness_core::tool_binary::PH_HDC_PATH_ENV,
    perf_harness_core::tool_binary::PH_TRACE_STREAMER_PATH_ENV,
    perf_harness_core::tool_binary::PH_BJC_PATH_ENV,
];

/// Written to `testInfo.json` at the start of a run so that partial report directories can be
/// identified.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestInfo<'a> {
    run_id: &'a str,
    scenario: &'a str,
    app: &'a AppInfo,
    device: Option<&'a str>,
    timestamp: i64,
}

/// Run a scenario against the device selected on the command line.
///
/// With `--dry-run` a recording device is used and nothing is sampled. Otherwise the device is
/// driven through `hdc` and each step is sampled with `hiperf` and `hitrace`, unless sampling
/// was disabled.
pub fn run<V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<V>,
) -> HarnessResult<RunSummary> {
    let definition = definition.build()?;
    let config = HarnessConfig::resolve(&definition.cli, &definition.name)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    let (device, sampler): (Box<dyn Device>, Box<dyn Sampler>) = if config.dry_run {
        let serial = config.device.clone().unwrap_or_else(|| "dry-run".to_string());
        log::info!("Dry run, device actions are recorded and nothing is sampled");
        (
            Box::new(RecordingDevice::dry_run(serial)),
            Box::new(NoopSampler::new()),
        )
    } else {
        let connection = HdcConnection::new(config.resolve_hdc_path()?, config.device.clone());
        let sampler: Box<dyn Sampler> = if config.sampling.enabled {
            Box::new(HdcSampler::new(
                connection.clone(),
                config.sampler_config(),
                runtime.handle().clone(),
            ))
        } else {
            log::info!("Sampling disabled, steps will only be timed");
            Box::new(NoopSampler::new())
        };
        (Box::new(HdcDevice::new(connection)), sampler)
    };

    execute(definition, config, runtime, device, sampler)
}

/// Run a scenario with a caller provided device and sampler, ignoring `--dry-run` and the
/// sampling settings.
pub fn run_with<V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<V>,
    device: Box<dyn Device>,
    sampler: Box<dyn Sampler>,
) -> HarnessResult<RunSummary> {
    let definition = definition.build()?;
    let config = HarnessConfig::resolve(&definition.cli, &definition.name)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    execute(definition, config, runtime, device, sampler)
}

fn execute<V: UserValuesConstraint>(
    definition: ScenarioDefinition<V>,
    config: HarnessConfig,
    runtime: tokio::runtime::Runtime,
    device: Box<dyn Device>,
    mut sampler: Box<dyn Sampler>,
) -> HarnessResult<RunSummary> {
    log::info!("Running scenario: {}", definition.name);

    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));

    let layout = ReportLayout::new(&config.report_dir);
    std::fs::create_dir_all(layout.root()).with_context(|| {
        format!(
            "Failed to create report directory {}",
            layout.root().display()
        )
    })?;

    let mut summary = RunSummary::new(
        nanoid::nanoid!(),
        definition.name.clone(),
        definition.app.clone(),
        config.report_dir.clone(),
        chrono::Utc::now().timestamp(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.device = config.device.clone();
    for key in RECORDED_ENV {
        if let Ok(value) = std::env::var(key) {
            summary.add_env(key.to_string(), value);
        }
    }

    write_json(
        &layout.test_info(),
        &TestInfo {
            run_id: &summary.run_id,
            scenario: &summary.scenario_name,
            app: &summary.app,
            device: summary.device.as_deref(),
            timestamp: summary.started_at,
        },
    )?;

    let mut reporter = Reporter::new().with_collector(SummaryReportCollector::new());
    let mut context = RunnerContext::new(
        executor,
        device,
        definition.app.clone(),
        definition.ability.clone(),
        config.clone(),
        shutdown_handle.clone(),
    );

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut context)?;
    }

    let mut aborted_by: Option<String> = None;
    for (position, step) in definition.steps.iter().enumerate() {
        let index = position + 1;

        if aborted_by.is_some() || shutdown_handle.is_shutdown() {
            summary.push_step(skipped(index, step));
            continue;
        }
        if !config.includes_step(&step.name) {
            log::info!("Skipping step {index} [{}], not selected", step.name);
            summary.push_step(skipped(index, step));
            continue;
        }

        let step_summary = run_step(
            index,
            step,
            &mut context,
            sampler.as_mut(),
            &mut reporter,
            &layout,
            &config,
        )?;

        if step_summary.outcome.is_failed() && config.failure_policy == FailurePolicy::Abort {
            log::warn!(
                "Aborting scenario after step {index} [{}] failed, remaining steps are skipped",
                step.name
            );
            aborted_by = Some(step.name.clone());
        }
        summary.push_step(step_summary);
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting to happen
        // cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(&mut context) {
            log::error!("Teardown failed: {e:?}");
        }
    }

    summary.finished_at = Some(chrono::Utc::now().timestamp());
    write_summaries(&summary, &layout, &config)?;
    reporter.finalize();

    let failed = summary.failed_steps().count();
    log::info!(
        "Scenario {} finished with {failed} failed step(s), report written to {}",
        summary.scenario_name,
        layout.root().display()
    );

    match aborted_by {
        Some(step) => Err(StepAbortError::new(step).into()),
        None => Ok(summary),
    }
}

fn run_step<V: UserValuesConstraint>(
    index: usize,
    step: &StepDefinition<V>,
    context: &mut RunnerContext<V>,
    sampler: &mut dyn Sampler,
    reporter: &mut Reporter,
    layout: &ReportLayout,
    config: &HarnessConfig,
) -> HarnessResult<StepSummary> {
    log::info!("Running step {index} [{}]: {}", step.name, step.description);

    let artifacts = layout
        .create_step_dirs(index)
        .with_context(|| format!("Failed to create artifact directories for step {index}"))?;

    let pids = match step.scope {
        SampleScope::App => app_pids(context),
        SampleScope::AllProcesses => Vec::new(),
    };

    let sampling = match sampler.begin(SampleWindow {
        step_index: index,
        step_name: step.name.clone(),
        duration: step.expected_duration,
        scope: step.scope,
        pids,
        artifacts,
        report_root: layout.root().to_path_buf(),
    }) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to start sampling for step {index} [{}]: {e:?}", step.name);
            false
        }
    };

    context.set_current_step(Some(CurrentStep {
        index,
        name: step.name.clone(),
        expected: step.expected_duration,
    }));
    let progress = (!config.no_progress).then(|| StepProgress::start(&step.name, step.expected_duration));

    let record = StepRecord::new(index, step.name.clone(), step.expected_duration);
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| (step.action)(context)))
        .unwrap_or_else(|panic| {
            Err(anyhow::anyhow!(
                "Step panicked: {}",
                panic_message(panic.as_ref())
            ))
        });
    let record = report_step(record, &result);

    drop(progress);
    context.set_current_step(None);

    let sample = if sampling {
        match sampler.end() {
            Ok(sample) => Some(sample),
            Err(e) => {
                log::warn!("Failed to finish sampling for step {index} [{}]: {e:?}", step.name);
                None
            }
        }
    } else {
        None
    };

    if record.overran() {
        log::warn!(
            "Step {index} [{}] took {:.1}s, longer than its expected {}s. Sampling stopped before the step finished",
            step.name,
            record.duration().unwrap_or_default().as_secs_f64(),
            step.expected_duration.as_secs(),
        );
    }
    reporter.add_step(&record);

    let outcome = match &result {
        Ok(()) => StepOutcome::Passed,
        Err(e) if e.is::<ShutdownSignalError>() => {
            log::warn!("Step {index} [{}] was interrupted by shutdown", step.name);
            StepOutcome::Failed {
                message: format!("{e:#}"),
            }
        }
        Err(e) => {
            log::error!("Step {index} [{}] failed: {e:?}", step.name);
            StepOutcome::Failed {
                message: format!("{e:#}"),
            }
        }
    };

    Ok(StepSummary {
        index,
        name: step.name.clone(),
        description: step.description.clone(),
        expected_duration_s: step.expected_duration.as_secs(),
        elapsed_ms: record.duration().unwrap_or_default().as_millis() as u64,
        outcome,
        sample,
    })
}

/// Pids of the app under test. When none can be found the step samples every process instead.
fn app_pids<V: UserValuesConstraint>(context: &mut RunnerContext<V>) -> Vec<u32> {
    let package = context.app().package.clone();
    match context.device().pids_of(&package) {
        Ok(pids) if !pids.is_empty() => pids,
        Ok(_) => {
            log::warn!("No running process found for {package}, sampling all processes");
            Vec::new()
        }
        Err(e) => {
            log::warn!("Failed to look up processes for {package}, sampling all processes: {e}");
            Vec::new()
        }
    }
}

fn skipped<V: UserValuesConstraint>(index: usize, step: &StepDefinition<V>) -> StepSummary {
    StepSummary::skipped(
        index,
        step.name.clone(),
        step.description.clone(),
        step.expected_duration.as_secs(),
    )
}

fn write_summaries(
    summary: &RunSummary,
    layout: &ReportLayout,
    config: &HarnessConfig,
) -> HarnessResult<()> {
    let steps_json = layout.steps_json();
    if let Some(parent) = steps_json.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_json(&steps_json, &summary.step_index())?;

    let run_summary_path = layout.run_summary();
    let mut file = File::create(&run_summary_path)
        .with_context(|| format!("Failed to create {}", run_summary_path.display()))?;
    store_run_summary(summary, &mut file)?;

    // The report directory is complete at this point, a broken history file must not fail the run.
    if let Err(e) = append_run_summary(summary, &config.history_path) {
        log::error!(
            "Failed to append run summary to {}: {e:?}",
            config.history_path.display()
        );
    }

    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> HarnessResult<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
