use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use perf_harness_core::prelude::ReportLayout;
use perf_harness_summary_model::{RunSummary, StepOutcome};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::analyzer::{run_isolated, Analyzer};
use crate::coverage::CoverageAnalyzer;
use crate::empty_frame::EmptyFrameAnalyzer;
use crate::frame_drop::FrameDropAnalyzer;
use crate::model::{Report, StepInput, StepReport};

pub const REPORT_FILE: &str = "perf_report.json";

/// The analyzers run for every step, in report order.
pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(FrameDropAnalyzer),
        Box::new(EmptyFrameAnalyzer),
        Box::new(CoverageAnalyzer::from_env()),
    ]
}

/// Run every analyzer over every step of a run. Skipped steps have nothing captured and get no
/// results.
pub fn assemble_report(
    layout: &ReportLayout,
    summary: &RunSummary,
    analyzers: &[Box<dyn Analyzer>],
) -> Report {
    let steps = summary
        .steps
        .iter()
        .map(|step| {
            let results = if step.outcome == StepOutcome::Skipped {
                BTreeMap::new()
            } else {
                let input = StepInput::new(layout, step);
                analyzers
                    .iter()
                    .map(|analyzer| {
                        (
                            analyzer.name().to_string(),
                            run_isolated(analyzer.as_ref(), &input),
                        )
                    })
                    .collect()
            };

            StepReport {
                index: step.index,
                name: step.name.clone(),
                outcome: step.outcome.clone(),
                elapsed_ms: step.elapsed_ms,
                results,
            }
        })
        .collect();

    Report {
        run_id: summary.run_id.clone(),
        scenario_name: summary.scenario_name.clone(),
        app: summary.app.clone(),
        device: summary.device.clone(),
        report_dir: layout.root().to_path_buf(),
        generated_at: chrono::Utc::now().timestamp(),
        steps,
    }
}

/// Write the report to `report/perf_report.json`, returning the path written.
pub fn write_report(layout: &ReportLayout, report: &Report) -> anyhow::Result<PathBuf> {
    let dir = layout.report_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(REPORT_FILE);
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(path)
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "#")]
    index: usize,
    step: String,
    status: &'static str,
    frames: String,
    jank: String,
    dropped: String,
    empty: String,
    #[tabled(rename = "line coverage")]
    line_coverage: String,
}

fn metric(report: &StepReport, analyzer: &str, pointer: &str) -> String {
    report
        .results
        .get(analyzer)
        .and_then(Option::as_ref)
        .and_then(|value| value.pointer(pointer))
        .map(|value| match value.as_f64() {
            Some(number) if value.is_f64() => format!("{number:.2}"),
            _ => value.to_string(),
        })
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_report(report: &Report) -> String {
    let rows = report
        .steps
        .iter()
        .map(|step| ReportRow {
            index: step.index,
            step: step.name.clone(),
            status: match step.outcome {
                StepOutcome::Passed => "passed",
                StepOutcome::Failed { .. } => "failed",
                StepOutcome::Skipped => "skipped",
            },
            frames: metric(step, "frame_drop", "/total_frames"),
            jank: metric(step, "frame_drop", "/jank_frames"),
            dropped: metric(step, "frame_drop", "/dropped_frames"),
            empty: metric(step, "empty_frame", "/empty_frames"),
            line_coverage: metric(step, "coverage", "/lines/pct"),
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn print_report(report: &Report) {
    println!(
        "\nReport for {} ({}) on {}",
        report.scenario_name,
        report.app.name,
        report.device.as_deref().unwrap_or("default device")
    );
    println!("{}", render_report(report));
}
