use std::collections::BTreeMap;
use std::path::PathBuf;

use perf_harness_core::prelude::{ReportLayout, StepArtifacts};
use perf_harness_summary_model::{AppInfo, StepOutcome, StepSummary};
use serde::{Deserialize, Serialize};

/// Everything an analyzer gets to know about one step.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// 1-based position of the step in the scenario
    pub index: usize,
    pub name: String,
    /// Processes that were sampled. Empty means every process.
    pub pids: Vec<u32>,
    pub artifacts: StepArtifacts,
}

impl StepInput {
    pub fn new(layout: &ReportLayout, step: &StepSummary) -> Self {
        Self {
            index: step.index,
            name: step.name.clone(),
            pids: step
                .sample
                .as_ref()
                .map(|sample| sample.pids.clone())
                .unwrap_or_default(),
            artifacts: layout.step(step.index),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardTimingsStats {
    pub mean: f64,
    pub std: f64,
    pub within_std: f64,
    pub within_2std: f64,
    pub within_3std: f64,
}

/// Analyzer results for one step. An analyzer that had nothing to work with, or failed, is
/// recorded as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepReport {
    pub index: usize,
    pub name: String,
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
    pub results: BTreeMap<String, Option<serde_json::Value>>,
}

/// The assembled report for one run, written to `report/perf_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub run_id: String,
    pub scenario_name: String,
    pub app: AppInfo,
    pub device: Option<String>,
    pub report_dir: PathBuf,
    /// Unix timestamp in seconds
    pub generated_at: i64,
    pub steps: Vec<StepReport>,
}

impl Report {
    pub fn result(&self, step_index: usize, analyzer: &str) -> Option<&serde_json::Value> {
        self.steps
            .iter()
            .find(|step| step.index == step_index)
            .and_then(|step| step.results.get(analyzer))
            .and_then(Option::as_ref)
    }
}
