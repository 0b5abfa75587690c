use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

/// The application a scenario drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfo {
    /// Bundle name on the device, e.g. `com.example.shop`
    pub package: String,
    /// Human readable name used in reports
    pub name: String,
}

/// Which processes a performance sample covered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleScope {
    /// Only the processes belonging to the target app
    #[default]
    App,
    /// Every process on the device
    AllProcesses,
}

/// A capture window and the artifacts it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceSample {
    /// Unix timestamp in milliseconds when sampling began
    pub started_at_ms: i64,
    /// Unix timestamp in milliseconds when sampling was finalized
    pub ended_at_ms: i64,
    pub scope: SampleScope,
    /// Process ids that were sampled. Empty when the scope is [SampleScope::AllProcesses].
    pub pids: Vec<u32>,
    /// Artifact files that exist on disk, relative to the report directory
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed { message: String },
    /// The step never started, because an earlier step aborted the run or a shutdown was
    /// requested.
    Skipped,
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

/// Summary of one step of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepSummary {
    /// 1-based position of the step in the scenario
    pub index: usize,
    pub name: String,
    pub description: String,
    /// The duration the step was declared with. Sampling runs for this long.
    pub expected_duration_s: u64,
    /// Measured wall-clock time of the step callback
    pub elapsed_ms: u64,
    pub outcome: StepOutcome,
    pub sample: Option<PerformanceSample>,
}

impl StepSummary {
    pub fn skipped(index: usize, name: String, description: String, expected_duration_s: u64) -> Self {
        Self {
            index,
            name,
            description,
            expected_duration_s,
            elapsed_ms: 0,
            outcome: StepOutcome::Skipped,
            sample: None,
        }
    }
}

/// One entry of `hiperf/steps.json`, the index of steps consumed by external report tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepIndexEntry {
    pub name: String,
    pub description: String,
    #[serde(rename = "stepIdx")]
    pub step_idx: usize,
}

impl From<&StepSummary> for StepIndexEntry {
    fn from(step: &StepSummary) -> Self {
        Self {
            name: step.name.clone(),
            description: step.description.clone(),
            step_idx: step.index,
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The app under test
    pub app: AppInfo,
    /// Serial of the device the run used, if one was selected explicitly
    pub device: Option<String>,
    /// Root of the artifact layout for this run
    pub report_dir: PathBuf,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The time the run finished, as a Unix timestamp in seconds
    pub finished_at: Option<i64>,
    /// Every step declared by the scenario, in order, including skipped ones
    pub steps: Vec<StepSummary>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the runner is aware of.
    pub env: HashMap<String, String>,
    /// The version of the harness that produced this run
    pub harness_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        app: AppInfo,
        report_dir: PathBuf,
        started_at: i64,
        harness_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            app,
            device: None,
            report_dir,
            started_at,
            finished_at: None,
            steps: Vec::new(),
            env: HashMap::with_capacity(0),
            harness_version,
        }
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    pub fn push_step(&mut self, step: StepSummary) {
        self.steps.push(step);
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepSummary> {
        self.steps.iter().filter(|s| s.outcome.is_failed())
    }

    pub fn step_index(&self) -> Vec<StepIndexEntry> {
        self.steps.iter().map(StepIndexEntry::from).collect()
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify the configuration used to run the scenario, so
    /// that repeated rounds of the same scenario can be grouped. It uses the
    ///     - Scenario name
    ///     - App package
    ///     - Step names and expected durations, in order
    ///     - Selected environment variables
    ///     - Harness version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, self.app.package.as_bytes());
        for step in &self.steps {
            Digest::update(&mut hasher, step.name.as_bytes());
            Digest::update(&mut hasher, step.expected_duration_s.to_le_bytes());
        }
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.harness_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are ignored.
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_summary() -> RunSummary {
        let mut summary = RunSummary::new(
            "run-1".to_string(),
            "shop_feed_scroll".to_string(),
            AppInfo {
                package: "com.example.shop".to_string(),
                name: "Shop".to_string(),
            },
            PathBuf::from("reports/run-1"),
            1_700_000_000,
            "0.2.0".to_string(),
        );
        summary.push_step(StepSummary {
            index: 1,
            name: "scroll_feed".to_string(),
            description: "Scroll the home feed".to_string(),
            expected_duration_s: 10,
            elapsed_ms: 9_870,
            outcome: StepOutcome::Passed,
            sample: None,
        });
        summary
    }

    #[test]
    fn fingerprint_ignores_run_specific_fields() {
        let a = sample_summary();
        let mut b = sample_summary();
        b.run_id = "run-2".to_string();
        b.started_at += 100;
        b.steps[0].elapsed_ms = 1;

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_steps() {
        let a = sample_summary();
        let mut b = sample_summary();
        b.steps[0].expected_duration_s = 20;

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_is_independent_of_env_insertion_order() {
        let mut a = sample_summary();
        a.add_env("A".to_string(), "1".to_string());
        a.add_env("B".to_string(), "2".to_string());
        let mut b = sample_summary();
        b.add_env("B".to_string(), "2".to_string());
        b.add_env("A".to_string(), "1".to_string());

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn append_then_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        let first = sample_summary();
        let mut second = sample_summary();
        second.run_id = "run-2".to_string();
        second.steps[0].outcome = StepOutcome::Failed {
            message: "element not found".to_string(),
        };

        append_run_summary(&first, &path).unwrap();
        append_run_summary(&second, &path).unwrap();

        let loaded = load_summary_runs(&path).unwrap();
        assert_eq!(vec![first, second], loaded);
        assert_eq!(1, loaded[1].failed_steps().count());
    }

    #[test]
    fn step_index_uses_external_field_names() {
        let summary = sample_summary();
        let json = serde_json::to_value(summary.step_index()).unwrap();

        assert_eq!(
            serde_json::json!([{
                "name": "scroll_feed",
                "description": "Scroll the home feed",
                "stepIdx": 1
            }]),
            json
        );
    }
}
