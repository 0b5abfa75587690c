use std::path::{Path, PathBuf};

pub const TEST_INFO_FILE: &str = "testInfo.json";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const PERF_DIR: &str = "hiperf";
pub const TRACE_DIR: &str = "htrace";
pub const REPORT_DIR: &str = "report";
pub const STEPS_FILE: &str = "steps.json";

pub const PERF_DATA_FILE: &str = "perf.data";
pub const PERF_DB_FILE: &str = "perf.db";
pub const TRACE_HTRACE_FILE: &str = "trace.htrace";
pub const TRACE_DB_FILE: &str = "trace.db";
pub const COVERAGE_INPUT_FILE: &str = "bjc_cov.json";
pub const COVERAGE_OUTPUT_FILE: &str = "bjc_cov_report.json";

/// The on-disk layout of one scenario run.
///
/// These names are read by external tooling, so they must not change.
///
/// ```text
/// <root>/testInfo.json
/// <root>/run_summary.json
/// <root>/hiperf/steps.json
/// <root>/hiperf/step<N>/perf.data, perf.db
/// <root>/htrace/step<N>/trace.htrace, trace.db, bjc_cov.json, bjc_cov_report.json
/// <root>/report/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    root: PathBuf,
}

impl ReportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn test_info(&self) -> PathBuf {
        self.root.join(TEST_INFO_FILE)
    }

    pub fn run_summary(&self) -> PathBuf {
        self.root.join(RUN_SUMMARY_FILE)
    }

    pub fn steps_json(&self) -> PathBuf {
        self.root.join(PERF_DIR).join(STEPS_FILE)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.root.join(REPORT_DIR)
    }

    /// Artifacts for a step. Step indices start at 1.
    pub fn step(&self, index: usize) -> StepArtifacts {
        let step_dir = format!("step{index}");
        StepArtifacts {
            index,
            perf_dir: self.root.join(PERF_DIR).join(&step_dir),
            trace_dir: self.root.join(TRACE_DIR).join(step_dir),
        }
    }

    /// Create the root, report and per-step directories.
    pub fn create_step_dirs(&self, index: usize) -> std::io::Result<StepArtifacts> {
        let step = self.step(index);
        std::fs::create_dir_all(&step.perf_dir)?;
        std::fs::create_dir_all(&step.trace_dir)?;
        std::fs::create_dir_all(self.report_dir())?;
        Ok(step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepArtifacts {
    pub index: usize,
    pub perf_dir: PathBuf,
    pub trace_dir: PathBuf,
}

impl StepArtifacts {
    pub fn perf_data(&self) -> PathBuf {
        self.perf_dir.join(PERF_DATA_FILE)
    }

    pub fn perf_db(&self) -> PathBuf {
        self.perf_dir.join(PERF_DB_FILE)
    }

    pub fn trace_htrace(&self) -> PathBuf {
        self.trace_dir.join(TRACE_HTRACE_FILE)
    }

    pub fn trace_db(&self) -> PathBuf {
        self.trace_dir.join(TRACE_DB_FILE)
    }

    pub fn coverage_input(&self) -> PathBuf {
        self.trace_dir.join(COVERAGE_INPUT_FILE)
    }

    pub fn coverage_output(&self) -> PathBuf {
        self.trace_dir.join(COVERAGE_OUTPUT_FILE)
    }
}
