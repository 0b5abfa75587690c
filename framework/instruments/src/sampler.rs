mod hdc_sampler;

use std::path::{Path, PathBuf};
use std::time::Duration;

use perf_harness_core::prelude::StepArtifacts;
use perf_harness_summary_model::{PerformanceSample, SampleScope};

pub use hdc_sampler::{HdcSampler, HdcSamplerConfig};

/// The capture window requested for one step.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    pub step_index: usize,
    pub step_name: String,
    /// How long to capture for, the step's declared duration.
    pub duration: Duration,
    pub scope: SampleScope,
    /// Processes to sample. Empty means every process.
    pub pids: Vec<u32>,
    pub artifacts: StepArtifacts,
    /// Root of the report layout. Artifact paths in the sample are recorded relative to it.
    pub report_root: PathBuf,
}

/// Captures performance data for the duration of a step.
///
/// `begin` is called right before the step callback runs and must return quickly, the capture
/// itself runs in the background. `end` is called once the callback returns and blocks until
/// the capture has been finalized and its artifacts written.
pub trait Sampler: Send {
    fn begin(&mut self, window: SampleWindow) -> anyhow::Result<()>;

    fn end(&mut self) -> anyhow::Result<PerformanceSample>;
}

/// Records capture windows without capturing anything, for dry runs and runs with sampling
/// disabled.
#[derive(Debug, Default)]
pub struct NoopSampler {
    active: Option<(SampleWindow, i64)>,
}

impl NoopSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sampler for NoopSampler {
    fn begin(&mut self, window: SampleWindow) -> anyhow::Result<()> {
        self.active = Some((window, now_ms()));
        Ok(())
    }

    fn end(&mut self) -> anyhow::Result<PerformanceSample> {
        let (window, started_at_ms) = self
            .active
            .take()
            .ok_or_else(|| anyhow::anyhow!("Sampling was not started"))?;

        Ok(PerformanceSample {
            started_at_ms,
            ended_at_ms: now_ms(),
            scope: window.scope,
            pids: window.pids,
            artifacts: Vec::new(),
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The subset of `candidates` that exist, relative to `root`.
pub(crate) fn existing_artifacts(root: &Path, candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|path| path.is_file())
        .map(|path| {
            path.strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_harness_core::prelude::ReportLayout;

    pub(crate) fn window(root: &Path, pids: Vec<u32>) -> SampleWindow {
        let layout = ReportLayout::new(root);
        SampleWindow {
            step_index: 1,
            step_name: "scroll".to_string(),
            duration: Duration::from_secs(2),
            scope: SampleScope::App,
            pids,
            artifacts: layout.step(1),
            report_root: root.to_path_buf(),
        }
    }

    #[test]
    fn noop_sampler_records_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut sampler = NoopSampler::new();

        sampler.begin(window(dir.path(), vec![7, 8])).unwrap();
        let sample = sampler.end().unwrap();

        assert_eq!(vec![7, 8], sample.pids);
        assert!(sample.artifacts.is_empty());
        assert!(sample.ended_at_ms >= sample.started_at_ms);
    }

    #[test]
    fn end_without_begin_is_an_error() {
        assert!(NoopSampler::new().end().is_err());
    }

    #[test]
    fn existing_artifacts_are_relative() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ReportLayout::new(dir.path());
        let step = layout.create_step_dirs(1).unwrap();
        std::fs::write(step.trace_db(), b"db").unwrap();

        let found = existing_artifacts(dir.path(), &[step.trace_db(), step.perf_db()]);
        assert_eq!(vec![PathBuf::from("htrace/step1/trace.db")], found);
    }
}
