use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use perf_harness_core::tool_binary;
use perf_harness_device::prelude::{CommandRunner, SystemCommandRunner};
use serde::{Deserialize, Serialize};

use crate::analyzer::Analyzer;
use crate::model::StepInput;

const BJC_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CoverageMetric {
    pub total: u64,
    pub covered: u64,
    pub pct: f64,
}

/// The `bjc` output, an istanbul style summary keyed by file with an extra `total` entry.
#[derive(Debug, Deserialize)]
struct BjcFileSummary {
    lines: CoverageMetric,
    statements: CoverageMetric,
    functions: CoverageMetric,
    branches: CoverageMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageSummary {
    /// Number of source files in the coverage report
    pub files: usize,
    pub lines: CoverageMetric,
    pub statements: CoverageMetric,
    pub functions: CoverageMetric,
    pub branches: CoverageMetric,
}

/// Code coverage of the step, computed by the external `bjc` tool from the raw coverage dump.
pub struct CoverageAnalyzer {
    bjc: Option<PathBuf>,
    runner: Box<dyn CommandRunner>,
}

impl CoverageAnalyzer {
    /// Use `bjc` from `PH_BJC_PATH` or the `PATH`. Steps with a coverage dump fail to analyze if it
    /// cannot be found.
    pub fn from_env() -> Self {
        let bjc = match tool_binary::bjc_path() {
            Ok(path) => Some(path),
            Err(e) => {
                log::debug!("Coverage will not be analyzed: {e:#}");
                None
            }
        };
        Self {
            bjc,
            runner: Box::new(SystemCommandRunner),
        }
    }

    pub fn with_bjc(bjc: impl Into<PathBuf>) -> Self {
        Self {
            bjc: Some(bjc.into()),
            runner: Box::new(SystemCommandRunner),
        }
    }

    fn run_bjc(&self, bjc: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
        let args = vec![
            "--input".to_string(),
            input.display().to_string(),
            "--output".to_string(),
            output.display().to_string(),
        ];
        let result = self
            .runner
            .run(&bjc.display().to_string(), &args, BJC_TIMEOUT)?;
        if !result.success() {
            anyhow::bail!(
                "bjc exited with {:?}: {}",
                result.exit_code,
                result.stderr.trim()
            );
        }
        Ok(())
    }
}

pub fn parse_bjc_report(content: &str) -> anyhow::Result<CoverageSummary> {
    let mut report: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(content).context("bjc report is not a JSON object")?;
    let total = report
        .remove("total")
        .context("bjc report has no `total` entry")?;
    let total: BjcFileSummary =
        serde_json::from_value(total).context("Invalid `total` entry in bjc report")?;

    Ok(CoverageSummary {
        files: report.len(),
        lines: total.lines,
        statements: total.statements,
        functions: total.functions,
        branches: total.branches,
    })
}

impl Analyzer for CoverageAnalyzer {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn analyze(&self, input: &StepInput) -> anyhow::Result<Option<serde_json::Value>> {
        // A step without a trace captured nothing worth analyzing.
        let trace_db = input.artifacts.trace_db();
        if !trace_db.is_file() {
            log::warn!("Trace database not found: {}", trace_db.display());
            return Ok(None);
        }

        let coverage_input = input.artifacts.coverage_input();
        if !coverage_input.is_file() {
            log::warn!("Coverage dump not found: {}", coverage_input.display());
            return Ok(None);
        }

        let bjc = self
            .bjc
            .as_deref()
            .context("bjc is required to analyze coverage, set PH_BJC_PATH")?;
        let coverage_output = input.artifacts.coverage_output();
        self.run_bjc(bjc, &coverage_input, &coverage_output)?;

        let content = std::fs::read_to_string(&coverage_output)
            .with_context(|| format!("Failed to read {}", coverage_output.display()))?;
        let summary = parse_bjc_report(&content)?;
        Ok(Some(serde_json::to_value(summary)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TraceDbBuilder;
    use perf_harness_core::prelude::ReportLayout;
    use pretty_assertions::assert_eq;

    const BJC_REPORT: &str = r#"{
        "total": {
            "lines": {"total": 200, "covered": 150, "skipped": 0, "pct": 75},
            "statements": {"total": 220, "covered": 154, "skipped": 0, "pct": 70},
            "functions": {"total": 40, "covered": 30, "skipped": 0, "pct": 75},
            "branches": {"total": 50, "covered": 20, "skipped": 0, "pct": 40}
        },
        "entry/src/main/ets/pages/Index.ets": {
            "lines": {"total": 100, "covered": 90, "skipped": 0, "pct": 90},
            "statements": {"total": 110, "covered": 90, "skipped": 0, "pct": 81.81},
            "functions": {"total": 20, "covered": 18, "skipped": 0, "pct": 90},
            "branches": {"total": 30, "covered": 15, "skipped": 0, "pct": 50}
        },
        "entry/src/main/ets/pages/Cart.ets": {
            "lines": {"total": 100, "covered": 60, "skipped": 0, "pct": 60},
            "statements": {"total": 110, "covered": 64, "skipped": 0, "pct": 58.18},
            "functions": {"total": 20, "covered": 12, "skipped": 0, "pct": 60},
            "branches": {"total": 20, "covered": 5, "skipped": 0, "pct": 25}
        }
    }"#;

    fn input(dir: &Path) -> StepInput {
        let artifacts = ReportLayout::new(dir).create_step_dirs(1).unwrap();
        TraceDbBuilder::new()
            .process(1, 100, "com.example.shop")
            .write(&artifacts.trace_db())
            .unwrap();
        StepInput {
            index: 1,
            name: "open".to_string(),
            pids: vec![],
            artifacts,
        }
    }

    #[test]
    fn parse_report_totals() {
        let summary = parse_bjc_report(BJC_REPORT).unwrap();

        assert_eq!(2, summary.files);
        assert_eq!(
            CoverageMetric {
                total: 200,
                covered: 150,
                pct: 75.0
            },
            summary.lines
        );
        assert_eq!(40.0, summary.branches.pct);
    }

    #[test]
    fn report_without_total_is_an_error() {
        assert!(parse_bjc_report(r#"{"a.ets": {}}"#).is_err());
    }

    #[test]
    fn missing_coverage_dump_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = CoverageAnalyzer::with_bjc("/non/existent/bjc");

        assert_eq!(None, analyzer.analyze(&input(dir.path())).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn runs_bjc_on_coverage_dump() {
        let dir = tempfile::tempdir().unwrap();
        let step = input(dir.path());
        std::fs::write(step.artifacts.coverage_input(), "{}").unwrap();
        std::fs::write(dir.path().join("canned.json"), BJC_REPORT).unwrap();
        // Copies a canned report to the path given with --output.
        let bjc = crate::test_fixtures::write_stub_tool(
            dir.path(),
            "bjc",
            &format!(
                "[ \"$1\" = --input ] && [ -f \"$2\" ] && [ \"$3\" = --output ] && cp {} \"$4\"",
                dir.path().join("canned.json").display()
            ),
        )
        .unwrap();

        let value = CoverageAnalyzer::with_bjc(bjc)
            .analyze(&step)
            .unwrap()
            .unwrap();

        assert_eq!(2, value["files"]);
        assert_eq!(75.0, value["lines"]["pct"]);
        assert!(step.artifacts.coverage_output().is_file());
    }

    #[cfg(unix)]
    #[test]
    fn missing_trace_db_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let step = input(dir.path());
        std::fs::remove_file(step.artifacts.trace_db()).unwrap();
        std::fs::write(step.artifacts.coverage_input(), "{}").unwrap();
        let bjc = crate::test_fixtures::write_stub_tool(dir.path(), "bjc", r#"touch "$4""#).unwrap();

        assert_eq!(None, CoverageAnalyzer::with_bjc(bjc).analyze(&step).unwrap());
        assert!(!step.artifacts.coverage_output().exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_bjc_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let step = input(dir.path());
        std::fs::write(step.artifacts.coverage_input(), "{}").unwrap();
        let bjc =
            crate::test_fixtures::write_stub_tool(dir.path(), "bjc", "echo broken >&2; exit 3")
                .unwrap();

        let err = CoverageAnalyzer::with_bjc(bjc).analyze(&step).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
