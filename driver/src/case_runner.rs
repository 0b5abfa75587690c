use std::path::PathBuf;

use perf_harness_core::prelude::{ShutdownHandle, ShutdownSignalError};
use tokio::runtime::Handle;

/// Runs one test case once.
pub trait CaseRunner {
    fn run_case(&mut self, case: &str) -> anyhow::Result<()>;
}

/// Runs test cases with an external runner, `<program> run -l <case> -tcpath <dir> -rp <dir>`.
///
/// The runner's output goes straight to this process's stdout and stderr. A shutdown kills the
/// case in progress.
pub struct ProcessCaseRunner {
    program: PathBuf,
    tc_path: PathBuf,
    report_path: PathBuf,
    runtime: Handle,
    shutdown: ShutdownHandle,
}

impl ProcessCaseRunner {
    pub fn new(
        program: impl Into<PathBuf>,
        tc_path: impl Into<PathBuf>,
        report_path: impl Into<PathBuf>,
        runtime: Handle,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            program: program.into(),
            tc_path: tc_path.into(),
            report_path: report_path.into(),
            runtime,
            shutdown,
        }
    }

    pub fn args(&self, case: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "-l".to_string(),
            case.to_string(),
            "-tcpath".to_string(),
            self.tc_path.display().to_string(),
            "-rp".to_string(),
            self.report_path.display().to_string(),
        ]
    }
}

impl CaseRunner for ProcessCaseRunner {
    fn run_case(&mut self, case: &str) -> anyhow::Result<()> {
        let args = self.args(case);
        log::debug!("Running {} {}", self.program.display(), args.join(" "));

        let mut command = tokio::process::Command::new(&self.program);
        command.args(&args).kill_on_drop(true);
        let mut shutdown_listener = self.shutdown.new_listener();

        let status = self.runtime.block_on(async move {
            tokio::select! {
                status = command.status() => Ok(status),
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })?;
        let status = status
            .map_err(|e| anyhow::anyhow!("Failed to start {}: {e}", self.program.display()))?;

        if !status.success() {
            anyhow::bail!("Case {case} exited with {status}");
        }
        Ok(())
    }
}
