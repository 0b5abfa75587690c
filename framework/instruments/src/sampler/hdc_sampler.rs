use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use perf_harness_device::prelude::{CommandRunner, HdcConnection, SystemCommandRunner};
use perf_harness_summary_model::PerformanceSample;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::sampler::{existing_artifacts, now_ms, SampleWindow, Sampler};

const DEVICE_PERF_DATA: &str = "/data/local/tmp/perf_harness.data";
const DEVICE_HTRACE: &str = "/data/local/tmp/perf_harness.htrace";
/// Extra time allowed for a capture to flush after its duration has elapsed.
const CAPTURE_GRACE: Duration = Duration::from_secs(60);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct HdcSamplerConfig {
    pub hiperf_frequency: u32,
    pub hiperf_event: String,
    pub hitrace_buffer_kb: u32,
    pub hitrace_tags: Vec<String>,
    /// Host tool converting raw captures into sqlite databases. Without it only the raw captures
    /// are kept.
    pub trace_streamer: Option<PathBuf>,
}

impl Default for HdcSamplerConfig {
    fn default() -> Self {
        Self {
            hiperf_frequency: 1000,
            hiperf_event: "raw-instruction-retired".to_string(),
            hitrace_buffer_kb: 20480,
            hitrace_tags: ["graphic", "ace", "app", "ohos", "ability", "window"]
                .into_iter()
                .map(String::from)
                .collect(),
            trace_streamer: None,
        }
    }
}

struct ActiveCapture {
    window: SampleWindow,
    started_at_ms: i64,
    hiperf: JoinHandle<anyhow::Result<()>>,
    hitrace: JoinHandle<anyhow::Result<()>>,
}

/// Captures CPU samples with `hiperf` and a system trace with `hitrace` on the device while a
/// step runs, then pulls both captures into the step's directories.
pub struct HdcSampler {
    connection: HdcConnection,
    config: HdcSamplerConfig,
    runtime: Handle,
    active: Option<ActiveCapture>,
}

impl HdcSampler {
    pub fn new(connection: HdcConnection, config: HdcSamplerConfig, runtime: Handle) -> Self {
        Self {
            connection,
            config,
            runtime,
            active: None,
        }
    }

    pub(crate) fn hiperf_command(&self, window: &SampleWindow) -> String {
        let target = if window.pids.is_empty() {
            "-a".to_string()
        } else {
            let pids = window
                .pids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            format!("-p {pids}")
        };

        format!(
            "hiperf record {target} -d {} -f {} -e {} --call-stack dwarf -o {DEVICE_PERF_DATA}",
            window.duration.as_secs().max(1),
            self.config.hiperf_frequency,
            self.config.hiperf_event,
        )
    }

    pub(crate) fn hitrace_command(&self, window: &SampleWindow) -> String {
        format!(
            "hitrace -b {} -t {} --overwrite -o {DEVICE_HTRACE} {}",
            self.config.hitrace_buffer_kb,
            window.duration.as_secs().max(1),
            self.config.hitrace_tags.join(" "),
        )
    }

    fn spawn_capture(&self, command: String, timeout: Duration) -> JoinHandle<anyhow::Result<()>> {
        let hdc = self.connection.hdc_path().to_path_buf();
        let args = self.connection.shell_args(&command);

        self.runtime.spawn(async move {
            log::debug!("Starting capture: {command}");
            let output = tokio::time::timeout(
                timeout,
                tokio::process::Command::new(&hdc)
                    .args(&args)
                    .kill_on_drop(true)
                    .output(),
            )
            .await
            .with_context(|| format!("Capture did not finish in {timeout:?}: {command}"))?
            .with_context(|| format!("Failed to run capture: {command}"))?;

            if !output.status.success() {
                anyhow::bail!(
                    "Capture exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(())
        })
    }

    fn await_capture(&self, name: &str, handle: JoinHandle<anyhow::Result<()>>) -> bool {
        match self.runtime.block_on(handle) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::warn!("{name} capture failed: {e:?}");
                false
            }
            Err(e) => {
                log::warn!("{name} capture task failed: {e:?}");
                false
            }
        }
    }

    fn pull(&self, remote: &str, local: &Path) -> bool {
        match self.connection.recv(remote, local) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to pull {remote}: {e}");
                false
            }
        }
    }

    fn convert(&self, input: &Path, output: &Path) {
        let Some(trace_streamer) = &self.config.trace_streamer else {
            log::debug!("No trace_streamer configured, keeping {}", input.display());
            return;
        };

        let args = vec![
            input.display().to_string(),
            "-e".to_string(),
            output.display().to_string(),
        ];
        let program = trace_streamer.display().to_string();
        match SystemCommandRunner.run(&program, &args, CONVERT_TIMEOUT) {
            Ok(result) if result.success() => {
                log::debug!("Converted {} to {}", input.display(), output.display())
            }
            Ok(result) => log::warn!(
                "Converting {} failed with {:?}: {}",
                input.display(),
                result.exit_code,
                result.stderr.trim()
            ),
            Err(e) => log::warn!("Converting {} failed: {e}", input.display()),
        }
    }
}

impl Sampler for HdcSampler {
    fn begin(&mut self, window: SampleWindow) -> anyhow::Result<()> {
        if self.active.is_some() {
            anyhow::bail!("Sampling already in progress");
        }

        if window.pids.is_empty() {
            log::info!(
                "Sampling all processes for step {} [{}]",
                window.step_index,
                window.step_name
            );
        }

        let timeout = window.duration + CAPTURE_GRACE;
        let hiperf = self.spawn_capture(self.hiperf_command(&window), timeout);
        let hitrace = self.spawn_capture(self.hitrace_command(&window), timeout);

        self.active = Some(ActiveCapture {
            window,
            started_at_ms: now_ms(),
            hiperf,
            hitrace,
        });
        Ok(())
    }

    fn end(&mut self) -> anyhow::Result<PerformanceSample> {
        let ActiveCapture {
            window,
            started_at_ms,
            hiperf,
            hitrace,
        } = self
            .active
            .take()
            .ok_or_else(|| anyhow::anyhow!("Sampling was not started"))?;

        let artifacts = &window.artifacts;

        // A failed capture leaves its artifacts missing, the analyzers deal with that.
        if self.await_capture("hiperf", hiperf) && self.pull(DEVICE_PERF_DATA, &artifacts.perf_data()) {
            self.convert(&artifacts.perf_data(), &artifacts.perf_db());
        }
        if self.await_capture("hitrace", hitrace) && self.pull(DEVICE_HTRACE, &artifacts.trace_htrace()) {
            self.convert(&artifacts.trace_htrace(), &artifacts.trace_db());
        }

        let candidates = [
            artifacts.perf_data(),
            artifacts.perf_db(),
            artifacts.trace_htrace(),
            artifacts.trace_db(),
        ];

        Ok(PerformanceSample {
            started_at_ms,
            ended_at_ms: now_ms(),
            scope: window.scope,
            artifacts: existing_artifacts(&window.report_root, &candidates),
            pids: window.pids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::tests::window;

    fn sampler(runtime: &tokio::runtime::Runtime, config: HdcSamplerConfig) -> HdcSampler {
        HdcSampler::new(
            HdcConnection::new("hdc", Some("SER".to_string())),
            config,
            runtime.handle().clone(),
        )
    }

    #[test]
    fn hiperf_targets_app_pids() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler(&runtime, HdcSamplerConfig::default());

        let command = sampler.hiperf_command(&window(dir.path(), vec![100, 200]));
        assert_eq!(
            "hiperf record -p 100,200 -d 2 -f 1000 -e raw-instruction-retired --call-stack dwarf -o /data/local/tmp/perf_harness.data",
            command
        );
    }

    #[test]
    fn hiperf_samples_everything_without_pids() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler(&runtime, HdcSamplerConfig::default());

        let command = sampler.hiperf_command(&window(dir.path(), vec![]));
        assert!(command.starts_with("hiperf record -a -d 2 "));
    }

    #[test]
    fn hitrace_uses_configured_tags() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let sampler = sampler(
            &runtime,
            HdcSamplerConfig {
                hitrace_tags: vec!["graphic".to_string(), "app".to_string()],
                ..Default::default()
            },
        );

        assert_eq!(
            "hitrace -b 20480 -t 2 --overwrite -o /data/local/tmp/perf_harness.htrace graphic app",
            sampler.hitrace_command(&window(dir.path(), vec![1]))
        );
    }

    #[cfg(unix)]
    #[test]
    fn failed_captures_still_produce_a_sample() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        // `false` exits non-zero for every command, as an unreachable device would.
        let mut sampler = HdcSampler::new(
            HdcConnection::new("false", None),
            HdcSamplerConfig::default(),
            runtime.handle().clone(),
        );

        sampler.begin(window(dir.path(), vec![5])).unwrap();
        let sample = sampler.end().unwrap();

        assert_eq!(vec![5], sample.pids);
        assert!(sample.artifacts.is_empty());
    }
}
