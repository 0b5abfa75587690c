use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use perf_harness_core::prelude::{ReportLayout, ShutdownHandle};
use perf_harness_device::prelude::Device;
use perf_harness_summary_model::AppInfo;

use crate::config::HarnessConfig;
use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

impl UserValuesConstraint for () {}

/// The step that is currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentStep {
    /// 1-based position of the step in the scenario
    pub index: usize,
    pub name: String,
    pub expected: Duration,
}

/// Everything a hook or step callback has access to during a run.
pub struct RunnerContext<V: UserValuesConstraint> {
    executor: Arc<Executor>,
    device: Box<dyn Device>,
    app: AppInfo,
    ability: String,
    config: HarnessConfig,
    layout: ReportLayout,
    shutdown_handle: ShutdownHandle,
    current_step: Option<CurrentStep>,
    value: V,
}

impl<V: UserValuesConstraint> RunnerContext<V> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        device: Box<dyn Device>,
        app: AppInfo,
        ability: String,
        config: HarnessConfig,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        let layout = ReportLayout::new(&config.report_dir);
        Self {
            executor,
            device,
            app,
            ability,
            config,
            layout,
            shutdown_handle,
            current_step: None,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// The device the scenario drives. UI helpers such as `tap_on` come from
    /// [perf_harness_device::prelude::DeviceExt].
    pub fn device(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// The running step. `None` in the setup and teardown hooks.
    pub fn current_step(&self) -> Option<&CurrentStep> {
        self.current_step.as_ref()
    }

    pub(crate) fn set_current_step(&mut self, step: Option<CurrentStep>) {
        self.current_step = step;
    }

    /// Launch the app under test with its configured ability.
    pub fn start_app(&mut self) -> anyhow::Result<()> {
        let package = self.app.package.clone();
        self.device
            .start_app(&package, &self.ability)
            .with_context(|| format!("Failed to start {package}"))
    }

    pub fn stop_app(&mut self) -> anyhow::Result<()> {
        let package = self.app.package.clone();
        self.device
            .stop_app(&package)
            .with_context(|| format!("Failed to stop {package}"))
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    /// Stop the run once the current step finishes. The remaining steps are recorded as
    /// skipped.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }
}
