mod cli;
mod config;
mod context;
mod definition;
mod executor;
mod init;
mod progress;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::HarnessCli;
    pub use crate::config::{
        ConfigError, ConfigFile, FailurePolicy, HarnessConfig, SamplingConfig,
        DEFAULT_RUN_SUMMARY_PATH, PH_DEVICE_SERIAL_ENV, RUN_SUMMARY_PATH_ENV,
    };
    pub use crate::context::{CurrentStep, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookMut, HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::{run, run_with};
    pub use crate::types::HarnessResult;

    pub use perf_harness_core::prelude::{ShutdownSignalError, StepAbortError};
    pub use perf_harness_device::prelude::*;
    pub use perf_harness_instruments::{NoopSampler, Sampler};
    pub use perf_harness_summary_model::{RunSummary, SampleScope, StepOutcome};
}
