use std::any::Any;
use std::panic::AssertUnwindSafe;

use crate::model::StepInput;

/// Derives one metric record for a step from its captured artifacts.
pub trait Analyzer {
    /// Key of this analyzer's result in the report.
    fn name(&self) -> &'static str;

    /// `Ok(None)` when an input artifact is missing. The caller records that as an absent result.
    fn analyze(&self, input: &StepInput) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Run an analyzer, converting any error or panic into an absent result so that one analyzer
/// cannot take down the others or the rest of the report.
pub fn run_isolated(analyzer: &dyn Analyzer, input: &StepInput) -> Option<serde_json::Value> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(input))) {
        Ok(Ok(result)) => {
            if result.is_none() {
                log::info!(
                    "No {} result for step {} [{}]",
                    analyzer.name(),
                    input.index,
                    input.name
                );
            }
            result
        }
        Ok(Err(e)) => {
            log::error!(
                "Analyzer {} failed for step {} [{}]: {e:?}",
                analyzer.name(),
                input.index,
                input.name
            );
            None
        }
        Err(panic) => {
            log::error!(
                "Analyzer {} panicked for step {} [{}]: {}",
                analyzer.name(),
                input.index,
                input.name,
                panic_message(panic.as_ref())
            );
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
