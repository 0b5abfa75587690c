/// Returned by the runner when a step fails and the failure policy is to abort the scenario.
///
/// The underlying step error has already been logged and recorded in the run summary by the time
/// this is returned, so callers only need it to decide on an exit status.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Scenario aborted after step [{step}] failed")]
pub struct StepAbortError {
    pub step: String,
}

impl StepAbortError {
    pub fn new(step: impl Into<String>) -> Self {
        Self { step: step.into() }
    }
}
