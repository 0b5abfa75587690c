mod abort;
mod layout;
mod shutdown;
pub mod tool_binary;

pub mod prelude {
    pub use crate::abort::StepAbortError;
    pub use crate::layout::{ReportLayout, StepArtifacts};
    pub use crate::layout::{COVERAGE_INPUT_FILE, COVERAGE_OUTPUT_FILE, STEPS_FILE};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
