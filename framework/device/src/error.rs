use std::time::Duration;
use thiserror::Error;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with {exit_code:?}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("No element matching {selector} within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },
    #[error("Invalid UI layout: {0}")]
    Layout(String),
    #[error("Invalid bounds string: {0:?}")]
    Bounds(String),
}
