use std::future::Future;

use perf_harness_core::prelude::{ShutdownHandle, ShutdownSignalError};
use tokio::runtime::Handle;

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the run is shut down. You do not need to do
    /// anything special to handle this, but a future which does not support cancelling may
    /// prevent the run from stopping after the current step.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled when the run is shut down, and the runner does not wait for it
    /// before writing the report. Use [Executor::execute_in_place] for work a step depends on.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Handle to the runtime, for components that schedule their own background work such as
    /// samplers.
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}
