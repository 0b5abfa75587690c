use tokio::signal;
use perf_harness_core::prelude::ShutdownHandle;

/// Stop the run after the current step when the user presses Ctrl-C.
pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl-C, the run can only be stopped by killing it: {e}");
            return;
        }
        log::warn!("Received shutdown signal, stopping after the current step...");
        listener_handle.shutdown();
    });

    Ok(handle)
}
