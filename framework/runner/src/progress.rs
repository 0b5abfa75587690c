use std::cmp::min;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

const TICK: Duration = Duration::from_millis(250);

/// Displays a progress bar while a step is running to show the user how much of the step's
/// sampling window is left. The bar is cleared when this is dropped.
pub(crate) struct StepProgress {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StepProgress {
    pub(crate) fn start(step_name: &str, planned: Duration) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let thread_done = done.clone();
        let step_name = step_name.to_string();

        let handle = std::thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || {
                let start_time = Instant::now();
                let pb = ProgressBar::new(planned.as_secs().max(1));
                pb.set_style(style(planned));
                pb.set_message(step_name);

                while !thread_done.load(Ordering::Acquire) {
                    let position = min(start_time.elapsed().as_secs(), planned.as_secs());
                    pb.set_position(position);
                    std::thread::sleep(TICK);
                }

                log::trace!("Progress thread shutting down");
                pb.finish_and_clear();
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Failed to start progress thread: {e}");
                None
            }
        };

        Self { done, handle }
    }
}

impl Drop for StepProgress {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn style(planned: Duration) -> ProgressStyle {
    let hours = planned.as_secs() / 3600;
    let minutes = (planned.as_secs() % 3600) / 60;
    let seconds = planned.as_secs() % 60;

    ProgressStyle::with_template(
        "{spinner:.green} {msg} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned}]",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .with_key(
        "planned",
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{hours:02}:{minutes:02}:{seconds:02}");
        },
    )
    .progress_chars("#>-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_stops_progress_thread() {
        let progress = StepProgress::start("scroll", Duration::from_secs(2));
        std::thread::sleep(Duration::from_millis(50));
        drop(progress);
    }
}
