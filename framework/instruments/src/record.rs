use std::time::{Duration, Instant};

/// Timing of one step execution.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step_index: usize,
    pub step_name: String,
    pub expected: Duration,
    started: Instant,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
}

impl StepRecord {
    pub fn new(step_index: usize, step_name: String, expected: Duration) -> Self {
        Self {
            step_index,
            step_name,
            expected,
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    /// Elapsed time of a finished step. `None` while the step is still running.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Whether the step took longer than its declared duration, which means sampling stopped
    /// before the step finished.
    pub fn overran(&self) -> bool {
        self.elapsed.is_some_and(|elapsed| elapsed > self.expected)
    }
}

/// Stop the clock on a step record, marking it failed if the step returned an error.
pub fn report_step<T, E>(mut record: StepRecord, result: &Result<T, E>) -> StepRecord {
    record.elapsed = Some(record.started.elapsed());
    record.is_error = result.is_err();
    log::debug!(
        "Step {} [{}] took {}ms, and failed? {:?}",
        record.step_index,
        record.step_name,
        record.elapsed.unwrap_or_default().as_millis(),
        record.is_error,
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_step_measures_elapsed_time() {
        let record = StepRecord::new(1, "wait".to_string(), Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(50));
        let record = report_step(record, &Ok::<(), ()>(()));

        let elapsed = record.duration().unwrap();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(1));
        assert!(!record.is_error);
        assert!(!record.overran());
    }

    #[test]
    fn report_step_marks_errors() {
        let record = StepRecord::new(2, "fails".to_string(), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(1));
        let record = report_step(record, &Err::<(), _>("boom"));

        assert!(record.is_error);
        assert!(record.overran());
    }
}
