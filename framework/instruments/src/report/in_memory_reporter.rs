use std::sync::Arc;

use parking_lot::Mutex;

use crate::report::ReportCollector;
use crate::StepRecord;

/// Keeps step records in memory so that they can be inspected after a run, mostly from tests.
///
/// Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryReporter {
    step_records: Arc<Mutex<Vec<StepRecord>>>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StepRecord> {
        self.step_records.lock().clone()
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_step(&mut self, step_record: &StepRecord) {
        self.step_records.lock().push(step_record.clone());
    }

    fn finalize(&self) {
        log::debug!(
            "In memory reporter holds {} step records",
            self.step_records.lock().len()
        );
    }
}
