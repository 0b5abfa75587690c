mod in_memory_reporter;
mod summary_report;

use crate::StepRecord;

pub use in_memory_reporter::InMemoryReporter;
pub use summary_report::SummaryReportCollector;

pub trait ReportCollector: Send {
    fn add_step(&mut self, step_record: &StepRecord);

    fn finalize(&self);
}

/// Fans step records out to every configured collector.
#[derive(Default)]
pub struct Reporter {
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collector(mut self, collector: impl ReportCollector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    pub fn add_step(&mut self, step_record: &StepRecord) {
        for collector in &mut self.collectors {
            collector.add_step(step_record);
        }
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.finalize();
        }
    }
}
