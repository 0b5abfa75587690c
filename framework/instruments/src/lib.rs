mod record;
mod report;
mod sampler;

pub use record::{report_step, StepRecord};
pub use report::{InMemoryReporter, ReportCollector, Reporter, SummaryReportCollector};
pub use sampler::{HdcSampler, HdcSamplerConfig, NoopSampler, SampleWindow, Sampler};
