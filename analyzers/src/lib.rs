mod analyze;
mod analyzer;
mod coverage;
mod empty_frame;
pub mod filter;
mod frame_drop;
pub mod model;
pub mod perf;
mod report;
pub mod trace;

#[cfg(any(test, feature = "test_fixtures"))]
pub mod test_fixtures;

pub use analyzer::{run_isolated, Analyzer};
pub use coverage::{parse_bjc_report, CoverageAnalyzer, CoverageMetric, CoverageSummary};
pub use empty_frame::{summarize_empty_frames, EmptyFrame, EmptyFrameAnalyzer, EmptyFrameSummary};
pub use frame_drop::{dropped_frames, summarize_frame_drops, FrameDropAnalyzer, FrameDropSummary, JankFrame};
pub use report::{
    assemble_report, default_analyzers, print_report, render_report, write_report, REPORT_FILE,
};
