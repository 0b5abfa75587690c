mod case_list;
mod case_runner;
mod drive;

pub use case_list::{parse_case_list, read_case_list};
pub use case_runner::{CaseRunner, ProcessCaseRunner};
pub use drive::{drive, DriveSummary, DEFAULT_ROUNDS};
