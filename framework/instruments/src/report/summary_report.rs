mod steps_table;

use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::steps_table::StepRow;
use crate::report::ReportCollector;
use crate::StepRecord;

/// Prints a table of step timings at the end of a run.
#[derive(Default)]
pub struct SummaryReportCollector {
    step_records: Vec<StepRecord>,
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn render(&self) -> String {
        let rows = self
            .step_records
            .iter()
            .map(|record| StepRow {
                step_index: record.step_index,
                step: record.step_name.clone(),
                expected_s: record.expected.as_secs_f64(),
                elapsed_s: record.duration().unwrap_or_default().as_secs_f64(),
                overran: record.overran(),
                status: if record.is_error { "failed" } else { "passed" },
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table.to_string()
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_step(&mut self, step_record: &StepRecord) {
        self.step_records.push(step_record.clone());
    }

    fn finalize(&self) {
        println!("\nSummary of steps");
        println!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_step;
    use std::time::Duration;

    #[test]
    fn render_lists_steps_in_order() {
        let mut collector = SummaryReportCollector::new();
        for (i, name) in ["open_home", "scroll_feed"].iter().enumerate() {
            let record = StepRecord::new(i + 1, name.to_string(), Duration::from_secs(5));
            collector.add_step(&report_step(record, &Ok::<(), ()>(())));
        }

        let rendered = collector.render();
        let open = rendered.find("open_home").unwrap();
        let scroll = rendered.find("scroll_feed").unwrap();
        assert!(open < scroll);
        assert!(rendered.contains("passed"));
    }
}
