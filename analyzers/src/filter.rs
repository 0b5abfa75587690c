use itertools::Itertools;
use perf_harness_summary_model::RunSummary;

/// Keep only the most recent run of each scenario and configuration, so that repeated rounds of
/// the same scenario are reported once.
pub fn latest_run_summaries_by_name_and_config(
    summary_runs: Vec<RunSummary>,
) -> Vec<(String, String, RunSummary)> {
    summary_runs
        .into_iter()
        .into_group_map_by(|summary| (summary.scenario_name.clone(), summary.fingerprint()))
        .into_iter()
        .filter_map(|((name, fingerprint), summaries)| {
            summaries
                .into_iter()
                .max_by_key(|summary| summary.started_at)
                .map(|latest| (name, fingerprint, latest))
        })
        .sorted_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
        .collect::<Vec<_>>()
}
