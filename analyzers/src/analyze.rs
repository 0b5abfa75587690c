use crate::model::StandardTimingsStats;
use anyhow::Context;
use polars::frame::DataFrame;
use polars::prelude::*;

/// Mean, standard deviation and the share of values within one, two and three standard
/// deviations of the mean.
pub(crate) fn standard_timing_stats(
    frame: DataFrame,
    column: &str,
) -> anyhow::Result<StandardTimingsStats> {
    let value_series = frame.column(column)?.as_materialized_series().clone();

    let mean = value_series.mean().context("Mean")?;
    let std = value_series.std(0).context("Std")?;

    let out = frame
        .clone()
        .lazy()
        .select([
            col(column)
                .gt_eq(lit(mean - std))
                .and(col(column).lt_eq(lit(mean + std)))
                .alias("within_std"),
            col(column)
                .gt_eq(lit(mean - 2.0 * std))
                .and(col(column).lt_eq(lit(mean + 2.0 * std)))
                .alias("within_2std"),
            col(column)
                .gt_eq(lit(mean - 3.0 * std))
                .and(col(column).lt_eq(lit(mean + 3.0 * std)))
                .alias("within_3std"),
        ])
        .collect()?;

    let total = value_series.len() as f64;
    let share = |name: &str| -> anyhow::Result<f64> {
        let count = out
            .column(name)?
            .as_materialized_series()
            .sum::<usize>()
            .with_context(|| format!("{name} sum"))?;
        Ok(count as f64 / total)
    };

    Ok(StandardTimingsStats {
        mean,
        std,
        within_std: share("within_std")?,
        within_2std: share("within_2std")?,
        within_3std: share("within_3std")?,
    })
}

/// Timing stats over a list of durations in milliseconds. `None` when there are too few values
/// for a standard deviation.
pub(crate) fn duration_stats(durations_ms: &[f64]) -> anyhow::Result<Option<StandardTimingsStats>> {
    if durations_ms.len() < 2 {
        return Ok(None);
    }

    let frame = df!("duration_ms" => durations_ms)?;
    standard_timing_stats(frame, "duration_ms").map(Some)
}
