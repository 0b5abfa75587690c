use std::ops::Range;
use std::path::Path;

use anyhow::Context;

use crate::trace::{has_table, open_db};

/// One CPU sample from a `hiperf` database converted by `trace_streamer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfSample {
    /// Sample time on the trace clock, comparable with frame timestamps
    pub timestamp_ns: i64,
    pub event_count: i64,
    pub tid: i64,
    pub pid: Option<u32>,
}

/// Samples of the given processes ordered by time. All processes when `pids` is empty.
///
/// Returns `None` when the database or its sample table does not exist.
pub fn load_samples(perf_db: &Path, pids: &[u32]) -> anyhow::Result<Option<Vec<PerfSample>>> {
    let Some(conn) = open_db(perf_db)? else {
        return Ok(None);
    };
    if !has_table(&conn, "perf_sample")? {
        log::warn!("No perf_sample table in {}", perf_db.display());
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT s.timestamp_trace, s.event_count, s.thread_id, t.process_id
         FROM perf_sample s
         LEFT JOIN perf_thread t ON s.thread_id = t.thread_id
         ORDER BY s.timestamp_trace",
    )?;
    let samples = stmt
        .query_map([], |row| {
            Ok(PerfSample {
                timestamp_ns: row.get(0)?,
                event_count: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
                tid: row.get(2)?,
                pid: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read samples from {}", perf_db.display()))?;

    Ok(Some(
        samples
            .into_iter()
            .filter(|sample| {
                pids.is_empty() || sample.pid.is_some_and(|pid| pids.contains(&pid))
            })
            .collect(),
    ))
}

/// Index range of the samples taken in `[start, end]`. `samples` must be ordered by time.
pub fn window(samples: &[PerfSample], start: i64, end: i64) -> Range<usize> {
    let first = samples.partition_point(|s| s.timestamp_ns < start);
    let last = samples.partition_point(|s| s.timestamp_ns <= end);
    first..last.max(first)
}

/// Sum of `event_count` over samples taken in `[start, end]`. `samples` must be ordered by time.
pub fn load_in_window(samples: &[PerfSample], start: i64, end: i64) -> i64 {
    samples[window(samples, start, end)]
        .iter()
        .map(|s| s.event_count)
        .sum()
}

pub fn total_load(samples: &[PerfSample]) -> i64 {
    samples.iter().map(|s| s.event_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::PerfDbBuilder;
    use pretty_assertions::assert_eq;

    fn sample(timestamp_ns: i64, event_count: i64) -> PerfSample {
        PerfSample {
            timestamp_ns,
            event_count,
            tid: 1,
            pid: Some(100),
        }
    }

    #[test]
    fn load_samples_filters_by_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.db");
        PerfDbBuilder::new()
            .thread(10, 100, "com.example.shop")
            .thread(20, 200, "render_service")
            .sample(300, 5, 10)
            .sample(100, 7, 20)
            .sample(200, 3, 10)
            .write(&path)
            .unwrap();

        let samples = load_samples(&path, &[100]).unwrap().unwrap();
        let times: Vec<_> = samples.iter().map(|s| s.timestamp_ns).collect();
        assert_eq!(vec![200, 300], times);

        assert_eq!(3, load_samples(&path, &[]).unwrap().unwrap().len());
    }

    #[test]
    fn missing_perf_db_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_samples(&dir.path().join("perf.db"), &[]).unwrap().is_none());
    }

    #[test]
    fn window_load_is_inclusive() {
        let samples = vec![sample(10, 1), sample(20, 2), sample(30, 4), sample(40, 8)];

        assert_eq!(6, load_in_window(&samples, 20, 30));
        assert_eq!(15, load_in_window(&samples, 0, 40));
        assert_eq!(0, load_in_window(&samples, 41, 50));
        assert_eq!(0, load_in_window(&samples, 30, 20));
        assert_eq!(15, total_load(&samples));
        assert_eq!(1..3, window(&samples, 15, 30));
    }
}
