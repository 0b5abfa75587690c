//! Reading frames from a trace database produced by `trace_streamer`.
//!
//! Frames live in `frame_slice`. Each rendered frame has an actual row (`type = 0`) with the time
//! the frame really took and an expected row (`type = 1`) with the vsync budget it had. The
//! `flag` column of actual rows classifies the frame: `0` on time, `1` jank, `2` nothing drawn,
//! `3` no expected frame to compare with.

use std::path::Path;

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};

/// Frame period used when the trace has no expected frames, 60 Hz.
pub const DEFAULT_FRAME_PERIOD_NS: i64 = 16_666_667;

pub const FLAG_JANK: i64 = 1;
pub const FLAG_EMPTY: i64 = 2;

const ACTUAL_FRAME: i64 = 0;
const EXPECTED_FRAME: i64 = 1;

/// An actual frame from `frame_slice`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub ts: i64,
    pub dur: i64,
    pub vsync: Option<i64>,
    pub flag: Option<i64>,
    pub pid: Option<u32>,
    /// Thread that produced the frame
    pub tid: Option<i64>,
    pub process_name: Option<String>,
    pub thread_name: Option<String>,
}

impl Frame {
    pub fn end(&self) -> i64 {
        self.ts + self.dur
    }

    pub fn is_jank(&self) -> bool {
        self.flag == Some(FLAG_JANK)
    }

    pub fn is_empty(&self) -> bool {
        self.flag == Some(FLAG_EMPTY)
    }
}

/// Open a database read-only. `None`, with a warning, when the file does not exist.
pub(crate) fn open_db(path: &Path) -> anyhow::Result<Option<Connection>> {
    if !path.is_file() {
        log::warn!("Database not found: {}", path.display());
        return Ok(None);
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Some(conn))
}

pub(crate) fn has_table(conn: &Connection, table: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn in_scope(pid: Option<u32>, pids: &[u32]) -> bool {
    pids.is_empty() || pid.is_some_and(|pid| pids.contains(&pid))
}

/// Actual frames of the given processes, ordered by start time. All processes when `pids` is
/// empty.
///
/// Returns `None` when the database or its frame table does not exist.
pub fn load_frames(trace_db: &Path, pids: &[u32]) -> anyhow::Result<Option<Vec<Frame>>> {
    let Some(conn) = open_db(trace_db)? else {
        return Ok(None);
    };
    if !has_table(&conn, "frame_slice")? {
        log::warn!("No frame_slice table in {}", trace_db.display());
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT f.ts, f.dur, f.vsync, f.flag, p.pid, t.tid, p.name, t.name
         FROM frame_slice f
         LEFT JOIN process p ON f.ipid = p.id
         LEFT JOIN thread t ON f.itid = t.id
         WHERE f.type = ?1 AND f.dur IS NOT NULL
         ORDER BY f.ts",
    )?;
    let frames = stmt
        .query_map([ACTUAL_FRAME], |row| {
            Ok(Frame {
                ts: row.get(0)?,
                dur: row.get(1)?,
                vsync: row.get(2)?,
                flag: row.get(3)?,
                pid: row.get(4)?,
                tid: row.get(5)?,
                process_name: row.get(6)?,
                thread_name: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read frames from {}", trace_db.display()))?;

    Ok(Some(
        frames
            .into_iter()
            .filter(|frame| in_scope(frame.pid, pids))
            .collect(),
    ))
}

/// The vsync period, as the median duration of the expected frames of the given processes.
///
/// Falls back to [DEFAULT_FRAME_PERIOD_NS] when there are no expected frames.
pub fn frame_period_ns(trace_db: &Path, pids: &[u32]) -> anyhow::Result<i64> {
    let Some(conn) = open_db(trace_db)? else {
        return Ok(DEFAULT_FRAME_PERIOD_NS);
    };
    if !has_table(&conn, "frame_slice")? {
        return Ok(DEFAULT_FRAME_PERIOD_NS);
    }

    let mut stmt = conn.prepare(
        "SELECT f.dur, p.pid
         FROM frame_slice f
         LEFT JOIN process p ON f.ipid = p.id
         WHERE f.type = ?1 AND f.dur > 0",
    )?;
    let mut durations = stmt
        .query_map([EXPECTED_FRAME], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<u32>>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(_, pid)| in_scope(*pid, pids))
        .map(|(dur, _)| dur)
        .collect::<Vec<_>>();

    if durations.is_empty() {
        return Ok(DEFAULT_FRAME_PERIOD_NS);
    }

    durations.sort_unstable();
    Ok(durations[durations.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TraceDbBuilder;
    use pretty_assertions::assert_eq;

    fn trace_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("trace.db");
        TraceDbBuilder::new()
            .process(1, 100, "com.example.shop")
            .process(2, 200, "render_service")
            .thread(1, 100, "com.example.shop", 1)
            .thread(2, 201, "RSMainThread", 2)
            .expected_frame(1_000, 8_333_333, 1)
            .expected_frame(2_000, 8_333_333, 1)
            .expected_frame(3_000, 8_400_000, 1)
            .expected_frame(1_000, 16_666_667, 2)
            .actual_frame(1_000, 8_000_000, 0, 1, 1)
            .actual_frame(3_000, 30_000_000, 1, 1, 1)
            .actual_frame(2_000, 4_000_000, 2, 1, 1)
            .actual_frame(5_000, 16_000_000, 0, 2, 2)
            .write(&path)
            .unwrap();
        path
    }

    #[test]
    fn frames_are_filtered_by_pid_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace_db(dir.path());

        let frames = load_frames(&path, &[100]).unwrap().unwrap();

        let starts: Vec<_> = frames.iter().map(|f| f.ts).collect();
        assert_eq!(vec![1_000, 2_000, 3_000], starts);
        assert!(frames[1].is_empty());
        assert!(frames[2].is_jank());
        assert_eq!(Some("com.example.shop".to_string()), frames[0].thread_name);
        assert_eq!(Some(100), frames[0].tid);
    }

    #[test]
    fn all_processes_without_pids() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace_db(dir.path());

        assert_eq!(4, load_frames(&path, &[]).unwrap().unwrap().len());
    }

    #[test]
    fn period_is_median_of_expected_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace_db(dir.path());

        assert_eq!(8_333_333, frame_period_ns(&path, &[100]).unwrap());
        assert_eq!(16_666_667, frame_period_ns(&path, &[200]).unwrap());
        assert_eq!(DEFAULT_FRAME_PERIOD_NS, frame_period_ns(&path, &[999]).unwrap());
    }

    #[test]
    fn missing_database_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");

        assert!(load_frames(&path, &[]).unwrap().is_none());
        assert_eq!(DEFAULT_FRAME_PERIOD_NS, frame_period_ns(&path, &[]).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn missing_frame_table_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE process (id INTEGER, pid INTEGER, name TEXT);")
            .unwrap();

        assert!(load_frames(&path, &[]).unwrap().is_none());
    }
}
