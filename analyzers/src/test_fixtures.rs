//! Builders for the trace and perf databases that `trace_streamer` produces, with just the
//! tables and columns the analyzers read.

use std::path::Path;

use rusqlite::{params, Connection};

#[derive(Debug, Default)]
pub struct TraceDbBuilder {
    processes: Vec<(i64, u32, String)>,
    threads: Vec<(i64, i64, String, i64)>,
    // ts, dur, type, flag, ipid, itid
    frames: Vec<(i64, i64, i64, Option<i64>, i64, Option<i64>)>,
}

impl TraceDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(mut self, id: i64, pid: u32, name: &str) -> Self {
        self.processes.push((id, pid, name.to_string()));
        self
    }

    pub fn thread(mut self, id: i64, tid: i64, name: &str, ipid: i64) -> Self {
        self.threads.push((id, tid, name.to_string(), ipid));
        self
    }

    pub fn actual_frame(mut self, ts: i64, dur: i64, flag: i64, ipid: i64, itid: i64) -> Self {
        self.frames.push((ts, dur, 0, Some(flag), ipid, Some(itid)));
        self
    }

    pub fn expected_frame(mut self, ts: i64, dur: i64, ipid: i64) -> Self {
        self.frames.push((ts, dur, 1, None, ipid, None));
        self
    }

    pub fn write(&self, path: &Path) -> rusqlite::Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE process (id INTEGER PRIMARY KEY, pid INTEGER, name TEXT);
             CREATE TABLE thread (id INTEGER PRIMARY KEY, tid INTEGER, name TEXT, ipid INTEGER);
             CREATE TABLE frame_slice (
                 id INTEGER PRIMARY KEY,
                 ts INTEGER,
                 vsync INTEGER,
                 ipid INTEGER,
                 itid INTEGER,
                 dur INTEGER,
                 type INTEGER,
                 flag INTEGER
             );",
        )?;

        for (id, pid, name) in &self.processes {
            conn.execute(
                "INSERT INTO process (id, pid, name) VALUES (?1, ?2, ?3)",
                params![id, pid, name],
            )?;
        }
        for (id, tid, name, ipid) in &self.threads {
            conn.execute(
                "INSERT INTO thread (id, tid, name, ipid) VALUES (?1, ?2, ?3, ?4)",
                params![id, tid, name, ipid],
            )?;
        }
        for (vsync, (ts, dur, kind, flag, ipid, itid)) in self.frames.iter().enumerate() {
            conn.execute(
                "INSERT INTO frame_slice (ts, vsync, ipid, itid, dur, type, flag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![ts, vsync as i64, ipid, itid, dur, kind, flag],
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PerfDbBuilder {
    threads: Vec<(i64, u32, String)>,
    samples: Vec<(i64, i64, i64)>,
}

impl PerfDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread(mut self, thread_id: i64, process_id: u32, name: &str) -> Self {
        self.threads.push((thread_id, process_id, name.to_string()));
        self
    }

    pub fn sample(mut self, timestamp_trace: i64, event_count: i64, thread_id: i64) -> Self {
        self.samples.push((timestamp_trace, event_count, thread_id));
        self
    }

    pub fn write(&self, path: &Path) -> rusqlite::Result<()> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE perf_thread (id INTEGER PRIMARY KEY, thread_id INTEGER, process_id INTEGER, thread_name TEXT);
             CREATE TABLE perf_sample (
                 id INTEGER PRIMARY KEY,
                 callchain_id INTEGER,
                 timestamp INTEGER,
                 thread_id INTEGER,
                 event_count INTEGER,
                 event_type_id INTEGER,
                 timestamp_trace INTEGER,
                 cpu_id INTEGER,
                 thread_state TEXT
             );",
        )?;

        for (thread_id, process_id, name) in &self.threads {
            conn.execute(
                "INSERT INTO perf_thread (thread_id, process_id, thread_name) VALUES (?1, ?2, ?3)",
                params![thread_id, process_id, name],
            )?;
        }
        for (timestamp_trace, event_count, thread_id) in &self.samples {
            conn.execute(
                "INSERT INTO perf_sample (timestamp, timestamp_trace, thread_id, event_count)
                 VALUES (?1, ?1, ?2, ?3)",
                params![timestamp_trace, thread_id, event_count],
            )?;
        }
        Ok(())
    }
}

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
pub fn write_stub_tool(dir: &Path, name: &str, body: &str) -> std::io::Result<std::path::PathBuf> {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    let mut permissions = std::fs::metadata(&path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions)?;
    Ok(path)
}
