use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::analyze::duration_stats;
use crate::analyzer::Analyzer;
use crate::model::{StandardTimingsStats, StepInput};
use crate::trace::{frame_period_ns, load_frames, Frame};

const TOP_FRAMES: usize = 10;
const NS_PER_MS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JankFrame {
    pub ts: i64,
    pub duration_ms: f64,
    pub dropped_frames: i64,
    pub process: Option<String>,
    pub thread: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameDropSummary {
    pub total_frames: usize,
    pub jank_frames: usize,
    pub dropped_frames: i64,
    pub max_dropped_in_frame: i64,
    /// Share of frames that were janky, between 0 and 1
    pub jank_rate: f64,
    pub frame_period_ms: f64,
    pub frame_duration_stats: Option<StandardTimingsStats>,
    /// The longest jank frames, longest first
    pub top_jank_frames: Vec<JankFrame>,
}

/// Counts frames that missed their vsync deadline and how many vsync periods each one cost.
#[derive(Debug, Default)]
pub struct FrameDropAnalyzer;

/// Vsync periods lost to one janky frame. A frame that overran at all lost at least one.
pub fn dropped_frames(duration_ns: i64, period_ns: i64) -> i64 {
    if period_ns <= 0 {
        return 1;
    }
    let periods = (duration_ns + period_ns - 1) / period_ns;
    (periods - 1).max(1)
}

pub fn summarize_frame_drops(frames: &[Frame], period_ns: i64) -> anyhow::Result<FrameDropSummary> {
    let jank = frames.iter().filter(|f| f.is_jank()).collect::<Vec<_>>();
    let dropped = jank
        .iter()
        .map(|f| dropped_frames(f.dur, period_ns))
        .collect::<Vec<_>>();

    let durations_ms = frames
        .iter()
        .map(|f| f.dur as f64 / NS_PER_MS)
        .collect::<Vec<_>>();

    let top_jank_frames = jank
        .iter()
        .sorted_by(|a, b| b.dur.cmp(&a.dur).then(a.ts.cmp(&b.ts)))
        .take(TOP_FRAMES)
        .map(|f| JankFrame {
            ts: f.ts,
            duration_ms: f.dur as f64 / NS_PER_MS,
            dropped_frames: dropped_frames(f.dur, period_ns),
            process: f.process_name.clone(),
            thread: f.thread_name.clone(),
        })
        .collect();

    Ok(FrameDropSummary {
        total_frames: frames.len(),
        jank_frames: jank.len(),
        dropped_frames: dropped.iter().sum(),
        max_dropped_in_frame: dropped.iter().copied().max().unwrap_or_default(),
        jank_rate: if frames.is_empty() {
            0.0
        } else {
            jank.len() as f64 / frames.len() as f64
        },
        frame_period_ms: period_ns as f64 / NS_PER_MS,
        frame_duration_stats: duration_stats(&durations_ms)?,
        top_jank_frames,
    })
}

impl Analyzer for FrameDropAnalyzer {
    fn name(&self) -> &'static str {
        "frame_drop"
    }

    fn analyze(&self, input: &StepInput) -> anyhow::Result<Option<serde_json::Value>> {
        let trace_db = input.artifacts.trace_db();
        let Some(frames) = load_frames(&trace_db, &input.pids)? else {
            return Ok(None);
        };
        let period_ns = frame_period_ns(&trace_db, &input.pids)?;

        let summary = summarize_frame_drops(&frames, period_ns)?;
        log::debug!(
            "Step {} [{}]: {} of {} frames janky",
            input.index,
            input.name,
            summary.jank_frames,
            summary.total_frames
        );
        Ok(Some(serde_json::to_value(summary)?))
    }
}
