use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::analyzer::Analyzer;
use crate::model::StepInput;
use crate::perf::{load_samples, total_load, window, PerfSample};
use crate::trace::{load_frames, Frame};

const TOP_FRAMES: usize = 10;
const NS_PER_MS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmptyFrame {
    pub ts: i64,
    pub duration_ms: f64,
    /// CPU events sampled while the frame was being produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<i64>,
    pub process: Option<String>,
    pub thread: Option<String>,
}

/// Frames that were produced but drew nothing, and the CPU spent on them.
///
/// The load fields are left out when there is no perf database for the step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmptyFrameSummary {
    pub total_frames: usize,
    pub empty_frames: usize,
    /// Share of frames that were empty, between 0 and 1
    pub empty_frame_ratio: f64,
    pub empty_frame_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_load: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_frame_load: Option<i64>,
    /// Percentage of the sampled load spent on empty frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_frame_load_pct: Option<f64>,
    /// The most expensive empty frames first, by load when known, otherwise by duration
    pub top_empty_frames: Vec<EmptyFrame>,
}

#[derive(Debug, Default)]
pub struct EmptyFrameAnalyzer;

/// Whether a sample was taken on the thread that produced the frame. Frames without a known
/// thread fall back to their process.
fn on_frame_thread(frame: &Frame, sample: &PerfSample) -> bool {
    match (frame.tid, frame.pid) {
        (Some(tid), _) => sample.tid == tid,
        (None, Some(pid)) => sample.pid == Some(pid),
        (None, None) => true,
    }
}

/// Samples are attributed to the empty frames whose thread and window they fall in. A sample
/// inside several overlapping empty frames adds to each frame's load but only once to
/// `empty_frame_load`, which therefore never exceeds `total_load`.
pub fn summarize_empty_frames(frames: &[Frame], samples: Option<&[PerfSample]>) -> EmptyFrameSummary {
    let mut attributed = vec![false; samples.map_or(0, <[PerfSample]>::len)];

    let empty = frames
        .iter()
        .filter(|f| f.is_empty())
        .map(|f| {
            let load = samples.map(|samples| {
                let range = window(samples, f.ts, f.end());
                let start = range.start;
                samples[range]
                    .iter()
                    .enumerate()
                    .filter(|(_, sample)| on_frame_thread(f, sample))
                    .map(|(offset, sample)| {
                        attributed[start + offset] = true;
                        sample.event_count
                    })
                    .sum::<i64>()
            });

            EmptyFrame {
                ts: f.ts,
                duration_ms: f.dur as f64 / NS_PER_MS,
                load,
                process: f.process_name.clone(),
                thread: f.thread_name.clone(),
            }
        })
        .collect::<Vec<_>>();

    let total_load = samples.map(total_load);
    let empty_frame_load = samples.map(|samples| {
        samples
            .iter()
            .zip(&attributed)
            .filter(|(_, attributed)| **attributed)
            .map(|(sample, _)| sample.event_count)
            .sum::<i64>()
    });
    let empty_frame_load_pct = match (empty_frame_load, total_load) {
        (Some(_), Some(0)) => Some(0.0),
        (Some(empty), Some(total)) => Some(empty as f64 / total as f64 * 100.0),
        _ => None,
    };

    EmptyFrameSummary {
        total_frames: frames.len(),
        empty_frames: empty.len(),
        empty_frame_ratio: if frames.is_empty() {
            0.0
        } else {
            empty.len() as f64 / frames.len() as f64
        },
        empty_frame_duration_ms: empty.iter().map(|f| f.duration_ms).sum(),
        total_load,
        empty_frame_load,
        empty_frame_load_pct,
        top_empty_frames: empty
            .iter()
            .sorted_by(|a, b| {
                b.load
                    .cmp(&a.load)
                    .then(b.duration_ms.total_cmp(&a.duration_ms))
                    .then(a.ts.cmp(&b.ts))
            })
            .take(TOP_FRAMES)
            .cloned()
            .collect(),
    }
}

impl Analyzer for EmptyFrameAnalyzer {
    fn name(&self) -> &'static str {
        "empty_frame"
    }

    fn analyze(&self, input: &StepInput) -> anyhow::Result<Option<serde_json::Value>> {
        let Some(frames) = load_frames(&input.artifacts.trace_db(), &input.pids)? else {
            return Ok(None);
        };
        let samples = load_samples(&input.artifacts.perf_db(), &input.pids)?;

        let summary = summarize_empty_frames(&frames, samples.as_deref());
        Ok(Some(serde_json::to_value(summary)?))
    }
}
