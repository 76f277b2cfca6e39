use serde::Serialize;

use crate::alignment::highlight::HighlightCursor;
use crate::config::ReadAlongConfig;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub schema_version: u32,
    pub meta: ReplayMeta,
    pub samples: Vec<ReplaySample>,
    pub aggregates: ReplayAggregates,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayMeta {
    pub generated_at: String,
    pub token_count: usize,
    pub word_count: usize,
    pub timed_word_count: usize,
    pub duration_s: f64,
    pub step_ms: u64,
    pub config: ReadAlongConfig,
}

/// Cursor snapshot after one simulated tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplaySample {
    pub time_s: f64,
    pub highlighted: usize,
    pub last_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayAggregates {
    /// Highlighted share of the document at the last sample, before the end handler.
    pub coverage_before_end: f64,
    /// Highlighted share after the end handler ran.
    pub coverage: f64,
    pub monotonic: bool,
    /// Longest playback stretch with no new highlight while words remained.
    pub max_stall_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_s: Option<f64>,
}

/// Collects cursor snapshots during a replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayRecorder {
    samples: Vec<ReplaySample>,
}

impl ReplayRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, time_s: f64, cursor: &HighlightCursor) {
        self.samples.push(ReplaySample {
            time_s,
            highlighted: cursor.highlighted_count(),
            last_index: cursor.last_highlighted_index(),
        });
    }

    pub fn samples(&self) -> &[ReplaySample] {
        &self.samples
    }

    /// `final_cursor` is the cursor after the end handler.
    pub fn finish(self, meta: ReplayMeta, final_cursor: &HighlightCursor) -> ReplayReport {
        let aggregates = aggregate_samples(
            &self.samples,
            meta.token_count,
            final_cursor.highlighted_count(),
        );
        ReplayReport {
            schema_version: REPORT_SCHEMA_VERSION,
            meta,
            samples: self.samples,
            aggregates,
        }
    }
}

pub fn aggregate_samples(
    samples: &[ReplaySample],
    token_count: usize,
    final_highlighted: usize,
) -> ReplayAggregates {
    let share = |count: usize| {
        if token_count == 0 {
            1.0
        } else {
            count as f64 / token_count as f64
        }
    };

    let monotonic = samples.windows(2).all(|pair| {
        pair[1].highlighted >= pair[0].highlighted && pair[1].last_index >= pair[0].last_index
    });

    // A stall runs from the last sample that made progress.
    let mut max_stall_s: f64 = 0.0;
    let mut last_progress_s = samples.first().map_or(0.0, |s| s.time_s);
    let mut previous = 0;
    for sample in samples {
        if sample.highlighted > previous || sample.highlighted >= token_count {
            last_progress_s = sample.time_s;
        } else {
            max_stall_s = max_stall_s.max(sample.time_s - last_progress_s);
        }
        previous = sample.highlighted;
    }

    let completed_at_s = samples
        .iter()
        .find(|s| token_count > 0 && s.highlighted >= token_count)
        .map(|s| s.time_s);

    ReplayAggregates {
        coverage_before_end: share(samples.last().map_or(0, |s| s.highlighted)),
        coverage: share(final_highlighted),
        monotonic,
        max_stall_s,
        completed_at_s,
    }
}
