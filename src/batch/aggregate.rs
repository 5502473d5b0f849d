//! Input-order aggregation of per-file results.
//!
//! Workers finish in arbitrary order; results arrive index-tagged and are
//! written into a slot vector, so the merge below is a plain in-order walk.
//! Ordering in the final [`DecodedBatch`] is therefore input order by
//! construction, never by scheduling accident.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::Frame;
use crate::header::FrameHeader;
use crate::pipeline::{DecodeFailure, FileOutcome};

/// Caller-facing success indicator, derived from the summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    /// Every attempted file decoded fully and the batch ran to completion.
    Complete,
    /// Some data decoded, but there were failures or the batch was cancelled.
    Partial,
    /// Nothing usable was decoded.
    Failed,
}

/// Counts for caller-visible reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Files the orchestrator actually started on.
    pub files_attempted: usize,
    /// Files whose every frame decoded (after filtering).
    pub files_fully_decoded: usize,
    /// Files that decoded with one or more skipped frames.
    pub files_partial: usize,
    /// Files that failed at the read or header stage.
    pub files_failed: usize,
    /// Frames materialized into the batch.
    pub frames_decoded: usize,
    /// Frames skipped over corruption or calibration mismatch.
    pub frames_skipped: usize,
    /// Frames dropped by the time-range filter (not failures).
    pub frames_filtered: usize,
}

/// The aggregate result of one batch decode. Immutable once produced.
#[derive(Debug, Clone)]
pub struct DecodedBatch {
    /// One entry per attempted input file, in input order; `None` marks a
    /// file that failed before its header decoded. Empty when the batch was
    /// run with `include_metadata` off.
    pub headers: Vec<Option<FrameHeader>>,
    /// All kept frames: concatenated file-by-file in input order, file-native
    /// order within each file.
    pub frames: Vec<Frame>,
    /// Complete ordered problem report (file-level and frame-level).
    pub failures: Vec<DecodeFailure>,
    /// Summary counts.
    pub summary: BatchSummary,
    /// True when the batch was cancelled before every file was dispatched.
    pub truncated: bool,
}

impl DecodedBatch {
    /// True when nothing at all went wrong.
    pub fn is_fully_successful(&self) -> bool {
        self.failures.is_empty() && !self.truncated
    }

    /// Success indicator for callers that only want to know whether to warn.
    pub fn status(&self) -> BatchStatus {
        if self.is_fully_successful() {
            BatchStatus::Complete
        } else if !self.failures.is_empty()
            && self.summary.files_fully_decoded == 0
            && self.summary.files_partial == 0
        {
            BatchStatus::Failed
        } else {
            // some data decoded, or a cancellation with nothing actually wrong
            BatchStatus::Partial
        }
    }

    /// Timestamp sequence parallel to [`DecodedBatch::frames`].
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.frames.iter().map(|frame| frame.timestamp).collect()
    }

    /// Machine-readable problem report (summary, failures, truncation flag)
    /// for callers that log or archive decode quality alongside the data.
    pub fn problem_report(&self) -> serde_json::Value {
        serde_json::json!({
            "summary": self.summary,
            "failures": self.failures,
            "truncated": self.truncated,
        })
    }
}

/// Merge index-tagged slots into the final batch.
///
/// A `None` slot is a file that was never started because the batch was
/// cancelled; it is not counted as attempted and gets no failure record.
pub(crate) fn assemble(slots: Vec<Option<FileOutcome>>, include_metadata: bool) -> DecodedBatch {
    let truncated = slots.iter().any(|slot| slot.is_none());

    let mut headers = Vec::new();
    let mut frames = Vec::new();
    let mut failures = Vec::new();
    let mut summary = BatchSummary::default();

    for outcome in slots.into_iter().flatten() {
        summary.files_attempted += 1;
        match (&outcome.header, outcome.failures.is_empty()) {
            (None, _) => summary.files_failed += 1,
            (Some(_), false) => summary.files_partial += 1,
            (Some(_), true) => summary.files_fully_decoded += 1,
        }
        summary.frames_decoded += outcome.frames.len();
        summary.frames_filtered += outcome.frames_filtered;
        summary.frames_skipped += outcome
            .failures
            .iter()
            .filter(|failure| {
                matches!(
                    failure.stage,
                    crate::pipeline::FailureStage::Frame(_)
                        | crate::pipeline::FailureStage::Calibration(_)
                )
            })
            .count();

        if include_metadata {
            headers.push(outcome.header);
        }
        frames.extend(outcome.frames);
        failures.extend(outcome.failures);
    }

    DecodedBatch {
        headers,
        frames,
        failures,
        summary,
        truncated,
    }
}
