//! Per-file decode pipeline.
//!
//! [`decode_file`] composes header codec → frame extractor → calibration
//! applier → time-range filter for one raw file, producing a [`FileOutcome`].
//! It is a pure function of its inputs — no shared mutable state — which is
//! what makes it safe to run as the unit of work inside the parallel
//! orchestrator.
//!
//! Failure containment ("bulkhead isolation"):
//! - a file that cannot be read or whose header does not decode produces one
//!   file-level [`DecodeFailure`] and zero frames;
//! - a corrupt or calibration-rejected frame produces one frame-level
//!   failure, and the rest of the file still decodes;
//! - nothing here ever aborts a sibling file.
//!
//! Per file the pipeline progresses strictly forward:
//! `Pending → HeaderDecoded → FrameExtracting → Done`, or terminally
//! `HeaderFailed`; individual frames end as kept, dropped-by-filter, or
//! failed (corrupt/calibration).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::read::GzDecoder;
use log::{debug, warn};
use serde::Serialize;

use crate::calibration::CalibrationData;
use crate::extract::{Frame, FrameExtractor};
use crate::formats::{FormatSpec, FrameCountRule};
use crate::header::{decode_header, FrameHeader, HeaderError};
use crate::timefilter::TimeRange;

/// Pipeline stage at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    /// The file could not be opened or read.
    Read,
    /// The header did not decode or failed validation.
    Header,
    /// One frame was corrupt or truncated; the payload is the frame index.
    Frame(usize),
    /// Calibration could not be applied to one frame.
    Calibration(usize),
}

/// One recorded failure: an unreadable file, or a skipped frame within an
/// otherwise-readable file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeFailure {
    /// Position of the file in the batch input order.
    pub file_index: usize,
    /// Path of the file the failure belongs to.
    pub path: PathBuf,
    /// Stage at which the failure occurred.
    pub stage: FailureStage,
    /// Human-readable reason.
    pub reason: String,
}

impl std::fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:?}]: {}",
            self.path.display(),
            self.stage,
            self.reason
        )
    }
}

/// Per-file knobs threaded down from the batch configuration.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Apply calibration when calibration data is supplied.
    pub apply_calibration: bool,
    /// Stop after the first kept frame (thumbnail reads).
    pub first_frame_only: bool,
    /// Allowed disagreement between declared and actual frame count before
    /// the file is rejected at the header stage.
    pub frame_count_slack: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            apply_calibration: false,
            first_frame_only: false,
            frame_count_slack: 1,
        }
    }
}

/// Result of decoding one file. Exactly one of these exists per input file
/// that was attempted, whatever happened to the file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Position of the file in the batch input order.
    pub index: usize,
    /// Path the file was read from.
    pub path: PathBuf,
    /// Decoded header; `None` when the read or header stage failed.
    pub header: Option<FrameHeader>,
    /// Kept frames, in file-native order.
    pub frames: Vec<Frame>,
    /// Failures recorded for this file (file-level or frame-level).
    pub failures: Vec<DecodeFailure>,
    /// Frames dropped by the time-range filter (not failures).
    pub frames_filtered: usize,
}

impl FileOutcome {
    /// True when the header decoded and no frame was lost.
    pub fn fully_decoded(&self) -> bool {
        self.header.is_some() && self.failures.is_empty()
    }

    fn failed(index: usize, path: &Path, stage: FailureStage, reason: String) -> Self {
        FileOutcome {
            index,
            path: path.to_path_buf(),
            header: None,
            frames: Vec::new(),
            failures: vec![DecodeFailure {
                file_index: index,
                path: path.to_path_buf(),
                stage,
                reason,
            }],
            frames_filtered: 0,
        }
    }
}

/// Read a raw file into memory, transparently decompressing `.gz` inputs.
fn read_raw(path: &Path) -> std::io::Result<Vec<u8>> {
    let is_gzip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gzip {
        let mut bytes = Vec::new();
        GzDecoder::new(File::open(path)?).read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        std::fs::read(path)
    }
}

/// Decode one raw file.
///
/// Never panics and never returns early with an unrecorded problem: every
/// failure ends up in the returned outcome. This is the unit of work the
/// parallel orchestrator fans out.
pub fn decode_file(
    file_index: usize,
    path: &Path,
    spec: &'static FormatSpec,
    calibration: Option<&CalibrationData>,
    window: TimeRange,
    options: &DecodeOptions,
) -> FileOutcome {
    let bytes = match read_raw(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to read '{}': {}", path.display(), err);
            return FileOutcome::failed(file_index, path, FailureStage::Read, err.to_string());
        }
    };

    let (header, consumed) = match decode_header(spec, &bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("failed to decode header of '{}': {}", path.display(), err);
            return FileOutcome::failed(file_index, path, FailureStage::Header, err.to_string());
        }
    };

    let payload = Bytes::from(bytes).slice(consumed..);
    let extractor = FrameExtractor::new(spec, &header, payload, file_index);

    // Declared counts must agree with the payload to within the slack; a
    // larger disagreement means the header itself cannot be trusted.
    if spec.frame_count_rule == FrameCountRule::Declared {
        let declared = header.declared_frame_count as usize;
        let actual = extractor.full_chunks();
        if declared.abs_diff(actual) > options.frame_count_slack {
            let err = HeaderError::FrameCountMismatch {
                declared,
                actual,
                slack: options.frame_count_slack,
            };
            warn!("rejecting '{}': {}", path.display(), err);
            return FileOutcome::failed(file_index, path, FailureStage::Header, err.to_string());
        }
    }

    // Whole file outside the window: header is kept, no frames, no failure.
    if window.excludes_file(&header, extractor.expected_frames()) {
        debug!(
            "'{}' entirely outside requested time range, skipping payload",
            path.display()
        );
        return FileOutcome {
            index: file_index,
            path: path.to_path_buf(),
            header: Some(header),
            frames: Vec::new(),
            failures: Vec::new(),
            frames_filtered: 0,
        };
    }

    let mut frames = Vec::new();
    let mut failures = Vec::new();
    let mut frames_filtered = 0usize;

    for result in extractor {
        let frame = match result {
            Ok(frame) => frame,
            Err(err) => {
                warn!("'{}': {}", path.display(), err);
                failures.push(DecodeFailure {
                    file_index,
                    path: path.to_path_buf(),
                    stage: FailureStage::Frame(err.frame_index()),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if !window.contains(frame.timestamp) {
            frames_filtered += 1;
            continue;
        }

        match (options.apply_calibration, calibration) {
            (true, Some(cal)) => match cal.apply(&frame, &header) {
                Ok(corrected) => frames.push(corrected),
                Err(err) => {
                    warn!("'{}': {}", path.display(), err);
                    failures.push(DecodeFailure {
                        file_index,
                        path: path.to_path_buf(),
                        stage: FailureStage::Calibration(frame.index),
                        reason: err.to_string(),
                    });
                }
            },
            _ => frames.push(frame),
        }

        if options.first_frame_only && !frames.is_empty() {
            break;
        }
    }

    debug!(
        "decoded '{}': {} frames kept, {} skipped, {} filtered",
        path.display(),
        frames.len(),
        failures.len(),
        frames_filtered
    );

    FileOutcome {
        index: file_index,
        path: path.to_path_buf(),
        header: Some(header),
        frames,
        failures,
        frames_filtered,
    }
}
