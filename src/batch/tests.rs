use std::path::PathBuf;

use chrono::{TimeZone, Utc};

use super::aggregate::assemble;
use super::*;
use crate::extract::{Frame, PixelData};
use crate::header::FrameHeader;
use crate::pipeline::{DecodeFailure, FailureStage, FileOutcome};

fn header(device: &str) -> FrameHeader {
    FrameHeader {
        format: InstrumentFormat::ThemisAsi,
        site_uid: "gill".to_string(),
        device_uid: device.to_string(),
        start_time: Utc.with_ymd_and_hms(2021, 11, 4, 6, 0, 0).unwrap(),
        width: 2,
        height: 2,
        declared_frame_count: 2,
        exposure_us: 2_950_000,
        cadence_ms: 3_000,
        wavelength_start_nm: None,
        wavelength_step_nm: None,
        observing_frequency_mhz: None,
    }
}

fn frame(file_index: usize, index: usize) -> Frame {
    Frame {
        file_index,
        index,
        timestamp: Utc.with_ymd_and_hms(2021, 11, 4, 6, 0, 3 * index as u32).unwrap(),
        width: 2,
        height: 2,
        channels: 1,
        pixels: PixelData::U16(vec![0; 4]),
    }
}

fn good_outcome(index: usize, frames: usize) -> FileOutcome {
    FileOutcome {
        index,
        path: PathBuf::from(format!("file_{index}.raw")),
        header: Some(header("t05")),
        frames: (0..frames).map(|i| frame(index, i)).collect(),
        failures: Vec::new(),
        frames_filtered: 0,
    }
}

fn failed_outcome(index: usize) -> FileOutcome {
    FileOutcome {
        index,
        path: PathBuf::from(format!("file_{index}.raw")),
        header: None,
        frames: Vec::new(),
        failures: vec![DecodeFailure {
            file_index: index,
            path: PathBuf::from(format!("file_{index}.raw")),
            stage: FailureStage::Header,
            reason: "bad magic".to_string(),
        }],
        frames_filtered: 0,
    }
}

#[test]
fn unknown_tag_is_unsupported_format() {
    let err = BatchDecoder::from_tag("smile_asi_raw").unwrap_err();
    assert!(matches!(err, BatchError::UnsupportedFormat { tag } if tag == "smile_asi_raw"));
}

#[test]
fn known_tag_resolves() {
    let decoder = BatchDecoder::from_tag("rego_asi_raw").unwrap();
    assert_eq!(decoder.format(), InstrumentFormat::RegoAsi);
}

#[test]
fn worker_count_above_cap_is_rejected_before_io() {
    let config = BatchConfig {
        worker_count: MAX_WORKER_COUNT + 1,
        ..BatchConfig::default()
    };
    let decoder = BatchDecoder::with_config(InstrumentFormat::ThemisAsi, config);
    let err = decoder
        .decode(&["nonexistent.raw"], None)
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidWorkerCount { .. }));
}

#[test]
fn calibration_on_riometer_is_rejected() {
    let config = BatchConfig {
        apply_calibration: true,
        ..BatchConfig::default()
    };
    let decoder = BatchDecoder::with_config(InstrumentFormat::NorstarRiometer, config);
    let err = decoder.decode::<PathBuf>(&[], None).unwrap_err();
    assert!(matches!(
        err,
        BatchError::CalibrationUnsupported { tag: "norstar_rio_k2" }
    ));
}

#[test]
fn calibration_flag_without_data_is_rejected() {
    let config = BatchConfig {
        apply_calibration: true,
        ..BatchConfig::default()
    };
    let decoder = BatchDecoder::with_config(InstrumentFormat::ThemisAsi, config);
    let err = decoder.decode::<PathBuf>(&[], None).unwrap_err();
    assert!(matches!(err, BatchError::CalibrationMissing));
}

#[test]
fn empty_batch_is_complete() {
    let decoder = BatchDecoder::new(InstrumentFormat::ThemisAsi);
    let batch = decoder.decode::<PathBuf>(&[], None).unwrap();
    assert_eq!(batch.status(), BatchStatus::Complete);
    assert!(batch.headers.is_empty());
    assert!(batch.frames.is_empty());
}

#[test]
fn assemble_preserves_input_order() {
    let slots = vec![
        Some(good_outcome(0, 2)),
        Some(failed_outcome(1)),
        Some(good_outcome(2, 1)),
    ];
    let batch = assemble(slots, true);

    assert_eq!(batch.headers.len(), 3);
    assert!(batch.headers[0].is_some());
    assert!(batch.headers[1].is_none());
    assert!(batch.headers[2].is_some());

    let file_order: Vec<usize> = batch.frames.iter().map(|f| f.file_index).collect();
    assert_eq!(file_order, vec![0, 0, 2]);
}

#[test]
fn assemble_summary_counts() {
    let mut partial = good_outcome(1, 3);
    partial.failures.push(DecodeFailure {
        file_index: 1,
        path: partial.path.clone(),
        stage: FailureStage::Frame(3),
        reason: "truncated".to_string(),
    });
    partial.frames_filtered = 2;

    let slots = vec![
        Some(good_outcome(0, 2)),
        Some(partial),
        Some(failed_outcome(2)),
    ];
    let batch = assemble(slots, true);

    assert_eq!(batch.summary.files_attempted, 3);
    assert_eq!(batch.summary.files_fully_decoded, 1);
    assert_eq!(batch.summary.files_partial, 1);
    assert_eq!(batch.summary.files_failed, 1);
    assert_eq!(batch.summary.frames_decoded, 5);
    assert_eq!(batch.summary.frames_skipped, 1);
    assert_eq!(batch.summary.frames_filtered, 2);
    // header failure is in the report but is not a skipped frame
    assert_eq!(batch.failures.len(), 2);
}

#[test]
fn assemble_without_metadata_keeps_headers_empty() {
    let batch = assemble(vec![Some(good_outcome(0, 1))], false);
    assert!(batch.headers.is_empty());
    assert_eq!(batch.frames.len(), 1);
}

#[test]
fn unstarted_slot_marks_batch_truncated() {
    let batch = assemble(vec![Some(good_outcome(0, 1)), None], true);
    assert!(batch.truncated);
    assert_eq!(batch.summary.files_attempted, 1);
    assert_eq!(batch.headers.len(), 1);
    assert!(!batch.is_fully_successful());
    assert_eq!(batch.status(), BatchStatus::Partial);
}

#[test]
fn status_classification() {
    let complete = assemble(vec![Some(good_outcome(0, 1))], true);
    assert_eq!(complete.status(), BatchStatus::Complete);
    assert!(complete.is_fully_successful());

    let partial = assemble(vec![Some(good_outcome(0, 1)), Some(failed_outcome(1))], true);
    assert_eq!(partial.status(), BatchStatus::Partial);

    let failed = assemble(vec![Some(failed_outcome(0))], true);
    assert_eq!(failed.status(), BatchStatus::Failed);
}

#[test]
fn timestamps_parallel_the_frames() {
    let batch = assemble(vec![Some(good_outcome(0, 3))], true);
    let stamps = batch.timestamps();
    assert_eq!(stamps.len(), 3);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn problem_report_serializes_failures_and_summary() {
    let batch = assemble(vec![Some(good_outcome(0, 1)), Some(failed_outcome(1))], true);
    let report = batch.problem_report();

    assert_eq!(report["truncated"], serde_json::json!(false));
    assert_eq!(report["summary"]["files_attempted"], serde_json::json!(2));
    assert_eq!(report["failures"][0]["stage"], serde_json::json!("Header"));
    assert_eq!(report["failures"][0]["reason"], serde_json::json!("bad magic"));
}

#[test]
fn cancel_token_is_sticky_and_shared() {
    let token = CancelToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    token.cancel();
    assert!(clone.is_cancelled());
    token.cancel();
    assert!(token.is_cancelled());
}
