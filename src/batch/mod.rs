//! Batch orchestration.
//!
//! [`BatchDecoder`] is the crate's entry point: configure it once per batch,
//! hand it an ordered list of file paths, and get back one [`DecodedBatch`].
//! Each file runs through the pure per-file pipeline
//! ([`crate::pipeline::decode_file`]) as an independent unit of work; a
//! bounded worker pool provides the parallelism and a crossbeam channel
//! carries index-tagged results back to the orchestrating thread.
//!
//! Parallelism is a performance knob, never a behavior knob: any
//! `worker_count` produces byte-identical output, because results are merged
//! by input index, not completion order. One file's failure never disturbs
//! its siblings.
//!
//! ```rust,no_run
//! use skyraw::batch::{BatchConfig, BatchDecoder};
//! use skyraw::formats::InstrumentFormat;
//!
//! let decoder = BatchDecoder::new(InstrumentFormat::ThemisAsi);
//! let files = vec!["20211104_0600_gill_themis05_full.raw".into()];
//! let batch = decoder.decode::<std::path::PathBuf>(&files, None)?;
//! println!("{} frames, {} problems", batch.frames.len(), batch.failures.len());
//! # Ok::<(), skyraw::batch::BatchError>(())
//! ```

mod aggregate;
mod error;
#[cfg(test)]
mod tests;

pub use aggregate::{BatchStatus, BatchSummary, DecodedBatch};
pub use error::BatchError;

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::calibration::CalibrationData;
use crate::formats::{FormatSpec, InstrumentFormat};
use crate::pipeline::{decode_file, DecodeOptions, FileOutcome};
use crate::timefilter::TimeRange;

/// Hard cap on the configurable worker count.
pub const MAX_WORKER_COUNT: usize = 256;

/// Progress callback, invoked on the orchestrating thread with
/// `(file_index, file_count)` as each file completes.
pub type ProgressHook = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Cooperative cancellation handle for a running batch.
///
/// Cancelling stops new files from being dispatched; files already being
/// decoded run to completion and their results are kept. The resulting
/// batch is marked [`DecodedBatch::truncated`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Batch-level configuration, threaded explicitly through the orchestrator
/// and pipeline (no ambient flags).
#[derive(Clone)]
pub struct BatchConfig {
    /// Worker count: `0` = one worker per available core, `1` = strict
    /// serial in-thread execution, `N` = pool of N workers.
    pub worker_count: usize,
    /// Inclusive lower timestamp bound.
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive upper timestamp bound.
    pub end_time: Option<DateTime<Utc>>,
    /// Apply the supplied calibration to every kept frame.
    pub apply_calibration: bool,
    /// Decode only the first kept frame of each file.
    pub first_frame_only: bool,
    /// Materialize per-file headers in the output.
    pub include_metadata: bool,
    /// Allowed declared-vs-actual frame count disagreement (see
    /// `HeaderError::FrameCountMismatch`).
    pub frame_count_slack: usize,
    /// Per-file completion callback.
    pub progress_hook: Option<ProgressHook>,
    /// Cooperative cancellation handle.
    pub cancel: Option<CancelToken>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            worker_count: 0,
            start_time: None,
            end_time: None,
            apply_calibration: false,
            first_frame_only: false,
            include_metadata: true,
            frame_count_slack: 1,
            progress_hook: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("worker_count", &self.worker_count)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("apply_calibration", &self.apply_calibration)
            .field("first_frame_only", &self.first_frame_only)
            .field("include_metadata", &self.include_metadata)
            .field("frame_count_slack", &self.frame_count_slack)
            .field("progress_hook", &self.progress_hook.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

/// Decodes batches of raw files for one instrument format.
#[derive(Debug)]
pub struct BatchDecoder {
    spec: &'static FormatSpec,
    config: BatchConfig,
}

impl BatchDecoder {
    /// Decoder for `format` with the default configuration.
    pub fn new(format: InstrumentFormat) -> Self {
        BatchDecoder {
            spec: format.spec(),
            config: BatchConfig::default(),
        }
    }

    /// Decoder for `format` with an explicit configuration.
    pub fn with_config(format: InstrumentFormat, config: BatchConfig) -> Self {
        BatchDecoder {
            spec: format.spec(),
            config,
        }
    }

    /// Resolve a catalog-style dataset tag and build a decoder for it.
    ///
    /// Fails with [`BatchError::UnsupportedFormat`] for tags outside the
    /// supported set — a caller configuration error, reported before any
    /// file I/O.
    pub fn from_tag(tag: &str) -> Result<Self, BatchError> {
        let format = InstrumentFormat::from_tag(tag).ok_or_else(|| {
            BatchError::UnsupportedFormat {
                tag: tag.to_string(),
            }
        })?;
        Ok(BatchDecoder::new(format))
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: BatchConfig) {
        self.config = config;
    }

    /// The format this decoder reads.
    pub fn format(&self) -> InstrumentFormat {
        self.spec.format
    }

    fn validate(&self, calibration: Option<&CalibrationData>) -> Result<(), BatchError> {
        if self.config.worker_count > MAX_WORKER_COUNT {
            return Err(BatchError::InvalidWorkerCount {
                requested: self.config.worker_count,
                max: MAX_WORKER_COUNT,
            });
        }
        if self.config.apply_calibration {
            if !self.spec.calibratable {
                return Err(BatchError::CalibrationUnsupported {
                    tag: self.spec.tag,
                });
            }
            if calibration.is_none() {
                return Err(BatchError::CalibrationMissing);
            }
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancel
            .as_ref()
            .map(CancelToken::is_cancelled)
            .unwrap_or(false)
    }

    fn report_progress(&self, file_index: usize, file_count: usize) {
        if let Some(hook) = &self.config.progress_hook {
            hook(file_index, file_count);
        }
    }

    /// Decode a batch of files, in parallel, into one [`DecodedBatch`].
    ///
    /// `files` is the canonical ordering: headers and frames in the result
    /// follow it regardless of worker count or completion order. Only
    /// configuration-class problems return `Err`; every data-quality problem
    /// is recorded in the returned batch instead.
    pub fn decode<P: AsRef<Path>>(
        &self,
        files: &[P],
        calibration: Option<&CalibrationData>,
    ) -> Result<DecodedBatch, BatchError> {
        self.validate(calibration)?;

        let workers = match self.config.worker_count {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
        .min(files.len().max(1));

        info!(
            "decoding {} {} file(s) with {} worker(s)",
            files.len(),
            self.spec.tag,
            workers
        );

        let window = TimeRange::new(self.config.start_time, self.config.end_time);
        let options = DecodeOptions {
            apply_calibration: self.config.apply_calibration,
            first_frame_only: self.config.first_frame_only,
            frame_count_slack: self.config.frame_count_slack,
        };

        let slots = if workers <= 1 {
            self.decode_serial(files, calibration, window, &options)
        } else {
            self.decode_parallel(files, calibration, window, &options, workers)?
        };

        let batch = aggregate::assemble(slots, self.config.include_metadata);
        info!(
            "batch done: {} frames from {} file(s), {} failure(s){}",
            batch.summary.frames_decoded,
            batch.summary.files_attempted,
            batch.failures.len(),
            if batch.truncated { " (truncated)" } else { "" }
        );
        Ok(batch)
    }

    fn decode_serial<P: AsRef<Path>>(
        &self,
        files: &[P],
        calibration: Option<&CalibrationData>,
        window: TimeRange,
        options: &DecodeOptions,
    ) -> Vec<Option<FileOutcome>> {
        let mut slots = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            if self.is_cancelled() {
                slots.push(None);
                continue;
            }
            let outcome =
                decode_file(index, path.as_ref(), self.spec, calibration, window, options);
            self.report_progress(index, files.len());
            slots.push(Some(outcome));
        }
        slots
    }

    fn decode_parallel<P: AsRef<Path>>(
        &self,
        files: &[P],
        calibration: Option<&CalibrationData>,
        window: TimeRange,
        options: &DecodeOptions,
        workers: usize,
    ) -> Result<Vec<Option<FileOutcome>>, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| BatchError::WorkerPool(err.to_string()))?;

        let (tx, rx) = crossbeam_channel::unbounded::<(usize, Option<FileOutcome>)>();
        let mut slots: Vec<Option<FileOutcome>> = files.iter().map(|_| None).collect();
        let file_count = files.len();
        let spec = self.spec;

        pool.in_place_scope(|scope| {
            for (index, path) in files.iter().enumerate() {
                let tx = tx.clone();
                let path: &Path = path.as_ref();
                scope.spawn(move |_| {
                    // checked at dispatch: in-flight files finish, no new work starts
                    let outcome = if self.is_cancelled() {
                        None
                    } else {
                        Some(decode_file(index, path, spec, calibration, window, options))
                    };
                    let _ = tx.send((index, outcome));
                });
            }
            drop(tx);

            // Drain on the orchestrating thread so the progress hook never
            // runs on (or blocks) a worker.
            for (index, outcome) in rx.iter() {
                if let Some(outcome) = outcome {
                    self.report_progress(index, file_count);
                    slots[index] = Some(outcome);
                }
            }
        });

        Ok(slots)
    }
}
