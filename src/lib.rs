//! # skyraw - Raw Ground-Instrument Data Decoding
//!
//! `skyraw` turns raw binary files from ground-based auroral instruments —
//! all-sky imagers, imaging spectrographs and riometers — into structured
//! in-memory datasets: stacked frames, per-frame timestamps and per-file
//! metadata.
//!
//! ## Key Properties
//!
//! - **Fixed layouts, closed set**: every supported instrument family has
//!   one compile-time [`formats::FormatSpec`]; the only runtime inspection a
//!   file gets is its magic/version check. Adding an instrument means adding
//!   a table row, not scattering branches.
//!
//! - **Fault isolation**: a corrupt frame is skipped and recorded, a broken
//!   file is recorded and its siblings decode anyway. The batch result
//!   always carries a complete problem report; nothing is silently dropped.
//!
//! - **Deterministic parallelism**: files decode across a bounded worker
//!   pool, but results are merged by input index. `worker_count = 1` and
//!   `worker_count = N` produce identical batches.
//!
//! - **Optional calibration and time windowing**: flat-field/Rayleighs
//!   correction and `[start, end)` filtering run inside the per-file
//!   pipeline; both are strictly opt-in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skyraw::prelude::*;
//!
//! let decoder = BatchDecoder::new(InstrumentFormat::ThemisAsi);
//! let files: Vec<std::path::PathBuf> = vec![
//!     "20211104_0600_gill_themis05_full.raw".into(),
//!     "20211104_0601_gill_themis05_full.raw".into(),
//! ];
//!
//! let batch = decoder.decode(&files, None)?;
//! println!(
//!     "{} frames from {} files ({} problems)",
//!     batch.summary.frames_decoded,
//!     batch.summary.files_attempted,
//!     batch.failures.len(),
//! );
//! if !batch.is_fully_successful() {
//!     for failure in &batch.failures {
//!         eprintln!("  {failure}");
//!     }
//! }
//! # Ok::<(), skyraw::batch::BatchError>(())
//! ```
//!
//! ## Supported Formats
//!
//! | format | tag | samples | endian |
//! |--------|-----|---------|--------|
//! | THEMIS all-sky imager | `themis_asi_raw` | u16 | big |
//! | REGO all-sky imager | `rego_asi_raw` | u16 | big |
//! | TREx NIR all-sky imager | `trex_nir_raw` | u16 | little |
//! | TREx spectrograph | `trex_spect_raw` | u16 | big |
//! | NORSTAR riometer (k2) | `norstar_rio_k2` | f32 pairs | big |
//!
//! Plain and gzip-compressed (`.gz`) inputs are both accepted.
//!
//! ## Architecture
//!
//! - [`formats`]: the closed instrument/layout table
//! - [`header`]: fixed-layout header codec
//! - [`extract`]: lazy frame extraction with per-frame fault recovery
//! - [`calibration`]: caller-owned flat-field correction
//! - [`timefilter`]: `[start, end)` frame windowing
//! - [`pipeline`]: the pure per-file decode pipeline
//! - [`batch`]: orchestration, aggregation and the public entry point
//!
//! This crate only decodes bytes that are already on disk. Downloading,
//! cataloging, calibration-file parsing and CLI concerns live with the
//! callers; the crate emits [`log`] records but never installs a logger.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod batch;
pub mod calibration;
pub mod extract;
pub mod formats;
pub mod header;
pub mod pipeline;
pub mod timefilter;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::batch::{
        BatchConfig, BatchDecoder, BatchError, BatchStatus, BatchSummary, CancelToken,
        DecodedBatch, ProgressHook, MAX_WORKER_COUNT,
    };
    pub use crate::calibration::{CalibrationData, CalibrationError};
    pub use crate::extract::{Frame, FrameError, PixelData};
    pub use crate::formats::{FormatSpec, InstrumentFormat, FORMAT_TABLE};
    pub use crate::header::{FrameHeader, HeaderError};
    pub use crate::pipeline::{DecodeFailure, FailureStage};
    pub use crate::timefilter::TimeRange;
}
