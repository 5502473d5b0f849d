/// Configuration-class errors, raised to the caller before any file I/O.
///
/// Everything else that can go wrong during a batch decode is a data-quality
/// problem and is recorded in the batch's failure report instead of being
/// raised.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Format tag is not in the supported set
    #[error("unsupported format tag '{tag}'")]
    UnsupportedFormat {
        /// The unrecognized tag.
        tag: String,
    },

    /// Requested worker count exceeds the hard cap
    #[error("invalid worker count {requested} (maximum {max})")]
    InvalidWorkerCount {
        /// Requested worker count.
        requested: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Calibration requested for a format that has no calibration product
    #[error("format '{tag}' does not support calibration")]
    CalibrationUnsupported {
        /// Tag of the offending format.
        tag: &'static str,
    },

    /// Calibration requested but no calibration data supplied
    #[error("apply_calibration is set but no calibration data was supplied")]
    CalibrationMissing,

    /// Worker pool could not be constructed
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
