/// Errors that can occur while decoding a file header.
///
/// All variants are fatal to the file they occur in, and only to that file:
/// the batch pipeline records them and moves on to the next input.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// File is shorter than the format's declared header length
    #[error("header truncated: need {needed} bytes, file has {got}")]
    Truncated {
        /// Header length the format requires.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// Magic number does not match the expected format
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Magic the format spec requires.
        expected: [u8; 4],
        /// Magic found in the file.
        found: [u8; 4],
    },

    /// Layout version is not supported by this crate
    #[error("unsupported layout version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u8,
        /// Version this crate accepts.
        supported: u8,
    },

    /// Declared dimensions imply a zero-sized frame
    #[error("dimensions {width}x{height} imply a zero-sized frame")]
    ZeroArea {
        /// Declared frame width.
        width: u16,
        /// Declared frame height.
        height: u16,
    },

    /// A site/device identifier field is not printable ASCII
    #[error("{field} field is not printable ASCII")]
    BadUid {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Capture start timestamp is outside the representable range
    #[error("capture start timestamp out of range: {micros} us")]
    BadTimestamp {
        /// Raw microseconds-since-epoch value from the file.
        micros: i64,
    },

    /// Declared frame count disagrees with the payload beyond the allowed slack
    #[error("declared frame count {declared} disagrees with payload ({actual} full frames, slack {slack})")]
    FrameCountMismatch {
        /// Frame count declared in the header.
        declared: usize,
        /// Full frame chunks actually present in the payload.
        actual: usize,
        /// Allowed disagreement before the file is rejected.
        slack: usize,
    },
}
