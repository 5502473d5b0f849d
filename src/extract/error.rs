/// Errors for individual frames within an otherwise-readable file.
///
/// Frame errors are skip-and-continue: the extractor reports the bad frame
/// and moves to the next chunk. They never abort the file, let alone the
/// batch.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Chunk is shorter than one full frame
    #[error("frame {index} truncated: expected {expected} bytes, got {got}")]
    Truncated {
        /// Index of the frame within its file.
        index: usize,
        /// Full chunk size the format requires.
        expected: usize,
        /// Bytes actually present for this chunk.
        got: usize,
    },

    /// Microheader marker does not match the expected alignment word
    #[error("frame {index} has bad microheader marker {found:#06x}")]
    BadMarker {
        /// Index of the frame within its file.
        index: usize,
        /// Marker value found in the file.
        found: u16,
    },

    /// Microheader status flag marks the frame as bad
    #[error("frame {index} flagged bad by instrument (status {status:#04x})")]
    BadStatus {
        /// Index of the frame within its file.
        index: usize,
        /// Raw status byte.
        status: u8,
    },

    /// Microheader timestamp offset moved backwards
    #[error("frame {index} timestamp offset {offset_ms} ms precedes previous frame ({prev_offset_ms} ms)")]
    NonMonotonicTimestamp {
        /// Index of the frame within its file.
        index: usize,
        /// Offset decoded for this frame.
        offset_ms: u32,
        /// Offset of the last good frame.
        prev_offset_ms: u32,
    },

    /// Derived absolute timestamp is outside the representable range
    #[error("frame {index} timestamp is outside the representable range")]
    TimestampOutOfRange {
        /// Index of the frame within its file.
        index: usize,
    },
}

impl FrameError {
    /// Index of the frame the error applies to.
    pub fn frame_index(&self) -> usize {
        match self {
            FrameError::Truncated { index, .. }
            | FrameError::BadMarker { index, .. }
            | FrameError::BadStatus { index, .. }
            | FrameError::NonMonotonicTimestamp { index, .. }
            | FrameError::TimestampOutOfRange { index } => *index,
        }
    }
}
