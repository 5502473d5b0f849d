//! Frame extraction.
//!
//! Slices a file's payload into frame-sized chunks and decodes each chunk
//! into a [`Frame`]. Extraction is lazy: the [`FrameExtractor`] iterator
//! decodes one chunk per step, so a caller that stops early (time filtering,
//! first-frame-only reads) never touches the remaining bytes.
//!
//! Partial failure is the defining property here. A truncated final chunk, a
//! bad microheader marker, an instrument-flagged frame or a backwards
//! timestamp yields an `Err` for that frame index and extraction continues
//! with the next chunk. The pipeline records those as skipped-frame failures.

mod error;

pub use error::FrameError;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

use crate::formats::{Endian, FormatSpec, FrameCountRule, SampleType};
use crate::header::FrameHeader;

/// Alignment word at the start of every imager/spectrograph microheader.
pub const MICROHEADER_MARKER: u16 = 0xF5A3;

/// Microheader status byte for a good frame.
pub const FRAME_STATUS_GOOD: u8 = 0x00;

/// Decoded sample values of one frame.
///
/// The variant is fixed per format family ([`SampleType`]); lengths always
/// equal `width * height * channels`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Unsigned 16-bit counts (imagers, spectrograph).
    U16(Vec<u16>),
    /// Single-precision values (riometer pairs, calibrated imager output).
    F32(Vec<f32>),
}

impl PixelData {
    /// Number of stored values.
    pub fn len(&self) -> usize {
        match self {
            PixelData::U16(v) => v.len(),
            PixelData::F32(v) => v.len(),
        }
    }

    /// True when no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One decoded sample unit: a fixed-shape array plus its absolute timestamp.
///
/// `file_index` ties the frame back to its input file; `index` is the
/// file-native frame position. Frames are immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of the source file in the batch input order.
    pub file_index: usize,
    /// Frame position within the source file.
    pub index: usize,
    /// Absolute capture time of this frame.
    pub timestamp: DateTime<Utc>,
    /// Frame width in sample positions.
    pub width: u16,
    /// Frame height in sample positions.
    pub height: u16,
    /// Values per sample position.
    pub channels: u16,
    /// Decoded sample values, row-major.
    pub pixels: PixelData,
}

/// Lazy iterator over the frames of one file's payload.
pub struct FrameExtractor {
    payload: Bytes,
    spec: &'static FormatSpec,
    file_index: usize,
    start_time: DateTime<Utc>,
    cadence_ms: u32,
    width: u16,
    height: u16,
    chunk_len: usize,
    total: usize,
    next_index: usize,
    prev_offset_ms: Option<u32>,
}

impl FrameExtractor {
    /// Build an extractor over `payload` (the bytes following the header).
    ///
    /// `file_index` is stamped onto every produced frame so batch-level
    /// ordering can be restored after parallel decode.
    pub fn new(
        spec: &'static FormatSpec,
        header: &FrameHeader,
        payload: Bytes,
        file_index: usize,
    ) -> Self {
        let chunk_len = spec.frame_chunk_len(header.width, header.height);
        let total = match spec.frame_count_rule {
            FrameCountRule::Declared => header.declared_frame_count as usize,
            FrameCountRule::PayloadDerived => payload.len() / chunk_len,
        };
        FrameExtractor {
            payload,
            spec,
            file_index,
            start_time: header.start_time,
            cadence_ms: header.cadence_ms,
            width: header.width,
            height: header.height,
            chunk_len,
            total,
            next_index: 0,
            prev_offset_ms: None,
        }
    }

    /// Number of frames this extractor will attempt to decode.
    pub fn expected_frames(&self) -> usize {
        self.total
    }

    /// Number of complete frame chunks present in the payload.
    pub fn full_chunks(&self) -> usize {
        self.payload.len() / self.chunk_len
    }

    fn decode_pixels(&self, chunk: &[u8]) -> PixelData {
        let values =
            self.width as usize * self.height as usize * self.spec.channels as usize;
        match self.spec.sample_type {
            SampleType::U16 => {
                let mut out = vec![0u16; values];
                match self.spec.endian {
                    Endian::Big => BigEndian::read_u16_into(chunk, &mut out),
                    Endian::Little => LittleEndian::read_u16_into(chunk, &mut out),
                }
                PixelData::U16(out)
            }
            SampleType::F32 => {
                let mut out = vec![0f32; values];
                match self.spec.endian {
                    Endian::Big => BigEndian::read_f32_into(chunk, &mut out),
                    Endian::Little => LittleEndian::read_f32_into(chunk, &mut out),
                }
                PixelData::F32(out)
            }
        }
    }

    fn decode_chunk(&mut self, index: usize) -> Result<Frame, FrameError> {
        let offset = index * self.chunk_len;
        let available = self.payload.len().saturating_sub(offset);
        if available < self.chunk_len {
            return Err(FrameError::Truncated {
                index,
                expected: self.chunk_len,
                got: available,
            });
        }
        let chunk = &self.payload[offset..offset + self.chunk_len];

        let timestamp = if self.spec.microheader_len > 0 {
            let marker = match self.spec.endian {
                Endian::Big => BigEndian::read_u16(&chunk[0..2]),
                Endian::Little => LittleEndian::read_u16(&chunk[0..2]),
            };
            if marker != MICROHEADER_MARKER {
                return Err(FrameError::BadMarker {
                    index,
                    found: marker,
                });
            }
            let status = chunk[2];
            if status != FRAME_STATUS_GOOD {
                return Err(FrameError::BadStatus { index, status });
            }
            let offset_ms = match self.spec.endian {
                Endian::Big => BigEndian::read_u32(&chunk[4..8]),
                Endian::Little => LittleEndian::read_u32(&chunk[4..8]),
            };
            if let Some(prev) = self.prev_offset_ms {
                if offset_ms < prev {
                    return Err(FrameError::NonMonotonicTimestamp {
                        index,
                        offset_ms,
                        prev_offset_ms: prev,
                    });
                }
            }
            self.prev_offset_ms = Some(offset_ms);
            self.start_time
                .checked_add_signed(Duration::milliseconds(offset_ms as i64))
                .ok_or(FrameError::TimestampOutOfRange { index })?
        } else {
            self.start_time
                .checked_add_signed(Duration::milliseconds(
                    self.cadence_ms as i64 * index as i64,
                ))
                .ok_or(FrameError::TimestampOutOfRange { index })?
        };

        let pixels = self.decode_pixels(&chunk[self.spec.microheader_len..]);
        Ok(Frame {
            file_index: self.file_index,
            index,
            timestamp,
            width: self.width,
            height: self.height,
            channels: self.spec.channels,
            pixels,
        })
    }
}

impl Iterator for FrameExtractor {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.total {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(self.decode_chunk(index))
    }
}
