//! Fixed-layout header codec.
//!
//! Each raw file starts with a format-specific header laid out per the
//! [`FormatSpec`] table. The common 48-byte prefix is shared by every family;
//! the spectrograph and riometer append a short trailer with
//! instrument-specific fields. Decoding validates magic, layout version and
//! declared dimensions, and reports the consumed byte length so the caller
//! can locate the frame payload.
//!
//! Decoding has no side effects and never reads beyond the supplied slice.

mod error;

pub use error::HeaderError;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::formats::{Endian, FormatSpec, InstrumentFormat};

// Common-prefix field offsets. Trailer fields start at COMMON_LEN.
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_SITE_UID: usize = 6;
const OFF_DEVICE_UID: usize = 10;
const OFF_START_MICROS: usize = 14;
const OFF_WIDTH: usize = 22;
const OFF_HEIGHT: usize = 24;
const OFF_FRAME_COUNT: usize = 26;
const OFF_EXPOSURE_US: usize = 28;
const OFF_CADENCE_MS: usize = 32;
const COMMON_LEN: usize = 48;
const UID_LEN: usize = 4;

/// Decoded scalar fields from one file's header. Read-only after decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameHeader {
    /// Instrument family the file belongs to.
    pub format: InstrumentFormat,
    /// Observatory site identifier (e.g. `gill`).
    pub site_uid: String,
    /// Device identifier (e.g. `thm05`, truncated to the stored 4 chars).
    pub device_uid: String,
    /// Capture start time of the first frame.
    pub start_time: DateTime<Utc>,
    /// Frame width in sample positions (riometer: 1).
    pub width: u16,
    /// Frame height in sample positions (riometer: 1).
    pub height: u16,
    /// Frame count declared by the header; zero for payload-derived formats.
    pub declared_frame_count: u16,
    /// Exposure time in microseconds.
    pub exposure_us: u32,
    /// Nominal frame cadence in milliseconds.
    pub cadence_ms: u32,
    /// Spectrograph only: wavelength of the first bin, nanometres.
    pub wavelength_start_nm: Option<f32>,
    /// Spectrograph only: wavelength step per bin, nanometres.
    pub wavelength_step_nm: Option<f32>,
    /// Riometer only: observing frequency, megahertz.
    pub observing_frequency_mhz: Option<f32>,
}

impl FrameHeader {
    /// Exposure time in seconds, as used for Rayleighs conversion.
    pub fn exposure_seconds(&self) -> f64 {
        self.exposure_us as f64 / 1_000_000.0
    }

    /// Nominal end of capture for a file holding `frame_count` frames, or
    /// `None` when the span is outside the representable range.
    ///
    /// Upper bound used by the header-level time prefilter; per-frame
    /// timestamps from microheaders remain authoritative.
    pub fn nominal_end_time(&self, frame_count: usize) -> Option<DateTime<Utc>> {
        let span_ms = (self.cadence_ms as i64).checked_mul(frame_count as i64)?;
        self.start_time
            .checked_add_signed(chrono::Duration::milliseconds(span_ms))
    }
}

fn read_u16(endian: Endian, buf: &[u8]) -> u16 {
    match endian {
        Endian::Big => BigEndian::read_u16(buf),
        Endian::Little => LittleEndian::read_u16(buf),
    }
}

fn read_u32(endian: Endian, buf: &[u8]) -> u32 {
    match endian {
        Endian::Big => BigEndian::read_u32(buf),
        Endian::Little => LittleEndian::read_u32(buf),
    }
}

fn read_i64(endian: Endian, buf: &[u8]) -> i64 {
    match endian {
        Endian::Big => BigEndian::read_i64(buf),
        Endian::Little => LittleEndian::read_i64(buf),
    }
}

fn read_f32(endian: Endian, buf: &[u8]) -> f32 {
    match endian {
        Endian::Big => BigEndian::read_f32(buf),
        Endian::Little => LittleEndian::read_f32(buf),
    }
}

fn decode_uid(raw: &[u8], field: &'static str) -> Result<String, HeaderError> {
    let trimmed: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| *b != b' ' && *b != 0)
        .collect();
    if trimmed.iter().any(|b| !b.is_ascii_graphic()) {
        return Err(HeaderError::BadUid { field });
    }
    // lowercase for stable joins against calibration records
    Ok(String::from_utf8_lossy(&trimmed).to_ascii_lowercase())
}

/// Decode and validate a file header against `spec`.
///
/// `bytes` is the leading portion of the file; it may be longer than the
/// header. On success, returns the decoded [`FrameHeader`] and the number of
/// bytes consumed (the payload starts at that offset).
pub fn decode_header(spec: &FormatSpec, bytes: &[u8]) -> Result<(FrameHeader, usize), HeaderError> {
    if bytes.len() < spec.header_len {
        return Err(HeaderError::Truncated {
            needed: spec.header_len,
            got: bytes.len(),
        });
    }

    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[OFF_MAGIC..OFF_MAGIC + 4]);
    if found != spec.magic {
        return Err(HeaderError::BadMagic {
            expected: spec.magic,
            found,
        });
    }

    let version = bytes[OFF_VERSION];
    if version != spec.supported_version {
        return Err(HeaderError::UnsupportedVersion {
            found: version,
            supported: spec.supported_version,
        });
    }

    let endian = spec.endian;
    let width = read_u16(endian, &bytes[OFF_WIDTH..OFF_WIDTH + 2]);
    let height = read_u16(endian, &bytes[OFF_HEIGHT..OFF_HEIGHT + 2]);
    if width == 0 || height == 0 {
        return Err(HeaderError::ZeroArea { width, height });
    }

    let micros = read_i64(endian, &bytes[OFF_START_MICROS..OFF_START_MICROS + 8]);
    let start_time = Utc
        .timestamp_micros(micros)
        .single()
        .ok_or(HeaderError::BadTimestamp { micros })?;

    let site_uid = decode_uid(&bytes[OFF_SITE_UID..OFF_SITE_UID + UID_LEN], "site uid")?;
    let device_uid = decode_uid(
        &bytes[OFF_DEVICE_UID..OFF_DEVICE_UID + UID_LEN],
        "device uid",
    )?;

    let mut header = FrameHeader {
        format: spec.format,
        site_uid,
        device_uid,
        start_time,
        width,
        height,
        declared_frame_count: read_u16(endian, &bytes[OFF_FRAME_COUNT..OFF_FRAME_COUNT + 2]),
        exposure_us: read_u32(endian, &bytes[OFF_EXPOSURE_US..OFF_EXPOSURE_US + 4]),
        cadence_ms: read_u32(endian, &bytes[OFF_CADENCE_MS..OFF_CADENCE_MS + 4]),
        wavelength_start_nm: None,
        wavelength_step_nm: None,
        observing_frequency_mhz: None,
    };

    match spec.format {
        InstrumentFormat::TrexSpectrograph => {
            header.wavelength_start_nm = Some(read_f32(endian, &bytes[COMMON_LEN..COMMON_LEN + 4]));
            header.wavelength_step_nm =
                Some(read_f32(endian, &bytes[COMMON_LEN + 4..COMMON_LEN + 8]));
        }
        InstrumentFormat::NorstarRiometer => {
            header.observing_frequency_mhz =
                Some(read_f32(endian, &bytes[COMMON_LEN..COMMON_LEN + 4]));
        }
        _ => {}
    }

    Ok((header, spec.header_len))
}
