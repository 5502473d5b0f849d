//! Instrument format registry.
//!
//! Every supported instrument family has exactly one fixed binary layout,
//! described by a [`FormatSpec`]. The specs are compile-time constants in
//! [`FORMAT_TABLE`]; the only layout information ever taken from a file at
//! runtime is what its header declares, and the header itself is validated
//! against the spec's magic number and layout version.
//!
//! Adding a new instrument means adding a variant to [`InstrumentFormat`]
//! and a row to the table — nothing else in the crate branches on format
//! identity outside of this module and the header codec.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of supported instrument families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentFormat {
    /// THEMIS all-sky imager raw stream (256x256 16-bit, big endian).
    ThemisAsi,
    /// REGO redline all-sky imager raw stream (512x512 16-bit, big endian).
    RegoAsi,
    /// TREx near-infrared all-sky imager raw stream (256x256 16-bit, little endian).
    TrexNirAsi,
    /// TREx imaging spectrograph raw stream (1024 rows x 256 wavelength bins).
    TrexSpectrograph,
    /// NORSTAR riometer k2 stream (raw power + absorption sample pairs).
    NorstarRiometer,
}

impl InstrumentFormat {
    /// Catalog-style dataset tag for this format.
    pub fn tag(&self) -> &'static str {
        self.spec().tag
    }

    /// Resolve a catalog-style dataset tag, case-insensitively.
    ///
    /// Returns `None` for tags outside the supported set; callers entering
    /// through [`crate::batch::BatchDecoder::from_tag`] surface that as an
    /// `UnsupportedFormat` error before any file I/O happens.
    pub fn from_tag(tag: &str) -> Option<Self> {
        FORMAT_TABLE
            .iter()
            .find(|spec| spec.tag.eq_ignore_ascii_case(tag))
            .map(|spec| spec.format)
    }

    /// The fixed layout for this format.
    pub fn spec(&self) -> &'static FormatSpec {
        match self {
            InstrumentFormat::ThemisAsi => &FORMAT_TABLE[0],
            InstrumentFormat::RegoAsi => &FORMAT_TABLE[1],
            InstrumentFormat::TrexNirAsi => &FORMAT_TABLE[2],
            InstrumentFormat::TrexSpectrograph => &FORMAT_TABLE[3],
            InstrumentFormat::NorstarRiometer => &FORMAT_TABLE[4],
        }
    }
}

impl fmt::Display for InstrumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Byte order of every multi-byte field in a format's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

/// Numeric type of one stored sample value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Unsigned 16-bit counts (imagers, spectrograph).
    U16,
    /// IEEE 754 single-precision values (riometer).
    F32,
}

impl SampleType {
    /// Stored size of one value.
    pub const fn byte_len(&self) -> usize {
        match self {
            SampleType::U16 => 2,
            SampleType::F32 => 4,
        }
    }
}

/// How the number of frames in a file is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountRule {
    /// The header's frame-count field is authoritative.
    Declared,
    /// Frame count is the payload length divided by the frame chunk size.
    PayloadDerived,
}

/// Fixed binary layout for one instrument family.
///
/// All sizes are in bytes. `channels` is the number of values stored per
/// sample position (1 for imagers and the spectrograph, 2 for the riometer's
/// raw-power/absorption pairs).
#[derive(Debug)]
pub struct FormatSpec {
    /// The format this spec describes.
    pub format: InstrumentFormat,
    /// Catalog-style dataset tag.
    pub tag: &'static str,
    /// Magic number at file offset 0.
    pub magic: [u8; 4],
    /// Layout version this crate accepts.
    pub supported_version: u8,
    /// Total header length, including any format-specific trailer fields.
    pub header_len: usize,
    /// Byte order of every multi-byte field in header, microheader and payload.
    pub endian: Endian,
    /// Numeric type of stored sample values.
    pub sample_type: SampleType,
    /// Values per sample position.
    pub channels: u16,
    /// Per-frame microheader length; zero when the format has none.
    pub microheader_len: usize,
    /// How the frame count is derived.
    pub frame_count_rule: FrameCountRule,
    /// Whether flat-field calibration is defined for this format.
    pub calibratable: bool,
}

impl FormatSpec {
    /// Payload bytes of one frame with the given dimensions, excluding the
    /// microheader.
    pub fn frame_payload_len(&self, width: u16, height: u16) -> usize {
        width as usize * height as usize * self.channels as usize * self.sample_type.byte_len()
    }

    /// Full stored size of one frame chunk: microheader plus sample payload.
    pub fn frame_chunk_len(&self, width: u16, height: u16) -> usize {
        self.microheader_len + self.frame_payload_len(width, height)
    }
}

/// The complete layout table, one row per supported instrument family.
pub static FORMAT_TABLE: [FormatSpec; 5] = [
    FormatSpec {
        format: InstrumentFormat::ThemisAsi,
        tag: "themis_asi_raw",
        magic: *b"THM1",
        supported_version: 1,
        header_len: 48,
        endian: Endian::Big,
        sample_type: SampleType::U16,
        channels: 1,
        microheader_len: 8,
        frame_count_rule: FrameCountRule::Declared,
        calibratable: true,
    },
    FormatSpec {
        format: InstrumentFormat::RegoAsi,
        tag: "rego_asi_raw",
        magic: *b"REGO",
        supported_version: 1,
        header_len: 48,
        endian: Endian::Big,
        sample_type: SampleType::U16,
        channels: 1,
        microheader_len: 8,
        frame_count_rule: FrameCountRule::Declared,
        calibratable: true,
    },
    FormatSpec {
        format: InstrumentFormat::TrexNirAsi,
        tag: "trex_nir_raw",
        magic: *b"TNIR",
        supported_version: 1,
        header_len: 48,
        endian: Endian::Little,
        sample_type: SampleType::U16,
        channels: 1,
        microheader_len: 8,
        frame_count_rule: FrameCountRule::Declared,
        calibratable: true,
    },
    FormatSpec {
        format: InstrumentFormat::TrexSpectrograph,
        tag: "trex_spect_raw",
        magic: *b"TSPC",
        supported_version: 1,
        header_len: 56,
        endian: Endian::Big,
        sample_type: SampleType::U16,
        channels: 1,
        microheader_len: 8,
        frame_count_rule: FrameCountRule::Declared,
        calibratable: true,
    },
    FormatSpec {
        format: InstrumentFormat::NorstarRiometer,
        tag: "norstar_rio_k2",
        magic: *b"NRIO",
        supported_version: 1,
        header_len: 52,
        endian: Endian::Big,
        sample_type: SampleType::F32,
        channels: 2,
        microheader_len: 0,
        frame_count_rule: FrameCountRule::PayloadDerived,
        calibratable: false,
    },
];
