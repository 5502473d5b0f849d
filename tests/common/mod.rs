//! Synthetic raw-file builders shared by the integration suites.
//!
//! Files are generated per the layout table in `skyraw::formats`, so every
//! suite can author valid, truncated or corrupted inputs without binary
//! fixtures in the repo.

use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, TimeZone, Utc};
use skyraw::extract::{FRAME_STATUS_GOOD, MICROHEADER_MARKER};
use skyraw::formats::{Endian, FormatSpec, FrameCountRule, InstrumentFormat};

/// 2021-11-04 06:00:00 UTC, a plausible winter observing night.
#[allow(dead_code)]
pub const START_US: i64 = 1_636_005_600_000_000;

/// [`START_US`] as a timestamp.
#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.timestamp_micros(START_US).unwrap()
}

/// Install the test logger so `RUST_LOG=debug` surfaces pipeline records.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn put_u16(endian: Endian, buf: &mut [u8], value: u16) {
    match endian {
        Endian::Big => BigEndian::write_u16(buf, value),
        Endian::Little => LittleEndian::write_u16(buf, value),
    }
}

fn put_u32(endian: Endian, buf: &mut [u8], value: u32) {
    match endian {
        Endian::Big => BigEndian::write_u32(buf, value),
        Endian::Little => LittleEndian::write_u32(buf, value),
    }
}

fn put_i64(endian: Endian, buf: &mut [u8], value: i64) {
    match endian {
        Endian::Big => BigEndian::write_i64(buf, value),
        Endian::Little => LittleEndian::write_i64(buf, value),
    }
}

fn put_f32(endian: Endian, buf: &mut [u8], value: f32) {
    match endian {
        Endian::Big => BigEndian::write_f32(buf, value),
        Endian::Little => LittleEndian::write_f32(buf, value),
    }
}

/// Builder for one synthetic raw file.
pub struct FileBuilder {
    spec: &'static FormatSpec,
    site: [u8; 4],
    device: [u8; 4],
    start_us: i64,
    width: u16,
    height: u16,
    exposure_us: u32,
    cadence_ms: u32,
    declared_override: Option<u16>,
    wavelength: Option<(f32, f32)>,
    frequency: Option<f32>,
    frames: usize,
    body: Vec<u8>,
}

#[allow(dead_code)]
impl FileBuilder {
    pub fn new(format: InstrumentFormat, width: u16, height: u16) -> Self {
        FileBuilder {
            spec: format.spec(),
            site: *b"GILL",
            device: *b"T05 ",
            start_us: START_US,
            width,
            height,
            exposure_us: 2_950_000,
            cadence_ms: 3_000,
            declared_override: None,
            wavelength: None,
            frequency: None,
            frames: 0,
            body: Vec::new(),
        }
    }

    pub fn device(mut self, device: &str) -> Self {
        let mut padded = *b"    ";
        padded[..device.len()].copy_from_slice(device.as_bytes());
        self.device = padded;
        self
    }

    pub fn site(mut self, site: &str) -> Self {
        let mut padded = *b"    ";
        padded[..site.len()].copy_from_slice(site.as_bytes());
        self.site = padded;
        self
    }

    pub fn start_us(mut self, start_us: i64) -> Self {
        self.start_us = start_us;
        self
    }

    pub fn cadence_ms(mut self, cadence_ms: u32) -> Self {
        self.cadence_ms = cadence_ms;
        self
    }

    pub fn exposure_us(mut self, exposure_us: u32) -> Self {
        self.exposure_us = exposure_us;
        self
    }

    /// Override the declared frame count (defaults to the frames added).
    pub fn declared_count(mut self, count: u16) -> Self {
        self.declared_override = Some(count);
        self
    }

    pub fn wavelength(mut self, start_nm: f32, step_nm: f32) -> Self {
        self.wavelength = Some((start_nm, step_nm));
        self
    }

    pub fn frequency(mut self, mhz: f32) -> Self {
        self.frequency = Some(mhz);
        self
    }

    /// Append a good imager/spectrograph frame with constant pixel `fill`.
    pub fn frame(self, offset_ms: u32, fill: u16) -> Self {
        self.frame_raw(offset_ms, fill, FRAME_STATUS_GOOD, MICROHEADER_MARKER)
    }

    /// Append a frame with an explicit status byte.
    pub fn frame_status(self, offset_ms: u32, fill: u16, status: u8) -> Self {
        self.frame_raw(offset_ms, fill, status, MICROHEADER_MARKER)
    }

    /// Append a frame with a corrupted microheader marker.
    pub fn frame_bad_marker(self, offset_ms: u32, fill: u16) -> Self {
        self.frame_raw(offset_ms, fill, FRAME_STATUS_GOOD, 0xDEAD)
    }

    fn frame_raw(mut self, offset_ms: u32, fill: u16, status: u8, marker: u16) -> Self {
        let endian = self.spec.endian;
        let mut micro = vec![0u8; self.spec.microheader_len];
        put_u16(endian, &mut micro[0..2], marker);
        micro[2] = status;
        put_u32(endian, &mut micro[4..8], offset_ms);
        self.body.extend_from_slice(&micro);

        let values = self.width as usize * self.height as usize;
        let mut pixels = vec![0u8; values * 2];
        for i in 0..values {
            put_u16(endian, &mut pixels[i * 2..i * 2 + 2], fill.wrapping_add(i as u16));
        }
        self.body.extend_from_slice(&pixels);
        self.frames += 1;
        self
    }

    /// Append one riometer sample pair.
    pub fn sample(mut self, raw_power: f32, absorption: f32) -> Self {
        let endian = self.spec.endian;
        let mut pair = [0u8; 8];
        put_f32(endian, &mut pair[0..4], raw_power);
        put_f32(endian, &mut pair[4..8], absorption);
        self.body.extend_from_slice(&pair);
        self.frames += 1;
        self
    }

    /// Drop the trailing `count` bytes of the body.
    pub fn truncate_tail(mut self, count: usize) -> Self {
        let len = self.body.len().saturating_sub(count);
        self.body.truncate(len);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let spec = self.spec;
        let endian = spec.endian;
        let mut buf = vec![0u8; spec.header_len];
        buf[..4].copy_from_slice(&spec.magic);
        buf[4] = spec.supported_version;
        buf[6..10].copy_from_slice(&self.site);
        buf[10..14].copy_from_slice(&self.device);
        put_i64(endian, &mut buf[14..22], self.start_us);
        put_u16(endian, &mut buf[22..24], self.width);
        put_u16(endian, &mut buf[24..26], self.height);
        let declared = self.declared_override.unwrap_or(match spec.frame_count_rule {
            FrameCountRule::Declared => self.frames as u16,
            FrameCountRule::PayloadDerived => 0,
        });
        put_u16(endian, &mut buf[26..28], declared);
        put_u32(endian, &mut buf[28..32], self.exposure_us);
        put_u32(endian, &mut buf[32..36], self.cadence_ms);
        if let Some((start_nm, step_nm)) = self.wavelength {
            put_f32(endian, &mut buf[48..52], start_nm);
            put_f32(endian, &mut buf[52..56], step_nm);
        }
        if let Some(mhz) = self.frequency {
            put_f32(endian, &mut buf[48..52], mhz);
        }
        buf.extend_from_slice(&self.body);
        buf
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.bytes()).expect("write synthetic file");
        path
    }

    pub fn write_gz(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&self.bytes()).expect("compress synthetic file");
        std::fs::write(&path, encoder.finish().expect("finish gzip")).expect("write gz file");
        path
    }
}
