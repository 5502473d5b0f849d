//! Flat-field calibration.
//!
//! [`CalibrationData`] is loaded by a separate calibration-file reader and
//! handed to the batch decoder by reference; this crate never fetches or
//! caches it. Application is per-frame and optional — when no calibration is
//! supplied the pipeline passes raw frames through untouched.
//!
//! A calibration record is keyed by device identifier and a validity window.
//! Applying it to a frame from the wrong device, of the wrong shape, or
//! outside the window is a recorded per-frame failure, never a silent no-op.

use chrono::{DateTime, Utc};

use crate::extract::{Frame, PixelData};
use crate::header::FrameHeader;

/// Errors raised when calibration cannot be applied to a frame.
///
/// All variants except [`CalibrationError::BadFlatField`] are frame-level
/// skip-and-continue errors, reported only when calibration was requested.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// Flat-field array length does not match the declared dimensions
    #[error("flat field has {got} values, dimensions require {expected}")]
    BadFlatField {
        /// `width * height` of the calibration record.
        expected: usize,
        /// Length of the supplied flat-field array.
        got: usize,
    },

    /// Calibration belongs to a different device
    #[error("calibration is for device '{calibration}', frame is from '{frame}'")]
    DeviceMismatch {
        /// Device the calibration record was produced for.
        calibration: String,
        /// Device the frame came from.
        frame: String,
    },

    /// Calibration shape does not match the frame shape
    #[error("calibration shape {calibration:?} does not match frame shape {frame:?}")]
    ShapeMismatch {
        /// Calibration (width, height).
        calibration: (u16, u16),
        /// Frame (width, height) scaled by channel count.
        frame: (u16, u16),
    },

    /// Frame timestamp falls outside the calibration validity window
    #[error("frame at {timestamp} is outside calibration validity window")]
    OutsideValidity {
        /// Timestamp of the rejected frame.
        timestamp: DateTime<Utc>,
    },
}

/// A flat-field correction record for one device.
///
/// Owned by the caller and shared by reference across all decode workers;
/// nothing in this crate mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationData {
    device_uid: String,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    width: u16,
    height: u16,
    flat_field: Vec<f32>,
    rayleighs_per_dn_per_s: Option<f32>,
}

impl CalibrationData {
    /// Build a calibration record.
    ///
    /// `flat_field` is the per-pixel gain multiplier, row-major, and must
    /// hold exactly `width * height` values. `valid_until` of `None` means
    /// the record never expires.
    pub fn new(
        device_uid: impl Into<String>,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        width: u16,
        height: u16,
        flat_field: Vec<f32>,
    ) -> Result<Self, CalibrationError> {
        let expected = width as usize * height as usize;
        if flat_field.len() != expected {
            return Err(CalibrationError::BadFlatField {
                expected,
                got: flat_field.len(),
            });
        }
        let device_uid: String = device_uid.into();
        Ok(CalibrationData {
            device_uid: device_uid.to_ascii_lowercase(),
            valid_from,
            valid_until,
            width,
            height,
            flat_field,
            rayleighs_per_dn_per_s: None,
        })
    }

    /// Attach a Rayleighs-per-DN-per-second conversion factor.
    ///
    /// When present, corrected values are additionally scaled by
    /// `factor / exposure_seconds`, producing Rayleighs instead of
    /// flat-fielded counts.
    pub fn with_rayleighs(mut self, factor: f32) -> Self {
        self.rayleighs_per_dn_per_s = Some(factor);
        self
    }

    /// Device this record calibrates.
    pub fn device_uid(&self) -> &str {
        &self.device_uid
    }

    /// True when `timestamp` falls inside the validity window.
    pub fn covers(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.valid_from
            && self.valid_until.map(|until| timestamp < until).unwrap_or(true)
    }

    /// Apply the correction to one frame, producing a corrected frame of
    /// identical shape with `f32` values.
    pub fn apply(&self, frame: &Frame, header: &FrameHeader) -> Result<Frame, CalibrationError> {
        if self.device_uid != header.device_uid {
            return Err(CalibrationError::DeviceMismatch {
                calibration: self.device_uid.clone(),
                frame: header.device_uid.clone(),
            });
        }
        if frame.channels != 1 || (frame.width, frame.height) != (self.width, self.height) {
            return Err(CalibrationError::ShapeMismatch {
                calibration: (self.width, self.height),
                frame: (
                    frame.width.saturating_mul(frame.channels),
                    frame.height,
                ),
            });
        }
        if !self.covers(frame.timestamp) {
            return Err(CalibrationError::OutsideValidity {
                timestamp: frame.timestamp,
            });
        }

        // zero exposure leaves counts flat-fielded but unscaled
        let scale = match self.rayleighs_per_dn_per_s {
            Some(factor) if header.exposure_us > 0 => {
                factor / header.exposure_seconds() as f32
            }
            _ => 1.0,
        };

        let corrected: Vec<f32> = match &frame.pixels {
            PixelData::U16(values) => values
                .iter()
                .zip(&self.flat_field)
                .map(|(v, ff)| *v as f32 * ff * scale)
                .collect(),
            PixelData::F32(values) => values
                .iter()
                .zip(&self.flat_field)
                .map(|(v, ff)| v * ff * scale)
                .collect(),
        };

        Ok(Frame {
            pixels: PixelData::F32(corrected),
            ..frame.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::InstrumentFormat;
    use chrono::TimeZone;

    fn header() -> FrameHeader {
        FrameHeader {
            format: InstrumentFormat::ThemisAsi,
            site_uid: "gill".to_string(),
            device_uid: "t05".to_string(),
            start_time: Utc.with_ymd_and_hms(2021, 11, 4, 6, 0, 0).unwrap(),
            width: 2,
            height: 2,
            declared_frame_count: 1,
            exposure_us: 2_000_000,
            cadence_ms: 3_000,
            wavelength_start_nm: None,
            wavelength_step_nm: None,
            observing_frequency_mhz: None,
        }
    }

    fn frame(timestamp: DateTime<Utc>) -> Frame {
        Frame {
            file_index: 0,
            index: 0,
            timestamp,
            width: 2,
            height: 2,
            channels: 1,
            pixels: PixelData::U16(vec![100, 200, 300, 400]),
        }
    }

    fn calibration() -> CalibrationData {
        CalibrationData::new(
            "T05",
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            None,
            2,
            2,
            vec![1.0, 2.0, 0.5, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn flat_field_multiplies_per_pixel() {
        let h = header();
        let corrected = calibration().apply(&frame(h.start_time), &h).unwrap();
        assert_eq!(
            corrected.pixels,
            PixelData::F32(vec![100.0, 400.0, 150.0, 400.0])
        );
        assert_eq!((corrected.width, corrected.height), (2, 2));
    }

    #[test]
    fn rayleighs_factor_scales_by_exposure() {
        let h = header();
        let cal = calibration().with_rayleighs(10.0);
        let corrected = cal.apply(&frame(h.start_time), &h).unwrap();
        // 2 s exposure: factor 10 / 2 = 5x on top of the flat field
        assert_eq!(
            corrected.pixels,
            PixelData::F32(vec![500.0, 2000.0, 750.0, 2000.0])
        );
    }

    #[test]
    fn device_mismatch_is_an_error() {
        let mut h = header();
        h.device_uid = "t09".to_string();
        let err = calibration().apply(&frame(h.start_time), &h).unwrap_err();
        assert!(matches!(err, CalibrationError::DeviceMismatch { .. }));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let h = header();
        let mut f = frame(h.start_time);
        f.width = 4;
        f.height = 1;
        let err = calibration().apply(&f, &h).unwrap_err();
        assert!(matches!(err, CalibrationError::ShapeMismatch { .. }));
    }

    #[test]
    fn expired_window_is_an_error() {
        let h = header();
        let cal = CalibrationData::new(
            "t05",
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            2,
            2,
            vec![1.0; 4],
        )
        .unwrap();
        let err = cal.apply(&frame(h.start_time), &h).unwrap_err();
        assert!(matches!(err, CalibrationError::OutsideValidity { .. }));
    }

    #[test]
    fn flat_field_length_is_validated_on_construction() {
        let err = CalibrationData::new(
            "t05",
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            None,
            2,
            2,
            vec![1.0; 3],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::BadFlatField { expected: 4, got: 3 }
        ));
    }
}
