//! Time-range filtering.
//!
//! A [`TimeRange`] restricts which frames are materialized: inclusive start,
//! exclusive end, either bound optional. It is consulted twice — once at
//! header level, so files entirely outside the window are skipped before any
//! frame extraction, and again per frame for files that straddle a bound.
//! Filtering never fails and a dropped frame is not a decode failure.

use chrono::{DateTime, Duration, Utc};

use crate::header::FrameHeader;

/// An `[start, end)` timestamp window; unset bounds mean unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Window with the given bounds; `None` means unbounded on that side.
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        TimeRange { start, end }
    }

    /// Window that keeps everything.
    pub fn unbounded() -> Self {
        TimeRange::default()
    }

    /// True when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Inclusive lower bound, if any.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Exclusive upper bound, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Keep/drop decision for one frame timestamp.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp >= end {
                return false;
            }
        }
        true
    }

    /// Header-level prefilter: true when no frame of the file can fall
    /// inside the window, so extraction can be skipped entirely.
    ///
    /// Frame timestamp offsets are bounded by the file's nominal span; one
    /// extra cadence of slop keeps the check conservative, and the per-frame
    /// filter remains authoritative for files that overlap a bound.
    pub fn excludes_file(&self, header: &FrameHeader, frame_count: usize) -> bool {
        if let Some(end) = self.end {
            // offsets never go backwards, so every frame is >= start_time
            if header.start_time >= end {
                return true;
            }
        }
        if let Some(start) = self.start {
            if frame_count > 0 && header.cadence_ms > 0 {
                let last = header
                    .nominal_end_time(frame_count)
                    .and_then(|end| {
                        end.checked_add_signed(Duration::milliseconds(header.cadence_ms as i64))
                    });
                // an unrepresentable span never prefilters; per-frame
                // filtering stays authoritative
                if let Some(last) = last {
                    if last < start {
                        return true;
                    }
                }
            }
        }
        false
    }
}
