//! Persisted calibration record and its bounded history.

use dartcal_core::Homography;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Records kept by [`History`].
pub const HISTORY_CAPACITY: usize = 10;

/// A fitted calibration.
///
/// Serializes to plain JSON (nested arrays and numbers, camelCase keys, `H`
/// for the matrix). Once `locked` is set the record is never modified; a new
/// calibration creates a new record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    /// Board millimeters to image pixels.
    #[serde(rename = "H")]
    pub h: Homography,
    /// RMS reprojection error in pixels.
    pub error_px: f64,
    /// Score in `[0, 100]`.
    pub confidence: f64,
    /// Camera frame size `[width, height]` the points were taken in.
    pub image_size: [u32; 2],
    /// Display overlay size `[width, height]`.
    pub overlay_size: [u32; 2],
    /// Board rotation in radians, `(-π, π]`. Set on lock.
    pub theta: f64,
    /// Whole-sector rotation `0..20`. Set on lock.
    pub sector_offset: u8,
    /// Unix time in milliseconds.
    pub created_at: u64,
    pub locked: bool,
}

impl CalibrationRecord {
    /// Whether scoring may use this record outside of live preview.
    pub fn is_active(&self) -> bool {
        self.locked
    }
}

/// Past records, newest first, at most [`HISTORY_CAPACITY`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: VecDeque<CalibrationRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` as the newest entry, evicting the oldest when full.
    pub fn push(&mut self, record: CalibrationRecord) {
        self.records.push_front(record);
        self.records.truncate(HISTORY_CAPACITY);
    }

    /// Entry `index`, `0` being the newest.
    pub fn get(&self, index: usize) -> Option<&CalibrationRecord> {
        self.records.get(index)
    }

    pub fn latest(&self) -> Option<&CalibrationRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationRecord> {
        self.records.iter()
    }

    /// Build from a list read from storage, newest first. Extra entries are
    /// dropped.
    pub fn from_records(records: impl IntoIterator<Item = CalibrationRecord>) -> Self {
        let mut records: VecDeque<_> = records.into_iter().collect();
        records.truncate(HISTORY_CAPACITY);
        Self { records }
    }
}
