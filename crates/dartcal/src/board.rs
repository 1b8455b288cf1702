//! Physical dartboard model.
//!
//! Board space is millimeters with the origin at the bull, `x` to the right
//! and `y` downwards. Angles are measured clockwise from 12 o'clock, so the
//! point at angle `a` and radius `r` is `(r sin a, -r cos a)`.

use dartcal_core::BoardPoint;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Sector numbers clockwise starting at 12 o'clock.
pub const SECTOR_ORDER: [u8; 20] = [
    20, 1, 18, 4, 13, 6, 10, 15, 2, 17, 3, 19, 7, 16, 8, 11, 14, 9, 12, 5,
];

/// Angular width of one sector (18°).
pub const SECTOR_ANGLE: f64 = PI / 10.0;

/// Number of canonical calibration targets.
pub const TARGET_COUNT: usize = 5;

/// Concentric ring radii in millimeters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRadii {
    pub bull_inner: f64,
    pub bull_outer: f64,
    pub treble_inner: f64,
    pub treble_outer: f64,
    pub double_inner: f64,
    pub double_outer: f64,
}

/// Board geometry validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("radii must be finite and positive")]
    NonPositive,
    #[error("radii must be strictly increasing from bull_inner to double_outer")]
    NotIncreasing,
}

/// Scoring ring a board point falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ring {
    InnerBull,
    OuterBull,
    InnerSingle,
    Treble,
    OuterSingle,
    Double,
    Miss,
}

impl BoardRadii {
    /// Regulation board.
    pub const STANDARD: Self = Self {
        bull_inner: 6.35,
        bull_outer: 15.9,
        treble_inner: 99.0,
        treble_outer: 107.0,
        double_inner: 162.0,
        double_outer: 170.0,
    };

    fn as_array(&self) -> [f64; 6] {
        [
            self.bull_inner,
            self.bull_outer,
            self.treble_inner,
            self.treble_outer,
            self.double_inner,
            self.double_outer,
        ]
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        let r = self.as_array();
        if r.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(BoardError::NonPositive);
        }
        if r.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BoardError::NotIncreasing);
        }
        Ok(())
    }

    /// Ring containing a point at `radius_mm` from the center.
    ///
    /// Boundaries belong to the inner ring.
    pub fn ring_at(&self, radius_mm: f64) -> Ring {
        match radius_mm {
            r if r <= self.bull_inner => Ring::InnerBull,
            r if r <= self.bull_outer => Ring::OuterBull,
            r if r < self.treble_inner => Ring::InnerSingle,
            r if r <= self.treble_outer => Ring::Treble,
            r if r < self.double_inner => Ring::OuterSingle,
            r if r <= self.double_outer => Ring::Double,
            _ => Ring::Miss,
        }
    }
}

impl Default for BoardRadii {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Canonical calibration targets, in collection order.
///
/// The four rim targets sit on the outer edge of the double ring at the
/// center of their sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Double 20, 12 o'clock.
    D20,
    /// Double 6, 3 o'clock.
    D6,
    /// Double 3, 6 o'clock.
    D3,
    /// Double 11, 9 o'clock.
    D11,
    Bull,
}

impl Target {
    pub const ALL: [Target; TARGET_COUNT] =
        [Target::D20, Target::D6, Target::D3, Target::D11, Target::Bull];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn is_rim(self) -> bool {
        self != Target::Bull
    }

    /// Sector number for rim targets.
    pub fn sector(self) -> Option<u8> {
        match self {
            Target::D20 => Some(20),
            Target::D6 => Some(6),
            Target::D3 => Some(3),
            Target::D11 => Some(11),
            Target::Bull => None,
        }
    }

    /// Clockwise angle from 12 o'clock of the target's sector center.
    pub fn angle(self) -> Option<f64> {
        let sector = self.sector()?;
        let slot = SECTOR_ORDER.iter().position(|&s| s == sector)?;
        Some(slot as f64 * SECTOR_ANGLE)
    }

    /// Board position of this target.
    pub fn board_point(self, radii: &BoardRadii) -> BoardPoint {
        match self.angle() {
            Some(a) => polar(radii.double_outer, a),
            None => BoardPoint::new(0.0, 0.0),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sector() {
            Some(s) => write!(f, "D{s}"),
            None => f.write_str("Bull"),
        }
    }
}

/// Board point at `radius` and clockwise angle `angle` from 12 o'clock.
#[inline]
pub fn polar(radius: f64, angle: f64) -> BoardPoint {
    BoardPoint::new(radius * angle.sin(), -radius * angle.cos())
}

/// Board positions of all targets, indexed like [`Target::ALL`].
pub fn canonical_targets(radii: &BoardRadii) -> [BoardPoint; TARGET_COUNT] {
    Target::ALL.map(|t| t.board_point(radii))
}
