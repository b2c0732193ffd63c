//! Plane coordinates within an OME-TIFF container.
//!
//! A [`PlaneCoordinate`] addresses one 2D plane by `(series, z, c, t)`.
//! Coordinates are ordered the way planes are laid out on disk: by series,
//! then time, then channel, then depth, so iterating a sorted collection of
//! coordinates visits planes in container order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlaneIoError;

use super::layout::SeriesLayout;

// =============================================================================
// PlaneCoordinate
// =============================================================================

/// Location of a single plane: series index plus Z/C/T position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneCoordinate {
    /// Series (image) the plane belongs to
    pub series: usize,

    /// Depth position
    pub z: usize,

    /// Channel position (channel group, not sample)
    pub c: usize,

    /// Time position
    pub t: usize,
}

impl PlaneCoordinate {
    /// Create a coordinate from its four components.
    pub const fn new(series: usize, z: usize, c: usize, t: usize) -> Self {
        Self { series, z, c, t }
    }

    /// The first plane of a series.
    pub const fn series_start(series: usize) -> Self {
        Self::new(series, 0, 0, 0)
    }

    /// Native linear plane index of this coordinate within a series.
    ///
    /// Planes are stored in XYZCT order, so the index is
    /// `z + Z * (c + C * t)`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaneIoError::SeriesMismatch`] if `layout` describes a
    /// different series, and [`PlaneIoError::PlaneOutOfRange`] if the
    /// coordinate lies outside the series' Z/C/T box.
    pub fn index_within(&self, layout: &SeriesLayout) -> Result<usize, PlaneIoError> {
        if layout.series != self.series {
            return Err(PlaneIoError::SeriesMismatch {
                expected: layout.series,
                actual: self.series,
            });
        }
        if !layout.contains(self) {
            return Err(PlaneIoError::PlaneOutOfRange {
                coordinate: *self,
                size_z: layout.size_z,
                size_c: layout.size_c(),
                size_t: layout.size_t,
            });
        }
        Ok(self.z + layout.size_z * (self.c + layout.size_c() * self.t))
    }

    /// Advance to the next plane of the series bounded by `end`.
    ///
    /// Z moves fastest, then C, then T. Once the last plane is passed the
    /// result saturates at `end`.
    pub fn increment_in_series(&self, end: &PlaneCoordinate) -> PlaneCoordinate {
        if self.t >= end.t || end.z == 0 || end.c == 0 {
            return *end;
        }

        let mut next = *self;
        next.z += 1;
        if next.z >= end.z {
            next.z = 0;
            next.c += 1;
            if next.c >= end.c {
                next.c = 0;
                next.t += 1;
                if next.t >= end.t {
                    return *end;
                }
            }
        }
        next
    }
}

impl Ord for PlaneCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.series, self.t, self.c, self.z).cmp(&(other.series, other.t, other.c, other.z))
    }
}

impl PartialOrd for PlaneCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PlaneCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}_Z{}_C{}_T{}", self.series, self.z, self.c, self.t)
    }
}

impl FromStr for PlaneCoordinate {
    type Err = String;

    /// Parse the canonical `S<series>_Z<z>_C<c>_T<t>` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let mut component = |prefix: char| -> Result<usize, String> {
            let part = parts
                .next()
                .ok_or_else(|| format!("missing {} component in '{}'", prefix, s))?;
            let digits = part
                .strip_prefix(prefix)
                .ok_or_else(|| format!("expected '{}' prefix in '{}'", prefix, part))?;
            digits
                .parse::<usize>()
                .map_err(|e| format!("invalid {} component '{}': {}", prefix, digits, e))
        };

        let series = component('S')?;
        let z = component('Z')?;
        let c = component('C')?;
        let t = component('T')?;

        if parts.next().is_some() {
            return Err(format!("trailing components in '{}'", s));
        }

        Ok(Self::new(series, z, c, t))
    }
}

// =============================================================================
// Series Enumeration
// =============================================================================

/// Iterator over every plane of one series in canonical order.
///
/// Created by [`SeriesLayout::planes`].
#[derive(Debug, Clone)]
pub struct SeriesPlanes {
    next: Option<PlaneCoordinate>,
    end: PlaneCoordinate,
}

impl SeriesPlanes {
    pub(crate) fn new(end: PlaneCoordinate) -> Self {
        let empty = end.z == 0 || end.c == 0 || end.t == 0;
        Self {
            next: (!empty).then(|| PlaneCoordinate::series_start(end.series)),
            end,
        }
    }
}

impl Iterator for SeriesPlanes {
    type Item = PlaneCoordinate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let following = current.increment_in_series(&self.end);
        self.next = (following != self.end).then_some(following);
        Some(current)
    }
}

// =============================================================================
// Tests
// =============================================================================
