//! Per-series plane layout.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::format::{MetadataRetrieve, PixelType, PlaneBuffer};

use super::coordinate::{PlaneCoordinate, SeriesPlanes};

/// Dimensions and pixel encoding of one series.
///
/// `channel_groups` holds the samples-per-pixel of each channel; its length
/// is the effective channel count used for plane addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesLayout {
    /// Series index this layout describes
    pub series: usize,

    /// Plane width in pixels
    pub size_x: usize,

    /// Plane height in pixels
    pub size_y: usize,

    /// Number of depth positions
    pub size_z: usize,

    /// Number of time points
    pub size_t: usize,

    /// Samples per pixel of each channel group
    pub channel_groups: Vec<usize>,

    /// Element type of every sample
    pub pixel_type: PixelType,
}

impl SeriesLayout {
    /// Derive the layout of `series` from container metadata.
    pub fn from_metadata<M: MetadataRetrieve + ?Sized>(
        metadata: &M,
        series: usize,
    ) -> Result<Self, CodecError> {
        let channel_count = metadata.channel_count(series)?;
        let channel_groups = (0..channel_count)
            .map(|channel| metadata.channel_samples_per_pixel(series, channel))
            .collect::<Result<Vec<_>, _>>()?;

        if channel_groups.is_empty() {
            return Err(CodecError::Metadata(format!(
                "series {} declares no channels",
                series
            )));
        }

        Ok(Self {
            series,
            size_x: metadata.pixels_size_x(series)?,
            size_y: metadata.pixels_size_y(series)?,
            size_z: metadata.pixels_size_z(series)?,
            size_t: metadata.pixels_size_t(series)?,
            channel_groups,
            pixel_type: metadata.pixels_type(series)?,
        })
    }

    /// Effective channel count.
    pub fn size_c(&self) -> usize {
        self.channel_groups.len()
    }

    /// Number of planes in the series (`Z * C * T`).
    pub fn plane_count(&self) -> usize {
        self.size_z * self.size_c() * self.size_t
    }

    /// Samples per pixel of channel `c`.
    pub fn samples_per_pixel(&self, c: usize) -> Option<usize> {
        self.channel_groups.get(c).copied()
    }

    /// Exclusive iteration bound `(series, Z, C, T)`.
    pub fn end(&self) -> PlaneCoordinate {
        PlaneCoordinate::new(self.series, self.size_z, self.size_c(), self.size_t)
    }

    /// Whether the coordinate addresses a plane of this series.
    pub fn contains(&self, coordinate: &PlaneCoordinate) -> bool {
        coordinate.series == self.series
            && coordinate.z < self.size_z
            && coordinate.c < self.size_c()
            && coordinate.t < self.size_t
    }

    /// Every plane of the series, Z fastest, then C, then T.
    pub fn planes(&self) -> SeriesPlanes {
        SeriesPlanes::new(self.end())
    }

    /// Verify that `plane` can be stored at channel `c` without conversion.
    ///
    /// Width, height, sample count and element type must all match; planes
    /// are never resized or rescaled.
    pub fn check_plane(&self, c: usize, plane: &PlaneBuffer) -> Result<(), CodecError> {
        let samples = self.samples_per_pixel(c).ok_or_else(|| CodecError::LayoutMismatch {
            message: format!("channel {} does not exist in series {}", c, self.series),
        })?;

        if plane.pixel_type() != self.pixel_type {
            return Err(CodecError::LayoutMismatch {
                message: format!(
                    "pixel type {} differs from series type {}",
                    plane.pixel_type(),
                    self.pixel_type
                ),
            });
        }

        if plane.width() != self.size_x || plane.height() != self.size_y {
            return Err(CodecError::LayoutMismatch {
                message: format!(
                    "plane is {}x{}, series {} is {}x{}",
                    plane.width(),
                    plane.height(),
                    self.series,
                    self.size_x,
                    self.size_y
                ),
            });
        }

        if plane.samples() != samples {
            return Err(CodecError::LayoutMismatch {
                message: format!(
                    "plane has {} samples per pixel, channel {} has {}",
                    plane.samples(),
                    c,
                    samples
                ),
            });
        }

        Ok(())
    }

    /// A zero-filled plane for channel `c`.
    pub fn zero_plane(&self, c: usize) -> PlaneBuffer {
        let samples = self.samples_per_pixel(c).unwrap_or(1);
        PlaneBuffer::zeros(self.pixel_type, self.size_y, self.size_x, samples)
    }
}
