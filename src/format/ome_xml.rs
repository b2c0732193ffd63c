//! OME-XML metadata embedded in the container.
//!
//! The first IFD of an OME-TIFF carries an XML document in its
//! `ImageDescription` tag describing every series: plane size, Z/C/T
//! extents, channel sample counts and pixel type. This module models the
//! subset of that document the coordinator needs, (de)serialized with
//! serde + quick-xml. Unknown elements and attributes are ignored on read.
//!
//! Accessors follow the metadata-store naming of the OME data model via the
//! [`MetadataRetrieve`] trait; the `set_*` mutators on [`OmeMetadata`] are
//! used when describing a brand-new container.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

use super::pixels::{PixelType, PlaneBuffer};

/// OME XML namespace written into new containers.
pub const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// The only dimension order this crate reads or writes.
pub const DIMENSION_ORDER: &str = "XYZCT";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

// =============================================================================
// Metadata Retrieval
// =============================================================================

/// Read access to container metadata, one series ("image") at a time.
pub trait MetadataRetrieve {
    /// Number of series in the container.
    fn image_count(&self) -> usize;

    /// Plane width of a series.
    fn pixels_size_x(&self, series: usize) -> Result<usize, CodecError>;

    /// Plane height of a series.
    fn pixels_size_y(&self, series: usize) -> Result<usize, CodecError>;

    /// Number of depth positions.
    fn pixels_size_z(&self, series: usize) -> Result<usize, CodecError>;

    /// Number of time points.
    fn pixels_size_t(&self, series: usize) -> Result<usize, CodecError>;

    /// Effective channel count (channel groups, not samples).
    fn channel_count(&self, series: usize) -> Result<usize, CodecError>;

    /// Samples per pixel of one channel.
    fn channel_samples_per_pixel(&self, series: usize, channel: usize)
        -> Result<usize, CodecError>;

    /// Pixel element type of a series.
    fn pixels_type(&self, series: usize) -> Result<PixelType, CodecError>;

    /// Dimension order string, e.g. `XYZCT`.
    fn dimension_order(&self, series: usize) -> Result<String, CodecError>;
}

// =============================================================================
// Document Model
// =============================================================================

/// Root `OME` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "OME")]
pub struct OmeMetadata {
    #[serde(rename = "@xmlns", default = "default_namespace")]
    namespace: String,

    #[serde(rename = "Image", default)]
    images: Vec<ImageMetadata>,
}

/// One `Image` element (a series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(rename = "@ID", default)]
    pub id: String,

    #[serde(rename = "@Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "Pixels")]
    pub pixels: PixelsMetadata,
}

/// The `Pixels` element of an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelsMetadata {
    #[serde(rename = "@ID", default)]
    pub id: String,

    #[serde(rename = "@DimensionOrder")]
    pub dimension_order: String,

    #[serde(rename = "@Type")]
    pub pixel_type: String,

    #[serde(rename = "@SizeX")]
    pub size_x: usize,

    #[serde(rename = "@SizeY")]
    pub size_y: usize,

    #[serde(rename = "@SizeZ")]
    pub size_z: usize,

    #[serde(rename = "@SizeC")]
    pub size_c: usize,

    #[serde(rename = "@SizeT")]
    pub size_t: usize,

    #[serde(rename = "@PhysicalSizeX", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_x: Option<f64>,

    #[serde(rename = "@PhysicalSizeXUnit", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_x_unit: Option<String>,

    #[serde(rename = "@PhysicalSizeY", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_y: Option<f64>,

    #[serde(rename = "@PhysicalSizeYUnit", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_y_unit: Option<String>,

    #[serde(rename = "@PhysicalSizeZ", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_z: Option<f64>,

    #[serde(rename = "@PhysicalSizeZUnit", default, skip_serializing_if = "Option::is_none")]
    pub physical_size_z_unit: Option<String>,

    #[serde(rename = "Channel", default)]
    pub channels: Vec<ChannelMetadata>,

    #[serde(rename = "TiffData", default)]
    pub tiff_data: Vec<TiffDataMetadata>,
}

/// One `Channel` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    #[serde(rename = "@ID", default)]
    pub id: String,

    #[serde(rename = "@Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "@SamplesPerPixel", default = "one")]
    pub samples_per_pixel: usize,
}

/// A `TiffData` block mapping IFDs to planes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiffDataMetadata {
    #[serde(rename = "@IFD", default)]
    pub ifd: usize,

    #[serde(rename = "@PlaneCount", default, skip_serializing_if = "Option::is_none")]
    pub plane_count: Option<usize>,

    #[serde(rename = "@FirstZ", default, skip_serializing_if = "Option::is_none")]
    pub first_z: Option<usize>,

    #[serde(rename = "@FirstC", default, skip_serializing_if = "Option::is_none")]
    pub first_c: Option<usize>,

    #[serde(rename = "@FirstT", default, skip_serializing_if = "Option::is_none")]
    pub first_t: Option<usize>,
}

fn default_namespace() -> String {
    OME_NAMESPACE.to_string()
}

fn one() -> usize {
    1
}

/// Replace non-ASCII characters with numeric character references.
///
/// `ImageDescription` is an ASCII tag; units such as `µm` must survive it.
fn escape_non_ascii(xml: &str) -> String {
    let mut escaped = String::with_capacity(xml.len());
    for ch in xml.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            escaped.push_str(&format!("&#{};", ch as u32));
        }
    }
    escaped
}

impl ChannelMetadata {
    fn with_samples(samples_per_pixel: usize) -> Self {
        Self {
            id: String::new(),
            name: None,
            samples_per_pixel,
        }
    }
}

// =============================================================================
// OmeMetadata
// =============================================================================

impl OmeMetadata {
    /// Empty document with no series.
    pub fn new() -> Self {
        Self {
            namespace: default_namespace(),
            images: Vec::new(),
        }
    }

    /// Metadata for a new container whose series all share the shape and
    /// pixel type of `plane`.
    ///
    /// Each of the `num_series` series gets `size_z` depth positions, one
    /// time point and a single channel holding the plane's samples.
    pub fn from_plane(plane: &PlaneBuffer, size_z: usize, num_series: usize) -> Self {
        let mut metadata = Self::new();
        for _ in 0..num_series {
            let series = metadata.add_image(plane.width(), plane.height(), plane.pixel_type());
            let pixels = &mut metadata.images[series].pixels;
            pixels.size_z = size_z;
            pixels.channels = vec![ChannelMetadata::with_samples(plane.samples())];
        }
        metadata
    }

    /// Parse an OME-XML document.
    ///
    /// Images without `Channel` elements get `SizeC` single-sample channels.
    pub fn from_xml(xml: &str) -> Result<Self, CodecError> {
        let mut metadata: OmeMetadata =
            quick_xml::de::from_str(xml).map_err(|e| CodecError::Metadata(e.to_string()))?;

        for image in &mut metadata.images {
            let pixels = &mut image.pixels;
            if pixels.channels.is_empty() {
                pixels.channels = (0..pixels.size_c.max(1))
                    .map(|_| ChannelMetadata::with_samples(1))
                    .collect();
            }
        }

        Ok(metadata)
    }

    /// Serialize for embedding in a container written in XYZCT order.
    ///
    /// IDs, `SizeC` and `TiffData` blocks are regenerated so that series `s`
    /// starts at the IFD following every plane of series `0..s`.
    pub fn to_container_xml(&self) -> Result<String, CodecError> {
        let mut document = self.clone();
        let mut ifd = 0;

        for (index, image) in document.images.iter_mut().enumerate() {
            image.id = format!("Image:{}", index);
            let pixels = &mut image.pixels;
            pixels.id = format!("Pixels:{}", index);
            pixels.dimension_order = DIMENSION_ORDER.to_string();
            pixels.size_c = pixels.channels.iter().map(|c| c.samples_per_pixel).sum();

            for (channel_index, channel) in pixels.channels.iter_mut().enumerate() {
                channel.id = format!("Channel:{}:{}", index, channel_index);
            }

            let plane_count = pixels.size_z * pixels.channels.len() * pixels.size_t;
            pixels.tiff_data = vec![TiffDataMetadata {
                ifd,
                plane_count: Some(plane_count),
                first_z: None,
                first_c: None,
                first_t: None,
            }];
            ifd += plane_count;
        }

        let body =
            quick_xml::se::to_string(&document).map_err(|e| CodecError::Metadata(e.to_string()))?;
        Ok(format!("{}{}", XML_DECLARATION, escape_non_ascii(&body)))
    }

    /// Check that every series can be addressed by this crate's reader.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.images.is_empty() {
            return Err(CodecError::Metadata("document contains no images".to_string()));
        }

        for (series, image) in self.images.iter().enumerate() {
            let order = self.dimension_order(series)?;
            if order != DIMENSION_ORDER {
                return Err(CodecError::UnsupportedDimensionOrder(order));
            }
            let pixels = &image.pixels;
            if pixels.size_x == 0 || pixels.size_y == 0 {
                return Err(CodecError::Metadata(format!(
                    "series {} has empty planes ({}x{})",
                    series, pixels.size_x, pixels.size_y
                )));
            }
            self.pixels_type(series)?;
        }

        Ok(())
    }

    /// Check that every `TiffData` block stores its planes where the reader
    /// looks for them: the series offset plus the plane's XYZCT index.
    ///
    /// Series without `TiffData` are assumed to be stored contiguously.
    pub fn check_plane_mapping(&self) -> Result<(), CodecError> {
        let offsets = self.series_offsets();
        for (series, (image, offset)) in self.images.iter().zip(offsets).enumerate() {
            let pixels = &image.pixels;
            let size_c = pixels.channels.len();
            let plane_count = pixels.size_z * size_c * pixels.size_t;

            for block in &pixels.tiff_data {
                let (z, c, t) = (
                    block.first_z.unwrap_or(0),
                    block.first_c.unwrap_or(0),
                    block.first_t.unwrap_or(0),
                );
                let start = z + pixels.size_z * (c + size_c * t);
                let count = block.plane_count.unwrap_or(1);

                let in_range = z < pixels.size_z && c < size_c && t < pixels.size_t;
                if !in_range || start + count > plane_count || block.ifd != offset + start {
                    return Err(CodecError::Metadata(format!(
                        "series {} stores planes outside XYZCT order (TiffData IFD={} at Z={} C={} T={})",
                        series, block.ifd, z, c, t
                    )));
                }
            }
        }
        Ok(())
    }

    /// Linear index of the first plane of each series.
    pub fn series_offsets(&self) -> Vec<usize> {
        self.images
            .iter()
            .scan(0, |offset, image| {
                let start = *offset;
                let pixels = &image.pixels;
                *offset += pixels.size_z * pixels.channels.len() * pixels.size_t;
                Some(start)
            })
            .collect()
    }

    /// All series descriptions.
    pub fn images(&self) -> &[ImageMetadata] {
        &self.images
    }

    fn image(&self, series: usize) -> Result<&ImageMetadata, CodecError> {
        self.images
            .get(series)
            .ok_or_else(|| CodecError::Metadata(format!("no image with index {}", series)))
    }

    fn pixels_mut(&mut self, series: usize) -> Result<&mut PixelsMetadata, CodecError> {
        self.images
            .get_mut(series)
            .map(|image| &mut image.pixels)
            .ok_or_else(|| CodecError::Metadata(format!("no image with index {}", series)))
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Append a series with one single-sample channel, `Z = T = 1`.
    ///
    /// Returns the new series index.
    pub fn add_image(&mut self, size_x: usize, size_y: usize, pixel_type: PixelType) -> usize {
        let index = self.images.len();
        self.images.push(ImageMetadata {
            id: format!("Image:{}", index),
            name: None,
            pixels: PixelsMetadata {
                id: format!("Pixels:{}", index),
                dimension_order: DIMENSION_ORDER.to_string(),
                pixel_type: pixel_type.as_str().to_string(),
                size_x,
                size_y,
                size_z: 1,
                size_c: 1,
                size_t: 1,
                physical_size_x: None,
                physical_size_x_unit: None,
                physical_size_y: None,
                physical_size_y_unit: None,
                physical_size_z: None,
                physical_size_z_unit: None,
                channels: vec![ChannelMetadata::with_samples(1)],
                tiff_data: Vec::new(),
            },
        });
        index
    }

    pub fn set_image_name(&mut self, series: usize, name: impl Into<String>) -> Result<(), CodecError> {
        let image = self
            .images
            .get_mut(series)
            .ok_or_else(|| CodecError::Metadata(format!("no image with index {}", series)))?;
        image.name = Some(name.into());
        Ok(())
    }

    pub fn set_pixels_size_x(&mut self, series: usize, size: usize) -> Result<(), CodecError> {
        self.pixels_mut(series)?.size_x = size;
        Ok(())
    }

    pub fn set_pixels_size_y(&mut self, series: usize, size: usize) -> Result<(), CodecError> {
        self.pixels_mut(series)?.size_y = size;
        Ok(())
    }

    pub fn set_pixels_size_z(&mut self, series: usize, size: usize) -> Result<(), CodecError> {
        self.pixels_mut(series)?.size_z = size;
        Ok(())
    }

    pub fn set_pixels_size_t(&mut self, series: usize, size: usize) -> Result<(), CodecError> {
        self.pixels_mut(series)?.size_t = size;
        Ok(())
    }

    pub fn set_pixels_type(&mut self, series: usize, pixel_type: PixelType) -> Result<(), CodecError> {
        self.pixels_mut(series)?.pixel_type = pixel_type.as_str().to_string();
        Ok(())
    }

    /// Resize the channel list; added channels hold one sample per pixel.
    pub fn set_channel_count(&mut self, series: usize, count: usize) -> Result<(), CodecError> {
        let pixels = self.pixels_mut(series)?;
        pixels
            .channels
            .resize_with(count, || ChannelMetadata::with_samples(1));
        pixels.size_c = pixels.channels.iter().map(|c| c.samples_per_pixel).sum();
        Ok(())
    }

    pub fn set_channel_samples_per_pixel(
        &mut self,
        series: usize,
        channel: usize,
        samples: usize,
    ) -> Result<(), CodecError> {
        let pixels = self.pixels_mut(series)?;
        let entry = pixels
            .channels
            .get_mut(channel)
            .ok_or_else(|| CodecError::Metadata(format!("no channel {} in image {}", channel, series)))?;
        entry.samples_per_pixel = samples;
        pixels.size_c = pixels.channels.iter().map(|c| c.samples_per_pixel).sum();
        Ok(())
    }

    pub fn set_channel_name(
        &mut self,
        series: usize,
        channel: usize,
        name: impl Into<String>,
    ) -> Result<(), CodecError> {
        let entry = self
            .pixels_mut(series)?
            .channels
            .get_mut(channel)
            .ok_or_else(|| CodecError::Metadata(format!("no channel {} in image {}", channel, series)))?;
        entry.name = Some(name.into());
        Ok(())
    }

    /// Set the voxel size of a series in micrometers.
    pub fn set_physical_size(
        &mut self,
        series: usize,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    ) -> Result<(), CodecError> {
        let pixels = self.pixels_mut(series)?;
        let unit = |value: Option<f64>| value.map(|_| "µm".to_string());
        pixels.physical_size_x_unit = unit(x);
        pixels.physical_size_y_unit = unit(y);
        pixels.physical_size_z_unit = unit(z);
        pixels.physical_size_x = x;
        pixels.physical_size_y = y;
        pixels.physical_size_z = z;
        Ok(())
    }
}

impl Default for OmeMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataRetrieve for OmeMetadata {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn pixels_size_x(&self, series: usize) -> Result<usize, CodecError> {
        Ok(self.image(series)?.pixels.size_x)
    }

    fn pixels_size_y(&self, series: usize) -> Result<usize, CodecError> {
        Ok(self.image(series)?.pixels.size_y)
    }

    fn pixels_size_z(&self, series: usize) -> Result<usize, CodecError> {
        Ok(self.image(series)?.pixels.size_z)
    }

    fn pixels_size_t(&self, series: usize) -> Result<usize, CodecError> {
        Ok(self.image(series)?.pixels.size_t)
    }

    fn channel_count(&self, series: usize) -> Result<usize, CodecError> {
        Ok(self.image(series)?.pixels.channels.len())
    }

    fn channel_samples_per_pixel(
        &self,
        series: usize,
        channel: usize,
    ) -> Result<usize, CodecError> {
        self.image(series)?
            .pixels
            .channels
            .get(channel)
            .map(|c| c.samples_per_pixel)
            .ok_or_else(|| CodecError::Metadata(format!("no channel {} in image {}", channel, series)))
    }

    fn pixels_type(&self, series: usize) -> Result<PixelType, CodecError> {
        self.image(series)?.pixels.pixel_type.parse()
    }

    fn dimension_order(&self, series: usize) -> Result<String, CodecError> {
        Ok(self.image(series)?.pixels.dimension_order.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
