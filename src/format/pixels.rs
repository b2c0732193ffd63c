//! Pixel types and plane transcoding.
//!
//! A decoded plane is held as a [`PlaneBuffer`]: an `ndarray::Array3` shaped
//! `(height, width, samples)` tagged with its element type. The helpers in
//! this module move planes between the TIFF codec and that representation
//! by dispatching on the element type. They never resize, reshape or
//! rescale; a buffer that disagrees with its declared shape is an error.

use std::fmt;
use std::io::{Read, Seek, Write};
use std::str::FromStr;

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::CodecError;

// =============================================================================
// Pixel Type
// =============================================================================

/// Element type of a plane's samples.
///
/// This is a closed set; anything else (bit, complex, 64-bit integers)
/// is rejected with [`CodecError::UnsupportedPixelType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    #[serde(rename = "int8")]
    Int8,
    #[serde(rename = "int16")]
    Int16,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "uint8")]
    Uint8,
    #[serde(rename = "uint16")]
    Uint16,
    #[serde(rename = "uint32")]
    Uint32,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
}

impl PixelType {
    /// All supported pixel types.
    pub const ALL: [PixelType; 8] = [
        PixelType::Int8,
        PixelType::Int16,
        PixelType::Int32,
        PixelType::Uint8,
        PixelType::Uint16,
        PixelType::Uint32,
        PixelType::Float,
        PixelType::Double,
    ];

    /// OME-XML name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Int16 => "int16",
            PixelType::Int32 => "int32",
            PixelType::Uint8 => "uint8",
            PixelType::Uint16 => "uint16",
            PixelType::Uint32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }

    /// Bits per sample.
    pub fn bits(&self) -> u8 {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 8,
            PixelType::Int16 | PixelType::Uint16 => 16,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 32,
            PixelType::Double => 64,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| CodecError::UnsupportedPixelType(s.to_string()))
    }
}

// =============================================================================
// Plane Buffer
// =============================================================================

/// One decoded plane, shaped `(height, width, samples)`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaneBuffer {
    Int8(Array3<i8>),
    Int16(Array3<i16>),
    Int32(Array3<i32>),
    Uint8(Array3<u8>),
    Uint16(Array3<u16>),
    Uint32(Array3<u32>),
    Float(Array3<f32>),
    Double(Array3<f64>),
}

/// Evaluate `$body` with `$array` bound to the inner array of any variant.
macro_rules! with_array {
    ($plane:expr, $array:ident => $body:expr) => {
        match $plane {
            PlaneBuffer::Int8($array) => $body,
            PlaneBuffer::Int16($array) => $body,
            PlaneBuffer::Int32($array) => $body,
            PlaneBuffer::Uint8($array) => $body,
            PlaneBuffer::Uint16($array) => $body,
            PlaneBuffer::Uint32($array) => $body,
            PlaneBuffer::Float($array) => $body,
            PlaneBuffer::Double($array) => $body,
        }
    };
}

impl PlaneBuffer {
    /// A zero-filled plane.
    pub fn zeros(pixel_type: PixelType, height: usize, width: usize, samples: usize) -> Self {
        let shape = (height, width, samples);
        match pixel_type {
            PixelType::Int8 => PlaneBuffer::Int8(Array3::zeros(shape)),
            PixelType::Int16 => PlaneBuffer::Int16(Array3::zeros(shape)),
            PixelType::Int32 => PlaneBuffer::Int32(Array3::zeros(shape)),
            PixelType::Uint8 => PlaneBuffer::Uint8(Array3::zeros(shape)),
            PixelType::Uint16 => PlaneBuffer::Uint16(Array3::zeros(shape)),
            PixelType::Uint32 => PlaneBuffer::Uint32(Array3::zeros(shape)),
            PixelType::Float => PlaneBuffer::Float(Array3::zeros(shape)),
            PixelType::Double => PlaneBuffer::Double(Array3::zeros(shape)),
        }
    }

    /// Element type of the plane.
    pub fn pixel_type(&self) -> PixelType {
        match self {
            PlaneBuffer::Int8(_) => PixelType::Int8,
            PlaneBuffer::Int16(_) => PixelType::Int16,
            PlaneBuffer::Int32(_) => PixelType::Int32,
            PlaneBuffer::Uint8(_) => PixelType::Uint8,
            PlaneBuffer::Uint16(_) => PixelType::Uint16,
            PlaneBuffer::Uint32(_) => PixelType::Uint32,
            PlaneBuffer::Float(_) => PixelType::Float,
            PlaneBuffer::Double(_) => PixelType::Double,
        }
    }

    /// `(height, width, samples)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        with_array!(self, array => array.dim())
    }

    pub fn height(&self) -> usize {
        self.dim().0
    }

    pub fn width(&self) -> usize {
        self.dim().1
    }

    pub fn samples(&self) -> usize {
        self.dim().2
    }

    /// True if the plane holds no pixels.
    pub fn is_empty(&self) -> bool {
        with_array!(self, array => array.is_empty())
    }

    /// Build a plane from a decoded buffer.
    ///
    /// 64-bit integer and other sample formats outside [`PixelType`] are
    /// rejected.
    pub fn from_decoding(
        result: DecodingResult,
        height: usize,
        width: usize,
        samples: usize,
    ) -> Result<Self, CodecError> {
        let shape = (height, width, samples);
        let plane = match result {
            DecodingResult::I8(data) => PlaneBuffer::Int8(shaped(shape, data)?),
            DecodingResult::I16(data) => PlaneBuffer::Int16(shaped(shape, data)?),
            DecodingResult::I32(data) => PlaneBuffer::Int32(shaped(shape, data)?),
            DecodingResult::U8(data) => PlaneBuffer::Uint8(shaped(shape, data)?),
            DecodingResult::U16(data) => PlaneBuffer::Uint16(shaped(shape, data)?),
            DecodingResult::U32(data) => PlaneBuffer::Uint32(shaped(shape, data)?),
            DecodingResult::F32(data) => PlaneBuffer::Float(shaped(shape, data)?),
            DecodingResult::F64(data) => PlaneBuffer::Double(shaped(shape, data)?),
            DecodingResult::I64(_) => {
                return Err(CodecError::UnsupportedPixelType("int64".to_string()))
            }
            DecodingResult::U64(_) => {
                return Err(CodecError::UnsupportedPixelType("uint64".to_string()))
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(CodecError::UnsupportedPixelType(
                    "unknown sample format".to_string(),
                ))
            }
        };
        Ok(plane)
    }
}

fn shaped<T>(shape: (usize, usize, usize), data: Vec<T>) -> Result<Array3<T>, CodecError> {
    let len = data.len();
    Array3::from_shape_vec(shape, data).map_err(|e| CodecError::LayoutMismatch {
        message: format!(
            "decoded {} samples, expected {}x{}x{}: {}",
            len, shape.0, shape.1, shape.2, e
        ),
    })
}

// =============================================================================
// Decoding
// =============================================================================

/// Number of samples per pixel for a decoded color type.
fn samples_of(color: ColorType) -> Result<usize, CodecError> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        other => Err(CodecError::UnsupportedPixelType(format!(
            "color type {:?}",
            other
        ))),
    }
}

/// Decode the image the decoder is currently positioned at.
pub fn decode_plane<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<PlaneBuffer, CodecError> {
    let (width, height) = decoder.dimensions()?;
    let samples = samples_of(decoder.colortype()?)?;
    let result = decoder.read_image()?;
    PlaneBuffer::from_decoding(result, height as usize, width as usize, samples)
}

// =============================================================================
// Encoding
// =============================================================================

/// Append `plane` as the next image of `encoder`.
///
/// If `description` is given it is written as the image's
/// `ImageDescription` tag.
pub fn encode_plane<W, K>(
    encoder: &mut TiffEncoder<W, K>,
    plane: &PlaneBuffer,
    description: Option<&str>,
) -> Result<(), CodecError>
where
    W: Write + Seek,
    K: TiffKind,
{
    let (height, width, samples) = plane.dim();
    let width = u32::try_from(width).map_err(|_| too_large(width))?;
    let height = u32::try_from(height).map_err(|_| too_large(height))?;

    macro_rules! encode_as {
        ($color:ty, $array:expr) => {{
            let data = $array.as_standard_layout();
            let slice = data.as_slice().ok_or_else(|| CodecError::LayoutMismatch {
                message: "plane buffer is not contiguous".to_string(),
            })?;
            write_image::<W, K, $color>(encoder, width, height, slice, description)
        }};
    }

    match (plane, samples) {
        (PlaneBuffer::Uint8(a), 1) => encode_as!(colortype::Gray8, a),
        (PlaneBuffer::Uint8(a), 3) => encode_as!(colortype::RGB8, a),
        (PlaneBuffer::Uint8(a), 4) => encode_as!(colortype::RGBA8, a),
        (PlaneBuffer::Uint16(a), 1) => encode_as!(colortype::Gray16, a),
        (PlaneBuffer::Uint16(a), 3) => encode_as!(colortype::RGB16, a),
        (PlaneBuffer::Uint16(a), 4) => encode_as!(colortype::RGBA16, a),
        (PlaneBuffer::Uint32(a), 1) => encode_as!(colortype::Gray32, a),
        (PlaneBuffer::Int8(a), 1) => encode_as!(colortype::GrayI8, a),
        (PlaneBuffer::Int16(a), 1) => encode_as!(colortype::GrayI16, a),
        (PlaneBuffer::Int32(a), 1) => encode_as!(colortype::GrayI32, a),
        (PlaneBuffer::Float(a), 1) => encode_as!(colortype::Gray32Float, a),
        (PlaneBuffer::Double(a), 1) => encode_as!(colortype::Gray64Float, a),
        (other, samples) => Err(CodecError::UnsupportedSamples {
            pixel_type: other.pixel_type().to_string(),
            samples,
        }),
    }
}

fn write_image<W, K, C>(
    encoder: &mut TiffEncoder<W, K>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    description: Option<&str>,
) -> Result<(), CodecError>
where
    W: Write + Seek,
    K: TiffKind,
    C: colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
{
    let mut image = encoder.new_image::<C>(width, height)?;
    if let Some(description) = description {
        image
            .encoder()
            .write_tag(Tag::ImageDescription, description)?;
    }
    image.write_data(data)?;
    Ok(())
}

fn too_large(extent: usize) -> CodecError {
    CodecError::LayoutMismatch {
        message: format!("plane extent {} exceeds TIFF limits", extent),
    }
}

// =============================================================================
// Tests
// =============================================================================
