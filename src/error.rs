use std::path::PathBuf;

use thiserror::Error;

use crate::plane::PlaneCoordinate;

/// Errors reported by the OME-TIFF codec layer.
///
/// These cover malformed containers, metadata that cannot be parsed, and
/// pixel encodings outside the supported set.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Error from the underlying TIFF encoder or decoder
    #[error("TIFF error: {0}")]
    Tiff(String),

    /// OME-XML metadata is missing or malformed
    #[error("Invalid OME metadata: {0}")]
    Metadata(String),

    /// Pixel element type outside the supported closed set
    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    /// Samples-per-pixel count the codec cannot express for this element type
    #[error("Unsupported sample count {samples} for pixel type {pixel_type}")]
    UnsupportedSamples { pixel_type: String, samples: usize },

    /// Dimension order other than XYZCT
    #[error("Unsupported dimension order: {0} (only XYZCT is supported)")]
    UnsupportedDimensionOrder(String),

    /// Decoded or supplied plane disagrees with the series layout
    #[error("Plane does not match series layout: {message}")]
    LayoutMismatch { message: String },
}

impl From<tiff::TiffError> for CodecError {
    fn from(err: tiff::TiffError) -> Self {
        CodecError::Tiff(err.to_string())
    }
}

/// Errors raised by the container I/O coordinator.
#[derive(Debug, Error)]
pub enum PlaneIoError {
    /// Attempted to write a plane with no pixels
    #[error("Cannot write an empty plane to {coordinate}")]
    EmptyPlane { coordinate: PlaneCoordinate },

    /// Only series 0 is supported for plane reads and writes
    #[error("Only series 0 is currently supported, got series {series}")]
    UnsupportedSeries { series: usize },

    /// Coordinate addresses a different series than the one selected
    #[error("Coordinate series {actual} does not match selected series {expected}")]
    SeriesMismatch { expected: usize, actual: usize },

    /// Coordinate lies outside the series' Z/C/T box
    #[error("Plane {coordinate} is out of range (Z={size_z}, C={size_c}, T={size_t})")]
    PlaneOutOfRange {
        coordinate: PlaneCoordinate,
        size_z: usize,
        size_c: usize,
        size_t: usize,
    },

    /// Container does not exist on disk
    #[error("Cannot read from non-existing file {0}")]
    NotFound(PathBuf),

    /// Writing a new container requires metadata describing it
    #[error("No metadata available to create {0}")]
    MissingMetadata(PathBuf),

    /// Metadata was requested while only staged planes exist
    #[error("Staged planes exist for {0}, but no metadata is set")]
    MetadataUnavailable(PathBuf),

    /// Filesystem error during open, staging or merge
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reported by the codec
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl PlaneIoError {
    /// Attach a path to a raw filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlaneIoError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tiff::TiffError> for PlaneIoError {
    fn from(err: tiff::TiffError) -> Self {
        PlaneIoError::Codec(err.into())
    }
}

/// Errors raised by the command-line subcommands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Container I/O failed
    #[error(transparent)]
    Io(#[from] PlaneIoError),

    /// Report could not be serialized
    #[error("Failed to format report: {0}")]
    Report(#[from] serde_json::Error),
}
