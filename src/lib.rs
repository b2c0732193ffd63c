//! # OME Plane IO
//!
//! Thread-safe random-access plane reads and writes for OME-TIFF containers.
//!
//! An OME-TIFF stores a multi-dimensional image as a sequence of 2D planes,
//! one per TIFF directory, described by OME-XML embedded in the first
//! directory. Pipelines want to read one plane, change it and write it back,
//! but a TIFF can only be written front to back. This crate bridges the two:
//!
//! - Reads go straight to the container and run concurrently
//! - Writes are staged as single-plane files next to the container
//! - Closing merges staged planes into the container in one sequential pass
//!
//! If the process dies before closing, the container is untouched and the
//! staged planes remain on disk, where [`OmeTiffIo::recover_staging`] can
//! pick them up again.
//!
//! ## Architecture
//!
//! - [`plane`] - Plane coordinates and per-series layouts
//! - [`mod@format`] - OME-XML metadata, pixel transcoding, TIFF reader and writer
//! - [`io`] - Staging store and the [`OmeTiffIo`] coordinator
//! - [`config`] - CLI configuration
//! - [`commands`] - Subcommands of the command-line tool
//!
//! ## Example
//!
//! ```rust,no_run
//! use ome_plane_io::{OmeMetadata, OmeTiffIo, PlaneBuffer, PixelType, PlaneCoordinate};
//!
//! # fn main() -> Result<(), ome_plane_io::PlaneIoError> {
//! let plane = PlaneBuffer::zeros(PixelType::Uint16, 512, 512, 1);
//! let metadata = OmeMetadata::from_plane(&plane, 10, 1);
//!
//! let io = OmeTiffIo::create("out.ome.tif", metadata)?;
//! for z in 0..10 {
//!     io.write_plane(&plane, PlaneCoordinate::new(0, z, 0, 0))?;
//! }
//! io.close(true)?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod plane;

// Re-export commonly used types
pub use config::{Cli, Command, IoConfig};
pub use error::{CodecError, CommandError, PlaneIoError};
pub use format::{
    ContainerReader, ContainerWriter, EncodeOptions, MetadataRetrieve, OmeMetadata, PixelType,
    PlaneBuffer,
};
pub use io::{IoMode, IoOptions, OmeTiffIo, StagingStore, DEFAULT_STAGING_DIR};
pub use plane::{PlaneCoordinate, SeriesLayout, SeriesPlanes};
