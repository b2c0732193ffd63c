//! OME-TIFF codec binding.
//!
//! This module is the only place that talks to the `tiff` crate. It provides:
//!
//! - [`ome_xml`]: the OME-XML document model and the [`MetadataRetrieve`]
//!   accessor trait
//! - [`pixels`]: the closed set of [`PixelType`]s and the [`PlaneBuffer`]
//!   transcoder
//! - [`reader`]: random-access plane reads from an existing container
//! - [`writer`]: sequential container writes and single-plane files
//!
//! Planes are stored one per IFD in `XYZCT` order. The OME-XML document
//! lives in the `ImageDescription` tag of the first IFD.

pub mod ome_xml;
pub mod pixels;
pub mod reader;
pub mod writer;

pub use ome_xml::{
    ChannelMetadata, ImageMetadata, MetadataRetrieve, OmeMetadata, PixelsMetadata,
    TiffDataMetadata, DIMENSION_ORDER,
};
pub use pixels::{decode_plane, encode_plane, PixelType, PlaneBuffer};
pub use reader::{read_single_plane, ContainerReader};
pub use writer::{write_single_plane, ContainerWriter, EncodeOptions};
