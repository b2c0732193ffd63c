//! Random-access reader for OME-TIFF containers.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{CodecError, PlaneIoError};
use crate::plane::{PlaneCoordinate, SeriesLayout};

use super::ome_xml::{MetadataRetrieve, OmeMetadata};
use super::pixels::{decode_plane, PlaneBuffer};

/// Reader over one OME-TIFF container.
///
/// The reader keeps a currently-selected series, like the underlying
/// format readers do. Selecting a series and decoding a plane both move the
/// decoder, so every call takes `&mut self`; callers sharing a reader must
/// serialize access.
pub struct ContainerReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    metadata: Arc<OmeMetadata>,
    series_offsets: Vec<usize>,
    layout: SeriesLayout,
}

impl ContainerReader {
    /// Open a container and parse its embedded OME-XML.
    ///
    /// # Errors
    ///
    /// - [`PlaneIoError::NotFound`] if `path` is not a regular file
    /// - [`PlaneIoError::Io`] if the file cannot be opened
    /// - [`PlaneIoError::Codec`] if the file is not a readable OME-TIFF
    pub fn open(path: &Path) -> Result<Self, PlaneIoError> {
        if !path.is_file() {
            return Err(PlaneIoError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| PlaneIoError::io(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(CodecError::from)?
            .with_limits(Limits::unlimited());

        let xml = decoder
            .get_tag_ascii_string(Tag::ImageDescription)
            .map_err(|e| CodecError::Metadata(format!("no OME-XML description: {}", e)))?;
        let metadata = OmeMetadata::from_xml(&xml)?;
        metadata.validate()?;
        metadata.check_plane_mapping()?;

        let series_offsets = metadata.series_offsets();
        let layout = SeriesLayout::from_metadata(&metadata, 0)?;

        debug!(
            "Opened OME-TIFF {} with {} series",
            path.display(),
            metadata.image_count()
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            metadata: Arc::new(metadata),
            series_offsets,
            layout,
        })
    }

    /// Path of the container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata parsed from the container.
    pub fn metadata(&self) -> &Arc<OmeMetadata> {
        &self.metadata
    }

    /// Currently-selected series.
    pub fn series(&self) -> usize {
        self.layout.series
    }

    /// Layout of the currently-selected series.
    pub fn layout(&self) -> &SeriesLayout {
        &self.layout
    }

    /// Select the series subsequent plane indices refer to.
    pub fn set_series(&mut self, series: usize) -> Result<(), PlaneIoError> {
        if series != self.layout.series {
            self.layout = SeriesLayout::from_metadata(self.metadata.as_ref(), series)?;
        }
        Ok(())
    }

    /// Decode the plane at `coordinate`, selecting its series first.
    pub fn read_plane(&mut self, coordinate: PlaneCoordinate) -> Result<PlaneBuffer, PlaneIoError> {
        self.set_series(coordinate.series)?;
        let index = coordinate.index_within(&self.layout)?;
        let ifd = self.series_offsets[self.layout.series] + index;

        self.decoder.seek_to_image(ifd).map_err(CodecError::from)?;
        let plane = decode_plane(&mut self.decoder)?;
        self.layout.check_plane(coordinate.c, &plane)?;
        Ok(plane)
    }
}

impl std::fmt::Debug for ContainerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerReader")
            .field("path", &self.path)
            .field("series", &self.layout.series)
            .finish_non_exhaustive()
    }
}

/// Decode the single plane stored in a plain TIFF file.
pub fn read_single_plane(path: &Path) -> Result<PlaneBuffer, PlaneIoError> {
    let file = File::open(path).map_err(|e| PlaneIoError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(CodecError::from)?
        .with_limits(Limits::unlimited());
    Ok(decode_plane(&mut decoder)?)
}
