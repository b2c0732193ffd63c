//! Sequential OME-TIFF writer and single-plane TIFF files.
//!
//! TIFF directories can only be appended, so a container is written in one
//! linear pass: every plane of series 0 in XYZCT order, then series 1, and
//! so on. The first directory carries the OME-XML description.
//!
//! The container is written to a hidden sibling file and renamed over the
//! target only once every plane is in place, so an interrupted write never
//! leaves a truncated container behind.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tiff::encoder::{Compression, TiffEncoder, TiffKindBig};
use tracing::{debug, warn};

use crate::error::{CodecError, PlaneIoError};

use super::ome_xml::OmeMetadata;
use super::pixels::{encode_plane, PlaneBuffer};

// =============================================================================
// Options
// =============================================================================

/// Encoding settings shared by container and staged plane writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Write containers as BigTIFF (64-bit offsets).
    pub big_tiff: bool,

    /// Compress image data with LZW.
    pub compression: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            big_tiff: true,
            compression: false,
        }
    }
}

impl EncodeOptions {
    fn compression(&self) -> Compression {
        if self.compression {
            Compression::Lzw
        } else {
            Compression::Uncompressed
        }
    }
}

/// Standard or BigTIFF encoder over a file.
enum PlaneEncoder {
    Standard(TiffEncoder<File>),
    Big(TiffEncoder<File, TiffKindBig>),
}

impl PlaneEncoder {
    fn new(file: File, big_tiff: bool, options: &EncodeOptions) -> Result<Self, CodecError> {
        let encoder = if big_tiff {
            PlaneEncoder::Big(TiffEncoder::new_big(file)?.with_compression(options.compression()))
        } else {
            PlaneEncoder::Standard(TiffEncoder::new(file)?.with_compression(options.compression()))
        };
        Ok(encoder)
    }

    fn write(&mut self, plane: &PlaneBuffer, description: Option<&str>) -> Result<(), CodecError> {
        match self {
            PlaneEncoder::Standard(encoder) => encode_plane(encoder, plane, description),
            PlaneEncoder::Big(encoder) => encode_plane(encoder, plane, description),
        }
    }
}

// =============================================================================
// Container Writer
// =============================================================================

/// Writes a complete OME-TIFF in one sequential pass.
pub struct ContainerWriter {
    target: PathBuf,
    partial: PathBuf,
    file: File,
    encoder: Option<PlaneEncoder>,
    description: Option<String>,
    written: usize,
    expected: usize,
    finished: bool,
}

impl ContainerWriter {
    /// Start writing a container described by `metadata` at `path`.
    ///
    /// Nothing is visible at `path` until [`ContainerWriter::finish`]
    /// succeeds.
    pub fn create(
        path: &Path,
        metadata: &OmeMetadata,
        options: &EncodeOptions,
    ) -> Result<Self, PlaneIoError> {
        metadata.validate()?;
        let description = metadata.to_container_xml()?;
        let expected = metadata
            .images()
            .iter()
            .map(|image| {
                let pixels = &image.pixels;
                pixels.size_z * pixels.channels.len() * pixels.size_t
            })
            .sum();

        let partial = partial_path(path);
        let file = File::create(&partial).map_err(|e| PlaneIoError::io(&partial, e))?;
        let handle = file.try_clone().map_err(|e| PlaneIoError::io(&partial, e))?;
        let encoder = PlaneEncoder::new(handle, options.big_tiff, options)?;

        Ok(Self {
            target: path.to_path_buf(),
            partial,
            file,
            encoder: Some(encoder),
            description: Some(description),
            written: 0,
            expected,
            finished: false,
        })
    }

    /// Append the next plane in container order.
    pub fn write_plane(&mut self, plane: &PlaneBuffer) -> Result<(), PlaneIoError> {
        if self.written >= self.expected {
            return Err(CodecError::LayoutMismatch {
                message: format!("container already holds all {} planes", self.expected),
            }
            .into());
        }

        let description = self.description.take();
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CodecError::Tiff("writer already finished".to_string()))?;
        encoder.write(plane, description.as_deref())?;
        self.written += 1;
        Ok(())
    }

    /// Number of planes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush the container and move it over the target path.
    pub fn finish(mut self) -> Result<(), PlaneIoError> {
        if self.written != self.expected {
            return Err(CodecError::LayoutMismatch {
                message: format!(
                    "wrote {} of {} planes to {}",
                    self.written,
                    self.expected,
                    self.target.display()
                ),
            }
            .into());
        }

        drop(self.encoder.take());
        self.file
            .sync_all()
            .map_err(|e| PlaneIoError::io(&self.partial, e))?;
        fs::rename(&self.partial, &self.target).map_err(|e| PlaneIoError::io(&self.target, e))?;
        self.finished = true;

        debug!("Wrote {} planes to {}", self.written, self.target.display());
        Ok(())
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if !self.finished {
            drop(self.encoder.take());
            if let Err(e) = fs::remove_file(&self.partial) {
                warn!(
                    "Failed to remove partial container {}: {}",
                    self.partial.display(),
                    e
                );
            }
        }
    }
}

/// Hidden sibling used while a file is being written.
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

// =============================================================================
// Single-plane Files
// =============================================================================

/// Write `plane` as a standalone single-image TIFF, replacing any file at
/// `path`.
///
/// The plane goes to a hidden sibling first and is renamed into place, so
/// an interrupted write leaves the previous file at `path` intact.
pub fn write_single_plane(
    path: &Path,
    plane: &PlaneBuffer,
    options: &EncodeOptions,
) -> Result<(), PlaneIoError> {
    let partial = partial_path(path);
    let result = write_single_plane_to(&partial, plane, options)
        .and_then(|()| fs::rename(&partial, path).map_err(|e| PlaneIoError::io(path, e)));

    if result.is_err() {
        if let Err(e) = fs::remove_file(&partial) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove partial plane {}: {}", partial.display(), e);
            }
        }
    }
    result
}

fn write_single_plane_to(
    path: &Path,
    plane: &PlaneBuffer,
    options: &EncodeOptions,
) -> Result<(), PlaneIoError> {
    let file = File::create(path).map_err(|e| PlaneIoError::io(path, e))?;
    let handle = file.try_clone().map_err(|e| PlaneIoError::io(path, e))?;
    {
        let mut encoder = PlaneEncoder::new(handle, false, options)?;
        encoder.write(plane, None)?;
    }
    file.sync_all().map_err(|e| PlaneIoError::io(path, e))?;
    Ok(())
}
