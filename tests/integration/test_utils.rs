//! Test utilities for integration tests.
//!
//! Helpers for building small OME-TIFF containers whose planes are filled
//! with a single recognizable value.

use std::path::{Path, PathBuf};

use ndarray::Array3;
use tempfile::TempDir;

use ome_plane_io::format::ContainerWriter;
use ome_plane_io::{EncodeOptions, OmeMetadata, PlaneBuffer, PlaneCoordinate};

/// Plane height used by every helper.
pub const HEIGHT: usize = 4;

/// Plane width used by every helper.
pub const WIDTH: usize = 6;

// =============================================================================
// Planes
// =============================================================================

/// An 8-bit grayscale plane filled with `value`.
pub fn gray_plane(value: u8) -> PlaneBuffer {
    PlaneBuffer::Uint8(Array3::from_elem((HEIGHT, WIDTH, 1), value))
}

/// An 8-bit RGB plane whose three samples are `value`, `value + 1`, `value + 2`.
pub fn rgb_plane(value: u8) -> PlaneBuffer {
    PlaneBuffer::Uint8(Array3::from_shape_fn((HEIGHT, WIDTH, 3), |(_, _, s)| {
        value.wrapping_add(s as u8)
    }))
}

/// The value every pixel of an 8-bit plane holds.
///
/// Panics if the plane is not uniform.
pub fn uniform_value(plane: &PlaneBuffer) -> u8 {
    match plane {
        PlaneBuffer::Uint8(array) => {
            let first = array[[0, 0, 0]];
            assert!(array.iter().all(|v| *v == first), "plane is not uniform");
            first
        }
        other => panic!("expected a uint8 plane, got {:?}", other.pixel_type()),
    }
}

/// Coordinate `(0, z, 0, 0)`.
pub fn z(z: usize) -> PlaneCoordinate {
    PlaneCoordinate::new(0, z, 0, 0)
}

// =============================================================================
// Containers
// =============================================================================

/// Write a single-series grayscale z-stack whose plane `z` holds `values[z]`.
pub fn create_stack(path: &Path, values: &[u8]) {
    let metadata = OmeMetadata::from_plane(&gray_plane(0), values.len(), 1);
    write_container(path, &metadata, values.iter().map(|v| gray_plane(*v)));
}

/// Write every plane of `metadata` in container order.
pub fn write_container(
    path: &Path,
    metadata: &OmeMetadata,
    planes: impl IntoIterator<Item = PlaneBuffer>,
) {
    let mut writer = ContainerWriter::create(path, metadata, &EncodeOptions::default()).unwrap();
    for plane in planes {
        writer.write_plane(&plane).unwrap();
    }
    writer.finish().unwrap();
}

/// A scratch directory holding the two-plane example container:
/// one series, `Z=2`, plane 0 filled with 10 and plane 1 with 20.
pub fn example_container() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.ome.tif");
    create_stack(&path, &[10, 20]);
    (dir, path)
}

/// Number of files in the staging directory next to `container`.
pub fn staged_files(container: &Path) -> usize {
    let dir = container
        .parent()
        .unwrap()
        .join(ome_plane_io::DEFAULT_STAGING_DIR);
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
