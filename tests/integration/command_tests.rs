//! Command-line subcommand integration tests.
//!
//! Tests verify:
//! - `copy` carries every series into the new container
//! - `info` reports the layout of every series as JSON
//! - `recover` merges staging left by an interrupted writer

use ome_plane_io::commands;
use ome_plane_io::format::ContainerReader;
use ome_plane_io::{
    EncodeOptions, IoOptions, MetadataRetrieve, OmeMetadata, OmeTiffIo, PlaneCoordinate,
};

use super::test_utils::{
    example_container, gray_plane, staged_files, uniform_value, write_container, z,
};

/// Series 0 with Z=1 holding 10, series 1 with Z=2 holding 77 and 78.
fn two_series_container(path: &std::path::Path) {
    let mut metadata = OmeMetadata::from_plane(&gray_plane(0), 1, 2);
    metadata.set_pixels_size_z(1, 2).unwrap();
    write_container(path, &metadata, [10, 77, 78].map(gray_plane));
}

// =============================================================================
// Copy
// =============================================================================

#[test]
fn test_copy_every_series() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.ome.tif");
    let destination = dir.path().join("copy.ome.tif");
    two_series_container(&source);

    let copied = commands::copy(&source, &destination, &IoOptions::default()).unwrap();
    assert_eq!(copied, 3);

    let mut reader = ContainerReader::open(&destination).unwrap();
    assert_eq!(reader.metadata().image_count(), 2);
    let values: Vec<u8> = [(0, 0), (1, 0), (1, 1)]
        .into_iter()
        .map(|(s, z)| uniform_value(&reader.read_plane(PlaneCoordinate::new(s, z, 0, 0)).unwrap()))
        .collect();
    assert_eq!(values, vec![10, 77, 78]);
}

#[test]
fn test_copy_reencodes() {
    let (dir, source) = example_container();
    let destination = dir.path().join("small.ome.tif");
    let options = IoOptions {
        encode: EncodeOptions {
            big_tiff: false,
            compression: true,
        },
        ..IoOptions::default()
    };

    assert_eq!(commands::copy(&source, &destination, &options).unwrap(), 2);

    let io = OmeTiffIo::open(&destination).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 10);
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 20);
}

#[test]
fn test_copy_missing_source_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("copy.ome.tif");

    let source = dir.path().join("missing.ome.tif");

    assert!(commands::copy(&source, &destination, &IoOptions::default()).is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// =============================================================================
// Info
// =============================================================================

#[test]
fn test_info_reports_every_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.ome.tif");
    two_series_container(&path);

    let report = commands::info(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(json["num_series"], 2);
    assert_eq!(json["series"].as_array().unwrap().len(), 2);
    assert_eq!(json["series"][1]["size_z"], 2);
}

// =============================================================================
// Recover
// =============================================================================

#[test]
fn test_recover_merges_and_clears_staging() {
    let (_dir, path) = example_container();
    {
        let io = OmeTiffIo::open(&path).unwrap();
        io.write_plane(&gray_plane(55), z(1)).unwrap();
    }

    assert_eq!(commands::recover(&path, IoOptions::default(), false).unwrap(), 2);
    assert_eq!(staged_files(&path), 0);

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 10);
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 55);
}

#[test]
fn test_recover_keeps_staging_when_asked() {
    let (_dir, path) = example_container();
    {
        let io = OmeTiffIo::open(&path).unwrap();
        io.write_plane(&gray_plane(55), z(0)).unwrap();
    }

    assert_eq!(commands::recover(&path, IoOptions::default(), true).unwrap(), 2);
    assert_eq!(staged_files(&path), 2);
}
