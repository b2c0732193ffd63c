//! Container format integration tests.
//!
//! Tests verify:
//! - Multi-series containers address planes through per-series IFD offsets
//! - Writing through the coordinator preserves series it cannot write
//! - Physical sizes and channel names survive a merge
//! - Files that are not OME-TIFF are rejected

use ome_plane_io::format::{read_single_plane, write_single_plane, ContainerReader};
use ome_plane_io::{
    CodecError, EncodeOptions, OmeMetadata, OmeTiffIo, PixelType, PlaneCoordinate, PlaneIoError,
};

use super::test_utils::{gray_plane, uniform_value, write_container, z, HEIGHT, WIDTH};

/// Two series: series 0 with Z=2 holding 1 and 2, series 1 with Z=3
/// holding 11, 12 and 13.
fn two_series_metadata() -> OmeMetadata {
    let mut metadata = OmeMetadata::from_plane(&gray_plane(0), 2, 2);
    metadata.set_pixels_size_z(1, 3).unwrap();
    metadata
}

#[test]
fn test_multi_series_addressing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.ome.tif");
    let planes = [1, 2, 11, 12, 13].map(gray_plane);
    write_container(&path, &two_series_metadata(), planes);

    let mut reader = ContainerReader::open(&path).unwrap();
    assert_eq!(reader.metadata().series_offsets(), vec![0, 2]);

    let plane = reader.read_plane(PlaneCoordinate::new(1, 2, 0, 0)).unwrap();
    assert_eq!(uniform_value(&plane), 13);
    assert_eq!(reader.series(), 1);
    assert_eq!(reader.layout().size_z, 3);

    let plane = reader.read_plane(PlaneCoordinate::new(0, 1, 0, 0)).unwrap();
    assert_eq!(uniform_value(&plane), 2);
    assert_eq!(reader.series(), 0);
}

#[test]
fn test_merge_preserves_other_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.ome.tif");
    let planes = [1, 2, 11, 12, 13].map(gray_plane);
    write_container(&path, &two_series_metadata(), planes);

    let io = OmeTiffIo::open(&path).unwrap();
    io.write_plane(&gray_plane(50), z(1)).unwrap();
    assert_eq!(io.staged_count(), 5);
    io.close(true).unwrap();

    let mut reader = ContainerReader::open(&path).unwrap();
    let values: Vec<u8> = [(0, 0), (0, 1), (1, 0), (1, 1), (1, 2)]
        .into_iter()
        .map(|(s, z)| uniform_value(&reader.read_plane(PlaneCoordinate::new(s, z, 0, 0)).unwrap()))
        .collect();
    assert_eq!(values, vec![1, 50, 11, 12, 13]);
}

#[test]
fn test_descriptive_metadata_survives_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("described.ome.tif");
    let mut metadata = OmeMetadata::from_plane(&gray_plane(0), 1, 1);
    metadata.set_image_name(0, "embryo").unwrap();
    metadata.set_channel_name(0, 0, "DAPI").unwrap();
    metadata
        .set_physical_size(0, Some(0.5), Some(0.5), Some(2.0))
        .unwrap();

    let io = OmeTiffIo::create(&path, metadata).unwrap();
    io.write_plane(&gray_plane(1), z(0)).unwrap();
    io.close(true).unwrap();

    let io = OmeTiffIo::open(&path).unwrap();
    io.write_plane(&gray_plane(2), z(0)).unwrap();
    io.close(true).unwrap();

    let reader = ContainerReader::open(&path).unwrap();
    let image = &reader.metadata().images()[0];
    assert_eq!(image.name.as_deref(), Some("embryo"));
    assert_eq!(image.pixels.channels[0].name.as_deref(), Some("DAPI"));
    assert_eq!(image.pixels.physical_size_z, Some(2.0));
    assert_eq!(image.pixels.physical_size_x_unit.as_deref(), Some("µm"));
}

#[test]
fn test_time_and_channel_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xyzct.ome.tif");
    let mut metadata = OmeMetadata::from_plane(&gray_plane(0), 2, 1);
    metadata.set_channel_count(0, 2).unwrap();
    metadata.set_pixels_size_t(0, 2).unwrap();

    // Plane value encodes its coordinate as 100*t + 10*c + z
    let io = OmeTiffIo::create(&path, metadata).unwrap();
    let layout = io.get_layout(0).unwrap();
    for coordinate in layout.planes() {
        let value = (100 * coordinate.t + 10 * coordinate.c + coordinate.z) as u8;
        io.write_plane(&gray_plane(value), coordinate).unwrap();
    }
    io.close(true).unwrap();

    // Container order is z fastest, then c, then t
    let mut reader = ContainerReader::open(&path).unwrap();
    let expected = [0, 1, 10, 11, 100, 101, 110, 111];
    for (index, coordinate) in layout.planes().enumerate() {
        let plane = reader.read_plane(coordinate).unwrap();
        assert_eq!(uniform_value(&plane), expected[index]);
    }
}

#[test]
fn test_plain_tiff_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.tif");
    write_single_plane(&path, &gray_plane(1), &EncodeOptions::default()).unwrap();
    assert_eq!(read_single_plane(&path).unwrap(), gray_plane(1));

    let result = ContainerReader::open(&path);
    assert!(matches!(result, Err(PlaneIoError::Codec(_))));

    let io = OmeTiffIo::open(&path).unwrap();
    assert!(io.read_plane(z(0)).is_err());
}

#[test]
fn test_garbage_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.ome.tif");
    std::fs::write(&path, b"definitely not a tiff").unwrap();

    assert!(matches!(
        ContainerReader::open(&path),
        Err(PlaneIoError::Codec(CodecError::Tiff(_)))
    ));
}

#[test]
fn test_all_gray_pixel_types() {
    let dir = tempfile::tempdir().unwrap();
    for pixel_type in PixelType::ALL {
        let path = dir.path().join(format!("{}.ome.tif", pixel_type));
        let plane = ome_plane_io::PlaneBuffer::zeros(pixel_type, HEIGHT, WIDTH, 1);
        let metadata = OmeMetadata::from_plane(&plane, 1, 1);

        let io = OmeTiffIo::create(&path, metadata).unwrap();
        io.write_plane(&plane, z(0)).unwrap();
        io.close(true).unwrap();

        let io = OmeTiffIo::open(&path).unwrap();
        let read = io.read_plane(z(0)).unwrap();
        assert_eq!(read.pixel_type(), pixel_type);
        assert_eq!(read, plane);
    }
}
