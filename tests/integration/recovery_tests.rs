//! Staging recovery integration tests.
//!
//! Tests verify:
//! - Planes staged by a coordinator that was dropped without closing can be
//!   adopted and merged by a new one
//! - Recovery ignores staging of other containers sharing the directory
//! - A stage interrupted mid-write does not block the next merge

use ome_plane_io::{IoMode, IoOptions, OmeMetadata, OmeTiffIo, StagingStore};

use super::test_utils::{create_stack, example_container, gray_plane, staged_files, uniform_value, z};

#[test]
fn test_dropped_coordinator_leaves_staging() {
    let (_dir, path) = example_container();
    let before = std::fs::read(&path).unwrap();

    {
        let io = OmeTiffIo::open(&path).unwrap();
        io.write_plane(&gray_plane(77), z(0)).unwrap();
    }

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(staged_files(&path), 2);
}

#[test]
fn test_recover_and_merge() {
    let (_dir, path) = example_container();
    {
        let io = OmeTiffIo::open(&path).unwrap();
        io.write_plane(&gray_plane(77), z(0)).unwrap();
    }

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(io.recover_staging().unwrap(), 2);
    assert_eq!(io.mode(), IoMode::Staging);
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 77);

    io.close(true).unwrap();
    assert_eq!(staged_files(&path), 0);

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 77);
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 20);
}

#[test]
fn test_recover_after_interrupted_restage() {
    let (dir, path) = example_container();
    {
        let io = OmeTiffIo::open(&path).unwrap();
        io.write_plane(&gray_plane(77), z(0)).unwrap();
    }

    // A re-stage of Z=1 died before its rename
    let partial = dir
        .path()
        .join(ome_plane_io::DEFAULT_STAGING_DIR)
        .join(".example_S0_Z1_C0_T0.tif.partial");
    std::fs::write(&partial, b"II*\0").unwrap();
    assert_eq!(staged_files(&path), 3);

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(io.recover_staging().unwrap(), 2);
    assert!(!partial.exists());
    io.close(true).unwrap();
    assert_eq!(staged_files(&path), 0);

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 77);
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 20);
}

#[test]
fn test_recover_new_container_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.ome.tif");
    let metadata = OmeMetadata::from_plane(&gray_plane(0), 2, 1);
    {
        let io = OmeTiffIo::create(&path, metadata.clone()).unwrap();
        io.write_plane(&gray_plane(3), z(1)).unwrap();
    }
    assert!(!path.exists());

    let io = OmeTiffIo::create(&path, metadata).unwrap();
    assert_eq!(io.recover_staging().unwrap(), 1);
    io.close(true).unwrap();

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(0)).unwrap()), 0);
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 3);
}

#[test]
fn test_recover_with_nothing_staged() {
    let (_dir, path) = example_container();
    let io = OmeTiffIo::open(&path).unwrap();

    assert_eq!(io.recover_staging().unwrap(), 0);
    assert_eq!(io.mode(), IoMode::Closed);
    io.close(true).unwrap();
}

#[test]
fn test_recover_ignores_other_containers() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.ome.tif");
    let second = dir.path().join("second.ome.tif");
    create_stack(&first, &[1, 1]);
    create_stack(&second, &[2, 2, 2]);

    {
        let io = OmeTiffIo::open(&second).unwrap();
        io.write_plane(&gray_plane(9), z(2)).unwrap();
    }

    let io = OmeTiffIo::open(&first).unwrap();
    assert_eq!(io.recover_staging().unwrap(), 0);

    let mut store = StagingStore::new(&second, &IoOptions::default().staging_dir);
    assert_eq!(store.recover().unwrap(), 3);
}

#[test]
fn test_recover_with_custom_staging_dir() {
    let (dir, path) = example_container();
    let options = IoOptions {
        staging_dir: "resume".to_string(),
        ..IoOptions::default()
    };
    {
        let io = OmeTiffIo::open(&path).unwrap().with_options(options.clone());
        io.write_plane(&gray_plane(12), z(1)).unwrap();
    }
    assert!(dir.path().join("resume").is_dir());

    let io = OmeTiffIo::open(&path).unwrap().with_options(options);
    assert_eq!(io.recover_staging().unwrap(), 2);
    io.close(true).unwrap();
    assert!(!dir.path().join("resume").exists());

    let io = OmeTiffIo::open(&path).unwrap();
    assert_eq!(uniform_value(&io.read_plane(z(1)).unwrap()), 12);
}
