//! On-disk staging of written planes.
//!
//! A TIFF container can only be written front to back, so a random write to
//! plane P is turned into a brand-new single-plane file for P. Staged files
//! live in a sibling directory of the container, one per coordinate:
//!
//! ```text
//! data/
//! ├── stack.ome.tif
//! └── __ome_write_buffer__/
//!     ├── stack_S0_Z0_C0_T0.tif
//!     └── stack_S0_Z1_C0_T0.tif
//! ```
//!
//! The names are derived from the coordinate alone, so a directory left
//! behind by an interrupted process can be scanned back into an index with
//! [`StagingStore::recover`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PlaneIoError;
use crate::format::{read_single_plane, write_single_plane, EncodeOptions, PlaneBuffer};
use crate::plane::PlaneCoordinate;

/// Default name of the staging directory.
pub const DEFAULT_STAGING_DIR: &str = "__ome_write_buffer__";

/// Extension of staged single-plane files.
const STAGED_EXTENSION: &str = "tif";

/// Suffix of a staged file still being written.
const PARTIAL_SUFFIX: &str = ".partial";

/// Index of staged planes for one container.
///
/// Entries are kept ordered by coordinate, which is also container order.
#[derive(Debug)]
pub struct StagingStore {
    dir: PathBuf,
    base_name: String,
    entries: BTreeMap<PlaneCoordinate, PathBuf>,
}

impl StagingStore {
    /// Staging store for `container`, using a sibling directory `dir_name`.
    ///
    /// Nothing is created on disk until the first plane is staged.
    pub fn new(container: &Path, dir_name: &str) -> Self {
        let parent = container.parent().unwrap_or_else(|| Path::new(""));
        Self {
            dir: parent.join(dir_name),
            base_name: base_name_of(container),
            entries: BTreeMap::new(),
        }
    }

    /// Directory holding staged files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a plane at `coordinate` is staged to.
    pub fn entry_path(&self, coordinate: &PlaneCoordinate) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.{}",
            self.base_name, coordinate, STAGED_EXTENSION
        ))
    }

    /// Write `plane` to its staged file, replacing any previous version.
    pub fn stage(
        &mut self,
        coordinate: PlaneCoordinate,
        plane: &PlaneBuffer,
        options: &EncodeOptions,
    ) -> Result<(), PlaneIoError> {
        fs::create_dir_all(&self.dir).map_err(|e| PlaneIoError::io(&self.dir, e))?;

        let path = self.entry_path(&coordinate);
        write_single_plane(&path, plane, options)?;
        debug!("Staged plane {} at {}", coordinate, path.display());

        self.entries.insert(coordinate, path);
        Ok(())
    }

    /// Read a staged plane back.
    pub fn read(&self, coordinate: &PlaneCoordinate) -> Option<Result<PlaneBuffer, PlaneIoError>> {
        self.entries.get(coordinate).map(|path| read_single_plane(path))
    }

    pub fn contains(&self, coordinate: &PlaneCoordinate) -> bool {
        self.entries.contains_key(coordinate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staged entries in container order.
    pub fn entries(&self) -> impl Iterator<Item = (&PlaneCoordinate, &Path)> {
        self.entries.iter().map(|(c, p)| (c, p.as_path()))
    }

    /// Forget every entry, deleting the staged files if `remove_files`.
    ///
    /// The staging directory itself is removed once it is empty; other
    /// containers in the same directory may still be using it.
    pub fn clear(&mut self, remove_files: bool) -> Result<(), PlaneIoError> {
        let entries = std::mem::take(&mut self.entries);
        if !remove_files {
            return Ok(());
        }

        for path in entries.values() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PlaneIoError::io(path, e)),
            }
        }

        let is_empty = fs::read_dir(&self.dir)
            .map(|mut dir| dir.next().is_none())
            .unwrap_or(false);
        if is_empty {
            if let Err(e) = fs::remove_dir(&self.dir) {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    self.dir.display(),
                    e
                );
            }
        }

        Ok(())
    }

    /// Rebuild the index from staged files already on disk.
    ///
    /// Files of other containers and names that do not parse as a
    /// coordinate are ignored. Partial files left by an interrupted stage
    /// are deleted; the entry they were replacing is still intact. Returns
    /// the number of entries adopted.
    pub fn recover(&mut self) -> Result<usize, PlaneIoError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(PlaneIoError::io(&self.dir, e)),
        };

        let prefix = format!("{}_", self.base_name);
        let suffix = format!(".{}", STAGED_EXTENSION);
        let partial_prefix = format!(".{}", prefix);
        let partial_suffix = format!("{}{}", suffix, PARTIAL_SUFFIX);
        let mut adopted = 0;

        for entry in read_dir {
            let entry = entry.map_err(|e| PlaneIoError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if parse_entry_name(name, &partial_prefix, &partial_suffix).is_some() {
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => debug!("Removed interrupted stage {}", path.display()),
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
                continue;
            }

            if let Some(coordinate) = parse_entry_name(name, &prefix, &suffix) {
                if self.entries.insert(coordinate, entry.path()).is_none() {
                    adopted += 1;
                }
            }
        }

        debug!(
            "Recovered {} staged planes from {}",
            adopted,
            self.dir.display()
        );
        Ok(adopted)
    }
}

/// Coordinate encoded in a staged file name between `prefix` and `suffix`.
fn parse_entry_name(name: &str, prefix: &str, suffix: &str) -> Option<PlaneCoordinate> {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .and_then(|key| key.parse().ok())
}

/// File name of `path` with up to two trailing extensions stripped.
///
/// `stack.ome.tif` becomes `stack`, `stack.tif` becomes `stack`.
pub fn base_name_of(path: &Path) -> String {
    let mut stem = PathBuf::from(path.file_name().unwrap_or_default());
    for _ in 0..2 {
        if stem.extension().is_none() {
            break;
        }
        stem = PathBuf::from(stem.file_stem().unwrap_or_default());
    }
    stem.to_string_lossy().into_owned()
}
