//! Thread-safe read/write coordination for one OME-TIFF container.
//!
//! [`OmeTiffIo`] owns at most one live handle per container path: either a
//! reader over the container on disk, or the write side, which stages every
//! written plane as its own single-plane file. Staged planes are merged into
//! the container in one sequential pass on [`OmeTiffIo::close`].
//!
//! # Locking
//!
//! All state sits behind one `parking_lot::RwLock`:
//!
//! - Reads against a live reader, or of a staged plane, take the lock
//!   shared. The reader's decoder cursor has its own mutex, since selecting
//!   a series and seeking both move it.
//! - Opening the reader goes through an upgradable read, so at most one
//!   thread performs the transition and the read is retried exactly once.
//! - Writes, seeding, merging and closing take the lock exclusively.
//!
//! # Example
//!
//! ```rust,no_run
//! use ome_plane_io::{OmeTiffIo, PlaneCoordinate};
//!
//! # fn main() -> Result<(), ome_plane_io::PlaneIoError> {
//! let io = OmeTiffIo::open("stack.ome.tif")?;
//! let plane = io.read_plane(PlaneCoordinate::new(0, 1, 0, 0))?;
//! io.write_plane(&plane, PlaneCoordinate::new(0, 0, 0, 0))?;
//! io.close(true)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::error::PlaneIoError;
use crate::format::{
    ContainerReader, ContainerWriter, EncodeOptions, MetadataRetrieve, OmeMetadata, PlaneBuffer,
};
use crate::plane::{PlaneCoordinate, SeriesLayout};

use super::staging::{StagingStore, DEFAULT_STAGING_DIR};

// =============================================================================
// Options
// =============================================================================

/// Settings for containers written by [`OmeTiffIo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoOptions {
    /// Encoding of merged containers and staged planes
    pub encode: EncodeOptions,

    /// Name of the staging directory created next to the container
    pub staging_dir: String,
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            encode: EncodeOptions::default(),
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Which side of the container is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// No live handle
    Closed,
    /// A reader over the container on disk is open
    Reading,
    /// Planes are being staged for the next merge
    Staging,
}

#[derive(Debug)]
enum Handle {
    Closed,
    Reading(Mutex<ContainerReader>),
    Staging,
}

#[derive(Debug)]
struct IoState {
    path: PathBuf,
    options: IoOptions,
    metadata: Option<Arc<OmeMetadata>>,
    handle: Handle,
    staging: StagingStore,
}

/// Random-access plane reads and staged plane writes for one container.
///
/// Reads may run concurrently from many threads; writes are serialized.
/// Nothing is merged implicitly on drop: call [`OmeTiffIo::close`] to
/// persist staged planes.
#[derive(Debug)]
pub struct OmeTiffIo {
    path: PathBuf,
    state: RwLock<IoState>,
}

impl OmeTiffIo {
    /// Coordinator for `path`, without checking the filesystem.
    ///
    /// `metadata` is required before writing a container that does not
    /// exist yet; for existing containers it is loaded lazily.
    pub fn new(path: impl Into<PathBuf>, metadata: Option<OmeMetadata>) -> Self {
        let path = path.into();
        let options = IoOptions::default();
        let staging = StagingStore::new(&path, &options.staging_dir);

        Self {
            path: path.clone(),
            state: RwLock::new(IoState {
                path,
                options,
                metadata: metadata.map(Arc::new),
                handle: Handle::Closed,
                staging,
            }),
        }
    }

    /// Coordinator for an existing container.
    ///
    /// # Errors
    ///
    /// Returns [`PlaneIoError::NotFound`] if `path` is not a regular file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PlaneIoError> {
        let path = path.into();
        if !path.is_file() {
            return Err(PlaneIoError::NotFound(path));
        }
        Ok(Self::new(path, None))
    }

    /// Coordinator for a container to be written.
    ///
    /// If a file already exists at `path`, `metadata` is discarded and the
    /// file's own metadata is used instead.
    pub fn create(path: impl Into<PathBuf>, metadata: OmeMetadata) -> Result<Self, PlaneIoError> {
        let path = path.into();
        if path.is_file() {
            debug!(
                "{} already exists, using its metadata instead of the supplied one",
                path.display()
            );
            return Ok(Self::new(path, None));
        }

        metadata.validate()?;
        Ok(Self::new(path, Some(metadata)))
    }

    /// Coordinator for a new container described like `other`.
    ///
    /// The metadata and options of `other` are copied.
    pub fn create_like(path: impl Into<PathBuf>, other: &OmeTiffIo) -> Result<Self, PlaneIoError> {
        let metadata = other.get_metadata()?;
        let options = other.state.read().options.clone();
        Ok(Self::create(path, OmeMetadata::clone(&metadata))?.with_options(options))
    }

    /// Replace the default [`IoOptions`].
    ///
    /// Once planes are staged the staging directory is fixed; a different
    /// `staging_dir` is ignored until the next merge.
    pub fn with_options(mut self, mut options: IoOptions) -> Self {
        let state = self.state.get_mut();
        if state.staging.is_empty() {
            state.staging = StagingStore::new(&state.path, &options.staging_dir);
        } else if options.staging_dir != state.options.staging_dir {
            warn!(
                "Keeping staging directory {} while {} planes are staged",
                state.staging.dir().display(),
                state.staging.len()
            );
            options.staging_dir = state.options.staging_dir.clone();
        }
        state.options = options;
        self
    }

    /// Path of the container.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which handle is currently live.
    pub fn mode(&self) -> IoMode {
        match self.state.read().handle {
            Handle::Closed => IoMode::Closed,
            Handle::Reading(_) => IoMode::Reading,
            Handle::Staging => IoMode::Staging,
        }
    }

    /// Number of planes staged since the last merge.
    pub fn staged_count(&self) -> usize {
        self.state.read().staging.len()
    }

    /// Whether `coordinate` has a staged plane awaiting merge.
    pub fn is_staged(&self, coordinate: &PlaneCoordinate) -> bool {
        self.state.read().staging.contains(coordinate)
    }

    // =========================================================================
    // Plane I/O
    // =========================================================================

    /// Read the plane at `coordinate`.
    ///
    /// A plane written since the last merge is read back from staging. Any
    /// other plane is read from the container; if staged planes exist, they
    /// are merged first so the container is current.
    pub fn read_plane(&self, coordinate: PlaneCoordinate) -> Result<PlaneBuffer, PlaneIoError> {
        check_series(&coordinate)?;

        // Fast path: live reader or staged plane
        {
            let state = self.state.read();
            if let Some(result) = state.try_read(&coordinate) {
                return result;
            }
        }

        let state = self.state.upgradable_read();
        if let Some(result) = state.try_read(&coordinate) {
            return result;
        }

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.open_reader()?;
        let state = RwLockWriteGuard::downgrade(state);

        match state.try_read(&coordinate) {
            Some(result) => result,
            None => unreachable!("reader is live after open_reader"),
        }
    }

    /// Stage `plane` as the new content of `coordinate`.
    ///
    /// On the first write to an existing container every plane of it is
    /// copied into staging, so the merge on [`OmeTiffIo::close`] can
    /// rewrite the whole container.
    ///
    /// # Errors
    ///
    /// Fails before touching the filesystem if the plane is empty, the
    /// series is not 0, no metadata is available for a new container, the
    /// coordinate is out of range, or the plane does not match the layout.
    pub fn write_plane(
        &self,
        plane: &PlaneBuffer,
        coordinate: PlaneCoordinate,
    ) -> Result<(), PlaneIoError> {
        if plane.is_empty() {
            return Err(PlaneIoError::EmptyPlane { coordinate });
        }
        check_series(&coordinate)?;

        let mut state = self.state.write();
        let metadata = match state.load_metadata()? {
            Some(metadata) => metadata,
            None => return Err(PlaneIoError::MissingMetadata(state.path.clone())),
        };

        let layout = SeriesLayout::from_metadata(metadata.as_ref(), coordinate.series)?;
        coordinate.index_within(&layout)?;
        layout.check_plane(coordinate.c, plane)?;

        state.begin_staging()?;
        let IoState {
            staging, options, ..
        } = &mut *state;
        staging.stage(coordinate, plane, &options.encode)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Metadata of the container, loaded from disk on first use.
    pub fn get_metadata(&self) -> Result<Arc<OmeMetadata>, PlaneIoError> {
        if let Some(metadata) = &self.state.read().metadata {
            return Ok(Arc::clone(metadata));
        }

        let mut state = self.state.write();
        match state.load_metadata()? {
            Some(metadata) => Ok(metadata),
            None if !state.staging.is_empty() => {
                Err(PlaneIoError::MetadataUnavailable(state.path.clone()))
            }
            None => Err(PlaneIoError::NotFound(state.path.clone())),
        }
    }

    /// Number of series in the container.
    pub fn get_num_series(&self) -> Result<usize, PlaneIoError> {
        Ok(self.get_metadata()?.image_count())
    }

    pub fn get_size_x(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_metadata()?.pixels_size_x(series)?)
    }

    pub fn get_size_y(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_metadata()?.pixels_size_y(series)?)
    }

    pub fn get_size_z(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_metadata()?.pixels_size_z(series)?)
    }

    pub fn get_size_t(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_metadata()?.pixels_size_t(series)?)
    }

    /// Number of addressable channels of `series`.
    ///
    /// An RGB channel counts once here even though it holds three samples.
    pub fn get_size_c(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_layout(series)?.size_c())
    }

    /// Number of planes in `series`.
    pub fn get_num_planes(&self, series: usize) -> Result<usize, PlaneIoError> {
        Ok(self.get_layout(series)?.plane_count())
    }

    /// Plane layout of `series`.
    pub fn get_layout(&self, series: usize) -> Result<SeriesLayout, PlaneIoError> {
        let metadata = self.get_metadata()?;
        Ok(SeriesLayout::from_metadata(metadata.as_ref(), series)?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the reader and merge staged planes into the container.
    ///
    /// With `remove_staging_on_success`, staged files are deleted once the
    /// merged container is in place; otherwise they are left on disk. If
    /// the merge fails, the container and every staged file are untouched
    /// and `close` can be retried.
    pub fn close(&self, remove_staging_on_success: bool) -> Result<(), PlaneIoError> {
        let mut state = self.state.write();
        state.handle = Handle::Closed;

        if state.staging.is_empty() {
            return Ok(());
        }

        state.merge()?;
        state.staging.clear(remove_staging_on_success)
    }

    /// Adopt planes staged by an earlier, interrupted coordinator.
    ///
    /// Returns the number of recovered planes. They are merged by the next
    /// [`OmeTiffIo::close`].
    pub fn recover_staging(&self) -> Result<usize, PlaneIoError> {
        let mut state = self.state.write();
        let recovered = state.staging.recover()?;

        if !state.staging.is_empty() {
            state.handle = Handle::Staging;
        }
        if recovered > 0 {
            info!(
                "Recovered {} staged planes for {}",
                recovered,
                state.path.display()
            );
        }
        Ok(recovered)
    }
}

impl Drop for OmeTiffIo {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.staging.is_empty() {
            warn!(
                "{} staged planes for {} were never merged; they remain in {}",
                state.staging.len(),
                state.path.display(),
                state.staging.dir().display()
            );
        }
    }
}

fn check_series(coordinate: &PlaneCoordinate) -> Result<(), PlaneIoError> {
    if coordinate.series != 0 {
        return Err(PlaneIoError::UnsupportedSeries {
            series: coordinate.series,
        });
    }
    Ok(())
}

// =============================================================================
// Transitions
// =============================================================================

impl IoState {
    /// Read without changing state, if the current handle allows it.
    fn try_read(&self, coordinate: &PlaneCoordinate) -> Option<Result<PlaneBuffer, PlaneIoError>> {
        match &self.handle {
            Handle::Reading(reader) => Some(reader.lock().read_plane(*coordinate)),
            _ => self.staging.read(coordinate),
        }
    }

    /// Metadata if known or loadable from the container on disk.
    fn load_metadata(&mut self) -> Result<Option<Arc<OmeMetadata>>, PlaneIoError> {
        if self.metadata.is_none() {
            let loaded = match &self.handle {
                Handle::Reading(reader) => Some(Arc::clone(reader.lock().metadata())),
                _ if self.path.is_file() => {
                    Some(Arc::clone(ContainerReader::open(&self.path)?.metadata()))
                }
                _ => None,
            };
            self.metadata = loaded;
        }
        Ok(self.metadata.clone())
    }

    /// Switch to reading, merging staged planes first.
    fn open_reader(&mut self) -> Result<(), PlaneIoError> {
        if let Handle::Reading(_) = self.handle {
            return Ok(());
        }

        if !self.staging.is_empty() {
            debug!(
                "Merging {} staged planes before reading {}",
                self.staging.len(),
                self.path.display()
            );
            self.handle = Handle::Closed;
            self.merge()?;
            self.staging.clear(true)?;
        }

        let reader = ContainerReader::open(&self.path)?;
        if self.metadata.is_none() {
            self.metadata = Some(Arc::clone(reader.metadata()));
        }
        self.handle = Handle::Reading(Mutex::new(reader));
        Ok(())
    }

    /// Switch to staging, seeding it from the container if needed.
    fn begin_staging(&mut self) -> Result<(), PlaneIoError> {
        let reader = match std::mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Staging => {
                self.handle = Handle::Staging;
                return Ok(());
            }
            Handle::Reading(reader) => Some(reader.into_inner()),
            Handle::Closed => None,
        };

        if self.staging.is_empty() && self.path.is_file() {
            let mut reader = match reader {
                Some(reader) => reader,
                None => ContainerReader::open(&self.path)?,
            };
            self.seed(&mut reader)?;
        }

        self.handle = Handle::Staging;
        Ok(())
    }

    /// Copy every plane of every series into staging.
    fn seed(&mut self, reader: &mut ContainerReader) -> Result<(), PlaneIoError> {
        let metadata = Arc::clone(reader.metadata());
        info!(
            "Seeding staging for {} from {} series",
            self.path.display(),
            metadata.image_count()
        );

        for series in 0..metadata.image_count() {
            let layout = SeriesLayout::from_metadata(metadata.as_ref(), series)?;
            for coordinate in layout.planes() {
                let plane = reader.read_plane(coordinate)?;
                self.staging.stage(coordinate, &plane, &self.options.encode)?;
            }
        }
        Ok(())
    }

    /// Rewrite the container from staged planes.
    ///
    /// Planes missing from staging are copied from the current container,
    /// or zero-filled if there is none. Staged files are left in place.
    fn merge(&mut self) -> Result<(), PlaneIoError> {
        let metadata = match self.load_metadata()? {
            Some(metadata) => metadata,
            None => return Err(PlaneIoError::MetadataUnavailable(self.path.clone())),
        };

        info!(
            "Merging {} staged planes into {}",
            self.staging.len(),
            self.path.display()
        );

        let mut writer = ContainerWriter::create(&self.path, &metadata, &self.options.encode)?;
        let mut existing: Option<ContainerReader> = None;
        let mut zero_filled = 0;

        for series in 0..metadata.image_count() {
            let layout = SeriesLayout::from_metadata(metadata.as_ref(), series)?;
            for coordinate in layout.planes() {
                let plane = match self.staging.read(&coordinate) {
                    Some(staged) => staged?,
                    None if self.path.is_file() => {
                        if existing.is_none() {
                            existing = Some(ContainerReader::open(&self.path)?);
                        }
                        match existing.as_mut() {
                            Some(reader) => reader.read_plane(coordinate)?,
                            None => unreachable!("existing reader was just opened"),
                        }
                    }
                    None => {
                        zero_filled += 1;
                        layout.zero_plane(coordinate.c)
                    }
                };

                layout.check_plane(coordinate.c, &plane)?;
                writer.write_plane(&plane)?;
                debug!("Merged plane {}", coordinate);
            }
        }

        drop(existing);
        writer.finish()?;

        if zero_filled > 0 {
            warn!(
                "{} planes of {} were never written and were filled with zeros",
                zero_filled,
                self.path.display()
            );
        }
        Ok(())
    }
}
