//! Subcommands of the `ome-plane-io` tool.
//!
//! Each command is a plain function so it can be driven without a process:
//! the binary only parses arguments, sets up logging and maps the result to
//! an exit code.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{CommandError, PlaneIoError};
use crate::format::{ContainerReader, ContainerWriter, MetadataRetrieve};
use crate::io::{IoOptions, OmeTiffIo};
use crate::plane::SeriesLayout;

// =============================================================================
// Info
// =============================================================================

/// Layout of every series of the container at `path`, as pretty JSON.
pub fn info(path: &Path) -> Result<String, CommandError> {
    let io = OmeTiffIo::open(path)?;
    let metadata = io.get_metadata()?;

    let series = (0..metadata.image_count())
        .map(|s| SeriesLayout::from_metadata(metadata.as_ref(), s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(PlaneIoError::from)?;

    let json = serde_json::json!({
        "path": path,
        "num_series": series.len(),
        "series": series,
    });

    Ok(serde_json::to_string_pretty(&json)?)
}

// =============================================================================
// Recover
// =============================================================================

/// Merge planes left in staging next to `path` by an interrupted writer.
///
/// Returns the number of recovered planes; nothing is written if there are
/// none.
pub fn recover(
    path: &Path,
    options: IoOptions,
    keep_staging: bool,
) -> Result<usize, PlaneIoError> {
    let io = OmeTiffIo::new(path, None).with_options(options);

    let recovered = io.recover_staging()?;
    if recovered == 0 {
        info!("No staged planes found for {}", path.display());
        return Ok(0);
    }

    io.close(!keep_staging)?;
    info!("Merged {} staged planes into {}", recovered, path.display());
    Ok(recovered)
}

// =============================================================================
// Copy
// =============================================================================

/// Copy every plane of every series of `source` into a new container at
/// `destination`, re-encoded with `options`.
///
/// The copy streams planes in container order and replaces `destination`
/// only once every plane is written. Returns the number of planes copied.
pub fn copy(
    source: &Path,
    destination: &Path,
    options: &IoOptions,
) -> Result<usize, PlaneIoError> {
    let mut reader = ContainerReader::open(source)?;
    let metadata = Arc::clone(reader.metadata());
    let mut writer = ContainerWriter::create(destination, &metadata, &options.encode)?;

    for series in 0..metadata.image_count() {
        let layout = SeriesLayout::from_metadata(metadata.as_ref(), series)?;
        for coordinate in layout.planes() {
            let plane = reader.read_plane(coordinate)?;
            writer.write_plane(&plane)?;
        }
    }

    let copied = writer.written();
    writer.finish()?;

    info!(
        "Copied {} planes in {} series from {} to {}",
        copied,
        metadata.image_count(),
        reader.path().display(),
        destination.display()
    );
    Ok(copied)
}
