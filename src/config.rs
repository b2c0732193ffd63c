//! Configuration for the `ome-plane-io` command-line tool.
//!
//! Options can be given as command-line arguments or environment variables
//! with the `OME_IO_` prefix:
//!
//! - `OME_IO_COMPRESSION` - LZW-compress written containers (default: false)
//! - `OME_IO_NO_BIG_TIFF` - Write classic TIFF instead of BigTIFF (default: false)
//! - `OME_IO_STAGING_DIR` - Staging directory name (default: `__ome_write_buffer__`)
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use ome_plane_io::config::Cli;
//!
//! let cli = Cli::parse();
//! cli.validate()?;
//! let options = cli.io.io_options();
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::format::EncodeOptions;
use crate::io::{IoOptions, DEFAULT_STAGING_DIR};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Inspect, copy and recover OME-TIFF containers.
#[derive(Parser, Debug, Clone)]
#[command(name = "ome-plane-io")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub io: IoConfig,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Settings for containers written by any subcommand.
#[derive(Args, Debug, Clone)]
pub struct IoConfig {
    /// Compress written containers with LZW.
    #[arg(long, global = true, default_value_t = false, env = "OME_IO_COMPRESSION")]
    pub compression: bool,

    /// Write classic TIFF instead of BigTIFF.
    ///
    /// Classic TIFF cannot address more than 4 GiB.
    #[arg(long, global = true, default_value_t = false, env = "OME_IO_NO_BIG_TIFF")]
    pub no_big_tiff: bool,

    /// Name of the staging directory created next to the container.
    #[arg(long, global = true, default_value = DEFAULT_STAGING_DIR, env = "OME_IO_STAGING_DIR")]
    pub staging_dir: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the layout of every series as JSON
    Info {
        /// Container to inspect
        path: PathBuf,
    },

    /// Merge planes left in staging by an interrupted writer
    Recover {
        /// Container whose staging directory should be merged
        path: PathBuf,

        /// Keep staged files after a successful merge
        #[arg(long, default_value_t = false)]
        keep_staging: bool,
    },

    /// Copy every plane of every series into a new container
    Copy {
        /// Existing container
        source: PathBuf,

        /// Container to create
        destination: PathBuf,
    },
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.io.validate()?;

        if let Command::Copy {
            source,
            destination,
        } = &self.command
        {
            if source == destination {
                return Err("copy source and destination must differ".to_string());
            }
            if destination.exists() {
                return Err(format!(
                    "destination {} already exists",
                    destination.display()
                ));
            }
        }

        Ok(())
    }
}

impl IoConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.staging_dir.as_str();
        if name.is_empty() {
            return Err("staging_dir must not be empty".to_string());
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(format!(
                "staging_dir must be a plain directory name, got '{}'",
                name
            ));
        }
        Ok(())
    }

    /// Options for the coordinator.
    pub fn io_options(&self) -> IoOptions {
        IoOptions {
            encode: EncodeOptions {
                big_tiff: !self.no_big_tiff,
                compression: self.compression,
            },
            staging_dir: self.staging_dir.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
