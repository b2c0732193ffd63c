//! Container I/O coordination.
//!
//! - [`OmeTiffIo`] multiplexes concurrent reads and serialized writes to one
//!   container
//! - [`StagingStore`] keeps written planes as single-plane files until they
//!   are merged

mod coordinator;
mod staging;

pub use coordinator::{IoMode, IoOptions, OmeTiffIo};
pub use staging::{base_name_of, StagingStore, DEFAULT_STAGING_DIR};
