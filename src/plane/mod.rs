//! Plane addressing.
//!
//! Every plane of a container is identified by a [`PlaneCoordinate`]
//! `(series, z, c, t)`. A [`SeriesLayout`] describes the dense
//! `[0,Z)×[0,C)×[0,T)` box of one series and maps coordinates to the
//! codec's linear plane index.

mod coordinate;
mod layout;

pub use coordinate::{PlaneCoordinate, SeriesPlanes};
pub use layout::SeriesLayout;
