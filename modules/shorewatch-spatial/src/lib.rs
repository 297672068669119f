//! In-process spatial index over user and report locations plus registered
//! alert polygons.
//!
//! Points are bucketed into geohash-5 cells (~5 km). Queries prefilter by
//! cell bounding box, then test candidates exactly (ray-cast membership or
//! haversine distance). Reads take a shared snapshot and are never corrupted
//! by concurrent writes.

mod cell;
pub mod index;

pub use index::SpatialIndex;
