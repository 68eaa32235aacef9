//! Geometry matching for geostore.
//!
//! Maps an item's coordinate sequence to the set of tessellation cells it
//! belongs to at a fixed level. The shape is inferred from the coordinates:
//!
//! - one pair is a **point**, covered by the single cell containing it
//! - an open sequence is a **polyline**, covered vertex by vertex (or by
//!   sampling along its edges, see [`PolylineStrategy`])
//! - a closed sequence (first pair repeated last) is a **polygon**, covered
//!   by the tessellation's region coverer
//!
//! The tessellation itself sits behind the [`Tessellation`] trait;
//! [`S2Tessellation`] implements it on the S2 cube-face quadtree.

pub mod error;
pub mod matcher;
pub mod s2cells;
pub mod tessellation;

pub use error::{GeoError, GeoResult};
pub use matcher::{
    radial_area_meters, GeoKind, GeoMatch, GeoMatcher, PolylineStrategy,
    EARTH_CIRCUMFERENCE_METERS,
};
pub use s2cells::S2Tessellation;
pub use tessellation::{LatLng, Region, Tessellation, MAX_LEVEL};
