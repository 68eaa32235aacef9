use geostore_types::CellId;
use serde::{Deserialize, Serialize};

/// Finest level supported by the hierarchical tessellation.
pub const MAX_LEVEL: u8 = 30;

/// A coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Pair up a flattened `[lat, lng, lat, lng, ...]` sequence. A trailing
    /// odd value is ignored.
    pub fn pairs(position: &[f64]) -> Vec<Self> {
        position
            .chunks_exact(2)
            .map(|p| Self::new(p[0], p[1]))
            .collect()
    }
}

/// A region the tessellation can cover.
#[derive(Clone, Debug, PartialEq)]
pub enum Region {
    /// Spherical cap around `center` with `area` in steradians.
    Cap { center: LatLng, area: f64 },
    /// Simple polygon given by its vertices, without a repeated closing vertex.
    Polygon { ring: Vec<LatLng> },
}

/// Hierarchical tessellation of the sphere.
///
/// Implementations must be deterministic: the same inputs always yield the
/// same cells, in the same order.
pub trait Tessellation: Send + Sync {
    /// The cell at `level` containing the coordinate.
    fn cell_at(&self, lat: f64, lng: f64, level: u8) -> CellId;

    /// Ancestor of `cell` at `level`. `level` must not exceed the cell's own.
    fn parent_at(&self, cell: CellId, level: u8) -> CellId;

    /// Cells between `min_level` and `max_level` covering `region`, sorted.
    fn cover(&self, region: &Region, min_level: u8, max_level: u8) -> Vec<CellId>;

    /// Cap region centered on `center` with the given area in steradians.
    fn cap_from_center_area(&self, center: LatLng, area: f64) -> Region {
        Region::Cap { center, area }
    }

    /// Finest supported level.
    fn max_level(&self) -> u8 {
        MAX_LEVEL
    }
}
