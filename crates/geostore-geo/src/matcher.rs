use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use geostore_types::{validate_position, CellId, Item};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeoError, GeoResult};
use crate::s2cells::nominal_edge_radians;
use crate::tessellation::{LatLng, Region, Tessellation};

/// Equatorial circumference of the Earth, in meters.
pub const EARTH_CIRCUMFERENCE_METERS: f64 = 40_075_017.0;

/// Upper bound on samples taken along a single polyline edge.
const MAX_SAMPLES_PER_EDGE: usize = 1 << 16;

/// Shape inferred from an item's coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoKind {
    /// Exactly one lat/lng pair.
    Point,
    /// Two or more pairs, first pair differs from last.
    Polyline,
    /// Two or more pairs, first pair equals last.
    Polygon,
}

impl GeoKind {
    /// Classify a validated coordinate sequence.
    pub fn classify(position: &[f64]) -> GeoResult<Self> {
        validate_position(position)?;
        let n = position.len();
        if n == 2 {
            return Ok(Self::Point);
        }
        if position[0] == position[n - 2] && position[1] == position[n - 1] {
            Ok(Self::Polygon)
        } else {
            Ok(Self::Polyline)
        }
    }
}

impl fmt::Display for GeoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Polyline => write!(f, "polyline"),
            Self::Polygon => write!(f, "polygon"),
        }
    }
}

/// How open shapes are covered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolylineStrategy {
    /// One cell per vertex. Cells crossed between vertices are missed.
    #[default]
    VertexSampling,
    /// Vertices plus points interpolated along each edge every quarter of
    /// a nominal cell edge, in degree space.
    EdgeSampling,
}

/// Cells covering one item, with its inferred shape.
///
/// `cell_ids` holds no duplicates and keeps first-seen order, so the first
/// entry is stable for a given geometry: it is the item's home cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoMatch {
    pub cell_ids: Vec<CellId>,
    pub kind: GeoKind,
}

impl GeoMatch {
    /// The cell an [`ItemId`](geostore_types::ItemId) for this item points into.
    pub fn home_cell(&self) -> Option<CellId> {
        self.cell_ids.first().copied()
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.cell_ids.contains(cell)
    }

    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }
}

/// Area in steradians of a disc of `radius` meters, computed as a flat disc
/// over the angular radius. Accurate for radii that are small against the
/// Earth; it is not the exact spherical-cap area.
pub fn radial_area_meters(radius: f64) -> f64 {
    let angular = (radius / EARTH_CIRCUMFERENCE_METERS) * 2.0 * PI;
    PI * angular * angular
}

/// Maps items to their covering cells at a fixed level.
#[derive(Clone)]
pub struct GeoMatcher {
    tessellation: Arc<dyn Tessellation>,
    level: u8,
    polyline: PolylineStrategy,
}

impl GeoMatcher {
    /// Create a matcher at `level`, validated against the tessellation.
    pub fn new(tessellation: Arc<dyn Tessellation>, level: u8) -> GeoResult<Self> {
        let max = tessellation.max_level();
        if level > max {
            return Err(GeoError::InvalidLevel { level, max });
        }
        Ok(Self {
            tessellation,
            level,
            polyline: PolylineStrategy::default(),
        })
    }

    pub fn with_polyline_strategy(mut self, strategy: PolylineStrategy) -> Self {
        self.polyline = strategy;
        self
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn polyline_strategy(&self) -> PolylineStrategy {
        self.polyline
    }

    pub fn tessellation(&self) -> &Arc<dyn Tessellation> {
        &self.tessellation
    }

    /// Classify `item` and compute its covering cells.
    pub fn match_item(&self, item: &dyn Item) -> GeoResult<GeoMatch> {
        self.match_position(&item.position())
    }

    /// Classify a flattened coordinate sequence and compute its covering.
    pub fn match_position(&self, position: &[f64]) -> GeoResult<GeoMatch> {
        let kind = GeoKind::classify(position)?;
        let vertices = LatLng::pairs(position);
        let cell_ids = match kind {
            GeoKind::Point => vec![self.cell_at(vertices[0].lat, vertices[0].lng)],
            GeoKind::Polyline => self.match_polyline(&vertices),
            GeoKind::Polygon => self.match_polygon(&vertices),
        };
        let cell_ids = dedup_in_order(cell_ids);
        debug!(%kind, level = self.level, cells = cell_ids.len(), "geometry matched");
        Ok(GeoMatch { cell_ids, kind })
    }

    /// The cell containing a coordinate at this matcher's level.
    pub fn cell_at(&self, lat: f64, lng: f64) -> CellId {
        self.tessellation.cell_at(lat, lng, self.level)
    }

    /// Cells covering a disc of `radius` meters around a coordinate.
    pub fn radius_cells(&self, lat: f64, lng: f64, radius: f64) -> Vec<CellId> {
        let region = self
            .tessellation
            .cap_from_center_area(LatLng::new(lat, lng), radial_area_meters(radius));
        self.tessellation.cover(&region, self.level, self.level)
    }

    fn match_polyline(&self, vertices: &[LatLng]) -> Vec<CellId> {
        match self.polyline {
            PolylineStrategy::VertexSampling => vertices
                .iter()
                .map(|v| self.cell_at(v.lat, v.lng))
                .collect(),
            PolylineStrategy::EdgeSampling => {
                let step = nominal_edge_radians(self.level).to_degrees() / 4.0;
                let mut cells = vec![self.cell_at(vertices[0].lat, vertices[0].lng)];
                for edge in vertices.windows(2) {
                    let (a, b) = (edge[0], edge[1]);
                    let span = (b.lat - a.lat).abs().max((b.lng - a.lng).abs());
                    let samples = ((span / step).ceil() as usize).clamp(1, MAX_SAMPLES_PER_EDGE);
                    for i in 1..=samples {
                        let t = i as f64 / samples as f64;
                        let lat = a.lat + (b.lat - a.lat) * t;
                        let lng = a.lng + (b.lng - a.lng) * t;
                        cells.push(self.cell_at(lat, lng));
                    }
                }
                cells
            }
        }
    }

    fn match_polygon(&self, vertices: &[LatLng]) -> Vec<CellId> {
        // Drop the closing vertex and any consecutive repeats.
        let mut ring: Vec<LatLng> = Vec::with_capacity(vertices.len());
        for v in &vertices[..vertices.len() - 1] {
            if ring.last() != Some(v) {
                ring.push(*v);
            }
        }
        if ring.len() < 3 {
            // Too few distinct vertices to enclose anything.
            return ring.iter().map(|v| self.cell_at(v.lat, v.lng)).collect();
        }
        self.tessellation
            .cover(&Region::Polygon { ring }, self.level, self.level)
    }
}

impl fmt::Debug for GeoMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoMatcher")
            .field("level", &self.level)
            .field("polyline", &self.polyline)
            .finish()
    }
}

fn dedup_in_order(ids: Vec<CellId>) -> Vec<CellId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2cells::S2Tessellation;
    use geostore_types::Feature;
    use proptest::prelude::*;

    fn matcher(level: u8) -> GeoMatcher {
        GeoMatcher::new(Arc::new(S2Tessellation::new()), level).unwrap()
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    #[test]
    fn classify_by_shape() {
        assert_eq!(GeoKind::classify(&[1.0, 2.0]).unwrap(), GeoKind::Point);
        assert_eq!(
            GeoKind::classify(&[1.0, 2.0, 3.0, 4.0]).unwrap(),
            GeoKind::Polyline
        );
        assert_eq!(
            GeoKind::classify(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 1.0, 2.0]).unwrap(),
            GeoKind::Polygon
        );
    }

    #[test]
    fn closure_compares_whole_pairs() {
        // Same longitude at both ends, different latitude: still open.
        assert_eq!(
            GeoKind::classify(&[1.0, 2.0, 3.0, 4.0, 5.0, 2.0]).unwrap(),
            GeoKind::Polyline
        );
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        assert!(matches!(
            GeoKind::classify(&[]),
            Err(GeoError::InvalidGeometry(_))
        ));
        assert!(matches!(
            matcher(10).match_position(&[1.0, 2.0, 3.0]),
            Err(GeoError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn level_beyond_tessellation_is_rejected() {
        let err = GeoMatcher::new(Arc::new(S2Tessellation::new()), 31).unwrap_err();
        assert_eq!(err, GeoError::InvalidLevel { level: 31, max: 30 });
    }

    // -----------------------------------------------------------------------
    // Coverings
    // -----------------------------------------------------------------------

    #[test]
    fn point_maps_to_containing_cell() {
        let m = matcher(10);
        let gm = m.match_item(&Feature::point("a", 40.0, -73.0)).unwrap();
        assert_eq!(gm.kind, GeoKind::Point);
        assert_eq!(gm.cell_ids, vec![m.cell_at(40.0, -73.0)]);
        assert_eq!(gm.home_cell(), Some(m.cell_at(40.0, -73.0)));
    }

    #[test]
    fn polyline_vertices_are_deduplicated_in_order() {
        let m = matcher(4);
        // First two vertices share a level-4 cell.
        let line = [40.0, -73.0, 40.001, -73.001, -33.9, 151.2];
        let gm = m.match_position(&line).unwrap();
        assert_eq!(gm.kind, GeoKind::Polyline);
        assert_eq!(
            gm.cell_ids,
            vec![m.cell_at(40.0, -73.0), m.cell_at(-33.9, 151.2)]
        );
    }

    #[test]
    fn edge_sampling_reaches_cells_between_vertices() {
        let vertex = matcher(8);
        let edge = matcher(8).with_polyline_strategy(PolylineStrategy::EdgeSampling);
        let line = [10.0, 10.0, 10.0, 12.0];

        let sparse = vertex.match_position(&line).unwrap();
        let dense = edge.match_position(&line).unwrap();
        assert_eq!(sparse.len(), 2);
        assert!(dense.len() > sparse.len());
        for cell in &sparse.cell_ids {
            assert!(dense.contains(cell));
        }
    }

    #[test]
    fn polygon_covers_interior() {
        let m = matcher(5);
        let square = [
            10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0, 10.0, 10.0, 10.0,
        ];
        let gm = m.match_position(&square).unwrap();
        assert_eq!(gm.kind, GeoKind::Polygon);
        assert!(gm.contains(&m.cell_at(15.0, 15.0)));
        assert!(gm.len() > 1);
    }

    #[test]
    fn degenerate_polygon_falls_back_to_vertices() {
        let m = matcher(10);
        let gm = m.match_position(&[5.0, 5.0, 5.0, 5.0]).unwrap();
        assert_eq!(gm.kind, GeoKind::Polygon);
        assert_eq!(gm.cell_ids, vec![m.cell_at(5.0, 5.0)]);
    }

    proptest! {
        #[test]
        fn radius_cells_include_center(
            lat in -80.0f64..80.0,
            lng in -179.9f64..179.9,
            radius in 1.0f64..5_000.0,
        ) {
            let m = matcher(12);
            let cells = m.radius_cells(lat, lng, radius);
            prop_assert!(cells.contains(&m.cell_at(lat, lng)));
        }
    }

    #[test]
    fn radial_area_grows_quadratically() {
        let a = radial_area_meters(100.0);
        let b = radial_area_meters(200.0);
        assert!((b / a - 4.0).abs() < 1e-9);
        assert_eq!(radial_area_meters(0.0), 0.0);
    }

    #[test]
    fn polyline_strategy_serde_names() {
        let json = serde_json::to_string(&PolylineStrategy::EdgeSampling).unwrap();
        assert_eq!(json, "\"edge_sampling\"");
    }
}
