use std::f64::consts::PI;

use geo::{Intersects, LineString, Polygon};
use geostore_types::CellId;
use s2::cap::Cap;
use s2::cell::Cell;
use s2::cellid::CellID;
use s2::latlng::LatLng as S2LatLng;
use s2::point::Point;
use s2::region::RegionCoverer;
use tracing::debug;

use crate::tessellation::{LatLng, Region, Tessellation, MAX_LEVEL};

/// Default soft limit on the number of cells in a covering.
pub const DEFAULT_MAX_CELLS: usize = 1024;

/// [`Tessellation`] backed by the S2 cube-face quadtree.
///
/// Caps are covered with the S2 region coverer. Polygons are covered by
/// taking the level cells of the polygon's bounding cap and keeping those
/// whose lat/lng quad intersects the polygon; cell edges are treated as
/// straight lines in degree space and polygons crossing the antimeridian
/// are not split.
///
/// Polygon covering cost grows with the area of that bounding cap, not with
/// the polygon: every level cell inside the cap is tested. A ring whose
/// vertices balance around the earth's center (say, four points spread along
/// the equator) gets the whole sphere as its cap, which at level 10 means
/// 6·4^10 (about 6.3 million) candidate cells. Match such shapes at a coarse
/// level or split them first.
#[derive(Clone, Debug)]
pub struct S2Tessellation {
    max_cells: usize,
}

impl S2Tessellation {
    pub fn new() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    /// Set the covering soft limit. Fixed-level coverings may exceed it.
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells.max(1);
        self
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    fn coverer(&self, min_level: u8, max_level: u8) -> RegionCoverer {
        RegionCoverer {
            min_level,
            max_level,
            level_mod: 1,
            max_cells: self.max_cells,
        }
    }

    fn cover_cap(&self, center: LatLng, area: f64, min_level: u8, max_level: u8) -> Vec<CellID> {
        let ll = S2LatLng::from_degrees(center.lat, center.lng);
        let cap = Cap::from_center_area(&Point::from(&ll), area);
        let union = self.coverer(min_level, max_level).covering(&cap);
        union.0
    }

    fn cover_polygon(&self, ring: &[LatLng], level: u8) -> Vec<CellID> {
        let (center, angle) = bounding_cap(ring);
        // Widen by one nominal cell edge so cells straddling the rim qualify.
        let angle = (angle + nominal_edge_radians(level)).min(PI);
        let area = 2.0 * PI * (1.0 - angle.cos());

        let shape = Polygon::new(
            LineString::from(ring.iter().map(|p| (p.lng, p.lat)).collect::<Vec<_>>()),
            vec![],
        );

        let candidates = fixed_level(self.cover_cap(center, area, level, level), level);
        let total = candidates.len();
        let kept: Vec<CellID> = candidates
            .into_iter()
            .filter(|id| shape.intersects(&cell_quad(id)))
            .collect();
        debug!(level, candidates = total, kept = kept.len(), "polygon covering");
        kept
    }
}

impl Default for S2Tessellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessellation for S2Tessellation {
    fn cell_at(&self, lat: f64, lng: f64, level: u8) -> CellId {
        let leaf = CellID::from(&S2LatLng::from_degrees(lat, lng));
        CellId::new(leaf.parent(level.min(MAX_LEVEL) as u64).0)
    }

    fn parent_at(&self, cell: CellId, level: u8) -> CellId {
        CellId::new(CellID(cell.raw()).parent(level as u64).0)
    }

    fn cover(&self, region: &Region, min_level: u8, max_level: u8) -> Vec<CellId> {
        let min_level = min_level.min(MAX_LEVEL);
        let max_level = max_level.clamp(min_level, MAX_LEVEL);

        let mut ids = match region {
            Region::Cap { center, area } => {
                let ids = self.cover_cap(*center, *area, min_level, max_level);
                if min_level == max_level {
                    fixed_level(ids, max_level)
                } else {
                    ids
                }
            }
            Region::Polygon { ring } if ring.is_empty() => Vec::new(),
            Region::Polygon { ring } => self.cover_polygon(ring, max_level),
        };
        ids.sort();
        ids.dedup();
        ids.into_iter().map(|id| CellId::new(id.0)).collect()
    }
}

/// Bring every cell of a covering to exactly `level`: finer cells are
/// replaced by their ancestor, coarser cells by all their descendants.
fn fixed_level(ids: Vec<CellID>, level: u8) -> Vec<CellID> {
    let level = level as u64;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let own = id.level();
        if own == level {
            out.push(id);
        } else if own > level {
            out.push(id.parent(level));
        } else {
            let end = id.child_end_at_level(level);
            let mut child = id.child_begin_at_level(level);
            while child != end {
                out.push(child);
                child = child.next();
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Lat/lng quad spanned by the four vertices of a cell.
fn cell_quad(id: &CellID) -> Polygon<f64> {
    let cell = Cell::from(id);
    let corners: Vec<(f64, f64)> = (0..4)
        .map(|k| {
            let ll = S2LatLng::from(&cell.vertex(k));
            (ll.lng.deg(), ll.lat.deg())
        })
        .collect();
    Polygon::new(LineString::from(corners), vec![])
}

/// Center and angular radius (radians) of a cap containing every vertex.
fn bounding_cap(ring: &[LatLng]) -> (LatLng, f64) {
    let vectors: Vec<[f64; 3]> = ring.iter().map(|p| unit_vector(*p)).collect();
    let sum = vectors.iter().fold([0.0; 3], |acc, v| {
        [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]
    });
    let norm = (sum[0] * sum[0] + sum[1] * sum[1] + sum[2] * sum[2]).sqrt();
    if norm < 1e-12 {
        // Vertices balance out around the origin; only a hemisphere-plus cap works.
        return (ring[0], PI);
    }
    let c = [sum[0] / norm, sum[1] / norm, sum[2] / norm];
    let angle = vectors
        .iter()
        .map(|v| (v[0] * c[0] + v[1] * c[1] + v[2] * c[2]).clamp(-1.0, 1.0).acos())
        .fold(0.0, f64::max);
    let center = LatLng::new(c[2].asin().to_degrees(), c[1].atan2(c[0]).to_degrees());
    (center, angle)
}

fn unit_vector(p: LatLng) -> [f64; 3] {
    let (lat, lng) = (p.lat.to_radians(), p.lng.to_radians());
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

/// Nominal edge length of a cell at `level`, in radians. A cube face spans
/// a quarter turn and every level halves the edge.
pub(crate) fn nominal_edge_radians(level: u8) -> f64 {
    (PI / 2.0) / f64::from(1u32 << level.min(MAX_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tess() -> S2Tessellation {
        S2Tessellation::new()
    }

    #[test]
    fn balanced_ring_gets_whole_sphere_cap() {
        let ring = [
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 90.0),
            LatLng::new(0.0, 180.0),
            LatLng::new(0.0, -90.0),
        ];
        let (_, angle) = bounding_cap(&ring);
        assert_eq!(angle, PI);

        let local = [
            LatLng::new(10.0, 10.0),
            LatLng::new(10.0, 15.0),
            LatLng::new(15.0, 15.0),
        ];
        let (_, angle) = bounding_cap(&local);
        assert!(angle < 0.1);
    }

    #[test]
    fn cell_at_is_deterministic_and_level_bound() {
        let a = tess().cell_at(40.0, -73.0, 10);
        let b = tess().cell_at(40.0, -73.0, 10);
        assert_eq!(a, b);
        assert_eq!(CellID(a.raw()).level(), 10);
    }

    #[test]
    fn parent_of_fine_cell_matches_coarse_lookup() {
        let fine = tess().cell_at(51.5, -0.12, 20);
        let coarse = tess().cell_at(51.5, -0.12, 8);
        assert_eq!(tess().parent_at(fine, 8), coarse);
    }

    #[test]
    fn nearby_points_share_coarse_cell() {
        let a = tess().cell_at(40.0, -73.0, 5);
        let b = tess().cell_at(40.0001, -73.0001, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn cap_covering_contains_center_cell() {
        let center = LatLng::new(40.0, -73.0);
        let region = tess().cap_from_center_area(center, 1e-8);
        let cells = tess().cover(&region, 12, 12);
        assert!(!cells.is_empty());
        assert!(cells.contains(&tess().cell_at(40.0, -73.0, 12)));
        for c in &cells {
            assert_eq!(CellID(c.raw()).level(), 12);
        }
    }

    #[test]
    fn polygon_covering_contains_interior_cell() {
        let ring = vec![
            LatLng::new(10.0, 10.0),
            LatLng::new(10.0, 20.0),
            LatLng::new(20.0, 20.0),
            LatLng::new(20.0, 10.0),
        ];
        let cells = tess().cover(&Region::Polygon { ring }, 5, 5);
        assert!(cells.contains(&tess().cell_at(15.0, 15.0, 5)));
        assert!(!cells.contains(&tess().cell_at(-40.0, 120.0, 5)));
    }

    #[test]
    fn polygon_covering_is_sorted_and_unique() {
        let ring = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 5.0),
            LatLng::new(5.0, 5.0),
        ];
        let cells = tess().cover(&Region::Polygon { ring }, 6, 6);
        for w in cells.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn empty_polygon_covers_nothing() {
        assert!(tess().cover(&Region::Polygon { ring: vec![] }, 5, 5).is_empty());
    }

    #[test]
    fn nominal_edge_halves_per_level() {
        let l4 = nominal_edge_radians(4);
        let l5 = nominal_edge_radians(5);
        assert!((l4 / l5 - 2.0).abs() < 1e-12);
    }
}
