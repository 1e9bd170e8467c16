//! Spatial index over geofence shapes.
//!
//! Shapes are validated and prepared once at registration ([`PreparedShape`])
//! and bucketed into a uniform latitude/longitude grid. A point query looks
//! up the point's cell, then runs the exact containment test on the shapes
//! registered in that cell plus the oversized shapes that cover too many
//! cells to be bucketed.
//!
//! Containment rules:
//! - circles use the haversine distance to the center;
//! - polygons use planar containment on the lon/lat ring. Points on the
//!   boundary are outside.
//!
//! Rings crossing the anti-meridian are unwrapped into `[0, 360)` longitude
//! before testing. A crossing ring that is still wider than 180 degrees after
//! unwrapping cannot be told apart from its complement and is rejected.

use std::collections::{HashMap, HashSet};

use geo::{Area, Contains, Intersects, Line, LineString, Point, Polygon};
use uuid::Uuid;

use crate::error::GeofenceError;
use crate::models::geofence::{validation_message, Coordinate, GeofenceShape, MAX_POLYGON_VERTICES};

/// Default grid cell size in degrees (about 5.5 km of latitude).
pub const DEFAULT_CELL_DEGREES: f64 = 0.05;

/// Up to this many shapes a query scans every shape instead of the grid.
pub const DEFAULT_LINEAR_SCAN_THRESHOLD: usize = 32;

/// Shapes whose bounding box covers more cells than this are kept in the
/// oversized list and tested on every query.
pub const MAX_CELLS_PER_SHAPE: usize = 4096;

/// A validated shape ready for containment tests.
#[derive(Debug, Clone)]
pub enum PreparedShape {
    Circle {
        center: Coordinate,
        radius_meters: f64,
    },
    Polygon {
        ring: Polygon<f64>,
        /// `(latitude, unwrapped longitude)` pairs, without the closing vertex.
        vertices: Vec<(f64, f64)>,
        crosses_antimeridian: bool,
    },
}

impl PreparedShape {
    /// Validates a shape and prepares it for querying.
    pub fn prepare(shape: &GeofenceShape) -> Result<Self, GeofenceError> {
        match shape {
            GeofenceShape::Circle {
                center,
                radius_meters,
            } => {
                center.check().map_err(GeofenceError::Validation)?;
                shared::validation::validate_radius_meters(*radius_meters)
                    .map_err(|e| GeofenceError::Validation(validation_message(e)))?;
                Ok(PreparedShape::Circle {
                    center: *center,
                    radius_meters: *radius_meters,
                })
            }
            GeofenceShape::Polygon { vertices } => prepare_polygon(vertices),
        }
    }

    /// Exact containment test. Boundary points are outside.
    pub fn contains(&self, point: Coordinate) -> bool {
        match self {
            PreparedShape::Circle {
                center,
                radius_meters,
            } => {
                shared::geodesy::haversine_distance_meters(
                    center.latitude,
                    center.longitude,
                    point.latitude,
                    point.longitude,
                ) <= *radius_meters
            }
            PreparedShape::Polygon {
                ring,
                crosses_antimeridian,
                ..
            } => {
                let x = unwrap_longitude(point.longitude, *crosses_antimeridian);
                ring.contains(&Point::new(x, point.latitude))
            }
        }
    }

    /// Signed distance to the boundary in meters: negative inside, positive outside.
    pub fn distance_to_boundary_meters(&self, point: Coordinate) -> f64 {
        match self {
            PreparedShape::Circle {
                center,
                radius_meters,
            } => {
                shared::geodesy::haversine_distance_meters(
                    center.latitude,
                    center.longitude,
                    point.latitude,
                    point.longitude,
                ) - radius_meters
            }
            PreparedShape::Polygon { vertices, .. } => {
                let n = vertices.len();
                let distance = (0..n)
                    .map(|i| {
                        shared::geodesy::point_segment_distance_meters(
                            point.latitude,
                            point.longitude,
                            vertices[i],
                            vertices[(i + 1) % n],
                        )
                    })
                    .fold(f64::INFINITY, f64::min);
                if self.contains(point) {
                    -distance
                } else {
                    distance
                }
            }
        }
    }

    /// Latitude band and longitude ranges (in `[-180, 180]`) covering the shape.
    fn bounds(&self) -> Bounds {
        match self {
            PreparedShape::Circle {
                center,
                radius_meters,
            } => {
                let dlat = shared::geodesy::meters_to_latitude_degrees(*radius_meters);
                let min_lat = center.latitude - dlat;
                let max_lat = center.latitude + dlat;
                if min_lat <= -90.0 || max_lat >= 90.0 {
                    return Bounds::full_longitude(min_lat.max(-90.0), max_lat.min(90.0));
                }
                let widest = min_lat.abs().max(max_lat.abs());
                match shared::geodesy::meters_to_longitude_degrees(*radius_meters, widest) {
                    Some(dlon) if dlon < 180.0 => Bounds {
                        min_lat,
                        max_lat,
                        lon_ranges: split_longitude_range(
                            center.longitude - dlon,
                            center.longitude + dlon,
                        ),
                    },
                    _ => Bounds::full_longitude(min_lat, max_lat),
                }
            }
            PreparedShape::Polygon { vertices, .. } => {
                let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
                let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
                for &(lat, x) in vertices {
                    min_lat = min_lat.min(lat);
                    max_lat = max_lat.max(lat);
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                }
                Bounds {
                    min_lat,
                    max_lat,
                    lon_ranges: split_longitude_range(min_x, max_x),
                }
            }
        }
    }
}

fn unwrap_longitude(longitude: f64, crosses_antimeridian: bool) -> f64 {
    if crosses_antimeridian && longitude < 0.0 {
        longitude + 360.0
    } else {
        longitude
    }
}

fn prepare_polygon(vertices: &[Coordinate]) -> Result<PreparedShape, GeofenceError> {
    for vertex in vertices {
        vertex.check().map_err(GeofenceError::Validation)?;
    }

    let mut ring: Vec<Coordinate> = vertices.to_vec();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    if ring.len() < 3 {
        return Err(GeofenceError::Validation(
            "Polygon needs at least 3 distinct vertices".to_string(),
        ));
    }
    if ring.len() > MAX_POLYGON_VERTICES {
        return Err(GeofenceError::Validation(format!(
            "Polygon cannot have more than {} vertices",
            MAX_POLYGON_VERTICES
        )));
    }

    let n = ring.len();
    if (0..n).any(|i| ring[i] == ring[(i + 1) % n]) {
        return Err(GeofenceError::Validation(
            "Polygon has repeated consecutive vertices".to_string(),
        ));
    }

    let crosses_antimeridian =
        (0..n).any(|i| (ring[i].longitude - ring[(i + 1) % n].longitude).abs() > 180.0);

    let unwrapped: Vec<(f64, f64)> = ring
        .iter()
        .map(|c| (c.latitude, unwrap_longitude(c.longitude, crosses_antimeridian)))
        .collect();

    if crosses_antimeridian {
        let (min_x, max_x) = unwrapped
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, x)| {
                (lo.min(x), hi.max(x))
            });
        if max_x - min_x > 180.0 {
            return Err(GeofenceError::Validation(
                "Polygon crossing the anti-meridian cannot span more than 180 degrees of longitude"
                    .to_string(),
            ));
        }
    }

    // geo works in (x, y) = (longitude, latitude)
    let points: Vec<(f64, f64)> = unwrapped.iter().map(|&(lat, x)| (x, lat)).collect();
    check_simple_ring(&points)?;

    let polygon = Polygon::new(LineString::from(points), vec![]);
    if polygon.unsigned_area() <= f64::EPSILON {
        return Err(GeofenceError::Validation(
            "Polygon must enclose a non-zero area".to_string(),
        ));
    }

    Ok(PreparedShape::Polygon {
        ring: polygon,
        vertices: unwrapped,
        crosses_antimeridian,
    })
}

/// Rejects rings whose edges cross or fold back over each other.
fn check_simple_ring(points: &[(f64, f64)]) -> Result<(), GeofenceError> {
    let n = points.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(points[i], points[(i + 1) % n]))
        .collect();

    for i in 0..n {
        // Adjacent edges share a vertex; they only conflict if they double back.
        let (a, b) = (edges[i], edges[(i + 1) % n]);
        let (ax, ay) = (a.end.x - a.start.x, a.end.y - a.start.y);
        let (bx, by) = (b.end.x - b.start.x, b.end.y - b.start.y);
        let cross = ax * by - ay * bx;
        let dot = ax * bx + ay * by;
        if cross.abs() <= f64::EPSILON && dot < 0.0 {
            return Err(GeofenceError::Validation(
                "Polygon ring folds back on itself".to_string(),
            ));
        }

        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return Err(GeofenceError::Validation(
                    "Polygon ring is self-intersecting".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Splits `[lo, hi]` into ranges within `[-180, 180]`.
fn split_longitude_range(lo: f64, hi: f64) -> Vec<(f64, f64)> {
    if hi - lo >= 360.0 {
        return vec![(-180.0, 180.0)];
    }
    let shift = ((lo + 180.0) / 360.0).floor() * 360.0;
    let (lo, hi) = (lo - shift, hi - shift);
    if hi <= 180.0 {
        vec![(lo, hi)]
    } else {
        vec![(lo, 180.0), (-180.0, hi - 360.0)]
    }
}

#[derive(Debug, Clone)]
struct Bounds {
    min_lat: f64,
    max_lat: f64,
    lon_ranges: Vec<(f64, f64)>,
}

impl Bounds {
    fn full_longitude(min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            lon_ranges: vec![(-180.0, 180.0)],
        }
    }
}

type CellKey = (i32, i32);

#[derive(Debug, Clone)]
struct IndexedShape {
    shape: PreparedShape,
    cells: Vec<CellKey>,
}

/// Grid-bucketed index of prepared shapes keyed by geofence id.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_degrees: f64,
    rows: i32,
    cols: i32,
    linear_scan_threshold: usize,
    shapes: HashMap<Uuid, IndexedShape>,
    cells: HashMap<CellKey, Vec<Uuid>>,
    oversized: HashSet<Uuid>,
}

impl SpatialIndex {
    /// Create an index with the given cell size and linear-scan threshold.
    pub fn new(cell_degrees: f64, linear_scan_threshold: usize) -> Self {
        let cell_degrees = if cell_degrees.is_finite() && cell_degrees > 0.0 {
            cell_degrees.min(90.0)
        } else {
            DEFAULT_CELL_DEGREES
        };
        Self {
            cell_degrees,
            rows: (180.0 / cell_degrees).ceil() as i32,
            cols: (360.0 / cell_degrees).ceil() as i32,
            linear_scan_threshold,
            shapes: HashMap::new(),
            cells: HashMap::new(),
            oversized: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Number of shapes tested on every grid query.
    pub fn oversized_count(&self) -> usize {
        self.oversized.len()
    }

    /// Inserts a shape, replacing any shape previously stored under `id`.
    pub fn insert(&mut self, id: Uuid, shape: PreparedShape) {
        self.remove(id);

        match self.cells_for(&shape.bounds()) {
            Some(cells) => {
                for cell in &cells {
                    self.cells.entry(*cell).or_default().push(id);
                }
                self.shapes.insert(id, IndexedShape { shape, cells });
            }
            None => {
                self.oversized.insert(id);
                self.shapes.insert(
                    id,
                    IndexedShape {
                        shape,
                        cells: Vec::new(),
                    },
                );
            }
        }
    }

    /// Removes a shape. Returns false if it was not indexed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(indexed) = self.shapes.remove(&id) else {
            return false;
        };
        self.oversized.remove(&id);
        for cell in indexed.cells {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Ids of all shapes containing `point`, sorted for deterministic output.
    pub fn query(&self, point: Coordinate) -> Vec<Uuid> {
        let mut hits: Vec<Uuid> = if self.shapes.len() <= self.linear_scan_threshold {
            self.shapes
                .iter()
                .filter(|(_, indexed)| indexed.shape.contains(point))
                .map(|(id, _)| *id)
                .collect()
        } else {
            let mut candidates: HashSet<Uuid> = self.oversized.clone();
            for cell in self.cells_for_point(point) {
                if let Some(ids) = self.cells.get(&cell) {
                    candidates.extend(ids.iter().copied());
                }
            }
            candidates
                .into_iter()
                .filter(|id| {
                    self.shapes
                        .get(id)
                        .map(|indexed| indexed.shape.contains(point))
                        .unwrap_or(false)
                })
                .collect()
        };
        hits.sort();
        hits
    }

    /// Signed distance from `point` to the boundary of shape `id`.
    pub fn distance_to_boundary(&self, id: Uuid, point: Coordinate) -> Option<f64> {
        self.shapes
            .get(&id)
            .map(|indexed| indexed.shape.distance_to_boundary_meters(point))
    }

    fn row(&self, latitude: f64) -> i32 {
        (((latitude + 90.0) / self.cell_degrees).floor() as i32).clamp(0, self.rows - 1)
    }

    fn col(&self, longitude: f64) -> i32 {
        (((longitude + 180.0) / self.cell_degrees).floor() as i32).clamp(0, self.cols - 1)
    }

    fn cells_for_point(&self, point: Coordinate) -> Vec<CellKey> {
        let row = self.row(point.latitude);
        if point.longitude.abs() == 180.0 {
            // -180 and 180 are the same meridian but map to opposite edge columns.
            vec![(row, 0), (row, self.cols - 1)]
        } else {
            vec![(row, self.col(point.longitude))]
        }
    }

    fn cells_for(&self, bounds: &Bounds) -> Option<Vec<CellKey>> {
        let (row_lo, row_hi) = (self.row(bounds.min_lat), self.row(bounds.max_lat));
        let col_spans: Vec<(i32, i32)> = bounds
            .lon_ranges
            .iter()
            .map(|&(lo, hi)| (self.col(lo), self.col(hi)))
            .collect();

        let rows = (row_hi - row_lo + 1) as usize;
        let cols: usize = col_spans.iter().map(|(lo, hi)| (hi - lo + 1) as usize).sum();
        if rows.saturating_mul(cols) > MAX_CELLS_PER_SHAPE {
            return None;
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for row in row_lo..=row_hi {
            for &(lo, hi) in &col_spans {
                for col in lo..=hi {
                    cells.push((row, col));
                }
            }
        }
        cells.sort();
        cells.dedup();
        Some(cells)
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_DEGREES, DEFAULT_LINEAR_SCAN_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    fn circle(lat: f64, lon: f64, radius: f64) -> PreparedShape {
        PreparedShape::prepare(&GeofenceShape::Circle {
            center: Coordinate::new(lat, lon),
            radius_meters: radius,
        })
        .unwrap()
    }

    fn polygon(points: &[(f64, f64)]) -> Result<PreparedShape, GeofenceError> {
        PreparedShape::prepare(&GeofenceShape::Polygon {
            vertices: points
                .iter()
                .map(|&(lat, lon)| Coordinate::new(lat, lon))
                .collect(),
        })
    }

    fn square(lat: f64, lon: f64, half: f64) -> PreparedShape {
        polygon(&[
            (lat - half, lon - half),
            (lat - half, lon + half),
            (lat + half, lon + half),
            (lat + half, lon - half),
        ])
        .unwrap()
    }

    #[test]
    fn test_circle_containment() {
        let shape = circle(0.0, 0.0, 100.0);
        assert!(shape.contains(Coordinate::new(0.0, 0.0)));
        assert!(shape.contains(Coordinate::new(0.0008, 0.0)));
        // ~1 km north
        assert!(!shape.contains(Coordinate::new(0.009, 0.0)));
    }

    #[test]
    fn test_circle_radius_bounds_rejected() {
        for radius in [49.0, 50_001.0] {
            let result = PreparedShape::prepare(&GeofenceShape::Circle {
                center: Coordinate::new(0.0, 0.0),
                radius_meters: radius,
            });
            assert!(matches!(result, Err(GeofenceError::Validation(_))));
        }
    }

    #[test]
    fn test_polygon_containment_and_boundary() {
        let shape = square(10.0, 10.0, 1.0);
        assert!(shape.contains(Coordinate::new(10.0, 10.0)));
        assert!(!shape.contains(Coordinate::new(12.0, 10.0)));
        // On the western edge: ambiguous, treated as outside
        assert!(!shape.contains(Coordinate::new(10.0, 9.0)));
    }

    #[test]
    fn test_polygon_accepts_closing_vertex() {
        let shape = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]).unwrap();
        match shape {
            PreparedShape::Polygon { vertices, .. } => assert_eq!(vertices.len(), 3),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_polygon_rejects_bowtie() {
        let result = polygon(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]);
        assert_eq!(
            result.unwrap_err(),
            GeofenceError::Validation("Polygon ring is self-intersecting".to_string())
        );
    }

    #[test]
    fn test_polygon_rejects_degenerate_rings() {
        assert!(polygon(&[(0.0, 0.0), (0.0, 1.0)]).is_err());
        assert!(polygon(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]).is_err());
        assert!(polygon(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 0.0)]).is_err());
        assert!(polygon(&[(0.0, 0.0), (0.0, 2.0), (0.0, 1.0), (1.0, 1.0)]).is_err());
        assert!(polygon(&[(95.0, 0.0), (0.0, 1.0), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_polygon_vertex_limit() {
        let ring = |n: usize| -> Vec<(f64, f64)> {
            (0..n)
                .map(|i| {
                    let angle = (i as f64) * std::f64::consts::TAU / (n as f64);
                    (angle.sin(), angle.cos())
                })
                .collect()
        };
        assert!(polygon(&ring(100)).is_ok());
        assert!(polygon(&ring(101)).is_err());
    }

    #[test]
    fn test_polygon_across_antimeridian() {
        let shape = polygon(&[(10.0, 170.0), (10.0, -170.0), (-10.0, -170.0), (-10.0, 170.0)])
            .unwrap();
        assert!(shape.contains(Coordinate::new(0.0, 179.0)));
        assert!(shape.contains(Coordinate::new(0.0, -179.0)));
        assert!(shape.contains(Coordinate::new(0.0, 180.0)));
        assert!(!shape.contains(Coordinate::new(0.0, 0.0)));
        assert!(!shape.contains(Coordinate::new(0.0, -160.0)));
    }

    #[test]
    fn test_polygon_across_antimeridian_too_wide_rejected() {
        // 10 -> -175 crosses; unwrapped the ring spans 10..260
        let result = polygon(&[(10.0, 10.0), (10.0, -175.0), (-10.0, -100.0), (-10.0, 10.0)]);
        assert!(matches!(result, Err(GeofenceError::Validation(_))));

        let ordinary = polygon(&[(10.0, 10.0), (10.0, -100.0), (-10.0, -100.0), (-10.0, 10.0)]);
        assert!(ordinary.is_ok());
    }

    #[test]
    fn test_distance_to_boundary() {
        let shape = circle(0.0, 0.0, 100.0);
        let inside = shape.distance_to_boundary_meters(Coordinate::new(0.0, 0.0));
        assert!((inside + 100.0).abs() < 1e-6);

        let square = square(0.0, 0.0, 0.01);
        let center = square.distance_to_boundary_meters(Coordinate::new(0.0, 0.0));
        assert!(center < 0.0);
        assert!((center.abs() - 1_112.0).abs() < 5.0, "got {}", center);

        let outside = square.distance_to_boundary_meters(Coordinate::new(0.02, 0.0));
        assert!((outside - 1_112.0).abs() < 5.0, "got {}", outside);
    }

    #[test]
    fn test_split_longitude_range() {
        assert_eq!(split_longitude_range(10.0, 20.0), vec![(10.0, 20.0)]);
        assert_eq!(
            split_longitude_range(170.0, 190.0),
            vec![(170.0, 180.0), (-180.0, -170.0)]
        );
        assert_eq!(
            split_longitude_range(-190.0, -170.0),
            vec![(170.0, 180.0), (-180.0, -170.0)]
        );
        assert_eq!(split_longitude_range(-200.0, 200.0), vec![(-180.0, 180.0)]);
    }

    #[test]
    fn test_index_insert_query_remove() {
        let mut index = SpatialIndex::new(DEFAULT_CELL_DEGREES, 0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        index.insert(a, circle(0.0, 0.0, 1_000.0));
        index.insert(b, circle(0.0, 0.005, 1_000.0));
        assert_eq!(index.len(), 2);

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(index.query(Coordinate::new(0.0, 0.0025)), expected);
        assert_eq!(index.query(Coordinate::new(0.0, -0.008)), vec![a]);

        assert!(index.remove(a));
        assert!(!index.remove(a));
        assert_eq!(index.query(Coordinate::new(0.0, -0.008)), Vec::<Uuid>::new());
        assert_eq!(index.query(Coordinate::new(0.0, 0.0025)), vec![b]);
    }

    #[test]
    fn test_index_update_moves_shape() {
        let mut index = SpatialIndex::new(DEFAULT_CELL_DEGREES, 0);
        let id = Uuid::new_v4();
        index.insert(id, circle(0.0, 0.0, 500.0));
        index.insert(id, circle(40.0, 40.0, 500.0));
        assert_eq!(index.len(), 1);
        assert!(index.query(Coordinate::new(0.0, 0.0)).is_empty());
        assert_eq!(index.query(Coordinate::new(40.0, 40.0)), vec![id]);
    }

    #[test]
    fn test_index_oversized_shapes() {
        let mut index = SpatialIndex::new(DEFAULT_CELL_DEGREES, 0);
        let id = Uuid::new_v4();
        index.insert(id, square(0.0, 0.0, 10.0));
        assert_eq!(index.oversized_count(), 1);
        assert_eq!(index.query(Coordinate::new(5.0, -5.0)), vec![id]);
        index.remove(id);
        assert_eq!(index.oversized_count(), 0);
    }

    #[test]
    fn test_index_circle_across_antimeridian() {
        let mut index = SpatialIndex::new(DEFAULT_CELL_DEGREES, 0);
        let id = Uuid::new_v4();
        index.insert(id, circle(0.0, 179.9995, 200.0));
        assert_eq!(index.query(Coordinate::new(0.0, -179.9995)), vec![id]);
        assert_eq!(index.query(Coordinate::new(0.0, 180.0)), vec![id]);
    }

    #[test]
    fn test_grid_matches_linear_scan() {
        let mut grid = SpatialIndex::new(DEFAULT_CELL_DEGREES, 0);
        let mut linear = SpatialIndex::new(DEFAULT_CELL_DEGREES, usize::MAX);

        for _ in 0..200 {
            let lat: f64 = (-1.0..1.0).fake();
            let lon: f64 = (-1.0..1.0).fake();
            let radius: f64 = (50.0..20_000.0).fake();
            let id = Uuid::new_v4();
            grid.insert(id, circle(lat, lon, radius));
            linear.insert(id, circle(lat, lon, radius));
        }

        for _ in 0..500 {
            let point = Coordinate::new((-1.2..1.2).fake(), (-1.2..1.2).fake());
            assert_eq!(grid.query(point), linear.query(point));
        }
    }
}
