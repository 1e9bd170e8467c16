//! Great-circle helpers shared by the spatial index and the API layer.
//!
//! Coordinates are plain `(latitude, longitude)` degrees here; the `geo`
//! crate expects `(x = longitude, y = latitude)`, so every conversion into a
//! `geo::Point` goes through [`point`].

use geo::{HaversineDistance, Point};

/// Mean Earth radius in meters (IUGG), the same value `geo` uses for haversine.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Builds a `geo::Point` from latitude/longitude degrees.
pub fn point(latitude: f64, longitude: f64) -> Point<f64> {
    Point::new(longitude, latitude)
}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance_meters(
    from_latitude: f64,
    from_longitude: f64,
    to_latitude: f64,
    to_longitude: f64,
) -> f64 {
    point(from_latitude, from_longitude).haversine_distance(&point(to_latitude, to_longitude))
}

/// Converts a north/south distance to degrees of latitude.
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_METERS).to_degrees()
}

/// Converts an east/west distance at the given latitude to degrees of longitude.
///
/// Returns `None` when the parallel is too short for the conversion to be
/// meaningful (within a few meters of a pole).
pub fn meters_to_longitude_degrees(meters: f64, at_latitude: f64) -> Option<f64> {
    let cos_lat = at_latitude.to_radians().cos();
    if cos_lat < 1e-9 {
        return None;
    }
    Some(meters_to_latitude_degrees(meters) / cos_lat)
}

/// Wraps a longitude into `[-180, 180)`.
pub fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == 180.0 {
        -180.0
    } else {
        wrapped
    }
}

/// Approximate distance in meters from a point to the segment `a`-`b`.
///
/// Uses an equirectangular projection centred on the point, which is accurate
/// to well under a percent for the segment lengths a geofence ring contains.
/// Longitude deltas are wrapped so segments crossing the anti-meridian work.
pub fn point_segment_distance_meters(
    latitude: f64,
    longitude: f64,
    a: (f64, f64),
    b: (f64, f64),
) -> f64 {
    let cos_lat = latitude.to_radians().cos();
    let project = |(lat, lon): (f64, f64)| -> (f64, f64) {
        let dlon = normalize_longitude(lon - longitude);
        let x = dlon.to_radians() * cos_lat * EARTH_RADIUS_METERS;
        let y = (lat - latitude).to_radians() * EARTH_RADIUS_METERS;
        (x, y)
    };

    let (ax, ay) = project(a);
    let (bx, by) = project(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((-ax * dx - ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_haversine_across_antimeridian() {
        let d = haversine_distance_meters(0.0, 179.999, 0.0, -179.999);
        assert!(d < 250.0, "got {}", d);
    }

    #[test]
    fn test_meters_to_degrees_round_trip() {
        let deg = meters_to_latitude_degrees(111_195.0);
        assert!((deg - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_meters_to_longitude_degrees_grows_with_latitude() {
        let equator = meters_to_longitude_degrees(1000.0, 0.0).unwrap();
        let north = meters_to_longitude_degrees(1000.0, 60.0).unwrap();
        assert!((north - 2.0 * equator).abs() < 1e-6);
        assert!(meters_to_longitude_degrees(1000.0, 90.0).is_none());
    }

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(190.0), -170.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        assert_eq!(normalize_longitude(180.0), -180.0);
        assert_eq!(normalize_longitude(45.0), 45.0);
    }

    #[test]
    fn test_point_segment_distance_perpendicular() {
        // Segment along the equator, point ~1.1 km north of its middle.
        let d = point_segment_distance_meters(0.01, 0.5, (0.0, 0.0), (0.0, 1.0));
        assert!((d - 1_112.0).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn test_point_segment_distance_endpoint() {
        let d = point_segment_distance_meters(0.0, 2.0, (0.0, 0.0), (0.0, 1.0));
        let expected = haversine_distance_meters(0.0, 2.0, 0.0, 1.0);
        assert!((d - expected).abs() < 5.0, "got {} expected {}", d, expected);
    }
}
