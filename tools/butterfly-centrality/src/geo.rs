//! Geodesic bearing and distance on the WGS84 ellipsoid

use butterfly_common::{Error, Result};
use geo::{Bearing, Distance, Geodesic, Point};

/// Result of the inverse geodesic problem between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inverse {
    /// Azimuth at the first point towards the second, degrees in [0, 360)
    pub forward_azimuth: f64,
    /// Azimuth at the second point back towards the first, degrees in [0, 360)
    pub back_azimuth: f64,
    /// Geodesic distance in meters
    pub distance: f64,
}

/// Check that a (lat, lon) pair lies inside the valid degree ranges
pub fn validate_coordinate(lat: f64, lon: f64) -> Result<()> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(Error::Geodesic { lat, lon })
    }
}

/// Solve the inverse geodesic problem between `a` and `b`, both (lat, lon) in degrees.
///
/// Uses Karney's algorithm on the WGS84 ellipsoid, so distances stay
/// meter-accurate from city to country scale. Identical points yield a
/// zero distance and zero azimuths.
pub fn bearing_and_distance(a: (f64, f64), b: (f64, f64)) -> Result<Inverse> {
    validate_coordinate(a.0, a.1)?;
    validate_coordinate(b.0, b.1)?;

    let p1 = Point::new(a.1, a.0); // [lon, lat]
    let p2 = Point::new(b.1, b.0);

    if p1 == p2 {
        return Ok(Inverse {
            forward_azimuth: 0.0,
            back_azimuth: 0.0,
            distance: 0.0,
        });
    }

    Ok(Inverse {
        forward_azimuth: normalize_bearing(Geodesic.bearing(p1, p2)),
        back_azimuth: normalize_bearing(Geodesic.bearing(p2, p1)),
        distance: Geodesic.distance(p1, p2),
    })
}

fn normalize_bearing(deg: f64) -> f64 {
    let normalized = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}
