//! Spherical geometry shared by the interference engine, graph utilities and
//! deployment-rule checks: distance, bearing and the angle/length-ratio test
//! used to find angularly-close link pairs.

use std::f64::consts::PI;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees, with optional altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m,
        }
    }
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// 3-D distance in meters accounting for altitude difference, treating the
/// great-circle distance as the planar leg of a right triangle. Sufficient
/// for backhaul ranges where altitude differences are small relative to
/// link length.
pub fn distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let horizontal_m = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude) * 1000.0;
    let vertical_m = b.altitude_m - a.altitude_m;
    (horizontal_m.powi(2) + vertical_m.powi(2)).sqrt()
}

/// Initial compass bearing in degrees [0, 360) from `a` to `b`.
pub fn bearing_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let theta = y.atan2(x);

    (theta.to_degrees() + 360.0) % 360.0
}

/// Vertical elevation deviation in degrees from the horizontal, positive when
/// `b` is above `a`.
pub fn elevation_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let horizontal_m = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude) * 1000.0;
    let vertical_m = b.altitude_m - a.altitude_m;
    vertical_m.atan2(horizontal_m.max(1e-6)).to_degrees()
}

/// Given a common vertex `c` and two other points `p1`, `p2`, compute the
/// angle (degrees) at `c` between segments `c-p1` and `c-p2`, using the
/// spherical law of cosines, and the ratio of the longer leg to the shorter
/// leg. Used by the deployment-rule checks (`diff_sector_angle_limit`,
/// `near_far_*`).
pub fn law_of_cosines_spherical(
    c_lat: f64,
    c_lon: f64,
    p1_lat: f64,
    p1_lon: f64,
    p2_lat: f64,
    p2_lon: f64,
) -> (f64, f64) {
    let d_c_p1 = haversine_km(c_lat, c_lon, p1_lat, p1_lon);
    let d_c_p2 = haversine_km(c_lat, c_lon, p2_lat, p2_lon);
    let d_p1_p2 = haversine_km(p1_lat, p1_lon, p2_lat, p2_lon);

    let (short, long) = if d_c_p1 <= d_c_p2 {
        (d_c_p1, d_c_p2)
    } else {
        (d_c_p2, d_c_p1)
    };
    let length_ratio = if short > 1e-9 { long / short } else { f64::INFINITY };

    if d_c_p1 < 1e-9 || d_c_p2 < 1e-9 {
        return (0.0, length_ratio);
    }

    // cos(angle) = (a^2 + b^2 - c^2) / (2ab), clamped against floating point
    // drift for near-colinear points.
    let cos_angle =
        (d_c_p1.powi(2) + d_c_p2.powi(2) - d_p1_p2.powi(2)) / (2.0 * d_c_p1 * d_c_p2);
    let angle_deg = cos_angle.clamp(-1.0, 1.0).acos().to_degrees();

    (angle_deg, length_ratio)
}

/// Angle in [0, 180] between two bearings (azimuths), in degrees.
pub fn angle_between_bearings(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Free-space path loss in dB for a distance in meters and frequency in Hz.
pub fn free_space_path_loss_db(distance_m: f64, frequency_hz: f64) -> f64 {
    let distance_m = distance_m.max(1.0);
    let wavelength_m = 299_792_458.0 / frequency_hz;
    20.0 * (4.0 * PI * distance_m / wavelength_m).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // NYC to London: ~5570 km
        let dist = haversine_km(40.7128, -74.0060, 51.5074, -0.1278);
        assert!((dist - 5570.0).abs() < 50.0);
    }

    #[test]
    fn haversine_zero_for_identical_point() {
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0) < 1e-6);
    }

    #[test]
    fn law_of_cosines_right_angle_square() {
        // Vertex at origin, one point due east, one point due north at the
        // same distance: angle should be close to 90 degrees.
        let (angle, ratio) = law_of_cosines_spherical(0.0, 0.0, 0.0, 1.0, 1.0, 0.0);
        assert!((angle - 90.0).abs() < 1.0, "angle={angle}");
        assert!((ratio - 1.0).abs() < 0.05);
    }

    #[test]
    fn law_of_cosines_colinear_points_is_zero_or_180() {
        let (angle, _) = law_of_cosines_spherical(0.0, 0.0, 0.0, 1.0, 0.0, 2.0);
        assert!((angle - 180.0).abs() < 1.0);
    }

    #[test]
    fn fspl_increases_with_distance() {
        let near = free_space_path_loss_db(100.0, 60e9);
        let far = free_space_path_loss_db(1000.0, 60e9);
        assert!(far > near);
    }
}
