//! Great-circle distance and containment primitives
//!
//! All functions here are pure and deterministic. Distances use the
//! Haversine formula with a mean Earth radius of 6,371,000 m, which is
//! accurate to well under 0.5% for fence radii in the tens of kilometers.

use crate::domain::Geofence;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (lat, lon) points in degrees.
///
/// Symmetric: `distance_meters(a, b) == distance_meters(b, a)`.
pub fn distance_meters(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let phi_a = lat_a.to_radians();
    let phi_b = lat_b.to_radians();
    let d_phi = (lat_b - lat_a).to_radians();
    let d_lambda = (lon_b - lon_a).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);

    // Clamp guards against rounding pushing sqrt(h) past 1.0 for
    // antipodal points, which would make asin return NaN.
    2.0 * EARTH_RADIUS_M * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Whether a point lies inside (or exactly on the boundary of) a fence
pub fn is_inside(lat: f64, lon: f64, fence: &Geofence) -> bool {
    distance_meters(lat, lon, fence.center_lat, fence.center_lon) <= fence.radius_m
}
