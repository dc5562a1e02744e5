//! # Geographic Utilities
//!
//! Shared geometry for route profiling and projection. Two deliberately
//! different distance models live here:
//!
//! - [`haversine_distance`]: exact great-circle distance, used for the
//!   cumulative arc length along a route (what "distance along" means).
//! - [`to_planar`]: a local equirectangular flattening, used for the
//!   perpendicular-offset geometry during projection. Over the few hundred
//!   meters that matter for off-route decisions the flat-earth error is
//!   negligible, and the projection math stays plain dot products.
//!
//! Both models share [`EARTH_RADIUS_METERS`] so reported distances stay
//! consistent between the two.

use crate::TrackPoint;

/// Mean Earth radius in meters, shared by both distance models.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// The intermediate value is clamped before `asin` so antipodal rounding
/// can never produce NaN.
pub fn haversine_distance(a: &TrackPoint, b: &TrackPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lng = (d_lng / 2.0).sin();
    let h = sin_lat * sin_lat + lat_a.cos() * lat_b.cos() * sin_lng * sin_lng;

    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Project a point onto the local flat plane around `reference_latitude`.
///
/// Returns `(x, y)` in meters. Longitude is scaled by the cosine of the
/// reference latitude, so all points of one route must be flattened with
/// the same reference for their planar coordinates to be comparable.
pub fn to_planar(point: &TrackPoint, reference_latitude: f64) -> (f64, f64) {
    let x = point.longitude.to_radians() * reference_latitude.to_radians().cos() * EARTH_RADIUS_METERS;
    let y = point.latitude.to_radians() * EARTH_RADIUS_METERS;
    (x, y)
}

/// Arithmetic mean latitude of a point set.
///
/// This is the reference latitude a route profile flattens around. Returns
/// 0.0 for an empty slice; profile construction rejects empty routes before
/// this matters.
pub fn mean_latitude(points: &[TrackPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.latitude).sum::<f64>() / points.len() as f64
}
