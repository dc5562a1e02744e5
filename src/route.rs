//! Route profiling and closed-segment projection.
//!
//! A [`RouteProfile`] preprocesses the planned route once per process:
//! - planar coordinates for every vertex (equirectangular, one fixed
//!   reference latitude for the whole route)
//! - cumulative geodesic arc length to every vertex
//! - squared planar length of every segment
//!
//! Queries are O(n) scans over the segments, no spatial index and no result
//! caching. Route sizes for this monitor are a few thousand points, so a
//! scan per device per poll stays cheap.

use crate::error::{MonitorError, Result};
use crate::geo_utils::{haversine_distance, mean_latitude, to_planar};
use crate::TrackPoint;

/// A route vertex with its precomputed planar coordinates in meters.
#[derive(Debug, Clone, Copy)]
struct RoutePoint {
    latitude: f64,
    longitude: f64,
    x: f64,
    y: f64,
}

/// Result of projecting a query position onto the route polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteProjection {
    /// Geodesic arc length from the route start to the foot point, meters.
    pub distance_along: f64,
    /// Perpendicular (planar) distance from the query to the route, meters.
    pub offset_meters: f64,
    /// True when `offset_meters` exceeds the profile's off-track threshold.
    pub offtrack: bool,
}

/// Preprocessed route geometry plus the off-track tolerance.
///
/// Built once at startup from the GPX track and shared read-only by every
/// poll cycle. Projection results are computed fresh on every query.
pub struct RouteProfile {
    points: Vec<RoutePoint>,
    cumulative: Vec<f64>,
    seg_len_sq: Vec<f64>,
    total_length: f64,
    reference_latitude: f64,
    offtrack_threshold: f64,
}

impl RouteProfile {
    /// Build a profile from GPX track segments, concatenated in document
    /// order. Segment boundaries are not special: a duplicated join point
    /// just yields one zero-length segment that projection skips.
    pub fn from_segments(segments: &[Vec<TrackPoint>], offtrack_threshold: f64) -> Result<Self> {
        let points: Vec<TrackPoint> = segments.iter().flat_map(|seg| seg.iter().copied()).collect();
        Self::from_points(&points, offtrack_threshold)
    }

    /// Build a profile from an ordered point list.
    ///
    /// Cumulative distances are geodesic (haversine) while the per-segment
    /// lengths used by projection are planar. The mix is intentional:
    /// "distance along" stays comparable to real-world route length, while
    /// offset geometry stays plain dot products.
    pub fn from_points(points: &[TrackPoint], offtrack_threshold: f64) -> Result<Self> {
        if points.is_empty() {
            return Err(MonitorError::EmptyRoute);
        }

        let reference_latitude = mean_latitude(points);

        let route_points: Vec<RoutePoint> = points
            .iter()
            .map(|p| {
                let (x, y) = to_planar(p, reference_latitude);
                RoutePoint {
                    latitude: p.latitude,
                    longitude: p.longitude,
                    x,
                    y,
                }
            })
            .collect();

        let mut cumulative = vec![0.0; points.len()];
        for i in 1..points.len() {
            cumulative[i] = cumulative[i - 1] + haversine_distance(&points[i - 1], &points[i]);
        }
        let total_length = cumulative.last().copied().unwrap_or(0.0);

        let seg_len_sq: Vec<f64> = route_points
            .windows(2)
            .map(|w| {
                let dx = w[1].x - w[0].x;
                let dy = w[1].y - w[0].y;
                dx * dx + dy * dy
            })
            .collect();

        Ok(Self {
            points: route_points,
            cumulative,
            seg_len_sq,
            total_length,
            reference_latitude,
            offtrack_threshold,
        })
    }

    /// Project a query position onto the nearest route segment.
    ///
    /// Every segment is treated as closed: the parameter `t` is clamped to
    /// `[0, 1]`, so queries beyond the route ends land on the endpoints.
    /// The scan keeps the first segment that attains the minimum squared
    /// distance, which pins out-and-back routes to the earlier traversal.
    ///
    /// Returns `None` when the query coordinates are not finite and in
    /// range, when the profile has fewer than two points, or when every
    /// segment is degenerate.
    pub fn project(&self, latitude: f64, longitude: f64) -> Option<RouteProjection> {
        let query = TrackPoint::new(latitude, longitude);
        if !query.is_valid() || self.points.len() < 2 {
            return None;
        }

        let (tx, ty) = to_planar(&query, self.reference_latitude);

        // (squared offset, distance along) of the best segment so far
        let mut best: Option<(f64, f64)> = None;
        for i in 0..self.points.len() - 1 {
            let seg_len_sq = self.seg_len_sq[i];
            if seg_len_sq == 0.0 {
                // identical consecutive points contribute no segment
                continue;
            }
            let a = &self.points[i];
            let b = &self.points[i + 1];

            let t = ((tx - a.x) * (b.x - a.x) + (ty - a.y) * (b.y - a.y)) / seg_len_sq;
            let t = t.clamp(0.0, 1.0);

            let px = a.x + (b.x - a.x) * t;
            let py = a.y + (b.y - a.y) * t;
            let d_sq = (px - tx).powi(2) + (py - ty).powi(2);
            let along = self.cumulative[i] + seg_len_sq.sqrt() * t;

            match best {
                Some((best_sq, _)) if d_sq >= best_sq => {}
                _ => best = Some((d_sq, along)),
            }
        }

        let (d_sq, distance_along) = best?;
        let offset_meters = d_sq.sqrt();
        Some(RouteProjection {
            distance_along,
            offset_meters,
            offtrack: offset_meters > self.offtrack_threshold,
        })
    }

    /// Return the point on the route at a given arc length from the start.
    ///
    /// The distance is clamped to `[0, total_length]`, then interpolated
    /// linearly in lat/lng between the bracketing vertices.
    pub fn point_at(&self, distance_along: f64) -> TrackPoint {
        let target = distance_along.clamp(0.0, self.total_length);
        // A NaN target matches no vertex; treat it like the route start.
        let idx = self.cumulative.iter().position(|&d| d >= target).unwrap_or(0);

        if idx == 0 {
            let p = &self.points[0];
            return TrackPoint::new(p.latitude, p.longitude);
        }
        if self.cumulative[idx] == target {
            let p = &self.points[idx];
            return TrackPoint::new(p.latitude, p.longitude);
        }

        let a = &self.points[idx - 1];
        let b = &self.points[idx];
        let span = self.cumulative[idx] - self.cumulative[idx - 1];
        let t = if span > 0.0 {
            (target - self.cumulative[idx - 1]) / span
        } else {
            0.0
        };
        TrackPoint::new(
            a.latitude + (b.latitude - a.latitude) * t,
            a.longitude + (b.longitude - a.longitude) * t,
        )
    }

    /// Total geodesic length of the route in meters.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Cumulative geodesic distance to every vertex, starting at 0.0.
    pub fn cumulative_distances(&self) -> &[f64] {
        &self.cumulative
    }

    /// Number of route vertices.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Reference latitude the planar flattening was computed with.
    pub fn reference_latitude(&self) -> f64 {
        self.reference_latitude
    }

    /// Off-track tolerance in meters.
    pub fn offtrack_threshold(&self) -> f64 {
        self.offtrack_threshold
    }
}
