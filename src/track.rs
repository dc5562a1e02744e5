//! GPX track loading.
//!
//! The planned route comes in as a GPX file. Only `<trk>` content matters
//! here: track segments are returned in document order and waypoints or
//! routes in the file are ignored. Empty segments are dropped.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::Point;

use crate::error::{MonitorError, Result};
use crate::TrackPoint;

/// Read every non-empty track segment from a GPX file.
pub fn load_track_segments(path: &Path) -> Result<Vec<Vec<TrackPoint>>> {
    let file = File::open(path).map_err(|e| MonitorError::TrackFile {
        message: format!("{}: {}", path.display(), e),
    })?;
    let gpx = gpx::read(BufReader::new(file)).map_err(|e| MonitorError::TrackFile {
        message: format!("{}: {}", path.display(), e),
    })?;

    let mut segments = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            let points: Vec<TrackPoint> = segment
                .points
                .iter()
                .map(|waypoint| {
                    let point: Point<f64> = waypoint.point();
                    TrackPoint::new(point.y(), point.x())
                })
                .collect();
            if !points.is_empty() {
                segments.push(points);
            }
        }
    }
    Ok(segments)
}
