//! # Off-Route Monitor
//!
//! Route deviation monitoring for GPS trackers with SMS alerting.
//!
//! This library provides:
//! - Route profiles built from GPX tracks, with closed-segment projection
//! - An edge-triggered per-device alert state machine (one SMS per excursion)
//! - A pure poll cycle that turns device positions into outcomes and alerts
//! - Clients for a Traccar-compatible position source and a configurable
//!   SMS gateway
//!
//! ## Features
//!
//! - **`http`** - HTTP clients for the position source and the SMS gateway
//! - **`cli`** - The `offroute-monitor` daemon binary
//!
//! ## Quick Start
//!
//! ```rust
//! use offroute_monitor::{RouteProfile, TrackPoint};
//!
//! // A short route along the equator
//! let points = vec![
//!     TrackPoint::new(0.0, 0.0),
//!     TrackPoint::new(0.0, 0.01),
//! ];
//!
//! let route = RouteProfile::from_points(&points, 200.0).unwrap();
//! if let Some(projection) = route.project(0.0001, 0.005) {
//!     println!(
//!         "{:.0} m along the route, {:.0} m off it (off-route: {})",
//!         projection.distance_along, projection.offset_meters, projection.offtrack
//!     );
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{MonitorError, Result};

// Geographic utilities (great-circle distance, planar projection)
pub mod geo_utils;

// Route profile: cumulative distances and closed-segment projection
pub mod route;
pub use route::{RouteProfile, RouteProjection};

// GPX track loading
pub mod track;
pub use track::load_track_segments;

// Per-device edge-triggered alert state
pub mod monitor;
pub use monitor::{DeviceMonitor, DeviceState, Observation};

// Position source payloads and timestamp parsing
pub mod positions;
pub use positions::{parse_time_ms, to_iso_time, Device, Position};

// Placeholder templates for messages and gateway payloads
pub mod template;
pub use template::{render_str, render_value};

// Participant roster keyed by normalized device name
pub mod roster;
pub use roster::{normalize_name, Participant, ParticipantDirectory};

// Configuration files (monitor and SMS gateway)
pub mod config;
pub use config::{GatewayConfig, MonitorConfig};

// One poll cycle: devices and positions in, outcomes and alerts out
pub mod cycle;
pub use cycle::{AlertPayload, DistanceReading, PollCycle, PollOutcome, UnavailableReason};

// SMS gateway request construction (pure, network-free)
pub mod sms;
pub use sms::{build_gateway_request, GatewayBody, GatewayRequest};

// HTTP clients for the position source and the SMS gateway
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{send_sms, TraccarClient};

// The polling daemon
#[cfg(feature = "http")]
pub mod daemon;
#[cfg(feature = "http")]
pub use daemon::Daemon;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use offroute_monitor::TrackPoint;
/// let point = TrackPoint::new(59.3293, 18.0686); // Stockholm
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl TrackPoint {
    /// Create a new track point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}
