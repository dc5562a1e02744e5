//! One poll cycle, as a pure function.
//!
//! A cycle takes the device and position snapshots the daemon fetched plus
//! the current time, runs every mapped device through projection and the
//! alert state machine, and returns what happened. No I/O happens here:
//! the daemon does the fetching before and the logging and SMS delivery
//! after, which keeps every decision in this module testable with plain
//! data.

use std::collections::HashMap;

use crate::monitor::{DeviceMonitor, Observation};
use crate::positions::{to_iso_time, Device, Position};
use crate::roster::ParticipantDirectory;
use crate::route::{RouteProfile, RouteProjection};
use crate::template::render_str;

/// Why no distance could be computed for a device this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The position source reported nothing for this device
    NoPosition,
    /// A position exists but its timestamp is missing, unparseable, or
    /// older than the staleness cutoff
    StalePosition,
    /// The position is current but could not be projected onto the route
    NoProjection,
}

/// Distance reading for one device in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceReading {
    /// Projection succeeded; carries offset and distance along the route
    Projected(RouteProjection),
    Unavailable(UnavailableReason),
}

/// An alert the daemon should deliver.
///
/// The message is already rendered. An empty phone number means the roster
/// has nowhere to send it; the state machine still counts the alert as
/// issued, matching how delivery failures are handled.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub device_id: i64,
    pub name: String,
    pub phone: String,
    pub message: String,
}

/// What one poll cycle decided for one mapped device.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub device_id: i64,
    /// Participant display name from the roster
    pub name: String,
    pub reading: DistanceReading,
    /// Whether this cycle considered the device off-route. Unusable
    /// positions are not off-route; failed projections are.
    pub offroute: bool,
    pub alert: Option<AlertPayload>,
}

/// Static inputs of a poll cycle: everything that does not change between
/// ticks.
pub struct PollCycle<'a> {
    pub profile: &'a RouteProfile,
    pub roster: &'a ParticipantDirectory,
    /// Positions older than this many milliseconds are unusable
    pub stale_ms: i64,
    /// Alert message template
    pub message_template: &'a str,
}

impl PollCycle<'_> {
    /// Run one cycle over fetched snapshots.
    ///
    /// Devices without a roster entry are skipped entirely and never get
    /// monitor state. Outcomes come back in device order. When several
    /// positions carry the same device id the last one wins.
    pub fn run(
        &self,
        monitor: &mut DeviceMonitor,
        devices: &[Device],
        positions: &[Position],
        now_ms: i64,
    ) -> Vec<PollOutcome> {
        let position_by_device: HashMap<i64, &Position> =
            positions.iter().map(|p| (p.device_id, p)).collect();

        let mut outcomes = Vec::new();
        for device in devices {
            let Some(participant) = self.roster.lookup(&device.name) else {
                continue;
            };
            let name = participant.name.clone();

            let Some(position) = position_by_device.get(&device.id) else {
                monitor.observe(device.id, Observation::Unusable);
                outcomes.push(PollOutcome {
                    device_id: device.id,
                    name,
                    reading: DistanceReading::Unavailable(UnavailableReason::NoPosition),
                    offroute: false,
                    alert: None,
                });
                continue;
            };

            let fresh = position
                .time_ms()
                .map(|t| now_ms - t <= self.stale_ms)
                .unwrap_or(false);
            if !fresh {
                monitor.observe(device.id, Observation::Unusable);
                outcomes.push(PollOutcome {
                    device_id: device.id,
                    name,
                    reading: DistanceReading::Unavailable(UnavailableReason::StalePosition),
                    offroute: false,
                    alert: None,
                });
                continue;
            }

            let projection = match (position.latitude, position.longitude) {
                (Some(lat), Some(lng)) => self.profile.project(lat, lng),
                _ => None,
            };
            // No projection counts as off-route: a current position that
            // cannot be related to the route is treated as an excursion
            let offroute = projection.map(|p| p.offtrack).unwrap_or(true);
            let reading = match projection {
                Some(p) => DistanceReading::Projected(p),
                None => DistanceReading::Unavailable(UnavailableReason::NoProjection),
            };

            let observation = if offroute {
                Observation::OffRoute
            } else {
                Observation::OnRoute
            };
            let alert = monitor.observe(device.id, observation).then(|| {
                let vars = [
                    ("name", name.clone()),
                    (
                        "lat",
                        position.latitude.map(|v| v.to_string()).unwrap_or_default(),
                    ),
                    (
                        "lng",
                        position.longitude.map(|v| v.to_string()).unwrap_or_default(),
                    ),
                    ("time", to_iso_time(position.time_raw().unwrap_or(""))),
                    ("deviceId", device.id.to_string()),
                ];
                AlertPayload {
                    device_id: device.id,
                    name: name.clone(),
                    phone: participant.phone.clone(),
                    message: render_str(self.message_template, &vars),
                }
            });

            outcomes.push(PollOutcome {
                device_id: device.id,
                name,
                reading,
                offroute,
                alert,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::parse_time_ms;
    use crate::roster::Participant;
    use crate::TrackPoint;

    const NOW: &str = "2024-05-04T10:30:00Z";
    const TEMPLATE: &str = "{name} is off-route at {time}. Last location: {lat},{lng}";

    fn now_ms() -> i64 {
        parse_time_ms(NOW).unwrap()
    }

    /// ~1112 m equator route with a 200 m off-track threshold.
    fn profile() -> RouteProfile {
        RouteProfile::from_points(
            &[TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.01)],
            200.0,
        )
        .unwrap()
    }

    fn roster() -> ParticipantDirectory {
        ParticipantDirectory::from_entries(&[
            Participant {
                name: "Tracker One".to_string(),
                phone: "+46700000001".to_string(),
            },
            Participant {
                name: "No Phone".to_string(),
                phone: String::new(),
            },
        ])
        .unwrap()
    }

    fn device(id: i64, name: &str) -> Device {
        Device {
            id,
            name: name.to_string(),
        }
    }

    fn position(device_id: i64, lat: f64, lng: f64, time: &str) -> Position {
        Position {
            device_id,
            latitude: Some(lat),
            longitude: Some(lng),
            device_time: Some(time.to_string()),
            fix_time: None,
            server_time: None,
        }
    }

    fn cycle<'a>(
        profile: &'a RouteProfile,
        roster: &'a ParticipantDirectory,
    ) -> PollCycle<'a> {
        PollCycle {
            profile,
            roster,
            stale_ms: 15 * 60 * 1000,
            message_template: TEMPLATE,
        }
    }

    #[test]
    fn test_unmapped_devices_are_skipped() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Somebody Else")],
            &[position(1, 0.0, 0.005, "2024-05-04T10:29:00Z")],
            now_ms(),
        );
        assert!(outcomes.is_empty());
        assert_eq!(monitor.device_count(), 0);
    }

    #[test]
    fn test_missing_position_resets_state() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        // Seed an off-route excursion, then drop the position feed
        cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Tracker One")],
            &[position(1, 0.05, 0.005, "2024-05-04T10:29:00Z")],
            now_ms(),
        );
        assert!(monitor.state(1).unwrap().notified);

        let outcomes =
            cycle(&profile, &roster).run(&mut monitor, &[device(1, "Tracker One")], &[], now_ms());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].reading,
            DistanceReading::Unavailable(UnavailableReason::NoPosition)
        );
        assert!(!outcomes[0].offroute);
        assert!(outcomes[0].alert.is_none());
        assert!(!monitor.state(1).unwrap().notified);
    }

    #[test]
    fn test_stale_position_resets_state() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        // 16 minutes old with a 15 minute cutoff
        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Tracker One")],
            &[position(1, 0.0, 0.005, "2024-05-04T10:14:00Z")],
            now_ms(),
        );
        assert_eq!(
            outcomes[0].reading,
            DistanceReading::Unavailable(UnavailableReason::StalePosition)
        );

        // Missing timestamps count as stale too
        let mut bare = position(1, 0.0, 0.005, "");
        bare.device_time = None;
        let outcomes =
            cycle(&profile, &roster).run(&mut monitor, &[device(1, "Tracker One")], &[bare], now_ms());
        assert_eq!(
            outcomes[0].reading,
            DistanceReading::Unavailable(UnavailableReason::StalePosition)
        );
    }

    #[test]
    fn test_on_route_device_reports_distance() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Tracker One")],
            &[position(1, 0.0, 0.005, "2024-05-04T10:29:00Z")],
            now_ms(),
        );

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "Tracker One");
        assert!(!outcomes[0].offroute);
        assert!(outcomes[0].alert.is_none());
        match outcomes[0].reading {
            DistanceReading::Projected(p) => {
                assert!(p.offset_meters < 1.0);
                assert!(!p.offtrack);
            }
            _ => panic!("expected a projected reading"),
        }
    }

    #[test]
    fn test_offroute_alerts_once_then_rearms() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();
        let cycle = cycle(&profile, &roster);
        let devices = [device(1, "Tracker One")];

        // ~555 m north of the route: clearly off
        let off = position(1, 0.005, 0.005, "2024-05-04T10:29:00Z");

        let outcomes = cycle.run(&mut monitor, &devices, std::slice::from_ref(&off), now_ms());
        let alert = outcomes[0].alert.as_ref().expect("first excursion alerts");
        assert_eq!(alert.phone, "+46700000001");
        assert_eq!(
            alert.message,
            "Tracker One is off-route at 2024-05-04T10:29:00Z. Last location: 0.005,0.005"
        );

        // Still off-route: no second alert
        let outcomes = cycle.run(&mut monitor, &devices, std::slice::from_ref(&off), now_ms());
        assert!(outcomes[0].alert.is_none());
        assert!(outcomes[0].offroute);

        // Back on route, then off again: alert fires a second time
        let on = position(1, 0.0, 0.005, "2024-05-04T10:29:30Z");
        let outcomes = cycle.run(&mut monitor, &devices, std::slice::from_ref(&on), now_ms());
        assert!(outcomes[0].alert.is_none());

        let outcomes = cycle.run(&mut monitor, &devices, std::slice::from_ref(&off), now_ms());
        assert!(outcomes[0].alert.is_some());
    }

    #[test]
    fn test_alert_without_phone_still_marks_notified() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(2, "No Phone")],
            &[position(2, 0.005, 0.005, "2024-05-04T10:29:00Z")],
            now_ms(),
        );
        let alert = outcomes[0].alert.as_ref().unwrap();
        assert_eq!(alert.phone, "");
        assert!(monitor.state(2).unwrap().notified);
    }

    #[test]
    fn test_missing_coordinates_count_as_offroute() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let mut pos = position(1, 0.0, 0.0, "2024-05-04T10:29:00Z");
        pos.latitude = None;

        let outcomes =
            cycle(&profile, &roster).run(&mut monitor, &[device(1, "Tracker One")], &[pos], now_ms());
        assert_eq!(
            outcomes[0].reading,
            DistanceReading::Unavailable(UnavailableReason::NoProjection)
        );
        assert!(outcomes[0].offroute);
        let alert = outcomes[0].alert.as_ref().unwrap();
        // Coordinates render empty when the fix has none
        assert!(alert.message.contains("Last location: ,"));
    }

    #[test]
    fn test_degenerate_route_flags_every_fix_offroute() {
        // All route points identical: projection can never succeed
        let profile = RouteProfile::from_points(
            &[TrackPoint::new(0.0, 0.0), TrackPoint::new(0.0, 0.0)],
            200.0,
        )
        .unwrap();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Tracker One")],
            &[position(1, 0.0, 0.0, "2024-05-04T10:29:00Z")],
            now_ms(),
        );
        assert_eq!(
            outcomes[0].reading,
            DistanceReading::Unavailable(UnavailableReason::NoProjection)
        );
        assert!(outcomes[0].offroute);
        assert!(outcomes[0].alert.is_some());
    }

    #[test]
    fn test_stale_then_fresh_on_route_never_alerts() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();
        let cycle = cycle(&profile, &roster);
        let devices = [device(1, "Tracker One")];

        let stale = position(1, 0.005, 0.005, "2024-05-04T09:00:00Z");
        let outcomes = cycle.run(&mut monitor, &devices, &[stale], now_ms());
        assert!(outcomes[0].alert.is_none());

        let fresh = position(1, 0.0, 0.005, "2024-05-04T10:29:00Z");
        let outcomes = cycle.run(&mut monitor, &devices, &[fresh], now_ms());
        assert!(outcomes[0].alert.is_none());
        assert!(!monitor.state(1).unwrap().notified);
    }

    #[test]
    fn test_last_position_wins_for_a_device() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let off = position(1, 0.005, 0.005, "2024-05-04T10:28:00Z");
        let on = position(1, 0.0, 0.005, "2024-05-04T10:29:00Z");

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "Tracker One")],
            &[off, on],
            now_ms(),
        );
        assert!(!outcomes[0].offroute);
        assert!(outcomes[0].alert.is_none());
    }

    #[test]
    fn test_device_name_matching_is_normalized() {
        let profile = profile();
        let roster = roster();
        let mut monitor = DeviceMonitor::new();

        let outcomes = cycle(&profile, &roster).run(
            &mut monitor,
            &[device(1, "  TRACKER one ")],
            &[position(1, 0.0, 0.005, "2024-05-04T10:29:00Z")],
            now_ms(),
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].name, "Tracker One");
    }
}
