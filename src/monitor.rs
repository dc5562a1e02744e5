//! Per-device alert state machine.
//!
//! Alerts are edge-triggered: a device that goes off-route produces one
//! alert and then stays silent until it is observed back on the route. A
//! missing or stale position clears both flags, so a tracker that drops out
//! mid-excursion will alert again when it reappears still off the route.

use std::collections::HashMap;

use log::debug;

/// What one poll cycle observed about a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No usable position this cycle (missing, stale, or unparseable time)
    Unusable,
    /// Position projected onto the route within tolerance
    OnRoute,
    /// Position beyond tolerance, or no projection was possible
    OffRoute,
}

/// Alert flags for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// Device was off-route at its last usable observation
    pub offroute: bool,
    /// An alert has already been issued for the current excursion
    pub notified: bool,
}

/// Tracks alert state across poll cycles for every monitored device.
///
/// State lives only for devices that have been observed; devices without a
/// roster entry never reach this map.
#[derive(Debug, Default)]
pub struct DeviceMonitor {
    states: HashMap<i64, DeviceState>,
}

impl DeviceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation for a device and decide whether to alert.
    ///
    /// Returns `true` exactly when the device is off-route and no alert has
    /// been issued for the current excursion. The caller delivers the alert;
    /// delivery failures do not rewind the `notified` flag.
    pub fn observe(&mut self, device_id: i64, observation: Observation) -> bool {
        match observation {
            Observation::Unusable => {
                // Reset both flags: the next usable off-route fix alerts again
                self.states.insert(device_id, DeviceState::default());
                false
            }
            Observation::OnRoute => {
                let entry = self.states.entry(device_id).or_default();
                entry.offroute = false;
                entry.notified = false;
                false
            }
            Observation::OffRoute => {
                let entry = self.states.entry(device_id).or_default();
                let alert = !entry.notified;
                entry.offroute = true;
                entry.notified = true;
                if alert {
                    debug!("[Monitor] Device {} left the route, raising alert", device_id);
                }
                alert
            }
        }
    }

    /// Last recorded state for a device, if it has ever been observed.
    pub fn state(&self, device_id: i64) -> Option<DeviceState> {
        self.states.get(&device_id).copied()
    }

    /// Number of devices with recorded state.
    pub fn device_count(&self) -> usize {
        self.states.len()
    }
}
