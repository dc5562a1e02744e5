//! The monitoring daemon: fetch positions, judge them, deliver alerts,
//! sleep, repeat.
//!
//! All decisions are made by the pure [`PollCycle`]; this module wires it
//! to the Traccar client and the SMS gateway and turns its outcomes into
//! log lines and deliveries. A failed cycle is logged and retried on the
//! next tick, it never stops the daemon.

use chrono::Utc;
use log::{error, info, warn};
use tokio::time::MissedTickBehavior;

use crate::config::MonitorConfig;
use crate::cycle::{AlertPayload, DistanceReading, PollCycle, PollOutcome, UnavailableReason};
use crate::error::Result;
use crate::http::{send_sms, TraccarClient};
use crate::monitor::DeviceMonitor;
use crate::roster::ParticipantDirectory;
use crate::route::RouteProfile;
use crate::track::load_track_segments;

/// Long-running monitor over one route and one participant roster.
pub struct Daemon {
    config: MonitorConfig,
    profile: RouteProfile,
    roster: ParticipantDirectory,
    traccar: TraccarClient,
    monitor: DeviceMonitor,
    dry_run: bool,
}

impl Daemon {
    /// Load the track and roster referenced by the configuration and build
    /// a ready-to-run daemon. With `dry_run` set, alerts are logged instead
    /// of handed to the SMS gateway.
    pub fn from_config(config: MonitorConfig, dry_run: bool) -> Result<Self> {
        config.validate_source()?;

        let segments = load_track_segments(&config.track_path()?)?;
        let profile = RouteProfile::from_segments(&segments, config.offroute_threshold_meters)?;
        info!(
            "[Daemon] Route loaded: {} points, {:.1} km",
            profile.point_count(),
            profile.total_length() / 1000.0
        );

        let roster = ParticipantDirectory::load(&config.participants_path()?)?;
        info!("[Daemon] Participants loaded: {}", roster.len());

        let traccar = TraccarClient::new(&config.traccar_url, &config.token)?;

        Ok(Self {
            config,
            profile,
            roster,
            traccar,
            monitor: DeviceMonitor::new(),
            dry_run,
        })
    }

    /// Poll forever. The first cycle runs immediately, then one cycle per
    /// configured interval.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "[Daemon] Polling every {} s",
            self.config.poll_interval().as_secs()
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.poll_once().await {
                error!("[Daemon] Poll error: {}", err);
            }
        }
    }

    /// One fetch-decide-deliver pass.
    pub async fn poll_once(&mut self) -> Result<()> {
        let devices = self.traccar.fetch_devices().await?;
        let positions = self.traccar.fetch_positions().await?;
        let now_ms = Utc::now().timestamp_millis();

        let cycle = PollCycle {
            profile: &self.profile,
            roster: &self.roster,
            stale_ms: self.config.stale_ms(),
            message_template: &self.config.offroute_message,
        };
        let outcomes = cycle.run(&mut self.monitor, &devices, &positions, now_ms);

        for outcome in outcomes {
            log_reading(&outcome);
            if let Some(alert) = &outcome.alert {
                self.deliver(alert).await;
            }
        }
        Ok(())
    }

    async fn deliver(&self, alert: &AlertPayload) {
        if alert.phone.is_empty() {
            warn!("[Alerts] No phone number for participant: {}", alert.name);
            return;
        }
        if self.dry_run {
            info!(
                "[Alerts] Dry run: would send SMS for {} to {}: {}",
                alert.name, alert.phone, alert.message
            );
            return;
        }
        match send_sms(&self.config.sms_gateway, &alert.phone, &alert.message).await {
            Ok(()) => info!(
                "[Alerts] Sent SMS for {} to {}: {}",
                alert.name, alert.phone, alert.message
            ),
            Err(err) => error!("[Alerts] SMS failed for {}: {}", alert.name, err),
        }
    }
}

fn log_reading(outcome: &PollOutcome) {
    match &outcome.reading {
        DistanceReading::Projected(projection) => {
            let suffix = if outcome.offroute { " (off-route)" } else { "" };
            info!(
                "[Poll] Distance from track: {} = {:.1} m{}",
                outcome.name, projection.offset_meters, suffix
            );
        }
        DistanceReading::Unavailable(UnavailableReason::NoPosition) => {
            info!(
                "[Poll] Distance from track: {} = unavailable (no position)",
                outcome.name
            );
        }
        DistanceReading::Unavailable(UnavailableReason::StalePosition) => {
            info!(
                "[Poll] Distance from track: {} = unavailable (stale position)",
                outcome.name
            );
        }
        DistanceReading::Unavailable(UnavailableReason::NoProjection) => {
            info!(
                "[Poll] Distance from track: {} = unavailable",
                outcome.name
            );
        }
    }
}
