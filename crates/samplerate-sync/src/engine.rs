//! Sync engine: matches the device's nominal rate to the playing track.
//!
//! The engine is single-owner state. It is driven by the sync worker thread in
//! [`crate::runtime`] and never runs two cycles at once.

use std::sync::Arc;

use serde::Serialize;

use crate::device::{CapabilityProvider, OutputDevice};
use crate::error::SyncError;
use crate::matcher::{is_valid_rate, nearest_rate};
use crate::playback_log::PlaybackLogSource;
use crate::status::{RateDisplay, SyncStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No default output device known.
    Idle,
    /// Device known, rate not yet checked against playback.
    Tracking,
    /// Device rate matches the latest playback rate.
    Synced,
    /// A rate change has been issued to the device.
    Applying,
}

/// Result of a single sync cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    /// The log was unavailable or held no rate.
    NoPlayback,
    /// No default output device is known.
    NoDevice,
    /// The device already runs at the matched rate.
    AlreadySynced { rate_hz: f64 },
    /// The device was switched to a new rate.
    Applied { from_hz: f64, to_hz: f64 },
    /// Matching or applying failed; state is unchanged.
    Failed(SyncError),
}

pub struct SyncEngine<P, L> {
    provider: Arc<P>,
    log_source: L,
    display: Arc<RateDisplay>,
    device: Option<OutputDevice>,
    phase: SyncPhase,
}

impl<P, L> SyncEngine<P, L>
where
    P: CapabilityProvider,
    L: PlaybackLogSource,
{
    pub fn new(provider: Arc<P>, log_source: L, display: Arc<RateDisplay>) -> Self {
        Self {
            provider,
            log_source,
            display,
            device: None,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn device(&self) -> Option<&OutputDevice> {
        self.device.as_ref()
    }

    /// Replace the device snapshot with the current default output device.
    ///
    /// A present device moves the engine to `Tracking` and publishes its nominal rate.
    /// An absent device moves it to `Idle` and leaves the published rate alone.
    pub fn refresh_device(&mut self) {
        match self.provider.default_output_device() {
            Ok(Some(device)) => {
                tracing::info!(
                    device = %device.name,
                    id = %device.id,
                    rate_hz = device.nominal_rate,
                    supported = ?device.supported_rates,
                    "default output device"
                );
                if is_valid_rate(device.nominal_rate) {
                    self.display.publish_hz(device.nominal_rate);
                }
                self.device = Some(device);
                self.phase = SyncPhase::Tracking;
            }
            Ok(None) => {
                tracing::warn!("{}", SyncError::NoDefaultDevice);
                self.device = None;
                self.phase = SyncPhase::Idle;
            }
            Err(err) => {
                tracing::warn!(error = %err, "default output device lookup failed");
                self.device = None;
                self.phase = SyncPhase::Idle;
            }
        }
    }

    /// React to a default output device change: re-fetch, then sync once.
    pub fn on_device_changed(&mut self) -> CycleOutcome {
        self.refresh_device();
        self.run_cycle()
    }

    /// Run one match-and-apply cycle.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let events = match self.log_source.recent_events() {
            Ok(events) => events,
            Err(err) => {
                tracing::debug!(error = %err, "sync skipped");
                return CycleOutcome::NoPlayback;
            }
        };
        let Some(latest) = events.first() else {
            tracing::debug!("sync skipped: no playback events in log");
            return CycleOutcome::NoPlayback;
        };
        let target_hz = latest.sample_rate;

        // A failed lookup leaves no device and the watcher only fires on identity changes.
        if self.device.is_none() {
            self.refresh_device();
        }
        let Some(device) = self.device.as_mut() else {
            tracing::debug!(target_hz, "sync skipped: no default output device");
            return CycleOutcome::NoDevice;
        };

        let matched_hz = match nearest_rate(target_hz, &device.supported_rates) {
            Ok(rate) => rate,
            Err(err) => {
                tracing::warn!(device = %device.name, target_hz, error = %err, "no usable rate");
                return CycleOutcome::Failed(err);
            }
        };

        match self.provider.nominal_rate(device) {
            Ok(rate) => device.nominal_rate = rate,
            Err(err) => {
                tracing::debug!(device = %device.name, error = %err, "using cached nominal rate");
            }
        }

        if matched_hz == device.nominal_rate {
            self.phase = SyncPhase::Synced;
            return CycleOutcome::AlreadySynced { rate_hz: matched_hz };
        }

        let from_hz = device.nominal_rate;
        self.phase = SyncPhase::Applying;
        match self.provider.set_nominal_rate(device, matched_hz) {
            Ok(()) => {
                device.nominal_rate = matched_hz;
                self.display.publish_hz(matched_hz);
                self.phase = SyncPhase::Synced;
                tracing::info!(
                    device = %device.name,
                    source_hz = target_hz,
                    from_hz,
                    to_hz = matched_hz,
                    "device sample rate changed"
                );
                CycleOutcome::Applied {
                    from_hz,
                    to_hz: matched_hz,
                }
            }
            Err(err) => {
                self.phase = SyncPhase::Tracking;
                tracing::warn!(device = %device.name, error = %err, "sample rate change failed");
                CycleOutcome::Failed(err)
            }
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.phase,
            device: self.device.as_ref().map(|d| d.name.clone()),
            device_id: self.device.as_ref().map(|d| d.id.clone()),
            nominal_rate_hz: self.device.as_ref().map(|d| d.nominal_rate),
            supported_rates_hz: self
                .device
                .as_ref()
                .map(|d| d.supported_rates.clone())
                .unwrap_or_default(),
            last_applied_rate_khz: self.display.khz(),
            display: self.display.text(),
        }
    }
}
