//! Published sync status: the applied rate for display and engine snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::engine::SyncPhase;

/// Last applied device rate in kHz, published for display.
///
/// Stored as the bit pattern of an `f64` so readers on any thread always see a whole value.
/// Zero means nothing has been published yet.
#[derive(Debug, Default)]
pub struct RateDisplay {
    khz_bits: AtomicU64,
}

impl RateDisplay {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn publish_hz(&self, rate_hz: f64) {
        self.khz_bits
            .store((rate_hz / 1000.0).to_bits(), Ordering::Release);
    }

    /// Last applied rate in kHz.
    pub fn khz(&self) -> Option<f64> {
        let bits = self.khz_bits.load(Ordering::Acquire);
        if bits == 0 {
            None
        } else {
            Some(f64::from_bits(bits))
        }
    }

    /// Display string such as `"44.1 kHz"`.
    pub fn text(&self) -> Option<String> {
        self.khz().map(format_khz)
    }
}

pub fn format_khz(khz: f64) -> String {
    format!("{khz:.1} kHz")
}

/// Point-in-time view of the engine, used by `once` and status logging.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub device: Option<String>,
    pub device_id: Option<String>,
    pub nominal_rate_hz: Option<f64>,
    pub supported_rates_hz: Vec<f64>,
    pub last_applied_rate_khz: Option<f64>,
    pub display: Option<String>,
}
