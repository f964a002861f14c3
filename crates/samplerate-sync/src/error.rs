//! Error taxonomy for the sync core.
//!
//! Every variant is recoverable: a failed cycle leaves the engine state untouched and the
//! next tick or device change tries again.

use thiserror::Error;

/// Result alias used by the sync core.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The player log could not be read or contained no usable rate.
    #[error("playback log unavailable: {0}")]
    LogUnavailable(String),

    /// The host reports no default output device.
    #[error("no default output device")]
    NoDefaultDevice,

    /// Device enumeration failed in the capability provider.
    #[error("device query failed: {0}")]
    Device(String),

    /// The device advertises no usable sample rates.
    #[error("device reports no supported sample rates")]
    EmptySupportedRateSet,

    /// A target rate that is not a positive finite number.
    #[error("invalid sample rate: {0}")]
    InvalidRate(f64),

    /// The device rejected or failed the nominal rate change.
    #[error("failed to set device sample rate to {rate_hz} Hz: {reason}")]
    HardwareApply { rate_hz: f64, reason: String },
}

impl SyncError {
    pub(crate) fn apply(rate_hz: f64, reason: impl Into<String>) -> Self {
        Self::HardwareApply {
            rate_hz,
            reason: reason.into(),
        }
    }
}
