//! CoreAudio nominal sample rate helpers for macOS.
//!
//! CPAL exposes the rates a device can run at but cannot switch the device's nominal
//! rate; on macOS that goes straight through the HAL property API.

#[cfg(target_os = "macos")]
mod macos {
    use coreaudio::audio_unit::macos_helpers::{get_device_id_from_name, set_device_sample_rate};
    use objc2_core_audio::AudioObjectGetPropertyData;
    use objc2_core_audio::AudioObjectPropertyAddress;
    use objc2_core_audio::AudioObjectPropertySelector;
    use objc2_core_audio::kAudioDevicePropertyNominalSampleRate;
    use objc2_core_audio::kAudioObjectPropertyElementMaster;
    use objc2_core_audio::kAudioObjectPropertyScopeGlobal;
    use std::ptr::NonNull;

    use crate::error::{Result, SyncError};

    /// Read the device's current nominal sample rate in Hz.
    pub fn nominal_rate(device_name: &str) -> Option<f64> {
        let device_id = get_device_id_from_name(device_name, false)?;
        let property_address = AudioObjectPropertyAddress {
            mSelector: kAudioDevicePropertyNominalSampleRate as AudioObjectPropertySelector,
            mScope: kAudioObjectPropertyScopeGlobal,
            mElement: kAudioObjectPropertyElementMaster,
        };
        let mut rate: f64 = 0.0;
        let data_size = std::mem::size_of::<f64>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                device_id,
                NonNull::from(&property_address),
                0,
                std::ptr::null(),
                NonNull::from(&data_size),
                NonNull::from(&mut rate).cast(),
            )
        };
        if status != 0 || rate <= 0.0 {
            return None;
        }
        Some(rate)
    }

    /// Switch the device's nominal sample rate.
    pub fn set_nominal_rate(device_name: &str, rate_hz: f64) -> Result<()> {
        let device_id = get_device_id_from_name(device_name, false).ok_or_else(|| {
            SyncError::apply(rate_hz, format!("unable to resolve device id for {device_name}"))
        })?;
        set_device_sample_rate(device_id, rate_hz)
            .map_err(|err| SyncError::apply(rate_hz, format!("{err:?}")))
    }
}

#[cfg(target_os = "macos")]
pub use macos::{nominal_rate, set_nominal_rate};

#[cfg(not(target_os = "macos"))]
pub fn nominal_rate(_device_name: &str) -> Option<f64> {
    None
}

#[cfg(not(target_os = "macos"))]
pub fn set_nominal_rate(_device_name: &str, rate_hz: f64) -> crate::error::Result<()> {
    Err(crate::error::SyncError::apply(
        rate_hz,
        "changing the nominal sample rate is not supported on this platform",
    ))
}
