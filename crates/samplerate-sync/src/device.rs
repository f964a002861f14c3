//! Default output device discovery and rate control.
//!
//! [`CapabilityProvider`] is the seam between the sync engine and the host audio stack.
//! [`CpalProvider`] implements it with CPAL for enumeration and CoreAudio for the nominal
//! rate on macOS.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::coreaudio;
use crate::error::{Result, SyncError};
use crate::matcher::is_valid_rate;

/// Rates probed inside continuous ranges reported by backends without discrete rate lists.
const STANDARD_RATES: [u32; 13] = [
    8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000,
    352_800, 384_000,
];

/// Snapshot of the system default output device.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDevice {
    /// Stable identifier used to detect default device changes.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Current hardware sample rate in Hz.
    pub nominal_rate: f64,
    /// Discrete rates the device can run at, in Hz.
    pub supported_rates: Vec<f64>,
}

/// Access to the default output device and its sample rate.
pub trait CapabilityProvider: Send + Sync {
    /// Fetch a fresh snapshot of the default output device, if any.
    fn default_output_device(&self) -> Result<Option<OutputDevice>>;

    /// Identity of the default output device, used by the device watcher.
    fn default_device_id(&self) -> Result<Option<String>> {
        Ok(self.default_output_device()?.map(|d| d.id))
    }

    /// Re-read the device's current nominal rate.
    ///
    /// Another application may have switched the rate since the snapshot was taken.
    fn nominal_rate(&self, device: &OutputDevice) -> Result<f64> {
        Ok(device.nominal_rate)
    }

    /// Set the device's nominal sample rate.
    fn set_nominal_rate(&self, device: &OutputDevice, rate_hz: f64) -> Result<()>;
}

/// Capability provider backed by the CPAL default host.
#[derive(Clone, Debug, Default)]
pub struct CpalProvider;

impl CpalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProvider for CpalProvider {
    fn default_output_device(&self) -> Result<Option<OutputDevice>> {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            return Ok(None);
        };
        snapshot_device(&device).map(Some)
    }

    fn default_device_id(&self) -> Result<Option<String>> {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            return Ok(None);
        };
        let name = device_name(&device)?;
        Ok(Some(device_id_for(&device, &name)))
    }

    fn nominal_rate(&self, device: &OutputDevice) -> Result<f64> {
        Ok(coreaudio::nominal_rate(&device.name).unwrap_or(device.nominal_rate))
    }

    fn set_nominal_rate(&self, device: &OutputDevice, rate_hz: f64) -> Result<()> {
        coreaudio::set_nominal_rate(&device.name, rate_hz)
    }
}

fn snapshot_device(device: &cpal::Device) -> Result<OutputDevice> {
    let name = device_name(device)?;
    let id = device_id_for(device, &name);

    let mut ranges = Vec::new();
    match device.supported_output_configs() {
        Ok(configs) => {
            for r in configs {
                ranges.push((r.min_sample_rate(), r.max_sample_rate()));
            }
        }
        Err(err) => {
            tracing::warn!(device = %name, error = %err, "unable to query supported output configs");
        }
    }
    let default_rate = device
        .default_output_config()
        .ok()
        .map(|cfg| cfg.sample_rate());
    let supported_rates = supported_rates_from_ranges(&ranges, default_rate);

    let nominal_rate = coreaudio::nominal_rate(&name)
        .or_else(|| default_rate.map(f64::from))
        .ok_or_else(|| SyncError::Device(format!("unable to read sample rate of {name}")))?;

    Ok(OutputDevice {
        id,
        name,
        nominal_rate,
        supported_rates,
    })
}

fn device_name(device: &cpal::Device) -> Result<String> {
    device
        .description()
        .map(|desc| desc.name().to_string())
        .map_err(|err| SyncError::Device(err.to_string()))
}

fn device_id_for(device: &cpal::Device, name: &str) -> String {
    if let Ok(id) = device.id() {
        return id.to_string();
    }
    name.to_string()
}

/// Flatten CPAL config ranges into a sorted, de-duplicated list of discrete rates.
///
/// Range endpoints are always included. Wide ranges also contribute the standard rates
/// that fall inside them. When the device reports nothing usable the default config rate
/// is used on its own.
fn supported_rates_from_ranges(ranges: &[(u32, u32)], default_rate: Option<u32>) -> Vec<f64> {
    let mut rates: Vec<u32> = Vec::new();
    for &(min, max) in ranges {
        if min == 0 || max < min {
            continue;
        }
        rates.push(min);
        rates.push(max);
        if max > min {
            rates.extend(STANDARD_RATES.iter().copied().filter(|r| *r > min && *r < max));
        }
    }
    if rates.is_empty() {
        rates.extend(default_rate.filter(|r| *r > 0));
    }
    rates.sort_unstable();
    rates.dedup();
    rates.into_iter().map(f64::from).filter(|r| is_valid_rate(*r)).collect()
}

/// Human-readable description of the default output device for `--list-devices`.
pub fn describe_default_device(provider: &dyn CapabilityProvider) -> Result<String> {
    let device = provider
        .default_output_device()?
        .ok_or(SyncError::NoDefaultDevice)?;
    let rates = device
        .supported_rates
        .iter()
        .map(|r| format_hz(*r))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "{} [{}]\n  current: {}\n  supported: {}",
        device.name,
        device.id,
        format_hz(device.nominal_rate),
        rates
    ))
}

fn format_hz(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{rate:.0} Hz")
    } else {
        format!("{rate} Hz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_rates_from_discrete_ranges() {
        let ranges = [(48_000, 48_000), (44_100, 44_100), (96_000, 96_000), (48_000, 48_000)];
        let rates = supported_rates_from_ranges(&ranges, Some(48_000));
        assert_eq!(rates, vec![44_100.0, 48_000.0, 96_000.0]);
    }

    #[test]
    fn supported_rates_expand_continuous_range() {
        let rates = supported_rates_from_ranges(&[(44_100, 96_000)], None);
        assert_eq!(rates, vec![44_100.0, 48_000.0, 88_200.0, 96_000.0]);
    }

    #[test]
    fn supported_rates_keep_odd_endpoints() {
        let rates = supported_rates_from_ranges(&[(5_512, 12_000)], None);
        assert_eq!(rates, vec![5_512.0, 8_000.0, 11_025.0, 12_000.0]);
    }

    #[test]
    fn supported_rates_fall_back_to_default_rate() {
        assert_eq!(supported_rates_from_ranges(&[], Some(48_000)), vec![48_000.0]);
        assert_eq!(supported_rates_from_ranges(&[(0, 0)], Some(44_100)), vec![44_100.0]);
        assert!(supported_rates_from_ranges(&[], None).is_empty());
    }

    #[test]
    fn format_hz_drops_integral_fraction() {
        assert_eq!(format_hz(44_100.0), "44100 Hz");
        assert_eq!(format_hz(44_100.5), "44100.5 Hz");
    }
}
