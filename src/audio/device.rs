// Input device selection via cpal.
//
// The loopback/system-audio source is a virtual input device (e.g. a
// PipeWire/BlackHole monitor) identified by name in configuration; the
// microphone defaults to the host's default input device.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};

/// List the names of all available input devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Resolve an input device by name, or the host default when no name is
/// given. Matching is a case-insensitive substring match so configured
/// identifiers survive minor backend renames.
pub fn input_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match name {
        Some(wanted) => {
            let wanted_lower = wanted.to_lowercase();
            let devices = host
                .input_devices()
                .context("Failed to enumerate input devices")?;

            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name.to_lowercase().contains(&wanted_lower) {
                        return Ok(device);
                    }
                }
            }

            Err(anyhow!("Input device not found: {}", wanted))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device available")),
    }
}
