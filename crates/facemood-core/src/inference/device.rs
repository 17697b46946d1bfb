//! Device selection for inference.

use candle_core::Device;
use serde::Deserialize;
use tracing::info;

/// Which device the estimator should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePreference {
    /// First available accelerator, falling back to CPU.
    #[default]
    Auto,
    /// Always the CPU.
    Cpu,
}

/// Returns the device to run inference on.
///
/// With `Auto`, Metal or CUDA is used when the matching cargo feature is
/// enabled and a device is present.
#[must_use]
pub fn select_device(preference: DevicePreference) -> Device {
    if preference == DevicePreference::Cpu {
        info!("Using CPU for inference (requested)");
        return Device::Cpu;
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Using Metal device for inference");
            return device;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA device for inference");
            return device;
        }
    }

    info!("Using CPU for inference");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_preference_is_honoured() {
        assert!(matches!(select_device(DevicePreference::Cpu), Device::Cpu));
    }

    #[test]
    fn test_auto_returns_a_device() {
        let _device = select_device(DevicePreference::Auto);
    }
}
