// src/utils/candle.rs
use candle_core::Device;
use once_cell::sync::Lazy;

/// Device the classifier runs on, picked once from `WEATHER_DEVICE`
/// (`cpu`, `metal`, `cuda` or `auto`). Defaults to CPU: the network is a few
/// dense layers and a GPU round trip costs more than the matmuls.
static CANDLE_DEVICE: Lazy<Device> = Lazy::new(|| {
    let requested = std::env::var("WEATHER_DEVICE")
        .unwrap_or_else(|_| "cpu".to_string())
        .to_lowercase();
    select_device(&requested)
});

pub fn default_device() -> &'static Device {
    &CANDLE_DEVICE
}

pub fn select_device(requested: &str) -> Device {
    match requested {
        "metal" => try_metal().unwrap_or(Device::Cpu),
        "cuda" => try_cuda().unwrap_or(Device::Cpu),
        "auto" => try_metal().or_else(try_cuda).unwrap_or(Device::Cpu),
        "cpu" => {
            log::info!("Using Candle CPU device.");
            Device::Cpu
        }
        other => {
            log::warn!("Unknown WEATHER_DEVICE '{}', using CPU.", other);
            Device::Cpu
        }
    }
}

fn try_metal() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(device) if device.is_metal() => {
            log::info!("Successfully initialized Candle Metal device (GPU).");
            Some(device)
        }
        Ok(_) => None,
        Err(err) => {
            log::warn!(
                "Failed to initialize Candle Metal device: {:?}. Falling back.",
                err
            );
            None
        }
    }
}

fn try_cuda() -> Option<Device> {
    match Device::new_cuda(0) {
        Ok(device) => {
            log::info!("Successfully initialized Candle CUDA device (GPU).");
            Some(device)
        }
        Err(err) => {
            log::warn!(
                "Failed to initialize Candle CUDA device: {:?}. Falling back.",
                err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_and_unknown_select_cpu() {
        assert!(select_device("cpu").is_cpu());
        assert!(select_device("tpu").is_cpu());
    }
}
