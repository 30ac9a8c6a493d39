//! Compute device selection.
//!
//! The device is chosen once, at load time, and fixed for the process
//! lifetime; the engine afterwards always takes the device from the
//! classifier handle rather than re-deriving it.

use candle_core::Device;

use crate::error::ModelLoadError;

#[cfg(not(feature = "cuda"))]
fn cuda_not_enabled() -> ModelLoadError {
    ModelLoadError::Device {
        message: "CUDA support not enabled. Compile with --features cuda".to_string(),
    }
}

/// Parse a device string and create a candle [`Device`].
///
/// # Supported formats
///
/// - `"auto"` → CUDA device 0 when available, otherwise CPU
/// - `"cpu"` → CPU device
/// - `"cuda"` or `"gpu"` → CUDA device 0
/// - `"cuda:N"` → CUDA device N (e.g., `"cuda:1"`)
pub fn parse_device(device_str: &str) -> Result<Device, ModelLoadError> {
    let device_str = device_str.to_lowercase();
    match device_str.as_str() {
        "auto" => Device::cuda_if_available(0).map_err(|e| ModelLoadError::Device {
            message: format!("Failed to probe CUDA device: {e}"),
        }),
        "cpu" => Ok(Device::Cpu),
        "cuda" | "gpu" => {
            #[cfg(feature = "cuda")]
            {
                Device::new_cuda(0).map_err(|e| ModelLoadError::Device {
                    message: format!("Failed to create CUDA device: {e}"),
                })
            }
            #[cfg(not(feature = "cuda"))]
            {
                Err(cuda_not_enabled())
            }
        }
        s if s.starts_with("cuda:") => {
            #[cfg(feature = "cuda")]
            {
                let ordinal: usize = s
                    .strip_prefix("cuda:")
                    .unwrap_or_default()
                    .parse()
                    .map_err(|_| ModelLoadError::Device {
                        message: format!("Invalid CUDA device ordinal in '{s}'"),
                    })?;
                Device::new_cuda(ordinal).map_err(|e| ModelLoadError::Device {
                    message: format!("Failed to create CUDA device {ordinal}: {e}"),
                })
            }
            #[cfg(not(feature = "cuda"))]
            {
                Err(cuda_not_enabled())
            }
        }
        _ => Err(ModelLoadError::Device {
            message: format!(
                "Unknown device: '{device_str}'. Use 'auto', 'cpu', 'cuda', or 'cuda:N'"
            ),
        }),
    }
}
