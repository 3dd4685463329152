//! Graphics backend module
//!
//! The API-specific half of the renderer. Two backends exist:
//! - DirectX 12: the real presentation path, Windows only
//! - Simulated: an in-memory device that records every operation, used on
//!   other platforms and throughout the test suite
//!
//! Both implement the [`GpuDevice`](device::GpuDevice) trait and are carried
//! by the [`Device`] enum, so the frame pipeline above never branches on the
//! API itself.

use std::time::Duration;

use winit::window::Window;

use crate::core::config::{Config, GraphicsBackend};
use crate::core::error::{Result, ToastRenderError};
use crate::core::scene::SceneConfig;

pub mod device;
pub mod sim;

#[cfg(target_os = "windows")]
pub mod dx12;

use device::GpuDevice;
use sim::SimDevice;

#[cfg(target_os = "windows")]
use dx12::Dx12Device;

/// Concrete graphics device, tagged by backend
///
/// Enum dispatch keeps the hot path free of virtual calls and makes the set
/// of supported backends explicit at compile time.
#[cfg_attr(not(target_os = "windows"), derive(Debug))]
pub enum Device {
    Sim(SimDevice),
    #[cfg(target_os = "windows")]
    Dx12(Box<Dx12Device>),
}

impl Device {
    /// Create the backend selected in the configuration
    pub fn new(
        config: &Config,
        width: u32,
        height: u32,
        window: Option<&Window>,
    ) -> Result<Device> {
        match config.graphics.backend {
            GraphicsBackend::Sim => {
                tracing::info!("Initializing simulated backend");
                Ok(Device::Sim(SimDevice::new(
                    config.graphics.buffer_count,
                    width,
                    height,
                )))
            }
            #[cfg(target_os = "windows")]
            GraphicsBackend::Dx12 => {
                tracing::info!("Initializing DirectX 12 backend");
                let window = window.ok_or_else(|| {
                    ToastRenderError::Initialization(
                        "DX12 backend requires a window".to_string(),
                    )
                })?;
                let device = Dx12Device::new(config, width, height, window)?;
                Ok(Device::Dx12(Box::new(device)))
            }
            #[cfg(not(target_os = "windows"))]
            GraphicsBackend::Dx12 => {
                let _ = window;
                Err(ToastRenderError::Initialization(
                    "DX12 backend is only available on Windows".to_string(),
                ))
            }
        }
    }
}

impl GpuDevice for Device {
    fn buffer_count(&self) -> usize {
        match self {
            Device::Sim(d) => d.buffer_count(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.buffer_count(),
        }
    }

    fn tearing_supported(&self) -> bool {
        match self {
            Device::Sim(d) => d.tearing_supported(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.tearing_supported(),
        }
    }

    fn current_back_buffer_index(&self) -> usize {
        match self {
            Device::Sim(d) => d.current_back_buffer_index(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.current_back_buffer_index(),
        }
    }

    fn signal_fence(&mut self, value: u64) -> Result<()> {
        match self {
            Device::Sim(d) => d.signal_fence(value),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.signal_fence(value),
        }
    }

    fn completed_fence_value(&self) -> u64 {
        match self {
            Device::Sim(d) => d.completed_fence_value(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.completed_fence_value(),
        }
    }

    fn wait_fence(&mut self, value: u64, timeout: Duration) -> Result<()> {
        match self {
            Device::Sim(d) => d.wait_fence(value, timeout),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.wait_fence(value, timeout),
        }
    }

    fn reset_frame_commands(&mut self, slot: usize) -> Result<()> {
        match self {
            Device::Sim(d) => d.reset_frame_commands(slot),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.reset_frame_commands(slot),
        }
    }

    fn record_transition_to_render_target(&mut self, slot: usize) -> Result<()> {
        match self {
            Device::Sim(d) => d.record_transition_to_render_target(slot),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.record_transition_to_render_target(slot),
        }
    }

    fn record_clear(&mut self, slot: usize, color: [f32; 4]) -> Result<()> {
        match self {
            Device::Sim(d) => d.record_clear(slot, color),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.record_clear(slot, color),
        }
    }

    fn record_scene(&mut self, scene: &SceneConfig) -> Result<()> {
        match self {
            Device::Sim(d) => d.record_scene(scene),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.record_scene(scene),
        }
    }

    fn record_transition_to_present(&mut self, slot: usize) -> Result<()> {
        match self {
            Device::Sim(d) => d.record_transition_to_present(slot),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.record_transition_to_present(slot),
        }
    }

    fn close_frame_commands(&mut self) -> Result<()> {
        match self {
            Device::Sim(d) => d.close_frame_commands(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.close_frame_commands(),
        }
    }

    fn submit_frame_commands(&mut self) -> Result<()> {
        match self {
            Device::Sim(d) => d.submit_frame_commands(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.submit_frame_commands(),
        }
    }

    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        match self {
            Device::Sim(d) => d.present(sync_interval, allow_tearing),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.present(sync_interval, allow_tearing),
        }
    }

    fn release_frame_targets(&mut self) {
        match self {
            Device::Sim(d) => d.release_frame_targets(),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.release_frame_targets(),
        }
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        match self {
            Device::Sim(d) => d.resize_buffers(width, height),
            #[cfg(target_os = "windows")]
            Device::Dx12(d) => d.resize_buffers(width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_device_selected_from_config() {
        let mut config = Config::default();
        config.graphics.backend = GraphicsBackend::Sim;
        config.graphics.buffer_count = 2;

        let device = Device::new(&config, 640, 480, None).unwrap();
        assert_eq!(device.buffer_count(), 2);
        assert!(matches!(device, Device::Sim(_)));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_dx12_unavailable_off_windows() {
        let mut config = Config::default();
        config.graphics.backend = GraphicsBackend::Dx12;

        let err = Device::new(&config, 640, 480, None).unwrap_err();
        assert!(err.to_string().contains("only available on Windows"));
    }
}
