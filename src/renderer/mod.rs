//! Renderer module
//!
//! The unified rendering surface of the engine. Hosts talk to [`Renderer`]
//! and never to a graphics API directly; the API-specific work lives in the
//! `gfx` module behind the [`Device`](crate::gfx::Device) enum.
//!
//! # Architecture
//!
//! - `Renderer`: owns the device, the swap chain and the frame scheduler,
//!   and exposes the whole-frame operations (render, resize, shutdown)
//! - `scheduler`: the per-tick state machine and slot bookkeeping
//! - `command`, `sync`, `frame`, `swapchain`: the API-agnostic pieces the
//!   scheduler is built from

use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::scene::SceneConfig;
use crate::gfx::Device;
use crate::renderer::scheduler::{FrameScheduler, SchedulerState};
use crate::renderer::swapchain::SwapChain;

pub mod command;
pub mod frame;
pub mod scheduler;
pub mod swapchain;
pub mod sync;

/// Top-level renderer
///
/// One instance per window. All methods are fallible where the GPU is
/// involved; any error other than a benign one is fatal and the host is
/// expected to shut down.
pub struct Renderer {
    device: Device,
    scheduler: FrameScheduler,
    swap_chain: SwapChain,
    scene: SceneConfig,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Create the device, swap chain and scheduler for one window
    ///
    /// `window` is `None` only for the simulated backend; the DirectX 12
    /// backend requires a real window to present into.
    pub fn new(config: &Config, scene: SceneConfig, window: Option<&Window>) -> Result<Self> {
        let (width, height) = match window {
            Some(window) => {
                let size = window.inner_size();
                (size.width.max(1), size.height.max(1))
            }
            None => (config.window.width, config.window.height),
        };

        let mut device = Device::new(config, width, height, window)?;
        let swap_chain = SwapChain::new(&device, width, height, config.graphics.vsync);
        let mut scheduler = FrameScheduler::new();
        scheduler.initialize(&mut device)?;

        tracing::info!(
            backend = config.graphics.backend.name(),
            buffer_count = swap_chain.buffer_count(),
            width,
            height,
            "Renderer initialized"
        );

        Ok(Self {
            device,
            scheduler,
            swap_chain,
            scene,
            clear_color: config.graphics.clear_color,
        })
    }

    /// Render and present one frame
    pub fn render_frame(&mut self) -> Result<()> {
        self.scheduler.render_frame(
            &mut self.device,
            &self.swap_chain,
            Some(&self.scene),
            self.clear_color,
        )
    }

    /// Resize the swap chain; zero extents are clamped to one pixel
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.scheduler
            .resize(&mut self.device, &mut self.swap_chain, width, height)
    }

    /// Replace the scene drawn every frame
    pub fn set_scene(&mut self, scene: SceneConfig) {
        tracing::info!(
            brushes = scene.brushes.len(),
            entities = scene.entities.len(),
            "Scene replaced"
        );
        self.scene = scene;
    }

    /// Flip vsync; returns the new setting
    pub fn toggle_vsync(&mut self) -> bool {
        self.swap_chain.toggle_vsync()
    }

    /// Ask the render loop to stop after the current tick
    pub fn request_shutdown(&mut self) {
        self.scheduler.request_shutdown();
    }

    /// Whether shutdown was requested or teardown already ran
    pub fn is_shutting_down(&self) -> bool {
        self.scheduler.is_shutting_down()
    }

    /// Drain the GPU and tear down; safe to call more than once
    pub fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown(&mut self.device)
    }

    /// Frames presented since creation
    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    #[allow(dead_code)]
    pub fn swap_chain(&self) -> &SwapChain {
        &self.swap_chain
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // The GPU must be idle before device objects are released
        if self.scheduler.state() != SchedulerState::Shutdown {
            tracing::warn!("Renderer dropped without shutdown, flushing GPU");
            if let Err(e) = self.scheduler.shutdown(&mut self.device) {
                tracing::error!("Flush on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GraphicsBackend;

    fn sim_config() -> Config {
        let mut config = Config::default();
        config.graphics.backend = GraphicsBackend::Sim;
        config
    }

    #[test]
    fn test_renderer_lifecycle() {
        let config = sim_config();
        let mut renderer = Renderer::new(&config, SceneConfig::default(), None).unwrap();

        for _ in 0..4 {
            renderer.render_frame().unwrap();
        }
        renderer.shutdown().unwrap();

        assert_eq!(renderer.frame_count(), 4);
        assert!(renderer.is_shutting_down());
    }

    #[test]
    fn test_render_after_shutdown_fails() {
        let config = sim_config();
        let mut renderer = Renderer::new(&config, SceneConfig::default(), None).unwrap();

        renderer.shutdown().unwrap();
        assert!(renderer.render_frame().is_err());
    }

    #[test]
    fn test_minimized_resize_clamps() {
        let config = sim_config();
        let mut renderer = Renderer::new(&config, SceneConfig::default(), None).unwrap();

        renderer.render_frame().unwrap();
        renderer.resize(0, 0).unwrap();

        assert_eq!(renderer.swap_chain().size(), (1, 1));
        renderer.render_frame().unwrap();
        renderer.shutdown().unwrap();
    }

    #[test]
    fn test_toggle_vsync_round_trip() {
        let config = sim_config();
        let mut renderer = Renderer::new(&config, SceneConfig::default(), None).unwrap();

        assert!(renderer.swap_chain().vsync());
        assert!(!renderer.toggle_vsync());
        assert!(renderer.toggle_vsync());
        renderer.shutdown().unwrap();
    }
}
