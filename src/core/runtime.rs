//! Window event loop driver.
//!
//! `Runtime` owns the window and the renderer and translates winit events
//! into renderer calls. The standalone binary drives it with `run_app`;
//! the embedding surface pumps it one event batch at a time instead.

use std::sync::Arc;

use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::core::config::Config;
use crate::core::error::{Result, ToastRenderError};
use crate::core::scene::SceneConfig;
use crate::renderer::Renderer;

/// Application state driven by the winit event loop.
pub struct Runtime {
    config: Config,
    scene: SceneConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    /// Standalone mode re-requests a redraw after every frame. Hosted mode
    /// leaves pacing to the embedding application.
    drive_redraws: bool,
    error: Option<ToastRenderError>,
}

impl Runtime {
    /// Runtime for the standalone binary. Renders continuously.
    pub fn new(config: Config, scene: SceneConfig) -> Self {
        Self {
            config,
            scene,
            window: None,
            renderer: None,
            drive_redraws: true,
            error: None,
        }
    }

    /// Runtime for an embedding host that pumps events and requests
    /// frames itself.
    pub fn hosted(config: Config, scene: SceneConfig) -> Self {
        Self {
            drive_redraws: false,
            ..Self::new(config, scene)
        }
    }

    /// Renders one frame immediately, outside the redraw event path.
    ///
    /// Used by hosts that own the frame cadence. Does nothing until the
    /// window exists or once shutdown has begun.
    pub fn render_now(&mut self) -> Result<()> {
        match self.renderer.as_mut() {
            Some(renderer) if !renderer.is_shutting_down() => renderer.render_frame(),
            _ => Ok(()),
        }
    }

    /// Replaces the scene used for subsequent frames.
    pub fn set_scene(&mut self, scene: SceneConfig) {
        self.scene = scene.clone();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_scene(scene);
        }
    }

    pub fn request_shutdown(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.request_shutdown();
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.renderer
            .as_ref()
            .map_or(false, |renderer| renderer.is_shutting_down())
    }

    /// True once the window and renderer exist.
    pub fn is_initialized(&self) -> bool {
        self.renderer.is_some()
    }

    /// Drains outstanding GPU work and tears the renderer down.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.shutdown()?;
        }
        Ok(())
    }

    /// Takes the first fatal error hit by the loop, if any.
    pub fn take_error(&mut self) -> Option<ToastRenderError> {
        self.error.take()
    }

    fn fail(&mut self, error: ToastRenderError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.request_shutdown();
        }
    }

    fn handle_key(&mut self, event: KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => {
                info!("Escape pressed, shutting down");
                self.request_shutdown();
            }
            PhysicalKey::Code(KeyCode::KeyV) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let vsync = renderer.toggle_vsync();
                    info!(vsync, "VSync toggled");
                }
            }
            PhysicalKey::Code(KeyCode::F11) => self.toggle_fullscreen(),
            _ => {}
        }
    }

    fn toggle_fullscreen(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.fullscreen().is_some() {
            info!("Leaving fullscreen");
            window.set_fullscreen(None);
        } else {
            info!("Entering borderless fullscreen");
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }
}

impl ApplicationHandler for Runtime {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);

        let attributes = Window::default_attributes()
            .with_title(format!(
                "{} [{}]",
                self.config.window.title,
                self.config.graphics.backend.name()
            ))
            .with_inner_size(LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.fail(ToastRenderError::Initialization(format!(
                    "Failed to create window: {}",
                    e
                )));
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(&self.config, self.scene.clone(), Some(&window)) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to initialize renderer: {}", e);
                self.fail(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested, shutting down");
                self.request_shutdown();
            }
            WindowEvent::Resized(size) if !self.is_shutting_down() => {
                debug!(width = size.width, height = size.height, "Window resized");
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.resize(size.width, size.height) {
                        error!("Resize failed: {}", e);
                        self.fail(e);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event),
            WindowEvent::RedrawRequested if !self.is_shutting_down() => {
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(e) = renderer.render_frame() {
                        error!("Frame failed: {}", e);
                        self.fail(e);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if renderer.is_shutting_down() {
            if let Err(e) = renderer.shutdown() {
                error!("Shutdown failed: {}", e);
                self.fail(e);
            }
            if let Some(renderer) = self.renderer.as_ref() {
                info!(frames = renderer.frame_count(), "Render loop finished");
            }
            event_loop.exit();
        } else if self.drive_redraws {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
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
    fn test_runtime_starts_without_window() {
        let mut runtime = Runtime::new(sim_config(), SceneConfig::default());
        assert!(!runtime.is_initialized());
        assert!(!runtime.is_shutting_down());
        // No renderer yet, so these are quiet no-ops.
        runtime.render_now().unwrap();
        runtime.shutdown().unwrap();
        assert!(runtime.take_error().is_none());
    }

    #[test]
    fn test_hosted_runtime_does_not_drive_redraws() {
        let runtime = Runtime::hosted(sim_config(), SceneConfig::default());
        assert!(!runtime.drive_redraws);
    }

    #[test]
    fn test_fail_keeps_first_error() {
        let mut runtime = Runtime::new(sim_config(), SceneConfig::default());
        runtime.fail(ToastRenderError::Runtime("first".into()));
        runtime.fail(ToastRenderError::Runtime("second".into()));
        match runtime.take_error() {
            Some(ToastRenderError::Runtime(message)) => assert_eq!(message, "first"),
            other => panic!("unexpected error slot: {:?}", other),
        }
    }
}
