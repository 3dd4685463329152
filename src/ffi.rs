//! C surface for embedding the renderer in a host engine.
//!
//! The host owns the frame cadence: it creates a renderer, optionally
//! pushes a scene, calls `RenderFrame` once per tick until
//! `RendererShuttingDown` reports true, then destroys the renderer.
//! Null handles are reported and absorbed instead of crashing the host.

// Exported names follow the host engine's C API.
#![allow(non_snake_case)]

use std::ffi::{c_char, CStr};
use std::ptr;
use std::slice;
use std::sync::Once;
use std::time::Duration;

use tracing::{error, info, warn};
use winit::event_loop::EventLoop;
use winit::platform::pump_events::EventLoopExtPumpEvents;

use crate::core::config::Config;
use crate::core::log;
use crate::core::runtime::Runtime;
use crate::core::scene::{Brush, CameraConfig, Entity, SceneConfig};

static LOG_INIT: Once = Once::new();

/// Renderer instance handed to the host as an opaque pointer.
pub struct ExternalRenderer {
    event_loop: EventLoop<()>,
    runtime: Runtime,
}

impl ExternalRenderer {
    /// Processes pending window events without blocking.
    fn pump(&mut self) {
        let _ = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.runtime);
    }
}

/// Axis-aligned box in the host's scene description.
#[repr(C)]
pub struct RawBrush {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
}

/// Point entity in the host's scene description.
#[repr(C)]
pub struct RawEntity {
    pub origin: [f32; 3],
}

/// Scene payload passed across the boundary.
#[repr(C)]
pub struct RawScene {
    pub brushes: *const RawBrush,
    pub brush_count: u32,
    pub entities: *const RawEntity,
    pub entity_count: u32,
}

/// Creates a renderer with its own window and returns an opaque handle.
///
/// `title` may be null to keep the configured window title. Returns null
/// when the window or the graphics device cannot be created.
///
/// # Safety
/// `title` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn CreateRenderer(title: *const c_char) -> *mut ExternalRenderer {
    let mut config = Config::from_file_or_default("config.toml");

    LOG_INIT.call_once(|| {
        let log_file = config.logging.log_file.clone();
        let log_path = config.logging.file_output.then_some(log_file.as_str());
        log::init_logger(config.logging.level, config.logging.file_output, log_path);
    });

    if !title.is_null() {
        match unsafe { CStr::from_ptr(title) }.to_str() {
            Ok(title) => config.window.title = title.to_string(),
            Err(_) => {
                warn!("CreateRenderer(title): WARNING; Title is not valid UTF-8, keeping default");
            }
        }
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("CreateRenderer(title): ERROR; Could not create event loop: {}", e);
            return ptr::null_mut();
        }
    };

    let scene = SceneConfig::from_file_or_default("scene.toml");
    let mut external = Box::new(ExternalRenderer {
        event_loop,
        runtime: Runtime::hosted(config, scene),
    });

    // The first pump creates the window and the GPU device so the handle
    // is ready to render by the time the host receives it.
    external.pump();
    if let Some(e) = external.runtime.take_error() {
        error!("CreateRenderer(title): ERROR; Renderer initialization failed: {}", e);
        return ptr::null_mut();
    }
    if !external.runtime.is_initialized() {
        error!("CreateRenderer(title): ERROR; Window was not created");
        return ptr::null_mut();
    }

    info!("External renderer created");
    Box::into_raw(external)
}

/// Replaces the scene drawn by subsequent frames. Returns false when the
/// renderer handle, the scene, or a non-empty array pointer is null.
///
/// # Safety
/// Non-null pointers must be valid: `renderer` must come from
/// [`CreateRenderer`], and the scene arrays must hold at least
/// `brush_count` and `entity_count` elements.
#[no_mangle]
pub unsafe extern "C" fn SetScene(
    renderer: *mut ExternalRenderer,
    scene: *const RawScene,
) -> bool {
    let Some(external) = (unsafe { renderer.as_mut() }) else {
        error!("SetScene(Renderer*, Scene*): ERROR; Input renderer is invalid!");
        return false;
    };
    let Some(raw) = (unsafe { scene.as_ref() }) else {
        error!("SetScene(Renderer*, Scene*): ERROR; Input scene is invalid!");
        return false;
    };
    let Some(scene) = (unsafe { convert_scene(raw) }) else {
        error!("SetScene(Renderer*, Scene*): ERROR; Scene arrays are invalid!");
        return false;
    };

    external.runtime.set_scene(scene);
    true
}

/// Renders one frame and processes pending window events.
///
/// A fatal frame error flags the renderer for shutdown; the host observes
/// it through [`RendererShuttingDown`] on the next tick.
///
/// # Safety
/// `renderer` must be null or a pointer returned by [`CreateRenderer`].
#[no_mangle]
pub unsafe extern "C" fn RenderFrame(renderer: *mut ExternalRenderer) {
    let Some(external) = (unsafe { renderer.as_mut() }) else {
        error!("RenderFrame(Renderer*): ERROR; Input renderer is invalid!");
        return;
    };

    external.pump();
    if let Err(e) = external.runtime.render_now() {
        error!("RenderFrame(Renderer*): ERROR; Frame failed: {}", e);
        external.runtime.request_shutdown();
    }
}

/// True when the renderer wants to stop. A null handle also reports true
/// so a host loop keyed on this call terminates.
///
/// # Safety
/// `renderer` must be null or a pointer returned by [`CreateRenderer`].
#[no_mangle]
pub unsafe extern "C" fn RendererShuttingDown(renderer: *mut ExternalRenderer) -> bool {
    let Some(external) = (unsafe { renderer.as_ref() }) else {
        warn!("RendererShuttingDown(Renderer*): ERROR; No renderer found! Assuming true...");
        return true;
    };
    external.runtime.is_shutting_down()
}

/// Drains outstanding GPU work and destroys the renderer.
///
/// # Safety
/// `renderer` must be null or a pointer returned by [`CreateRenderer`],
/// and must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn ShutdownRenderer(renderer: *mut ExternalRenderer) {
    if renderer.is_null() {
        error!("ShutdownRenderer(Renderer*): ERROR; Input renderer is invalid!");
        return;
    }

    let mut external = unsafe { Box::from_raw(renderer) };
    if let Err(e) = external.runtime.shutdown() {
        error!("ShutdownRenderer(Renderer*): ERROR; Shutdown failed: {}", e);
    }
    info!("External renderer destroyed");
}

/// Builds a [`SceneConfig`] from the host payload. Returns `None` when a
/// non-empty array pointer is null.
///
/// # Safety
/// Non-null array pointers must hold at least `brush_count` and
/// `entity_count` elements.
unsafe fn convert_scene(raw: &RawScene) -> Option<SceneConfig> {
    if raw.brush_count > 0 && raw.brushes.is_null() {
        return None;
    }
    if raw.entity_count > 0 && raw.entities.is_null() {
        return None;
    }

    let mut scene = SceneConfig {
        camera: CameraConfig::default(),
        brushes: Vec::with_capacity(raw.brush_count as usize),
        entities: Vec::with_capacity(raw.entity_count as usize),
    };
    if raw.brush_count > 0 {
        let brushes = unsafe { slice::from_raw_parts(raw.brushes, raw.brush_count as usize) };
        scene
            .brushes
            .extend(brushes.iter().map(|b| Brush::new(b.mins, b.maxs)));
    }
    if raw.entity_count > 0 {
        let entities = unsafe { slice::from_raw_parts(raw.entities, raw.entity_count as usize) };
        scene
            .entities
            .extend(entities.iter().map(|e| Entity::new(e.origin)));
    }
    Some(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutting_down_null_assumes_true() {
        assert!(unsafe { RendererShuttingDown(ptr::null_mut()) });
    }

    #[test]
    fn test_set_scene_rejects_null_renderer() {
        let raw = RawScene {
            brushes: ptr::null(),
            brush_count: 0,
            entities: ptr::null(),
            entity_count: 0,
        };
        assert!(!unsafe { SetScene(ptr::null_mut(), &raw) });
    }

    #[test]
    fn test_render_frame_ignores_null_renderer() {
        unsafe { RenderFrame(ptr::null_mut()) };
    }

    #[test]
    fn test_shutdown_ignores_null_renderer() {
        unsafe { ShutdownRenderer(ptr::null_mut()) };
    }

    #[test]
    fn test_convert_scene_copies_arrays() {
        let brushes = [RawBrush {
            mins: [-1.0, 0.0, -1.0],
            maxs: [1.0, 2.0, 1.0],
        }];
        let entities = [RawEntity {
            origin: [4.0, 5.0, 6.0],
        }];
        let raw = RawScene {
            brushes: brushes.as_ptr(),
            brush_count: 1,
            entities: entities.as_ptr(),
            entity_count: 1,
        };

        let scene = unsafe { convert_scene(&raw) }.unwrap();
        assert_eq!(scene.brushes.len(), 1);
        assert_eq!(scene.brushes[0].mins, [-1.0, 0.0, -1.0]);
        assert_eq!(scene.brushes[0].maxs, [1.0, 2.0, 1.0]);
        assert_eq!(scene.entities.len(), 1);
        assert_eq!(scene.entities[0].origin, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_convert_scene_rejects_null_arrays() {
        let raw = RawScene {
            brushes: ptr::null(),
            brush_count: 2,
            entities: ptr::null(),
            entity_count: 0,
        };
        assert!(unsafe { convert_scene(&raw) }.is_none());
    }

    #[test]
    fn test_convert_scene_accepts_empty_scene() {
        let raw = RawScene {
            brushes: ptr::null(),
            brush_count: 0,
            entities: ptr::null(),
            entity_count: 0,
        };
        let scene = unsafe { convert_scene(&raw) }.unwrap();
        assert!(scene.brushes.is_empty());
        assert!(scene.entities.is_empty());
    }
}
