//! Toaster Engine - standalone renderer binary
//!
//! Opens a window and renders the configured scene until the window is
//! closed or Escape is pressed. The graphics backend is chosen through
//! the config file or command line flags.
//!
//! # Usage
//!
//! ```bash
//! # use config.toml / scene.toml next to the binary
//! cargo run
//!
//! # override the backend from the command line
//! cargo run -- --dx12
//! cargo run -- --sim
//! ```
//!
//! # Flags
//!
//! - `--dx12` / `--sim`: select the graphics backend
//! - `--warp`: use the software rasterizer (DirectX 12 only)
//! - `--no-vsync`: present without vertical sync
//! - `--width <value>` / `--height <value>`: set the window size
//!
//! # Startup flow
//!
//! 1. Load the engine config file (config.toml)
//! 2. Apply command line overrides
//! 3. Initialize logging
//! 4. Load the scene file (scene.toml)
//! 5. Create the event loop and hand control to [`Runtime`]

use tracing::{error, info};
use winit::event_loop::EventLoop;

use toast_render::core::{log, Config, Runtime, SceneConfig};

fn main() -> anyhow::Result<()> {
    // 1. Load configuration (before the logger so it can configure it)
    let mut config = Config::from_file_or_default("config.toml");

    // 2. Apply command line overrides
    config.apply_args(std::env::args());

    // 3. Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. Initialize the logging system
    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!("Toaster Engine starting...");
    info!(version = env!("CARGO_PKG_VERSION"), "Application initialized");

    // 5. Load the scene
    let scene = SceneConfig::from_file_or_default("scene.toml");

    info!(
        backend = config.graphics.backend.name(),
        width = config.window.width,
        height = config.window.height,
        buffer_count = config.graphics.buffer_count,
        vsync = config.graphics.vsync,
        "Graphics configuration"
    );
    info!(
        camera_pos = ?scene.camera.transform.position,
        camera_fov = scene.camera.fov,
        brushes = scene.brushes.len(),
        entities = scene.entities.len(),
        "Scene configuration"
    );

    // 6. Create the event loop and run until the window closes
    let event_loop = EventLoop::new()?;
    let mut runtime = Runtime::new(config, scene);

    info!("Entering main loop...");
    event_loop.run_app(&mut runtime)?;

    if let Some(e) = runtime.take_error() {
        error!("Exited with error: {}", e);
        return Err(e.into());
    }

    info!("Toaster Engine stopped");
    Ok(())
}
