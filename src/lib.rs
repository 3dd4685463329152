//! Toaster Engine - triple buffered renderer
//!
//! A small DirectX 12 renderer built around fence based frame
//! synchronization. It draws box brushes and entity markers and can run
//! either standalone or embedded in a host engine through the C surface
//! in [`ffi`].
//!
//! # Module structure
//!
//! - `core`: configuration, logging, errors, math, scene, event loop driver
//! - `renderer`: frame scheduler, fences, command recording, swap chain
//! - `gfx`: graphics devices (DirectX 12 and a simulated test device)
//! - `ffi`: C surface for host engines
//!
//! # Example
//!
//! ```no_run
//! use toast_render::core::{Config, Runtime, SceneConfig};
//! use winit::event_loop::EventLoop;
//!
//! let config = Config::from_file_or_default("config.toml");
//! let scene = SceneConfig::from_file_or_default("scene.toml");
//!
//! let event_loop = EventLoop::new().unwrap();
//! let mut runtime = Runtime::new(config, scene);
//! event_loop.run_app(&mut runtime).unwrap();
//! ```

pub mod core;
pub mod ffi;
pub mod gfx;
pub mod renderer;
