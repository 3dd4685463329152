//! Engine-wide foundation modules.
//!
//! Everything here is independent of the graphics backend in use.
//!
//! - `math`: vector and matrix aliases over nalgebra
//! - `log`: structured logging setup
//! - `config`: engine settings loaded from a config file
//! - `error`: unified error types
//! - `scene`: brush and entity scene description
//! - `runtime`: window event loop driver

pub mod config;
pub mod error;
pub mod log;
pub mod math;
pub mod runtime;
pub mod scene;

// Re-export the types most callers need.
pub use config::Config;
pub use error::{Result, ToastRenderError};
pub use math::{Matrix4, Vector3, Vector4};
pub use runtime::Runtime;
pub use scene::SceneConfig;
