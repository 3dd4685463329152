//! Error handling module
//!
//! Defines the unified error types used across the renderer.
//!
//! # Design principles
//!
//! - One top-level error enum with per-subsystem sub-enums
//! - Clear context for every failure site
//! - Error chains via `source()` where an underlying error exists
//! - Easy to pattern-match at the call site

use std::fmt;

/// Crate-wide Result type
///
/// Every fallible function in the renderer should use this alias.
pub type Result<T> = std::result::Result<T, ToastRenderError>;

/// Top-level renderer error
///
/// Covers everything that can go wrong from startup through teardown.
#[derive(Debug)]
pub enum ToastRenderError {
    /// Configuration error
    Config(ConfigError),

    /// Graphics API error
    Graphics(GraphicsError),

    /// IO error
    Io(std::io::Error),

    /// Logging system error
    Log(String),

    /// Initialization error
    Initialization(String),

    /// Runtime error
    Runtime(String),
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found
    FileNotFound(String),

    /// Config file failed to parse
    ParseError(String),

    /// Required field missing
    MissingField(String),

    /// Field value out of range or malformed
    InvalidValue { field: String, reason: String },
}

/// Graphics API errors
#[derive(Debug)]
pub enum GraphicsError {
    /// Device creation failed
    DeviceCreation(String),

    /// Swap chain error
    SwapchainError(String),

    /// Shader compilation failed
    ShaderCompilation(String),

    /// Resource creation failed
    ResourceCreation(String),

    /// Command recording or execution failed
    CommandExecution(String),

    /// Device removed or wait primitive failure; not recoverable
    DeviceLost(String),

    /// Fence wait exceeded its timeout
    FenceTimeout(u64),
}

impl fmt::Display for ToastRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToastRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            ToastRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            ToastRenderError::Io(e) => write!(f, "IO error: {}", e),
            ToastRenderError::Log(msg) => write!(f, "Log error: {}", msg),
            ToastRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            ToastRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {}", field),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            GraphicsError::FenceTimeout(value) => {
                write!(f, "Timed out waiting for fence value {}", value)
            }
        }
    }
}

impl std::error::Error for ToastRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToastRenderError::Io(e) => Some(e),
            ToastRenderError::Config(e) => Some(e),
            ToastRenderError::Graphics(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

// From impls so `?` converts sub-errors at the boundary
impl From<std::io::Error> for ToastRenderError {
    fn from(err: std::io::Error) -> Self {
        ToastRenderError::Io(err)
    }
}

impl From<ConfigError> for ToastRenderError {
    fn from(err: ConfigError) -> Self {
        ToastRenderError::Config(err)
    }
}

impl From<GraphicsError> for ToastRenderError {
    fn from(err: GraphicsError) -> Self {
        ToastRenderError::Graphics(err)
    }
}
