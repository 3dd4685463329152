//! Configuration module
//!
//! Loads and manages renderer configuration.
//! Settings come from a TOML file with command-line overrides on top.
//!
//! # Config file format (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "Toaster Engine"
//! resizable = true
//!
//! [graphics]
//! backend = "dx12"    # or "sim"
//! buffer_count = 3
//! vsync = true
//! use_warp = false
//! clear_color = [0.0, 0.5, 0.75, 1.0]
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// Renderer configuration
///
/// Everything the renderer needs to start.
/// Loadable from a config file or built in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Window settings
    #[serde(default)]
    pub window: WindowConfig,

    /// Graphics settings
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window width
    #[serde(default = "default_width")]
    pub width: u32,

    /// Window height
    #[serde(default = "default_height")]
    pub height: u32,

    /// Window title
    #[serde(default = "default_title")]
    pub title: String,

    /// Whether the window can be resized
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// Graphics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Graphics backend selection
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,

    /// Number of swap-chain back buffers (2 or 3)
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    /// Vertical sync
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// Use the WARP software adapter instead of hardware
    #[serde(default = "default_use_warp")]
    pub use_warp: bool,

    /// RGBA clear color applied every frame
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

/// Graphics backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// Direct3D 12 backend (Windows only)
    Dx12,
    /// Simulated device, no GPU or window required
    Sim,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Whether to also write to a log file
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// Log file path
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Default value functions
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_title() -> String { "Toaster Engine".to_string() }
fn default_resizable() -> bool { true }
#[cfg(target_os = "windows")]
fn default_backend() -> GraphicsBackend { GraphicsBackend::Dx12 }
#[cfg(not(target_os = "windows"))]
fn default_backend() -> GraphicsBackend { GraphicsBackend::Sim }
fn default_buffer_count() -> usize { 3 }
fn default_vsync() -> bool { true }
fn default_use_warp() -> bool { false }
fn default_clear_color() -> [f32; 4] { [0.0, 0.5, 0.75, 1.0] }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "toast_render.log".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            graphics: GraphicsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            buffer_count: default_buffer_count(),
            vsync: default_vsync(),
            use_warp: default_use_warp(),
            clear_color: default_clear_color(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Arguments
    ///
    /// * `path` - config file path
    ///
    /// # Returns
    ///
    /// The parsed `Config`, or an error when the file is missing or malformed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use toast_render::core::Config;
    ///
    /// let config = Config::from_file("config.toml");
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// Load configuration from a file, falling back to defaults
    ///
    /// # Arguments
    ///
    /// * `path` - config file path
    ///
    /// # Returns
    ///
    /// The parsed `Config`, or `Config::default()` when loading fails
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// Save the configuration to a file
    ///
    /// # Arguments
    ///
    /// * `path` - config file path
    ///
    /// # Returns
    ///
    /// `Ok(())` on success
    #[allow(dead_code)]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply command-line overrides
    ///
    /// # Arguments
    ///
    /// * `args` - command-line argument iterator
    ///
    /// # Notes
    ///
    /// Supported arguments:
    /// - `--dx12`: use the Direct3D 12 backend
    /// - `--sim`: use the simulated backend
    /// - `--warp`: use the WARP software adapter
    /// - `--no-vsync`: disable vertical sync
    /// - `--width <value>`: set window width
    /// - `--height <value>`: set window height
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--dx12") {
            self.graphics.backend = GraphicsBackend::Dx12;
        }

        if args.iter().any(|a| a == "--sim") {
            self.graphics.backend = GraphicsBackend::Sim;
        }

        if args.iter().any(|a| a == "--warp") {
            self.graphics.use_warp = true;
        }

        if args.iter().any(|a| a == "--no-vsync") {
            self.graphics.vsync = false;
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Returns
    ///
    /// `Ok(())` when every field is usable, otherwise an error naming the field
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        // The frame pipeline is sized for double or triple buffering
        if !matches!(self.graphics.buffer_count, 2 | 3) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.buffer_count".to_string(),
                reason: "Buffer count must be 2 or 3".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl GraphicsBackend {
    /// Whether this is the DX12 backend
    #[allow(dead_code)]
    pub fn is_dx12(&self) -> bool {
        matches!(self, GraphicsBackend::Dx12)
    }

    /// Whether this is the simulated backend
    #[allow(dead_code)]
    pub fn is_sim(&self) -> bool {
        matches!(self, GraphicsBackend::Sim)
    }

    /// Backend display name
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Dx12 => "DirectX 12",
            GraphicsBackend::Sim => "Simulated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.buffer_count, 3);
        assert!(config.graphics.vsync);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        config.window.width = 800;
        config.graphics.buffer_count = 4;
        assert!(config.validate().is_err());

        config.graphics.buffer_count = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["--sim", "--no-vsync", "--width", "1280", "--height", "720"]);

        assert_eq!(config.graphics.backend, GraphicsBackend::Sim);
        assert!(!config.graphics.vsync);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [graphics]
            backend = "sim"
            buffer_count = 2
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.graphics.backend, GraphicsBackend::Sim);
        assert_eq!(config.graphics.buffer_count, 2);
        // Untouched sections keep their defaults
        assert_eq!(config.window.width, 800);
    }
}
