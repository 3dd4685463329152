//! Scene configuration module
//!
//! The scene model is deliberately small: axis-aligned box geometry
//! ("brushes"), point entities drawn as small boxes, and a camera. Scenes
//! load from TOML and can be replaced at runtime by the hosting engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use crate::core::error::{Result, ToastRenderError, ConfigError};
use crate::core::math::{Vector3, Matrix4};

/// Index list tessellating the shared 8-corner box into 12 triangles.
///
/// Corner convention (see [`Brush::corners`]): 0-3 walk the front face
/// (max Z) counter-clockwise from the bottom-left, 4-7 the back face.
pub const BRUSH_INDICES: [u16; 36] = [
    0, 1, 2, 0, 2, 3, // Front face
    4, 5, 6, 4, 6, 7, // Back face
    4, 0, 3, 4, 3, 7, // Left face
    1, 5, 6, 1, 6, 2, // Right face
    3, 2, 6, 3, 6, 7, // Top face
    0, 1, 5, 0, 5, 4, // Bottom face
];

/// Half-extent of the box a point entity is drawn as
pub const ENTITY_HALF_EXTENT: f32 = 0.25;

/// 3D transform
///
/// Position, rotation and scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    /// Position (x, y, z)
    #[serde(default = "default_position")]
    pub position: [f32; 3],

    /// Rotation in degrees (pitch, yaw, roll)
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 3],

    /// Scale (x, y, z)
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_position() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_rotation() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl Transform {
    /// Build the model matrix
    ///
    /// Transform order: scale -> rotate -> translate.
    pub fn to_matrix(&self) -> Matrix4 {
        use std::f32::consts::PI;

        let pitch = self.rotation[0] * PI / 180.0;
        let yaw = self.rotation[1] * PI / 180.0;
        let roll = self.rotation[2] * PI / 180.0;

        let translation = Matrix4::new_translation(&Vector3::new(
            self.position[0],
            self.position[1],
            self.position[2],
        ));

        let rotation_x = Matrix4::from_axis_angle(&Vector3::x_axis(), pitch);
        let rotation_y = Matrix4::from_axis_angle(&Vector3::y_axis(), yaw);
        let rotation_z = Matrix4::from_axis_angle(&Vector3::z_axis(), roll);
        let rotation = rotation_z * rotation_y * rotation_x;

        let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(
            self.scale[0],
            self.scale[1],
            self.scale[2],
        ));

        // T * R * S
        translation * rotation * scale
    }
}

/// Camera configuration
///
/// Position, orientation and projection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera transform
    #[serde(default)]
    pub transform: Transform,

    /// Field of view in degrees
    #[serde(default = "default_fov")]
    pub fov: f32,

    /// Near clip plane distance
    #[serde(default = "default_near_clip")]
    pub near_clip: f32,

    /// Far clip plane distance
    #[serde(default = "default_far_clip")]
    pub far_clip: f32,
}

fn default_fov() -> f32 {
    60.0
}

fn default_near_clip() -> f32 {
    0.1
}

fn default_far_clip() -> f32 {
    100.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            transform: Transform {
                position: [0.0, 2.0, 8.0],
                rotation: [10.0, 0.0, 0.0],
                scale: [1.0, 1.0, 1.0],
            },
            fov: 60.0,
            near_clip: 0.1,
            far_clip: 100.0,
        }
    }
}

impl CameraConfig {
    /// Build the view matrix from the camera's position and rotation
    pub fn view_matrix(&self) -> Matrix4 {
        use std::f32::consts::PI;

        let eye = Vector3::new(
            self.transform.position[0],
            self.transform.position[1],
            self.transform.position[2],
        );

        let pitch = self.transform.rotation[0] * PI / 180.0;
        let yaw = self.transform.rotation[1] * PI / 180.0;

        // Forward vector; zero rotation looks down -Z
        let forward = Vector3::new(
            yaw.sin() * pitch.cos(),
            -pitch.sin(),
            -yaw.cos() * pitch.cos(),
        );

        let target = eye + forward;
        let up = Vector3::new(0.0, 1.0, 0.0);

        Matrix4::look_at_rh(&eye.into(), &target.into(), &up)
    }

    /// Build the perspective projection matrix
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Matrix4 {
        use std::f32::consts::PI;
        let fov_rad = self.fov * PI / 180.0;
        Matrix4::new_perspective(aspect_ratio, fov_rad, self.near_clip, self.far_clip)
    }
}

/// Axis-aligned box geometry, stretched between two corner points
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Brush {
    /// Minimum corner (bottom of the box)
    pub mins: [f32; 3],

    /// Maximum corner (top of the box)
    pub maxs: [f32; 3],
}

impl Brush {
    /// Create a brush spanning `mins` to `maxs`
    pub fn new(mins: [f32; 3], maxs: [f32; 3]) -> Self {
        Self { mins, maxs }
    }

    /// The eight corner positions, in the order [`BRUSH_INDICES`] expects:
    /// front face (max Z) 0-3, back face (min Z) 4-7, each from the
    /// bottom-left counter-clockwise.
    pub fn corners(&self) -> [[f32; 3]; 8] {
        let [nx, ny, nz] = self.mins;
        let [px, py, pz] = self.maxs;
        [
            [nx, ny, pz],
            [px, ny, pz],
            [px, py, pz],
            [nx, py, pz],
            [nx, ny, nz],
            [px, ny, nz],
            [px, py, nz],
            [nx, py, nz],
        ]
    }

    /// Center point of the box
    pub fn center(&self) -> [f32; 3] {
        [
            (self.mins[0] + self.maxs[0]) * 0.5,
            (self.mins[1] + self.maxs[1]) * 0.5,
            (self.mins[2] + self.maxs[2]) * 0.5,
        ]
    }

    /// Half the box's extent along each axis
    pub fn half_extents(&self) -> [f32; 3] {
        [
            (self.maxs[0] - self.mins[0]) * 0.5,
            (self.maxs[1] - self.mins[1]) * 0.5,
            (self.maxs[2] - self.mins[2]) * 0.5,
        ]
    }

    /// Transform mapping the canonical unit box (corners at ±1) onto this box
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.center(),
            rotation: [0.0, 0.0, 0.0],
            scale: self.half_extents(),
        }
    }
}

/// Point entity, drawn as a small fixed-size box at its origin
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Entity {
    /// World position
    pub origin: [f32; 3],
}

impl Entity {
    /// Create an entity at `origin`
    pub fn new(origin: [f32; 3]) -> Self {
        Self { origin }
    }

    /// Transform mapping the canonical unit box onto this entity's marker box
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.origin,
            rotation: [0.0, 0.0, 0.0],
            scale: [ENTITY_HALF_EXTENT; 3],
        }
    }
}

/// Scene configuration
///
/// Camera plus the brush and entity lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Camera configuration
    #[serde(default)]
    pub camera: CameraConfig,

    /// Brushes to draw, in order
    #[serde(default)]
    pub brushes: Vec<Brush>,

    /// Point entities to draw, in order
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            brushes: vec![
                // Floor slab
                Brush::new([-4.0, -0.5, -4.0], [4.0, 0.0, 4.0]),
                // Center block
                Brush::new([-1.0, 0.0, -1.0], [1.0, 2.0, 1.0]),
            ],
            entities: vec![Entity::new([2.5, 0.75, 0.0])],
        }
    }
}

impl SceneConfig {
    /// Load a scene configuration from a file
    ///
    /// # Arguments
    ///
    /// - `path`: config file path
    ///
    /// # Returns
    ///
    /// - `Ok(SceneConfig)` on success
    /// - `Err(ToastRenderError)` when reading or parsing fails
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ToastRenderError::Config(ConfigError::FileNotFound(format!(
                "Failed to read scene config file '{}': {}",
                path.display(),
                e
            ))))?;

        toml::from_str(&contents)
            .map_err(|e| ToastRenderError::Config(ConfigError::ParseError(format!(
                "Failed to parse scene config: {}",
                e
            ))))
    }

    /// Load from a file, falling back to the built-in default scene
    ///
    /// # Arguments
    ///
    /// - `path`: config file path
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded scene config from: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load scene config: {}, using defaults", e);
                    Self::default()
                }
            }
        } else {
            tracing::info!("Scene config not found, using defaults");
            Self::default()
        }
    }

    /// Save the scene configuration to a file
    ///
    /// # Arguments
    ///
    /// - `path`: config file path
    #[allow(dead_code)]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ToastRenderError::Config(ConfigError::ParseError(format!(
                "Failed to serialize scene config: {}",
                e
            ))))?;

        fs::write(path, contents)
            .map_err(|e| ToastRenderError::Config(ConfigError::FileNotFound(format!(
                "Failed to write scene config to '{}': {}",
                path.display(),
                e
            ))))?;

        tracing::info!("Saved scene config to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transform() {
        let transform = Transform::default();
        assert_eq!(transform.position, [0.0, 0.0, 0.0]);
        assert_eq!(transform.rotation, [0.0, 0.0, 0.0]);
        assert_eq!(transform.scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_transform_to_matrix() {
        let transform = Transform {
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        };
        let matrix = transform.to_matrix();

        // Translation lands in the last column
        assert!((matrix[(0, 3)] - 1.0).abs() < 0.001);
        assert!((matrix[(1, 3)] - 2.0).abs() < 0.001);
        assert!((matrix[(2, 3)] - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_brush_corners() {
        let brush = Brush::new([-1.0, -2.0, -3.0], [1.0, 2.0, 3.0]);
        let corners = brush.corners();

        // Front face sits at max Z, back face at min Z
        assert_eq!(corners[0], [-1.0, -2.0, 3.0]);
        assert_eq!(corners[2], [1.0, 2.0, 3.0]);
        assert_eq!(corners[4], [-1.0, -2.0, -3.0]);
        assert_eq!(corners[6], [1.0, 2.0, -3.0]);

        assert_eq!(brush.center(), [0.0, 0.0, 0.0]);
        assert_eq!(brush.half_extents(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_brush_transform_maps_unit_box() {
        let brush = Brush::new([2.0, 0.0, -4.0], [6.0, 2.0, -2.0]);
        let matrix = brush.transform().to_matrix();

        // The unit box corner (-1, -1, -1) must land on mins
        let mapped = matrix * nalgebra::Vector4::new(-1.0_f32, -1.0, -1.0, 1.0);
        assert!((mapped.x - 2.0).abs() < 0.001);
        assert!((mapped.y - 0.0).abs() < 0.001);
        assert!((mapped.z - -4.0).abs() < 0.001);
    }

    #[test]
    fn test_brush_index_table() {
        assert_eq!(BRUSH_INDICES.len(), 36);
        assert!(BRUSH_INDICES.iter().all(|&i| i < 8));
        // Every corner participates in at least one triangle
        for corner in 0..8u16 {
            assert!(BRUSH_INDICES.contains(&corner));
        }
    }

    #[test]
    fn test_default_scene() {
        let scene = SceneConfig::default();
        assert_eq!(scene.camera.fov, 60.0);
        assert_eq!(scene.brushes.len(), 2);
        assert_eq!(scene.entities.len(), 1);
    }

    #[test]
    fn test_scene_round_trip() {
        let toml = r#"
            [[brushes]]
            mins = [0.0, 0.0, 0.0]
            maxs = [1.0, 1.0, 1.0]

            [[entities]]
            origin = [5.0, 0.5, 5.0]
        "#;
        let scene: SceneConfig = toml::from_str(toml).unwrap();

        assert_eq!(scene.brushes.len(), 1);
        assert_eq!(scene.entities[0].origin, [5.0, 0.5, 5.0]);
        // Camera falls back to the default
        assert_eq!(scene.camera.fov, 60.0);
    }
}
