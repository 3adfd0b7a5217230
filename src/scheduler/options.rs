//! Render request parameters.

use serde::{Deserialize, Serialize};

use crate::sequence::{BokehShape, SampleMode, SequenceParams, HALTON_BASES};
use crate::util::{Error, Result, UVec2, Vec3};

/// Pinhole/thin-lens camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Lens radius in world units. Zero is a pinhole.
    pub aperture: f32,
    pub focus_distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 45.0,
            aperture: 0.0,
            focus_distance: 5.0,
        }
    }
}

impl Camera {
    /// Orthonormal `(right, up, forward)` basis.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = (self.target - self.position).normalize_or(Vec3::NEG_Z);
        let right = forward.cross(self.up).normalize_or(Vec3::X);
        let up = right.cross(forward);
        (right, up, forward)
    }
}

/// Gradient sky used when a ray escapes the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub sky_color: Vec3,
    pub ground_color: Vec3,
    pub intensity: f32,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            sky_color: Vec3::new(0.55, 0.7, 1.0),
            ground_color: Vec3::new(0.25, 0.22, 0.2),
            intensity: 1.0,
        }
    }
}

impl Environment {
    /// Radiance seen along direction `dir` (unit length).
    #[inline]
    pub fn radiance(&self, dir: Vec3) -> Vec3 {
        let t = 0.5 * (dir.y + 1.0);
        self.ground_color.lerp(self.sky_color, t) * self.intensity
    }
}

/// One render request. Copied by value into each pass job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Spread each full-frame sample over `interactive_block_size` calls.
    pub enable_interactive_mode: bool,
    pub interactive_block_size: UVec2,
    /// Samples per pixel after which the image is considered converged.
    /// Also the length of every sequence in the table.
    pub max_render_passes: u32,
    pub max_ray_depth: u32,
    pub sample_mode: SampleMode,
    pub bokeh_shape: BokehShape,
    pub camera: Camera,
    pub environment: Environment,
    /// Discard accumulated samples before this pass.
    #[serde(skip)]
    pub reset_internal_state: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            enable_interactive_mode: true,
            interactive_block_size: UVec2::new(5, 5),
            max_render_passes: 1024,
            max_ray_depth: 8,
            sample_mode: SampleMode::BlueNoise,
            bokeh_shape: BokehShape::Circular,
            camera: Camera::default(),
            environment: Environment::default(),
            reset_internal_state: false,
        }
    }
}

impl RenderOptions {
    /// Parameters the sequence table is built from.
    pub fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            sample_mode: self.sample_mode,
            sample_count: self.max_render_passes,
            bokeh_shape: self.bokeh_shape,
        }
    }

    /// Whether a table built from `current` is unusable for these options.
    /// Camera, environment and mode flags never invalidate it.
    pub fn needs_sequence_rebuild(&self, current: &SequenceParams) -> bool {
        self.sequence_params() != *current
    }

    /// Same options with the reset flag set.
    pub fn with_reset(mut self) -> Self {
        self.reset_internal_state = true;
        self
    }

    /// Reject options the scheduler cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.interactive_block_size.x == 0 || self.interactive_block_size.y == 0 {
            return Err(Error::invalid_options(format!(
                "interactive block size must be positive, got {}x{}",
                self.interactive_block_size.x, self.interactive_block_size.y
            )));
        }
        if self.max_render_passes == 0 || self.max_render_passes > MAX_RENDER_PASSES {
            return Err(Error::invalid_options(format!(
                "max_render_passes must be in 1..={}, got {}",
                MAX_RENDER_PASSES, self.max_render_passes
            )));
        }
        if let BokehShape::Polygon(sides) = self.bokeh_shape {
            if sides < 3 {
                return Err(Error::invalid_options(format!(
                    "polygonal bokeh needs at least 3 sides, got {}",
                    sides
                )));
            }
        }
        if !(self.camera.fov_y > 0.0 && self.camera.fov_y < 180.0) {
            return Err(Error::invalid_options(format!(
                "field of view must be in (0, 180), got {}",
                self.camera.fov_y
            )));
        }
        Ok(())
    }
}

/// Upper bound on `max_render_passes`, and so on the length of every
/// sequence in the table.
pub const MAX_RENDER_PASSES: u32 = 65536;

/// Largest sequence count every sample mode supports.
pub const MAX_SEQUENCES: u32 = HALTON_BASES.len() as u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_change_keeps_table() {
        let a = RenderOptions::default();
        let mut b = a;
        b.camera.position = Vec3::new(3.0, 2.0, 1.0);
        b.camera.fov_y = 60.0;
        b.environment.intensity = 2.0;
        b.enable_interactive_mode = false;
        b.reset_internal_state = true;
        assert!(!b.needs_sequence_rebuild(&a.sequence_params()));
    }

    #[test]
    fn test_sampling_change_rebuilds_table() {
        let a = RenderOptions::default();

        let mut b = a;
        b.sample_mode = SampleMode::Halton;
        assert!(b.needs_sequence_rebuild(&a.sequence_params()));

        let mut c = a;
        c.max_render_passes = 64;
        assert!(c.needs_sequence_rebuild(&a.sequence_params()));

        let mut d = a;
        d.bokeh_shape = BokehShape::Polygon(6);
        assert!(d.needs_sequence_rebuild(&a.sequence_params()));
    }

    #[test]
    fn test_validate() {
        assert!(RenderOptions::default().validate().is_ok());

        let mut o = RenderOptions::default();
        o.interactive_block_size = UVec2::new(0, 5);
        assert!(o.validate().is_err());

        let mut o = RenderOptions::default();
        o.bokeh_shape = BokehShape::Polygon(2);
        assert!(o.validate().is_err());

        let mut o = RenderOptions::default();
        o.max_render_passes = 0;
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_render_pass_cap() {
        let mut o = RenderOptions::default();
        o.max_render_passes = MAX_RENDER_PASSES;
        assert!(o.validate().is_ok());

        o.max_render_passes = MAX_RENDER_PASSES + 1;
        assert!(matches!(o.validate(), Err(Error::InvalidOptions(_))));

        o.max_render_passes = u32::MAX;
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_camera_basis_orthonormal() {
        let (r, u, f) = Camera::default().basis();
        assert!((r.length() - 1.0).abs() < 1e-5);
        assert!((u.length() - 1.0).abs() < 1e-5);
        assert!(r.dot(f).abs() < 1e-5);
        assert!(u.dot(f).abs() < 1e-5);
    }

    #[test]
    fn test_options_json_defaults() {
        let o: RenderOptions = serde_json::from_str("{\"max_render_passes\": 16}").unwrap();
        assert_eq!(o.max_render_passes, 16);
        assert_eq!(o.interactive_block_size, UVec2::new(5, 5));
        assert!(!o.reset_internal_state);
    }
}
