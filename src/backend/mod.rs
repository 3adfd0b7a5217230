//! Rendering backend contract.
//!
//! The scheduler only needs a handful of capabilities from whatever does
//! the actual tracing: create/destroy a context, resize frame resources,
//! accept the sequence table and light list, render one pass into an RGBA
//! float accumulation buffer, and read that buffer back. Everything else
//! (geometry, materials, shading) is the backend's business.
//!
//! All methods are called from the scheduler's worker thread only.
//!
//! ## Architecture
//! ```text
//! PassScheduler ──Job──▶ worker thread ──▶ RenderBackend ──▶ PixelBuffer
//!                                   ▲
//!                       SequenceTable, LightBuffer
//! ```

pub mod cpu;

pub use cpu::{CpuBackend, Material, Sphere};

use std::sync::Arc;

use crate::scheduler::{Camera, Environment, Light};
use crate::sequence::SequenceTable;
use crate::util::{BackendResult, UVec2, Vec4};

/// Handle to a shading program issued by a backend.
///
/// Programs are owned by the backend; the scheduler only keeps handles so
/// it can rebind system uniforms after the sequence table or lights change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Interactive-mode sub-pass: only pixels whose position modulo `size`
/// equals `pixel` are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPass {
    pub pixel: UVec2,
    pub size: UVec2,
}

impl BlockPass {
    /// Whether pixel `(x, y)` belongs to this sub-pass.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x % self.size.x == self.pixel.x && y % self.size.y == self.pixel.y
    }
}

/// Per-pass uniform state handed to [`RenderBackend::render_pass`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassUniforms {
    /// Column of the sequence table to read this pass.
    pub sample_index: u32,
    /// Set in interactive mode.
    pub block: Option<BlockPass>,
    pub max_ray_depth: u32,
    pub camera: Camera,
    pub environment: Environment,
}

/// Host copy of the accumulation buffer.
///
/// `rgb` holds the running mean radiance, `a` the number of samples
/// accumulated into that pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<Vec4>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Vec4 {
        self.data[(y * self.width + x) as usize]
    }

    /// Raw bytes, four `f32` per pixel.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Flat RGBA `f32` values.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.data)
    }

    /// Smallest per-pixel sample count.
    pub fn min_samples(&self) -> u32 {
        self.data.iter().map(|p| p.w as u32).min().unwrap_or(0)
    }
}

/// Capabilities the scheduler requires from a rendering backend.
///
/// Every fallible call reports failure through [`BackendResult`]; the
/// scheduler treats any error as unrecoverable.
pub trait RenderBackend: Send + 'static {
    /// Create the context and frame-sized resources.
    fn create_context(&mut self, width: u32, height: u32) -> BackendResult<()>;

    /// Reallocate frame-sized resources. Accumulated samples are lost.
    fn resize(&mut self, width: u32, height: u32) -> BackendResult<()>;

    /// Make a new sequence table current. Read-only during passes.
    fn upload_sequences(&mut self, table: Arc<SequenceTable>) -> BackendResult<()>;

    /// Replace the light list.
    fn upload_lights(&mut self, lights: &[Light]) -> BackendResult<()>;

    /// Bind the sequence table and lights to a shading program.
    fn bind_system_uniforms(&mut self, program: ProgramId) -> BackendResult<()>;

    /// Drop all scene geometry and programs.
    fn clear_scene(&mut self) -> BackendResult<()>;

    /// Zero the accumulation buffer.
    fn clear_accumulation(&mut self) -> BackendResult<()>;

    /// Render exactly one pass into the accumulation buffer.
    fn render_pass(&mut self, uniforms: &PassUniforms) -> BackendResult<()>;

    /// Copy the accumulation buffer to host memory.
    fn read_pixels(&mut self) -> BackendResult<PixelBuffer>;

    /// Release frame resources, then the context. Must be safe to call on
    /// a backend whose context was never created.
    fn destroy(&mut self);
}
