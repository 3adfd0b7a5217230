//! Reference CPU backend.
//!
//! A small rayon-parallel path tracer over spheres. It exists to drive the
//! scheduler end to end without a GPU: it reads the sequence table the
//! same way a shader would (one table row per pixel, one column per pass),
//! honours interactive block sub-passes, and accumulates into an RGBA
//! float buffer.

use std::collections::HashSet;
use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rayon::prelude::*;

use super::{PassUniforms, PixelBuffer, ProgramId, RenderBackend};
use crate::scheduler::{Camera, Environment, Light, SceneLoader};
use crate::sequence::SequenceTable;
use crate::util::{BackendError, BackendResult, Vec2, Vec3, Vec4};

const RAY_EPSILON: f32 = 1e-3;

/// Largest frame the backend will allocate, in pixels.
const MAX_PIXELS: u64 = 16384 * 16384;

/// Diffuse surface description. Each material is its own program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub emission: Vec3,
}

impl Material {
    pub fn diffuse(albedo: Vec3) -> Self {
        Self {
            albedo,
            emission: Vec3::ZERO,
        }
    }

    pub fn emissive(emission: Vec3) -> Self {
        Self {
            albedo: Vec3::ZERO,
            emission,
        }
    }
}

/// Shading for programs that never had system uniforms bound.
const UNBOUND_MATERIAL: Material = Material {
    albedo: Vec3::ZERO,
    emission: Vec3::new(1.0, 0.0, 1.0),
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub program: ProgramId,
}

impl Sphere {
    /// Nearest hit distance in `(RAY_EPSILON, t_max)`.
    fn intersect(&self, origin: Vec3, dir: Vec3, t_max: f32) -> Option<f32> {
        let oc = origin - self.center;
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        [-b - sq, -b + sq]
            .into_iter()
            .find(|&t| t > RAY_EPSILON && t < t_max)
    }
}

struct Hit {
    t: f32,
    normal: Vec3,
    program: ProgramId,
}

/// Frame-sized resources. `rgb` is the radiance sum, `a` the sample count.
struct Frame {
    width: u32,
    height: u32,
    accum: Vec<Vec4>,
}

/// Read-only view of everything a pass needs, shared across rayon tasks.
struct SceneView<'a> {
    spheres: &'a [Sphere],
    materials: &'a [Material],
    bound: &'a HashSet<ProgramId>,
    lights: &'a [Light],
    environment: Environment,
}

impl SceneView<'_> {
    fn intersect(&self, origin: Vec3, dir: Vec3, t_max: f32) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        for sphere in self.spheres {
            let limit = best.as_ref().map_or(t_max, |h| h.t);
            if let Some(t) = sphere.intersect(origin, dir, limit) {
                let normal = (origin + dir * t - sphere.center) / sphere.radius;
                best = Some(Hit {
                    t,
                    normal,
                    program: sphere.program,
                });
            }
        }
        best
    }

    fn occluded(&self, origin: Vec3, dir: Vec3, t_max: f32) -> bool {
        self.spheres
            .iter()
            .any(|s| s.intersect(origin, dir, t_max).is_some())
    }

    fn material(&self, program: ProgramId) -> Material {
        if !self.bound.contains(&program) {
            return UNBOUND_MATERIAL;
        }
        self.materials
            .get(program.0 as usize)
            .copied()
            .unwrap_or(UNBOUND_MATERIAL)
    }

    /// Lambertian direct lighting (without albedo) at `p`.
    fn direct_light(&self, p: Vec3, n: Vec3) -> Vec3 {
        let origin = p + n * RAY_EPSILON;
        let mut total = Vec3::ZERO;
        for light in self.lights {
            match *light {
                Light::Directional {
                    direction,
                    color,
                    intensity,
                } => {
                    let l = direction.normalize_or_zero();
                    let cos = n.dot(l);
                    if cos > 0.0 && !self.occluded(origin, l, f32::INFINITY) {
                        total += color * intensity * cos;
                    }
                }
                Light::Point {
                    position,
                    color,
                    intensity,
                } => {
                    let d = position - p;
                    let dist2 = d.length_squared();
                    if dist2 <= 0.0 {
                        continue;
                    }
                    let dist = dist2.sqrt();
                    let l = d / dist;
                    let cos = n.dot(l);
                    if cos > 0.0 && !self.occluded(origin, l, dist) {
                        total += color * intensity * cos / dist2;
                    }
                }
            }
        }
        total / PI
    }

    fn trace(&self, mut origin: Vec3, mut dir: Vec3, max_depth: u32, rng: &mut Pcg32) -> Vec3 {
        let mut radiance = Vec3::ZERO;
        let mut throughput = Vec3::ONE;

        for _ in 0..max_depth.max(1) {
            let Some(hit) = self.intersect(origin, dir, f32::INFINITY) else {
                radiance += throughput * self.environment.radiance(dir);
                break;
            };

            let material = self.material(hit.program);
            let p = origin + dir * hit.t;
            let n = if hit.normal.dot(dir) > 0.0 { -hit.normal } else { hit.normal };

            radiance += throughput * material.emission;
            radiance += throughput * material.albedo * self.direct_light(p, n);

            throughput *= material.albedo;
            if throughput.max_element() < 1e-3 {
                break;
            }

            dir = cosine_hemisphere(n, rng.gen(), rng.gen());
            origin = p + n * RAY_EPSILON;
        }
        radiance
    }
}

/// Cosine-weighted direction around `n`.
fn cosine_hemisphere(n: Vec3, u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let phi = TAU * u2;
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt());
    let up = if n.y.abs() < 0.999 { Vec3::Y } else { Vec3::X };
    let t = up.cross(n).normalize();
    let b = n.cross(t);
    (t * local.x + b * local.y + n * local.z).normalize_or(n)
}

/// Precomputed camera frame for primary rays.
struct CameraRays {
    origin: Vec3,
    right: Vec3,
    up: Vec3,
    forward: Vec3,
    half_width: f32,
    half_height: f32,
    width: f32,
    height: f32,
    aperture: f32,
    focus_distance: f32,
}

impl CameraRays {
    fn new(camera: &Camera, width: u32, height: u32) -> Self {
        let (right, up, forward) = camera.basis();
        let half_height = (camera.fov_y.to_radians() * 0.5).tan();
        let aspect = width as f32 / height as f32;
        Self {
            origin: camera.position,
            right,
            up,
            forward,
            half_width: half_height * aspect,
            half_height,
            width: width as f32,
            height: height as f32,
            aperture: camera.aperture,
            focus_distance: camera.focus_distance,
        }
    }

    /// Ray through pixel `(x, y)` jittered by `s.xy`, with the lens
    /// position taken from `s.zw`.
    fn primary_ray(&self, x: u32, y: u32, s: Vec4) -> (Vec3, Vec3) {
        let u = ((x as f32 + s.x) / self.width) * 2.0 - 1.0;
        let v = 1.0 - ((y as f32 + s.y) / self.height) * 2.0;
        let dir = (self.forward + self.right * (u * self.half_width) + self.up * (v * self.half_height))
            .normalize();
        if self.aperture <= 0.0 {
            return (self.origin, dir);
        }
        let lens = (Vec2::new(s.z, s.w) * 2.0 - Vec2::ONE) * self.aperture;
        let focus = self.origin + dir * (self.focus_distance / dir.dot(self.forward));
        let origin = self.origin + self.right * lens.x + self.up * lens.y;
        (origin, (focus - origin).normalize())
    }
}

/// Rayon-parallel sphere path tracer implementing [`RenderBackend`].
#[derive(Default)]
pub struct CpuBackend {
    frame: Option<Frame>,
    sequences: Option<Arc<SequenceTable>>,
    lights: Vec<Light>,
    materials: Vec<Material>,
    spheres: Vec<Sphere>,
    bound: HashSet<ProgramId>,
    passes_rendered: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material; the returned id is its shading program.
    pub fn add_material(&mut self, material: Material) -> ProgramId {
        let id = ProgramId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> BackendResult<()> {
        if sphere.program.0 as usize >= self.materials.len() {
            return Err(BackendError::UnknownProgram(sphere.program.0));
        }
        self.spheres.push(sphere);
        Ok(())
    }

    /// Whether system uniforms are bound to `program`.
    pub fn is_bound(&self, program: ProgramId) -> bool {
        self.bound.contains(&program)
    }

    pub fn sphere_count(&self) -> usize {
        self.spheres.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn passes_rendered(&self) -> u64 {
        self.passes_rendered
    }

    /// Current frame size, if a context exists.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(|f| (f.width, f.height))
    }

    /// Sequence table currently in use.
    pub fn sequences(&self) -> Option<&SequenceTable> {
        self.sequences.as_deref()
    }

    fn allocate(width: u32, height: u32) -> BackendResult<Frame> {
        let pixels = width as u64 * height as u64;
        if pixels == 0 || pixels > MAX_PIXELS {
            return Err(BackendError::OutOfMemory(format!(
                "{}x{} accumulation buffer",
                width, height
            )));
        }
        Ok(Frame {
            width,
            height,
            accum: vec![Vec4::ZERO; pixels as usize],
        })
    }
}

impl RenderBackend for CpuBackend {
    fn create_context(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.frame = Some(Self::allocate(width, height)?);
        self.passes_rendered = 0;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        if self.frame.is_none() {
            return Err(BackendError::NotInitialized);
        }
        self.frame = Some(Self::allocate(width, height)?);
        Ok(())
    }

    fn upload_sequences(&mut self, table: Arc<SequenceTable>) -> BackendResult<()> {
        self.sequences = Some(table);
        Ok(())
    }

    fn upload_lights(&mut self, lights: &[Light]) -> BackendResult<()> {
        self.lights = lights.to_vec();
        Ok(())
    }

    fn bind_system_uniforms(&mut self, program: ProgramId) -> BackendResult<()> {
        if program.0 as usize >= self.materials.len() {
            return Err(BackendError::UnknownProgram(program.0));
        }
        self.bound.insert(program);
        Ok(())
    }

    fn clear_scene(&mut self) -> BackendResult<()> {
        self.spheres.clear();
        self.materials.clear();
        self.bound.clear();
        Ok(())
    }

    fn clear_accumulation(&mut self) -> BackendResult<()> {
        let frame = self.frame.as_mut().ok_or(BackendError::NotInitialized)?;
        frame.accum.fill(Vec4::ZERO);
        Ok(())
    }

    fn render_pass(&mut self, uniforms: &PassUniforms) -> BackendResult<()> {
        let frame = self.frame.as_mut().ok_or(BackendError::NotInitialized)?;
        let table = self.sequences.as_deref().ok_or(BackendError::NotInitialized)?;
        if uniforms.sample_index >= table.sample_count() {
            return Err(BackendError::Call {
                op: "render_pass",
                code: 1,
            });
        }
        if let Some(block) = uniforms.block {
            if block.size.x == 0 || block.size.y == 0 {
                return Err(BackendError::Call {
                    op: "render_pass",
                    code: 2,
                });
            }
        }

        let scene = SceneView {
            spheres: &self.spheres,
            materials: &self.materials,
            bound: &self.bound,
            lights: &self.lights,
            environment: uniforms.environment,
        };
        let camera = CameraRays::new(&uniforms.camera, frame.width, frame.height);
        let sample = uniforms.sample_index;
        let num_sequences = table.num_sequences();

        frame
            .accum
            .par_chunks_mut(frame.width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                if let Some(block) = uniforms.block {
                    if y % block.size.y != block.pixel.y {
                        return;
                    }
                }
                for (x, px) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    if let Some(block) = uniforms.block {
                        if !block.contains(x, y) {
                            continue;
                        }
                    }
                    let seq = seed_hash::pixel_sequence(x, y, num_sequences);
                    let s = table.get(seq, sample);
                    let (origin, dir) = camera.primary_ray(x, y, s);

                    let key = ((sample as u64) << 40) ^ ((y as u64) << 20) ^ x as u64;
                    let mut rng = Pcg32::seed_from_u64(seed_hash::mix64(key));
                    let radiance = scene.trace(origin, dir, uniforms.max_ray_depth, &mut rng);
                    let radiance = if radiance.is_finite() { radiance } else { Vec3::ZERO };
                    *px += radiance.extend(1.0);
                }
            });

        self.passes_rendered += 1;
        Ok(())
    }

    fn read_pixels(&mut self) -> BackendResult<PixelBuffer> {
        let frame = self.frame.as_ref().ok_or(BackendError::NotInitialized)?;
        let data = frame
            .accum
            .iter()
            .map(|p| {
                if p.w > 0.0 {
                    (p.truncate() / p.w).extend(p.w)
                } else {
                    Vec4::ZERO
                }
            })
            .collect();
        Ok(PixelBuffer {
            width: frame.width,
            height: frame.height,
            data,
        })
    }

    fn destroy(&mut self) {
        self.frame = None;
        self.sequences = None;
        self.bound.clear();
        self.spheres.clear();
        self.materials.clear();
        self.lights.clear();
    }
}

/// Populate a small demo scene: a ground sphere, three spheres and a
/// warm point light.
pub fn demo_scene(loader: &mut SceneLoader<'_, CpuBackend>) {
    let layout = [
        (Vec3::new(0.0, -1000.0, 0.0), 1000.0, Material::diffuse(Vec3::splat(0.6))),
        (Vec3::new(0.0, 1.0, 0.0), 1.0, Material::diffuse(Vec3::new(0.8, 0.25, 0.2))),
        (Vec3::new(-2.2, 0.7, 0.6), 0.7, Material::diffuse(Vec3::new(0.2, 0.5, 0.8))),
        (Vec3::new(2.0, 0.5, 1.0), 0.5, Material::emissive(Vec3::new(4.0, 3.2, 2.0))),
    ];

    for (center, radius, material) in layout {
        let backend = loader.backend();
        let program = backend.add_material(material);
        if let Err(e) = backend.add_sphere(Sphere {
            center,
            radius,
            program,
        }) {
            tracing::warn!("demo scene: {}", e);
            continue;
        }
        loader.bind_system_uniforms(program);
    }

    loader.lights().add(Light::Point {
        position: Vec3::new(-3.0, 4.0, 3.0),
        color: Vec3::new(1.0, 0.85, 0.7),
        intensity: 20.0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BlockPass;
    use crate::sequence::{BokehShape, SampleMode, SequenceParams};
    use crate::util::UVec2;

    fn ready_backend(width: u32, height: u32, samples: u32) -> CpuBackend {
        let mut backend = CpuBackend::new();
        backend.create_context(width, height).unwrap();
        let table = SequenceTable::build(
            SequenceParams {
                sample_mode: SampleMode::Halton,
                sample_count: samples,
                bokeh_shape: BokehShape::Circular,
            },
            4,
        );
        backend.upload_sequences(Arc::new(table)).unwrap();
        backend
    }

    fn uniforms(sample_index: u32, block: Option<BlockPass>) -> PassUniforms {
        PassUniforms {
            sample_index,
            block,
            max_ray_depth: 2,
            camera: Camera::default(),
            environment: Environment::default(),
        }
    }

    #[test]
    fn test_sphere_intersect() {
        let s = Sphere {
            center: Vec3::new(0.0, 0.0, -5.0),
            radius: 1.0,
            program: ProgramId(0),
        };
        let t = s.intersect(Vec3::ZERO, Vec3::NEG_Z, f32::INFINITY).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(s.intersect(Vec3::ZERO, Vec3::Z, f32::INFINITY).is_none());
        assert!(s.intersect(Vec3::ZERO, Vec3::NEG_Z, 3.0).is_none());
    }

    #[test]
    fn test_full_pass_touches_every_pixel() {
        let mut backend = ready_backend(8, 6, 4);
        backend.render_pass(&uniforms(0, None)).unwrap();
        let pixels = backend.read_pixels().unwrap();
        assert_eq!(pixels.min_samples(), 1);
        assert!(pixels.data.iter().all(|p| p.x >= 0.0 && p.x.is_finite()));
        assert_eq!(backend.passes_rendered(), 1);
    }

    #[test]
    fn test_block_pass_touches_one_pixel_per_block() {
        let mut backend = ready_backend(10, 10, 4);
        let block = BlockPass {
            pixel: UVec2::new(2, 3),
            size: UVec2::new(5, 5),
        };
        backend.render_pass(&uniforms(0, Some(block))).unwrap();
        let pixels = backend.read_pixels().unwrap();
        for y in 0..10 {
            for x in 0..10 {
                let expected = if block.contains(x, y) { 1.0 } else { 0.0 };
                assert_eq!(pixels.pixel(x, y).w, expected, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_sample_index_out_of_table() {
        let mut backend = ready_backend(4, 4, 2);
        assert!(matches!(
            backend.render_pass(&uniforms(2, None)),
            Err(BackendError::Call { op: "render_pass", .. })
        ));
    }

    #[test]
    fn test_calls_before_context_fail() {
        let mut backend = CpuBackend::new();
        assert_eq!(backend.clear_accumulation(), Err(BackendError::NotInitialized));
        assert_eq!(backend.read_pixels().unwrap_err(), BackendError::NotInitialized);
        assert_eq!(backend.resize(4, 4), Err(BackendError::NotInitialized));
        backend.destroy();
    }

    #[test]
    fn test_unknown_program_rejected() {
        let mut backend = CpuBackend::new();
        assert_eq!(
            backend.bind_system_uniforms(ProgramId(3)),
            Err(BackendError::UnknownProgram(3))
        );
        let p = backend.add_material(Material::diffuse(Vec3::ONE));
        assert!(backend.bind_system_uniforms(p).is_ok());
        assert!(backend.is_bound(p));
        assert!(backend
            .add_sphere(Sphere {
                center: Vec3::ZERO,
                radius: 1.0,
                program: ProgramId(7),
            })
            .is_err());
    }

    #[test]
    fn test_accumulation_averages() {
        let mut backend = ready_backend(4, 4, 4);
        backend.render_pass(&uniforms(0, None)).unwrap();
        backend.render_pass(&uniforms(1, None)).unwrap();
        let pixels = backend.read_pixels().unwrap();
        assert_eq!(pixels.min_samples(), 2);
        backend.clear_accumulation().unwrap();
        assert_eq!(backend.read_pixels().unwrap().min_samples(), 0);
    }

    #[test]
    fn test_empty_scene_shows_environment() {
        let mut backend = ready_backend(4, 4, 1);
        backend.render_pass(&uniforms(0, None)).unwrap();
        let pixels = backend.read_pixels().unwrap();
        let env = Environment::default();
        let lo = env.ground_color.min(env.sky_color).min_element();
        let hi = env.ground_color.max(env.sky_color).max_element();
        for p in &pixels.data {
            assert!(p.x >= lo - 1e-4 && p.x <= hi + 1e-4);
        }
    }

    #[test]
    fn test_aperture_changes_rays() {
        let mut camera = Camera::default();
        let pinhole = CameraRays::new(&camera, 8, 8);
        camera.aperture = 0.5;
        let thin_lens = CameraRays::new(&camera, 8, 8);
        let s = Vec4::new(0.5, 0.5, 0.9, 0.1);
        let (o1, _) = pinhole.primary_ray(4, 4, s);
        let (o2, _) = thin_lens.primary_ray(4, 4, s);
        assert_eq!(o1, camera.position);
        assert_ne!(o2, camera.position);
    }
}
