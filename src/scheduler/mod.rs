//! Progressive pass scheduler.
//!
//! Owns a [`RenderBackend`] on a dedicated worker thread and turns every
//! public call into a [`Job`] on a FIFO [`JobQueue`]. The worker is the
//! only thread that ever touches the backend.
//!
//! ## State machine
//! ```text
//! Uninitialized ──Init──▶ Ready ◀──▶ RenderingFrame
//!        │                  │
//!        └── failure ───────┴──Destroy / failure──▶ Destroyed
//! ```
//!
//! ## Usage
//! ```ignore
//! let scheduler = PassScheduler::new(CpuBackend::new());
//! scheduler.init(640, 480);
//! scheduler.load_scene(true, |loader| demo_scene(loader));
//! scheduler.render_pass(RenderOptions::default(), |result| {
//!     println!("pass took {:.3}s", result.pass_time_seconds);
//! });
//! scheduler.shutdown();
//! ```

mod job;
mod lights;
mod options;
mod progress;

pub use job::{Job, PassCompleteCallback, SceneCallback, Task};
pub use lights::{Light, LightBuffer, LightId};
pub use options::{Camera, Environment, RenderOptions, MAX_RENDER_PASSES, MAX_SEQUENCES};
pub use progress::ProgressiveState;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::backend::{BlockPass, PassUniforms, PixelBuffer, ProgramId, RenderBackend};
use crate::config::SchedulerConfig;
use crate::queue::JobQueue;
use crate::sequence::{SequenceParams, SequenceTable};
use crate::util::{Error, Result, UVec2};

/// Lifecycle of the backend context as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Ready,
    RenderingFrame,
    Destroyed,
}

/// Outcome of one `RenderPass` job, handed to its callback.
#[derive(Debug, Clone)]
pub struct PassResult {
    /// Accumulated image after this pass.
    pub pixels: PixelBuffer,
    /// Wall time spent in the job, including any table rebuild.
    pub pass_time_seconds: f64,
    /// Sample index the pass rendered with.
    pub sample_index: u32,
    /// Block pixel the pass rendered (always zero in batch mode).
    pub block_pixel: UVec2,
    /// Bumped each time the sequence table is rebuilt.
    pub table_generation: u64,
    /// All sequence entries used up; no new samples were added.
    pub converged: bool,
}

/// Access handed to a scene-population callback.
pub struct SceneLoader<'a, B> {
    backend: &'a mut B,
    lights: &'a mut LightBuffer,
    programs: Vec<ProgramId>,
}

impl<B: RenderBackend> SceneLoader<'_, B> {
    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    pub fn lights(&mut self) -> &mut LightBuffer {
        &mut *self.lights
    }

    /// Have the scheduler bind the sequence table and lights to `program`
    /// once population finishes, and again whenever they change.
    pub fn bind_system_uniforms(&mut self, program: ProgramId) {
        if !self.programs.contains(&program) {
            self.programs.push(program);
        }
    }
}

/// Asynchronous front end to a render backend.
///
/// Every method enqueues and returns immediately. Jobs run strictly in
/// call order; callbacks run on the worker thread.
pub struct PassScheduler<B: RenderBackend> {
    queue: JobQueue<Job<B>>,
    state: Arc<Mutex<SchedulerState>>,
}

impl<B: RenderBackend> PassScheduler<B> {
    /// Scheduler with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &SchedulerConfig::default())
    }

    /// Spawn the worker. The initial sequence table is built from
    /// `config.options` when `init` runs.
    pub fn with_config(backend: B, config: &SchedulerConfig) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::Uninitialized));
        let mut ctx = RenderContext::new(backend, config, Arc::clone(&state));

        let mut queue = JobQueue::new();
        queue.init(move |job| ctx.handle(job));

        Self { queue, state }
    }

    /// Create the backend context.
    pub fn init(&self, width: u32, height: u32) {
        self.queue.add_task(Job::Init { width, height });
    }

    /// Resize frame resources and restart accumulation.
    pub fn resize(&self, width: u32, height: u32) {
        self.queue.add_task(Job::Resize { width, height });
    }

    /// Render one pass; `on_complete` receives the result on the worker.
    pub fn render_pass<F>(&self, options: RenderOptions, on_complete: F)
    where
        F: FnOnce(PassResult) + Send + 'static,
    {
        self.queue.add_task(Job::RenderPass {
            options,
            on_complete: Box::new(on_complete),
        });
    }

    /// Populate the scene, optionally tearing down the previous one first.
    pub fn load_scene<F>(&self, clear_existing: bool, populate: F)
    where
        F: FnOnce(&mut SceneLoader<'_, B>) + Send + 'static,
    {
        self.queue.add_task(Job::LoadScene {
            clear_existing,
            populate: Box::new(populate),
        });
    }

    /// Run arbitrary backend work in queue order.
    pub fn run_task<F>(&self, task: F)
    where
        F: FnOnce(&mut B) + Send + 'static,
    {
        self.queue.add_task(Job::RunTask(Box::new(task)));
    }

    /// Release the backend and stop the worker after queued jobs.
    pub fn destroy(&self) {
        self.queue.add_task(Job::Destroy);
    }

    /// Block until every queued job has run.
    pub fn finish(&self) {
        self.queue.finish();
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Jobs not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Destroy, drain and join.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<B: RenderBackend> Drop for PassScheduler<B> {
    fn drop(&mut self) {
        self.destroy();
        self.queue.deinit();
    }
}

/// Table parameters for `init`; falls back to defaults when the configured
/// options are unusable.
fn initial_params(config: &SchedulerConfig) -> SequenceParams {
    match config.options.validate() {
        Ok(()) => config.options.sequence_params(),
        Err(e) => {
            tracing::warn!("configured options rejected ({}); using defaults", e);
            RenderOptions::default().sequence_params()
        }
    }
}

/// Worker-side state. Lives inside the queue handler.
struct RenderContext<B> {
    backend: B,
    state: Arc<Mutex<SchedulerState>>,
    num_sequences: u32,
    initial_params: SequenceParams,
    table: Option<Arc<SequenceTable>>,
    table_generation: u64,
    progress: ProgressiveState,
    force_reset: bool,
    lights: LightBuffer,
    programs: Vec<ProgramId>,
}

impl<B: RenderBackend> RenderContext<B> {
    fn new(backend: B, config: &SchedulerConfig, state: Arc<Mutex<SchedulerState>>) -> Self {
        Self {
            backend,
            state,
            num_sequences: config.num_sequences.clamp(1, MAX_SEQUENCES),
            initial_params: initial_params(config),
            table: None,
            table_generation: 0,
            progress: ProgressiveState::default(),
            force_reset: true,
            lights: LightBuffer::new(),
            programs: Vec::new(),
        }
    }

    fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }

    /// Queue handler. Returns true to stop the worker.
    ///
    /// A panic in a job, including one raised by a caller's callback, is
    /// treated like a backend failure.
    fn handle(&mut self, job: Job<B>) -> bool {
        let kind = job.kind();
        let _span = tracing::info_span!("job", kind = kind).entered();
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(job))) {
            Ok(quit) => quit,
            Err(_) => {
                tracing::error!("{} job panicked; tearing down", kind);
                self.teardown();
                true
            }
        }
    }

    fn dispatch(&mut self, job: Job<B>) -> bool {
        let state = self.state();

        if state == SchedulerState::Destroyed {
            tracing::warn!("{:?} after destroy; dropping", job);
            return true;
        }

        let result = match job {
            Job::Init { width, height } => {
                if state != SchedulerState::Uninitialized {
                    tracing::warn!("init while already initialized; ignoring");
                    return false;
                }
                self.init(width, height)
            }
            Job::Resize { width, height } => {
                if state == SchedulerState::Uninitialized {
                    tracing::warn!("resize before init; dropping");
                    return false;
                }
                if width == 0 || height == 0 {
                    tracing::warn!("ignoring resize to {}x{}", width, height);
                    self.force_reset = true;
                    return false;
                }
                self.resize(width, height)
            }
            Job::RenderPass { options, on_complete } => {
                if state == SchedulerState::Uninitialized {
                    tracing::warn!("render pass before init; dropping");
                    return false;
                }
                if let Err(e) = options.validate() {
                    tracing::error!("dropping render pass: {}", e);
                    return false;
                }
                self.render_pass(options, on_complete)
            }
            Job::LoadScene {
                clear_existing,
                populate,
            } => {
                if state == SchedulerState::Uninitialized {
                    tracing::warn!("load scene before init; dropping");
                    return false;
                }
                self.load_scene(clear_existing, populate)
            }
            Job::RunTask(task) => {
                task(&mut self.backend);
                Ok(())
            }
            Job::Destroy => {
                self.teardown();
                tracing::info!("scheduler destroyed");
                return true;
            }
        };

        match result {
            Ok(()) => false,
            Err(e) => {
                tracing::error!("unrecoverable backend failure: {}", e);
                self.teardown();
                true
            }
        }
    }

    fn init(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize { width, height });
        }
        self.backend.create_context(width, height)?;
        self.rebuild_sequences(self.initial_params)?;
        self.lights.install_defaults();
        self.upload_lights()?;
        self.force_reset = true;
        self.set_state(SchedulerState::Ready);
        tracing::info!("initialized {}x{}", width, height);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.backend.resize(width, height)?;
        self.force_reset = true;
        tracing::debug!("resized to {}x{}", width, height);
        Ok(())
    }

    fn load_scene(&mut self, clear_existing: bool, populate: SceneCallback<B>) -> Result<()> {
        if clear_existing {
            self.backend.clear_scene()?;
            self.programs.clear();
            self.lights.install_defaults();
        }

        let mut loader = SceneLoader {
            backend: &mut self.backend,
            lights: &mut self.lights,
            programs: Vec::new(),
        };
        populate(&mut loader);
        let new_programs = loader.programs;

        for &program in &new_programs {
            self.backend.bind_system_uniforms(program)?;
            if !self.programs.contains(&program) {
                self.programs.push(program);
            }
        }
        if self.lights.is_dirty() {
            self.upload_lights()?;
        }
        self.force_reset = true;
        tracing::debug!(
            "scene loaded: {} new programs, {} lights",
            new_programs.len(),
            self.lights.len()
        );
        Ok(())
    }

    fn render_pass(&mut self, options: RenderOptions, on_complete: PassCompleteCallback) -> Result<()> {
        self.set_state(SchedulerState::RenderingFrame);
        let start = Instant::now();

        let rebuild = self
            .table
            .as_ref()
            .map_or(true, |t| options.needs_sequence_rebuild(&t.params()));
        if rebuild {
            self.rebuild_sequences(options.sequence_params())?;
        }

        if options.reset_internal_state || self.force_reset || rebuild {
            self.progress.reset();
            self.backend.clear_accumulation()?;
            self.force_reset = false;
        }

        self.progress
            .align(options.enable_interactive_mode, options.interactive_block_size);
        let used = self.progress;
        let converged = used.is_converged(options.max_render_passes);
        if !converged {
            let block = options.enable_interactive_mode.then_some(BlockPass {
                pixel: used.block_pixel,
                size: options.interactive_block_size,
            });
            let uniforms = PassUniforms {
                sample_index: used.sample_index,
                block,
                max_ray_depth: options.max_ray_depth,
                camera: options.camera,
                environment: options.environment,
            };
            self.backend.render_pass(&uniforms)?;
            self.progress
                .advance(options.enable_interactive_mode, options.interactive_block_size);
        }

        let pixels = self.backend.read_pixels()?;
        self.set_state(SchedulerState::Ready);

        let result = PassResult {
            pixels,
            pass_time_seconds: start.elapsed().as_secs_f64(),
            sample_index: used.sample_index,
            block_pixel: used.block_pixel,
            table_generation: self.table_generation,
            converged,
        };
        tracing::trace!(
            "pass {} block ({}, {}) in {:.4}s",
            result.sample_index,
            result.block_pixel.x,
            result.block_pixel.y,
            result.pass_time_seconds
        );
        on_complete(result);
        Ok(())
    }

    /// Build a new table, upload it and rebind it to every known program.
    fn rebuild_sequences(&mut self, params: SequenceParams) -> Result<()> {
        let _span = tracing::debug_span!("rebuild_sequences").entered();
        let started = Instant::now();
        let table = Arc::new(SequenceTable::build(params, self.num_sequences));
        self.backend.upload_sequences(Arc::clone(&table))?;
        for &program in &self.programs {
            self.backend.bind_system_uniforms(program)?;
        }
        self.table = Some(table);
        self.table_generation += 1;
        tracing::debug!(
            "sequence table {:?} x{} built in {:.3}s",
            params.sample_mode,
            params.sample_count,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn upload_lights(&mut self) -> Result<()> {
        self.backend.upload_lights(self.lights.as_slice())?;
        for &program in &self.programs {
            self.backend.bind_system_uniforms(program)?;
        }
        self.lights.mark_clean();
        Ok(())
    }

    /// Release everything in dependency order: tables and programs first,
    /// then the backend context itself.
    fn teardown(&mut self) {
        self.table = None;
        self.programs.clear();
        self.lights.clear();
        self.backend.destroy();
        self.set_state(SchedulerState::Destroyed);
    }
}
