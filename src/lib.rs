//! # pathpass
//!
//! Progressive pass scheduling for interactive path tracing.
//!
//! A [`PassScheduler`] owns a rendering backend on a dedicated worker thread
//! and feeds it one pass at a time: either a full-frame sample (batch mode)
//! or one pixel of every `N×M` block (interactive mode). Per-pixel jitter
//! and lens positions come from a precomputed [`SequenceTable`] of
//! low-discrepancy or blue-noise point sets.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math aliases
//! - [`queue`] - Single-worker FIFO job queue
//! - [`sequence`] - Sample point generators and the sequence table
//! - [`scheduler`] - Pass scheduler, render options, lights
//! - [`backend`] - Backend contract and the reference CPU backend
//! - [`config`] - Persisted scheduler configuration
//!
//! ## Example
//!
//! ```no_run
//! use pathpass::prelude::*;
//!
//! let scheduler = PassScheduler::new(CpuBackend::new());
//! scheduler.init(320, 240);
//! scheduler.load_scene(true, |loader| demo_scene(loader));
//!
//! let options = RenderOptions {
//!     enable_interactive_mode: false,
//!     max_render_passes: 16,
//!     ..Default::default()
//! };
//! for _ in 0..16 {
//!     scheduler.render_pass(options, |result| {
//!         println!("sample {} in {:.3}s", result.sample_index, result.pass_time_seconds);
//!     });
//! }
//! scheduler.shutdown();
//! ```

pub mod util;
pub mod queue;
pub mod sequence;
pub mod scheduler;
pub mod backend;
pub mod config;

// Re-export commonly used types
pub use util::{BackendError, Error, Result};
pub use queue::{JobQueue, WorkerState};
pub use sequence::{BokehShape, SampleMode, SequenceParams, SequenceTable};
pub use scheduler::{PassResult, PassScheduler, RenderOptions, SchedulerState};
pub use backend::{CpuBackend, PixelBuffer, ProgramId, RenderBackend};
pub use config::SchedulerConfig;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BackendError, Error, Result};
    pub use crate::sequence::{BokehShape, SampleMode, SequenceParams, SequenceTable};
    pub use crate::scheduler::{
        Camera, Environment, Light, LightBuffer, LightId, PassResult, PassScheduler,
        RenderOptions, SceneLoader, SchedulerState,
    };
    pub use crate::backend::cpu::demo_scene;
    pub use crate::backend::{
        BlockPass, CpuBackend, Material, PassUniforms, PixelBuffer, ProgramId, RenderBackend,
        Sphere,
    };
    pub use crate::config::SchedulerConfig;
}
