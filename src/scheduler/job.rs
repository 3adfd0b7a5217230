//! Jobs consumed by the scheduler's worker thread.
//!
//! A closed set of job kinds, each carrying its own payload. `RunTask` is
//! the only variant that accepts an arbitrary closure.

use std::fmt;

use super::{PassResult, RenderOptions, SceneLoader};

/// Invoked once per pass on the worker thread.
pub type PassCompleteCallback = Box<dyn FnOnce(PassResult) + Send>;

/// Populates the scene during `LoadScene`, on the worker thread.
pub type SceneCallback<B> = Box<dyn for<'a> FnOnce(&mut SceneLoader<'a, B>) + Send>;

/// Ad hoc work that needs the backend.
pub type Task<B> = Box<dyn FnOnce(&mut B) + Send>;

/// One unit of work for the worker.
pub enum Job<B> {
    Init {
        width: u32,
        height: u32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    RenderPass {
        options: RenderOptions,
        on_complete: PassCompleteCallback,
    },
    LoadScene {
        clear_existing: bool,
        populate: SceneCallback<B>,
    },
    RunTask(Task<B>),
    Destroy,
}

impl<B> Job<B> {
    /// Short name for logs and spans.
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Init { .. } => "init",
            Job::Resize { .. } => "resize",
            Job::RenderPass { .. } => "render_pass",
            Job::LoadScene { .. } => "load_scene",
            Job::RunTask(_) => "run_task",
            Job::Destroy => "destroy",
        }
    }
}

impl<B> fmt::Debug for Job<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Init { width, height } => write!(f, "Init({}x{})", width, height),
            Job::Resize { width, height } => write!(f, "Resize({}x{})", width, height),
            Job::RenderPass { options, .. } => f
                .debug_struct("RenderPass")
                .field("sample_mode", &options.sample_mode)
                .field("interactive", &options.enable_interactive_mode)
                .field("reset", &options.reset_internal_state)
                .finish_non_exhaustive(),
            Job::LoadScene { clear_existing, .. } => f
                .debug_struct("LoadScene")
                .field("clear_existing", clear_existing)
                .finish_non_exhaustive(),
            Job::RunTask(_) => f.write_str("RunTask"),
            Job::Destroy => f.write_str("Destroy"),
        }
    }
}
