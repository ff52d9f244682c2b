//! # Renderflow
//!
//! Dependency-resolved, wave-scheduled pipeline execution.
//!
//! Renderflow turns a flat, declarative list of processing steps (generate /
//! transform / save, wired together by named variables) into an execution
//! plan that respects data dependencies, runs independent steps concurrently
//! under a configurable ceiling, and keeps results deterministic regardless
//! of completion timing:
//!
//! - **Graph building**: each step declares the variables it consumes and
//!   produces; secondary references in parameters become edges too
//! - **Wave scheduling**: level-ordered planning that fails fast on missing
//!   inputs and cycles, before anything executes
//! - **Bounded execution**: positionally ordered results under a per-run
//!   concurrency ceiling
//! - **Shared variable store**: single-assignment run state, seeded with
//!   externally supplied inputs, merged at wave boundaries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use renderflow::prelude::*;
//!
//! let steps = vec![
//!     Step::generate("sdxl.txt2img", "draft"),
//!     Step::transform("esrgan.upscale", "draft", "final"),
//!     Step::save("s3.put", "final"),
//! ];
//!
//! let store = VariableStore::new();
//! let runner = PipelineRunner::new(dispatcher)
//!     .with_concurrency(ConcurrencyLimit::bounded(4)?);
//! let report = runner.run(&steps, &store).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod graph;
pub mod runner;
pub mod step;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::dispatch::{
        DispatchError, Dispatcher, FnDispatcher, ResolvedInputs, StepCall,
    };
    pub use crate::errors::{
        ConfigError, PlanningError, RenderflowError, StepExecutionError, StoreConflictError,
    };
    pub use crate::executor::{execute_with_concurrency, ConcurrencyLimit};
    pub use crate::graph::{
        build_dependency_graph, compute_execution_waves, ExecutionPlan, StepNode, Wave,
    };
    pub use crate::runner::{PipelineRunner, RunConfig, RunReport};
    pub use crate::step::{Step, StepAction, StepKind};
    pub use crate::store::VariableStore;
}
