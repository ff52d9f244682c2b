//! Error types for the renderflow engine.
//!
//! Three families: structural planning errors raised before anything runs,
//! execution errors wrapped with the identity of the step that failed, and
//! usage errors for invalid configuration.

use crate::dispatch::DispatchError;
use crate::step::Step;
use thiserror::Error;

/// The top-level error type for pipeline planning and execution.
#[derive(Debug, Error)]
pub enum RenderflowError {
    /// Planning found steps that can never become eligible.
    #[error("{0}")]
    Planning(#[from] PlanningError),

    /// A step invocation failed during execution.
    #[error("{0}")]
    StepExecution(#[from] StepExecutionError),

    /// Invalid run configuration, rejected before planning.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A variable name was written more than once.
    #[error("{0}")]
    StoreConflict(#[from] StoreConflictError),

    /// The run was cancelled before completion.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),

    /// An engine invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Raised when the scheduler cannot make progress.
///
/// Either some required variable is never produced and never pre-satisfied,
/// or the stuck steps form a dependency cycle. Forward scheduling cannot
/// tell the two apart, so both collapse into this one error; the fields
/// carry enough identity for a reporting layer to point at the culprits.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlanningError {
    /// Human-readable summary naming the stuck steps and variables.
    pub message: String,
    /// Labels of the steps that can never become eligible, in pipeline order.
    pub stuck_steps: Vec<String>,
    /// Variable names the stuck steps are waiting on, sorted.
    pub unsatisfied: Vec<String>,
    /// Subset of `unsatisfied` that no step in the pipeline produces, sorted.
    pub never_produced: Vec<String>,
}

impl PlanningError {
    /// Builds the no-progress error from the scheduler's final scan.
    #[must_use]
    pub fn no_progress(
        stuck_steps: Vec<String>,
        mut unsatisfied: Vec<String>,
        mut never_produced: Vec<String>,
    ) -> Self {
        unsatisfied.sort();
        never_produced.sort();

        let mut message = format!(
            "pipeline cannot make progress: {} step(s) stuck [{}]; unsatisfied variables: [{}]",
            stuck_steps.len(),
            stuck_steps.join(", "),
            unsatisfied.join(", "),
        );
        if never_produced.is_empty() {
            message.push_str("; the stuck steps form a dependency cycle");
        } else {
            message.push_str(&format!(
                "; never produced or pre-satisfied: [{}]",
                never_produced.join(", "),
            ));
        }

        Self {
            message,
            stuck_steps,
            unsatisfied,
            never_produced,
        }
    }
}

/// A dispatch failure wrapped with the identity of the step that raised it.
#[derive(Debug, Error)]
#[error("step '{step}' (op '{op}') failed: {source}")]
pub struct StepExecutionError {
    /// Display label of the failed step.
    pub step: String,
    /// The user-assigned step id, when one was given.
    pub step_id: Option<String>,
    /// Operation identifier of the failed step.
    pub op: String,
    /// The output the step declared, when any.
    pub output: Option<String>,
    /// The underlying dispatch failure.
    #[source]
    pub source: DispatchError,
}

impl StepExecutionError {
    /// Wraps a dispatch failure with the failing step's identity.
    #[must_use]
    pub fn wrap(step: &Step, index: usize, source: DispatchError) -> Self {
        Self {
            step: step.label(index),
            step_id: step.id.clone(),
            op: step.op.clone(),
            output: step.declared_outputs().first().map(ToString::to_string),
            source,
        }
    }
}

/// Invalid run configuration.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigError {
    /// What was wrong with the configuration.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Raised when a variable name is written a second time during a run.
#[derive(Debug, Clone, Error)]
#[error("variable '{name}' already written; run variables are single-assignment")]
pub struct StoreConflictError {
    /// The conflicting variable name.
    pub name: String,
}

impl StoreConflictError {
    /// Creates a new conflict error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
