//! The dispatch boundary: how steps reach external providers.
//!
//! The engine never executes step content itself. Generation, pixel
//! transforms and persistence all arrive through the one [`Dispatcher`]
//! seam, injected by the caller.

use crate::step::StepKind;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use thiserror::Error;

/// Inputs the engine resolved from the variable store for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ResolvedInputs {
    primary: Option<String>,
    values: HashMap<String, Value>,
}

impl ResolvedInputs {
    /// Creates an empty input set (generate steps consume nothing).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an input set from resolved values.
    #[must_use]
    pub fn from_values(primary: Option<String>, values: HashMap<String, Value>) -> Self {
        Self { primary, values }
    }

    /// Name of the primary consumed variable, when the step has one.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Value of the primary consumed variable.
    #[must_use]
    pub fn primary_value(&self) -> Option<&Value> {
        self.primary.as_deref().and_then(|name| self.values.get(name))
    }

    /// Looks up a resolved value by variable name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// All resolved variable names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Number of resolved values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One request to the external dispatch capability.
#[derive(Debug, Clone)]
pub struct StepCall {
    /// What kind of step is being invoked.
    pub kind: StepKind,
    /// Operation identifier understood by the provider.
    pub op: String,
    /// The step's parameter payload, passed through verbatim.
    pub params: Map<String, Value>,
    /// Values resolved from the variable store.
    pub inputs: ResolvedInputs,
}

/// A failure reported by the dispatch capability.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DispatchError {
    /// Provider-facing description of the failure.
    pub message: String,
    /// Underlying provider error, when one exists.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DispatchError {
    /// Creates a dispatch error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a dispatch error chaining a provider error.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// External capability that performs a step's actual work.
///
/// Implementations are opaque to the engine; retries, rate limits and
/// provider protocols all live behind this trait. The returned values pair
/// positionally with the step's declared outputs, and a count mismatch is
/// reported as an execution error attributed to the step.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Performs one step invocation.
    async fn dispatch(&self, call: StepCall) -> Result<Vec<Value>, DispatchError>;
}

/// Adapter for using a plain closure as a dispatcher.
pub struct FnDispatcher<F>
where
    F: Fn(StepCall) -> Result<Vec<Value>, DispatchError> + Send + Sync,
{
    func: F,
}

impl<F> FnDispatcher<F>
where
    F: Fn(StepCall) -> Result<Vec<Value>, DispatchError> + Send + Sync,
{
    /// Wraps a closure as a dispatcher.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnDispatcher<F>
where
    F: Fn(StepCall) -> Result<Vec<Value>, DispatchError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDispatcher").finish()
    }
}

#[async_trait]
impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(StepCall) -> Result<Vec<Value>, DispatchError> + Send + Sync,
{
    async fn dispatch(&self, call: StepCall) -> Result<Vec<Value>, DispatchError> {
        (self.func)(call)
    }
}
