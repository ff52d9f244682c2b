//! Step model: the declarative units of pipeline work.
//!
//! A pipeline is an ordered list of steps. Each step names the variables it
//! consumes and produces; those names, not list order, determine when a step
//! may run. List order only breaks ties so iteration stays deterministic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Produces a new value from nothing but parameters.
    Generate,
    /// Consumes one primary value and produces a derived one.
    Transform,
    /// Persists a value; may or may not re-expose it under a new name.
    Save,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Transform => write!(f, "transform"),
            Self::Save => write!(f, "save"),
        }
    }
}

/// The shape-specific part of a step: what it consumes and what it produces.
///
/// Serialized with a `kind` tag and the primary consumed slot as `in`, so a
/// step list reads naturally as JSON:
///
/// ```json
/// { "kind": "transform", "op": "esrgan.upscale", "in": "draft", "out": "hires" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepAction {
    /// No consumed variable; declares exactly one produced variable.
    Generate {
        /// Name the produced value is published under.
        out: String,
    },
    /// One primary consumed variable and one produced variable. Parameters
    /// may reference further upstream variables by name.
    Transform {
        /// Name of the primary consumed variable.
        #[serde(rename = "in")]
        input: String,
        /// Name the produced value is published under.
        out: String,
    },
    /// One primary consumed variable; producing a value is optional. A save
    /// without `out` is a terminal sink.
    Save {
        /// Name of the primary consumed variable.
        #[serde(rename = "in")]
        input: String,
        /// Optional name the persisted value is re-exposed under.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        out: Option<String>,
    },
}

/// One declared unit of pipeline work.
///
/// Steps are immutable once planning begins. The optional `id` is the
/// caller's handle for mapping failures back to whatever authored the step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// User-facing identifier for failure attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Operation identifier understood by the dispatch capability.
    pub op: String,
    /// Opaque parameter payload, passed through to the dispatcher verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// What the step consumes and produces.
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    /// Creates a generate step producing `out`.
    #[must_use]
    pub fn generate(op: impl Into<String>, out: impl Into<String>) -> Self {
        Self {
            id: None,
            op: op.into(),
            params: Map::new(),
            action: StepAction::Generate { out: out.into() },
        }
    }

    /// Creates a transform step consuming `input` and producing `out`.
    #[must_use]
    pub fn transform(
        op: impl Into<String>,
        input: impl Into<String>,
        out: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            op: op.into(),
            params: Map::new(),
            action: StepAction::Transform {
                input: input.into(),
                out: out.into(),
            },
        }
    }

    /// Creates a terminal save step consuming `input`.
    #[must_use]
    pub fn save(op: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: None,
            op: op.into(),
            params: Map::new(),
            action: StepAction::Save {
                input: input.into(),
                out: None,
            },
        }
    }

    /// Creates a save step that re-exposes the persisted value as `out`.
    #[must_use]
    pub fn save_as(
        op: impl Into<String>,
        input: impl Into<String>,
        out: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            op: op.into(),
            params: Map::new(),
            action: StepAction::Save {
                input: input.into(),
                out: Some(out.into()),
            },
        }
    }

    /// Sets the user-facing step id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a single parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Replaces the parameter payload.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Returns the kind of work this step performs.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self.action {
            StepAction::Generate { .. } => StepKind::Generate,
            StepAction::Transform { .. } => StepKind::Transform,
            StepAction::Save { .. } => StepKind::Save,
        }
    }

    /// Name of the primary consumed variable, if the step has one.
    #[must_use]
    pub fn primary_input(&self) -> Option<&str> {
        match &self.action {
            StepAction::Generate { .. } => None,
            StepAction::Transform { input, .. } | StepAction::Save { input, .. } => Some(input),
        }
    }

    /// Names the step will produce, in declaration order. Empty for a
    /// terminal save.
    #[must_use]
    pub fn declared_outputs(&self) -> Vec<&str> {
        match &self.action {
            StepAction::Generate { out } | StepAction::Transform { out, .. } => {
                vec![out.as_str()]
            }
            StepAction::Save { out, .. } => out.as_deref().into_iter().collect(),
        }
    }

    /// Display label used in diagnostics: the step id when one was given,
    /// otherwise the op qualified by pipeline position.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}#{index}", self.op))
    }
}
