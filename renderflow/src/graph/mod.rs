//! Dependency graph construction and wave scheduling.
//!
//! This module provides:
//! - Per-step dependency nodes built from a declarative step list
//! - Level-ordered wave computation with fail-fast planning errors
//! - The combined [`ExecutionPlan`] the runner drives

mod waves;

pub use waves::{compute_execution_waves, ExecutionPlan, Wave};

use crate::step::Step;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One dependency-graph node per step.
///
/// Nodes are created once by [`build_dependency_graph`] and never mutated
/// afterwards; `index` points back at the originating step in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
    /// Position of the originating step in the pipeline.
    pub index: usize,
    /// Display label of the originating step, used in diagnostics.
    pub label: String,
    /// Variable names that must exist before the step may run.
    pub dependencies: HashSet<String>,
    /// Variable names the step will produce, in declaration order.
    pub outputs: Vec<String>,
}

/// Converts a step list into dependency-graph nodes, one per step,
/// order-preserving.
///
/// Generate steps depend on nothing. Transform and save steps depend on
/// their primary `in` variable plus any secondary reference detected in the
/// parameter payload (see [`referenced_variables`]); a step's own outputs
/// are never counted as its dependencies.
#[must_use]
pub fn build_dependency_graph(steps: &[Step]) -> Vec<StepNode> {
    let produced: HashSet<&str> = steps
        .iter()
        .flat_map(Step::declared_outputs)
        .collect();

    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let mut dependencies = HashSet::new();
            if let Some(primary) = step.primary_input() {
                dependencies.insert(primary.to_string());

                let own: HashSet<&str> = step.declared_outputs().into_iter().collect();
                for name in referenced_variables(&step.params, &produced) {
                    if !own.contains(name.as_str()) {
                        dependencies.insert(name);
                    }
                }
            }

            StepNode {
                index,
                label: step.label(index),
                dependencies,
                outputs: step
                    .declared_outputs()
                    .into_iter()
                    .map(ToString::to_string)
                    .collect(),
            }
        })
        .collect()
}

/// Collects every string leaf in a parameter payload that names a known
/// variable.
///
/// This is the multi-input detection rule: exact string equality against
/// `known`, applied recursively through nested objects and arrays. Only
/// string leaves participate, so a numeric parameter can never alias a
/// variable name.
#[must_use]
pub fn referenced_variables(params: &Map<String, Value>, known: &HashSet<&str>) -> HashSet<String> {
    let mut found = HashSet::new();
    for value in params.values() {
        collect_refs(value, known, &mut found);
    }
    found
}

fn collect_refs(value: &Value, known: &HashSet<&str>, found: &mut HashSet<String>) {
    match value {
        Value::String(name) => {
            if known.contains(name.as_str()) {
                found.insert(name.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, known, found);
            }
        }
        Value::Object(fields) => {
            for field in fields.values() {
                collect_refs(field, known, found);
            }
        }
        _ => {}
    }
}
