//! Run orchestration: planning, wave execution, and result reporting.
//!
//! Ties the pieces together: build the dependency graph, compute waves,
//! then drive each wave through the bounded executor against a shared
//! variable store, merging outputs at wave boundaries.


use crate::cancellation::CancellationToken;
use crate::dispatch::{DispatchError, Dispatcher, ResolvedInputs, StepCall};
use crate::errors::{RenderflowError, StepExecutionError};
use crate::executor::{execute_with_concurrency, ConcurrencyLimit};
use crate::graph::{referenced_variables, ExecutionPlan, StepNode};
use crate::step::{Step, StepAction};
use crate::store::VariableStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-run configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Ceiling on concurrent step invocations within a wave.
    #[serde(default)]
    pub concurrency: ConcurrencyLimit,
}

impl RunConfig {
    /// Creates a config with the default (unbounded) ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency ceiling.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: ConcurrencyLimit) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id assigned to this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Number of waves the plan produced.
    pub wave_count: usize,
    /// Number of steps that executed.
    pub steps_executed: usize,
    /// Output names declared by save steps, readable from the store.
    pub sink_outputs: Vec<String>,
    /// Total run time in milliseconds.
    pub duration_ms: f64,
}

/// Drives a pipeline end to end.
///
/// Planning failures abort before any dispatch. During execution, wave
/// `k + 1` never starts until wave `k` has fully settled; a failed wave
/// stops the run while completed waves' writes stay in the store.
pub struct PipelineRunner {
    dispatcher: Arc<dyn Dispatcher>,
    config: RunConfig,
    cancellation: Option<Arc<CancellationToken>>,
}

impl PipelineRunner {
    /// Creates a runner around a dispatch capability.
    #[must_use]
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            config: RunConfig::default(),
            cancellation: None,
        }
    }

    /// Replaces the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the concurrency ceiling.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: ConcurrencyLimit) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Attaches a cancellation token checked at wave and task boundaries.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Runs `steps` to completion against `store`.
    ///
    /// The store's existing entries form the pre-satisfied set: seed it
    /// before calling for externally supplied inputs. On success every
    /// declared output is readable from the store; on failure the error
    /// names the step that caused it and the store keeps the writes of the
    /// waves that completed.
    pub async fn run(
        &self,
        steps: &[Step],
        store: &VariableStore,
    ) -> Result<RunReport, RenderflowError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let timer = Instant::now();

        let seeded: HashSet<String> = store.keys().into_iter().collect();
        let plan = ExecutionPlan::compute(steps, &seeded)?;
        info!(
            %run_id,
            steps = steps.len(),
            waves = plan.wave_count(),
            "pipeline planned",
        );

        let mut steps_executed = 0;
        for (wave_index, wave) in plan.waves.iter().enumerate() {
            self.ensure_active()?;
            debug!(%run_id, wave_index, members = wave.len(), "wave started");

            let mut tasks = Vec::with_capacity(wave.len());
            for &node_index in &wave.members {
                let step = &steps[node_index];
                let node = &plan.nodes[node_index];
                let call = StepCall {
                    kind: step.kind(),
                    op: step.op.clone(),
                    params: step.params.clone(),
                    inputs: self.resolve_inputs(step, node, store, &seeded)?,
                };

                let dispatcher = Arc::clone(&self.dispatcher);
                let cancellation = self.cancellation.clone();
                let expected = node.outputs.len();
                let step = step.clone();
                tasks.push(async move {
                    if let Some(token) = &cancellation {
                        if token.is_cancelled() {
                            return Err(RenderflowError::Cancelled(
                                token
                                    .reason()
                                    .unwrap_or_else(|| "cancellation requested".to_string()),
                            ));
                        }
                    }

                    let values = dispatcher
                        .dispatch(call)
                        .await
                        .map_err(|source| StepExecutionError::wrap(&step, node_index, source))?;

                    if values.len() != expected {
                        let mismatch = DispatchError::new(format!(
                            "dispatch produced {} value(s) for {} declared output(s)",
                            values.len(),
                            expected,
                        ));
                        return Err(StepExecutionError::wrap(&step, node_index, mismatch).into());
                    }
                    Ok(values)
                });
            }

            let produced = match execute_with_concurrency(tasks, self.config.concurrency).await {
                Ok(produced) => produced,
                Err(err) => {
                    warn!(%run_id, wave_index, error = %err, "wave failed");
                    return Err(err);
                }
            };

            let mut outputs = Vec::new();
            for (&node_index, values) in wave.members.iter().zip(produced) {
                let node = &plan.nodes[node_index];
                outputs.extend(node.outputs.iter().cloned().zip(values));
            }
            store.insert_batch(outputs)?;

            steps_executed += wave.len();
            debug!(%run_id, wave_index, "wave completed");
        }

        let report = RunReport {
            run_id,
            started_at,
            wave_count: plan.wave_count(),
            steps_executed,
            sink_outputs: sink_outputs(steps),
            duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            %run_id,
            waves = report.wave_count,
            duration_ms = report.duration_ms,
            "pipeline completed",
        );
        Ok(report)
    }

    /// Resolves the values a step reads before dispatch: its graph
    /// dependencies, plus any parameter reference to a pre-satisfied name
    /// (the builder's detection rule extended to caller-supplied inputs).
    fn resolve_inputs(
        &self,
        step: &Step,
        node: &StepNode,
        store: &VariableStore,
        seeded: &HashSet<String>,
    ) -> Result<ResolvedInputs, RenderflowError> {
        let mut names = node.dependencies.clone();
        if step.primary_input().is_some() {
            let seeded_view: HashSet<&str> = seeded.iter().map(String::as_str).collect();
            names.extend(referenced_variables(&step.params, &seeded_view));
        }

        let mut values = HashMap::with_capacity(names.len());
        for name in names {
            let value = store.get(&name).ok_or_else(|| {
                RenderflowError::Internal(format!(
                    "variable '{name}' missing from store for step '{}'",
                    node.label,
                ))
            })?;
            values.insert(name, value);
        }

        Ok(ResolvedInputs::from_values(
            step.primary_input().map(ToString::to_string),
            values,
        ))
    }

    fn ensure_active(&self) -> Result<(), RenderflowError> {
        if let Some(token) = &self.cancellation {
            if token.is_cancelled() {
                return Err(RenderflowError::Cancelled(
                    token
                        .reason()
                        .unwrap_or_else(|| "cancellation requested".to_string()),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("config", &self.config)
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

fn sink_outputs(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .filter_map(|step| match &step.action {
            StepAction::Save { out: Some(out), .. } => Some(out.clone()),
            _ => None,
        })
        .collect()
}
