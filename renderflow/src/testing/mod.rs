//! Test doubles and fixtures for exercising pipelines without real
//! providers.

use crate::dispatch::{DispatchError, Dispatcher, StepCall};
use crate::step::{Step, StepKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// A dispatcher that records every call and returns scripted outcomes.
///
/// Unscripted ops fall back to an echo behavior: generate produces
/// `"generated:<op>"`, transform passes its primary input through, and save
/// produces nothing (so a save that declares an `out` must be scripted).
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    responses: Mutex<HashMap<String, Result<Vec<Value>, String>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<StepCall>>,
}

impl ScriptedDispatcher {
    /// Creates a dispatcher with no scripted outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the values an op produces.
    #[must_use]
    pub fn with_response(self, op: impl Into<String>, values: Vec<Value>) -> Self {
        self.responses.lock().insert(op.into(), Ok(values));
        self
    }

    /// Scripts an op to fail.
    #[must_use]
    pub fn with_failure(self, op: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses.lock().insert(op.into(), Err(message.into()));
        self
    }

    /// Adds an artificial delay before an op responds.
    #[must_use]
    pub fn with_delay(self, op: impl Into<String>, delay: Duration) -> Self {
        self.delays.lock().insert(op.into(), delay);
        self
    }

    /// Every call received so far, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<StepCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Ops invoked so far, in invocation order.
    #[must_use]
    pub fn ops_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.op.clone()).collect()
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(&self, call: StepCall) -> Result<Vec<Value>, DispatchError> {
        self.calls.lock().push(call.clone());

        let delay = self.delays.lock().get(&call.op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().get(&call.op).cloned();
        match scripted {
            Some(Ok(values)) => Ok(values),
            Some(Err(message)) => Err(DispatchError::new(message)),
            None => Ok(match call.kind {
                StepKind::Generate => vec![json!(format!("generated:{}", call.op))],
                StepKind::Transform => {
                    vec![call.inputs.primary_value().cloned().unwrap_or(Value::Null)]
                }
                StepKind::Save => Vec::new(),
            }),
        }
    }
}

/// A four-step linear chain: generate, two transforms, terminal save.
#[must_use]
pub fn linear_chain() -> Vec<Step> {
    vec![
        Step::generate("sdxl.txt2img", "draft"),
        Step::transform("esrgan.upscale", "draft", "big"),
        Step::transform("tint.apply", "big", "final"),
        Step::save("s3.put", "final"),
    ]
}

/// One generate fanned out into two independent transforms.
#[must_use]
pub fn fan_out() -> Vec<Step> {
    vec![
        Step::generate("sdxl.txt2img", "draft"),
        Step::transform("esrgan.upscale", "draft", "big"),
        Step::transform("tint.apply", "draft", "tinted"),
    ]
}

/// `count` generate steps with no dependencies between them.
#[must_use]
pub fn independent_generates(count: usize) -> Vec<Step> {
    (0..count)
        .map(|i| Step::generate("sdxl.txt2img", format!("img_{i}")))
        .collect()
}
