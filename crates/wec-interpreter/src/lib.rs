//! C6: the Interpreter.
//!
//! Walks a workflow document's step array under a single instruction
//! pointer, dispatching to the other five components, recording every
//! transition in the Event Log, and applying the on-failure policy on
//! step failure (§4.6).

mod error;
mod outcome;
mod output_validation;
mod timeout;

pub use error::InterpreterError;
pub use outcome::WorkflowOutcome;

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use wec_context::ContextStore;
use wec_core::{ControlMarker, FailureStrategy, StepResult, WorkflowDocument};
use wec_extensions::Registry;
use wec_log::{EventLog, EventType};

/// Runs a loaded, validated [`WorkflowDocument`] to completion or abort.
pub struct Interpreter<'a> {
    doc: &'a WorkflowDocument,
    registry: &'a Registry,
    log: EventLog,
    ctx: ContextStore,
    counters: HashMap<String, u32>,
}

impl<'a> Interpreter<'a> {
    /// Construct a fresh interpreter against an already-open Event Log.
    ///
    /// If the log is empty, writes `STATE_ZERO`. If it already holds
    /// events (a resume), loop counters are restored from the last
    /// `LOOP_ITERATION` per `loop_id` seen for any step id that is a
    /// `loop_begin` in this document (§9: counter state survives resume
    /// even though the in-memory map does not).
    pub fn new(doc: &'a WorkflowDocument, registry: &'a Registry, mut log: EventLog) -> Result<Self, InterpreterError> {
        let ctx = ContextStore::new(&doc.user_inputs, &doc.provider);

        if !log.has_state_zero() {
            log.append(
                EventType::StateZero,
                None,
                Map::from_iter([(
                    "user_inputs".to_string(),
                    serde_json::to_value(&doc.user_inputs).unwrap_or(Value::Null),
                )]),
            )?;
        }

        let mut counters = HashMap::new();
        for step in &doc.steps {
            if step.loop_begin.is_some() {
                let restored = log.loop_counter(&step.id);
                if restored > 0 {
                    counters.insert(step.id.clone(), restored);
                }
            }
        }

        Ok(Self {
            doc,
            registry,
            log,
            ctx,
            counters,
        })
    }

    /// Resolve the instruction pointer to resume after the last
    /// successfully completed step, or `0` for a fresh run.
    fn resume_index(&self) -> usize {
        match self.log.last_successful_step() {
            Some(step_id) => self
                .doc
                .steps
                .iter()
                .position(|s| s.id == step_id)
                .map(|idx| idx + 1)
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Run the step array to completion or abort (§4.6's main loop).
    pub fn run(&mut self) -> Result<WorkflowOutcome, InterpreterError> {
        let mut ip = self.resume_index();
        let steps_len = self.doc.steps.len();

        while ip < steps_len {
            let step = &self.doc.steps[ip];
            match step.control_marker() {
                Some(ControlMarker::LoopBegin(_)) => {
                    ip = self.handle_loop_begin(ip)?;
                }
                Some(ControlMarker::LoopEnd(_)) => {
                    ip = self.handle_loop_end(ip)?;
                }
                Some(ControlMarker::Switch(_)) => {
                    ip = self.handle_switch(ip)?;
                }
                None => match self.execute(ip)? {
                    Some(outcome) => return self.finish(Some(outcome)),
                    None => ip += 1,
                },
            }
        }

        self.finish(None)
    }

    fn finish(&mut self, aborted: Option<WorkflowOutcome>) -> Result<WorkflowOutcome, InterpreterError> {
        match aborted {
            Some(WorkflowOutcome::Aborted { failed_step, payload }) => {
                self.log.append(EventType::WorkflowAborted, Some(&failed_step), payload.clone())?;
                Ok(WorkflowOutcome::Aborted { failed_step, payload })
            }
            _ => {
                self.log.append(EventType::WorkflowComplete, None, Map::new())?;
                Ok(WorkflowOutcome::Complete)
            }
        }
    }

    /// Regular step execution (§4.6 `execute`). Returns `Some(outcome)`
    /// when the workflow must terminate (abort); `None` to continue.
    fn execute(&mut self, ip: usize) -> Result<Option<WorkflowOutcome>, InterpreterError> {
        let step = self.doc.steps[ip].clone();

        if let Some(condition) = &step.condition {
            if !wec_eval::evaluate_condition(&self.ctx, condition) {
                self.log.append(EventType::StepSkipped, Some(&step.id), Map::new())?;
                self.ctx.record_skip(&step.id);
                return Ok(None);
            }
        }

        self.log.append(EventType::StepStart, Some(&step.id), Map::new())?;

        let Some(extension_name) = step.extension.as_deref().filter(|s| !s.is_empty()) else {
            // A no-op / placeholder step.
            self.log.append(EventType::StepSuccess, Some(&step.id), Map::new())?;
            self.ctx.record_success(&step.id, &StepResult::default());
            return Ok(None);
        };

        let (result, errors) = self.attempt_step(&step, extension_name);

        if result.is_error || !errors.is_empty() {
            let mut failed = result;
            failed.is_error = true;
            return self.handle_failure(&step, failed, errors);
        }

        self.log.append(
            EventType::StepSuccess,
            Some(&step.id),
            result.to_context_entry_payload(),
        )?;
        self.ctx.record_success(&step.id, &result);
        Ok(None)
    }

    /// The entitlement gate followed by interpolate→invoke→validate
    /// (§4.6 steps 4-8). Shared by the first attempt and every retry
    /// attempt so a denied step is re-denied, never executed, each time
    /// (§4.6 `retry`: "Re-invoke `execute(step)`").
    fn attempt_step(&self, step: &wec_core::Step, extension_name: &str) -> (StepResult, Vec<String>) {
        for path in wec_entitlements::extract_paths_from_inputs(&step.inputs) {
            let (allowed, reason) = wec_entitlements::verify_entitlements(
                &self.doc.provider.entitlements,
                extension_name,
                step.tool_name(),
                Some(&path),
            );
            if !allowed {
                debug!(step = %step.id, path = %path, reason = %reason, "entitlement denied");
                let result = StepResult {
                    stderr: format!("Entitlement denied: {reason}"),
                    exit_code: 1,
                    is_error: true,
                    ..Default::default()
                };
                return (result, Vec::new());
            }
        }

        let inputs: Map<String, Value> = step.inputs.clone().into_iter().collect();
        let result = self.invoke(extension_name, step.tool_name(), &inputs, step.timeout.as_deref());

        let errors = output_validation::validate_outputs(&result, &step.outputs);
        if !result.is_error && !errors.is_empty() {
            warn!(step = %step.id, ?errors, "output validation failed");
        }
        (result, errors)
    }

    /// Invoke the Tool Dispatcher, optionally bounding the wait with
    /// `step.timeout` (§5). The invocation itself runs on a background
    /// thread so a hung extension cannot block the interpreter past the
    /// deadline; on timeout the thread is abandoned rather than joined.
    fn invoke(
        &self,
        extension_name: &str,
        tool_name: &str,
        raw_inputs: &Map<String, Value>,
        raw_timeout: Option<&str>,
    ) -> StepResult {
        let deadline = raw_timeout.and_then(timeout::parse_timeout);

        match deadline {
            None => match wec_extensions::dispatch(self.registry, &self.ctx, extension_name, tool_name, raw_inputs) {
                Ok(result) => result,
                Err(err) => StepResult {
                    stderr: format!("Registry error: {err}"),
                    exit_code: 1,
                    is_error: true,
                    ..Default::default()
                },
            },
            Some(duration) => {
                let Some(extension) = self.registry.get(extension_name) else {
                    return StepResult {
                        stderr: format!("Registry error: extension '{extension_name}' is not registered"),
                        exit_code: 1,
                        is_error: true,
                        ..Default::default()
                    };
                };
                let interpolated = wec_extensions::interpolate_inputs(&self.ctx, raw_inputs);
                self.invoke_with_deadline(extension, tool_name, &interpolated, duration)
            }
        }
    }

    fn invoke_with_deadline(
        &self,
        extension: Arc<dyn wec_extensions::Extension>,
        tool_name: &str,
        inputs: &Map<String, Value>,
        duration: Duration,
    ) -> StepResult {
        let (tx, rx) = mpsc::channel();
        let tool_name = tool_name.to_string();
        let inputs = inputs.clone();

        std::thread::spawn(move || {
            let result = run_extension(extension.as_ref(), &tool_name, &inputs);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(duration) {
            Ok(result) => result,
            Err(_) => StepResult {
                stderr: format!("step timed out after {}s", duration.as_secs()),
                exit_code: 1,
                is_error: true,
                ..Default::default()
            },
        }
    }

    /// `handle_loop_begin(step, ip)` (§4.6).
    fn handle_loop_begin(&mut self, ip: usize) -> Result<usize, InterpreterError> {
        let step = &self.doc.steps[ip];
        let id = step.id.clone();
        let max_iterations = step.loop_begin.as_ref().expect("loop_begin step").max_iterations;

        let counter = self.counters.entry(id.clone()).or_insert(0);
        *counter += 1;
        let counter = *counter;

        self.ctx.record_loop_counter(&id, counter);
        self.log.append(
            EventType::LoopIteration,
            Some(&id),
            Map::from_iter([("counter".to_string(), json!(counter.to_string()))]),
        )?;

        if max_iterations > 0 && counter > max_iterations {
            let loop_end_idx = self
                .doc
                .steps
                .iter()
                .enumerate()
                .skip(ip + 1)
                .find(|(_, s)| s.loop_end.as_ref().is_some_and(|le| le.loop_id == id))
                .map(|(idx, _)| idx + 1)
                .unwrap_or(self.doc.steps.len());
            return Ok(loop_end_idx);
        }

        Ok(ip + 1)
    }

    /// `handle_loop_end(step, ip)` (§4.6).
    fn handle_loop_end(&mut self, ip: usize) -> Result<usize, InterpreterError> {
        let step = &self.doc.steps[ip];
        let loop_end = step.loop_end.as_ref().expect("loop_end step");
        let exit_when = loop_end.exit_when.clone();
        let loop_id = loop_end.loop_id.clone();

        if wec_eval::evaluate_condition(&self.ctx, &exit_when) {
            return Ok(ip + 1);
        }

        let begin_idx = self
            .doc
            .steps
            .iter()
            .position(|s| s.id == loop_id)
            .unwrap_or(ip + 1);
        Ok(begin_idx)
    }

    /// `handle_switch(step, ip)` (§4.6, §9 open question: records but
    /// does not jump).
    fn handle_switch(&mut self, ip: usize) -> Result<usize, InterpreterError> {
        let step = &self.doc.steps[ip];
        let switch = step.switch.as_ref().expect("switch step");
        let value = wec_eval::interpolate(&self.ctx, &switch.value);

        let selected = switch
            .cases
            .iter()
            .find(|case| case.match_value == value)
            .map(|case| case.steps.clone())
            .or_else(|| switch.default.clone())
            .unwrap_or_default();

        self.log.append(
            EventType::StepSuccess,
            Some(&step.id),
            Map::from_iter([
                ("switch_value".to_string(), json!(value)),
                ("selected_steps".to_string(), json!(selected)),
            ]),
        )?;
        self.ctx.record_success(
            &step.id,
            &StepResult {
                result: Map::from_iter([("selected_steps".to_string(), json!(selected))]),
                ..Default::default()
            },
        );

        Ok(ip + 1)
    }

    /// `handle_failure(step, result)` (§4.6): apply `step.on_failure`.
    fn handle_failure(
        &mut self,
        step: &wec_core::Step,
        result: StepResult,
        validation_errors: Vec<String>,
    ) -> Result<Option<WorkflowOutcome>, InterpreterError> {
        let policy = step.on_failure.clone().unwrap_or(wec_core::OnFailure {
            strategy: FailureStrategy::Abort,
            max_retries: 3,
            fallback_step: None,
        });

        let reason = failure_reason(&result, &validation_errors);
        self.log.append(
            EventType::StepFailure,
            Some(&step.id),
            failure_event_payload(&result, &validation_errors),
        )?;

        match policy.strategy {
            FailureStrategy::Skip => {
                self.ctx.record_skip(&step.id);
                Ok(None)
            }
            FailureStrategy::Retry => self.handle_retry(step, policy.max_retries),
            FailureStrategy::Fallback => self.handle_fallback(step, policy.fallback_step.as_deref()),
            FailureStrategy::SelfHeal => Ok(Some(self.self_heal_outcome(step, &result))),
            FailureStrategy::Abort => Ok(Some(WorkflowOutcome::Aborted {
                failed_step: step.id.clone(),
                payload: Map::from_iter([("reason".to_string(), json!(reason))]),
            })),
        }
    }

    /// Re-invoke the step (§4.6 `retry`: "Re-invoke `execute(step)`") up
    /// to `max_retries` times total. `max_retries` counts the *original*
    /// attempt (already failed and logged by the caller), so this loop
    /// covers attempts `2..=max_retries`. Each attempt re-runs through
    /// [`Interpreter::attempt_step`], so a step denied by the
    /// Entitlements Checker is re-denied on every retry and is never
    /// actually executed.
    fn handle_retry(
        &mut self,
        step: &wec_core::Step,
        max_retries: u32,
    ) -> Result<Option<WorkflowOutcome>, InterpreterError> {
        let Some(extension_name) = step.extension.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(Some(WorkflowOutcome::Aborted {
                failed_step: step.id.clone(),
                payload: Map::new(),
            }));
        };

        for attempt in 2..=max_retries.max(1) {
            debug!(step = %step.id, attempt, "retrying failed step");
            self.log.append(EventType::StepStart, Some(&step.id), Map::new())?;

            let (result, errors) = self.attempt_step(step, extension_name);

            if !result.is_error && errors.is_empty() {
                self.log.append(
                    EventType::StepSuccess,
                    Some(&step.id),
                    result.to_context_entry_payload(),
                )?;
                self.ctx.record_success(&step.id, &result);
                return Ok(None);
            }

            self.log.append(
                EventType::StepFailure,
                Some(&step.id),
                failure_event_payload(&result, &errors),
            )?;
        }

        Ok(Some(WorkflowOutcome::Aborted {
            failed_step: step.id.clone(),
            payload: Map::from_iter([("reason".to_string(), json!("retries exhausted"))]),
        }))
    }

    fn handle_fallback(
        &mut self,
        step: &wec_core::Step,
        fallback_step: Option<&str>,
    ) -> Result<Option<WorkflowOutcome>, InterpreterError> {
        let Some(fallback_id) = fallback_step else {
            return Ok(Some(WorkflowOutcome::Aborted {
                failed_step: step.id.clone(),
                payload: Map::new(),
            }));
        };

        let Some(fallback_idx) = self.doc.steps.iter().position(|s| s.id == fallback_id) else {
            return Ok(Some(WorkflowOutcome::Aborted {
                failed_step: step.id.clone(),
                payload: Map::from_iter([("reason".to_string(), json!(format!("unknown fallback_step '{fallback_id}'")))]),
            }));
        };

        self.execute(fallback_idx)
    }

    fn self_heal_outcome(&self, step: &wec_core::Step, result: &StepResult) -> WorkflowOutcome {
        // Mirrors `trigger_feedback_loop`: self_heal is terminal, but the
        // feedback payload is preserved for downstream re-planning tooling.
        let payload = Map::from_iter([
            ("type".to_string(), json!("self_heal_request")),
            (
                "failed_step".to_string(),
                json!({
                    "id": step.id,
                    "description": step.description,
                }),
            ),
            ("error".to_string(), json!({"stderr": result.stderr, "stdout": result.stdout})),
            (
                "context_summary".to_string(),
                json!({
                    "completed_steps": self.completed_step_ids(),
                }),
            ),
            (
                "request".to_string(),
                json!("Please analyze the failure and generate a corrected workflow plan."),
            ),
        ]);
        WorkflowOutcome::Aborted {
            failed_step: step.id.clone(),
            payload,
        }
    }

    fn completed_step_ids(&self) -> Vec<String> {
        self.doc
            .steps
            .iter()
            .filter(|s| self.ctx.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }
}

fn run_extension(extension: &dyn wec_extensions::Extension, tool_name: &str, inputs: &Map<String, Value>) -> StepResult {
    match extension.invoke(tool_name, inputs) {
        Ok(response) => wec_extensions::normalize(response),
        Err(err) => StepResult {
            stderr: err.to_string(),
            exit_code: 1,
            is_error: true,
            ..Default::default()
        },
    }
}

/// The `STEP_FAILURE` event payload shape (§4.1): `{stdout, stderr,
/// exit_code, validation_errors, error}`.
fn failure_event_payload(result: &StepResult, validation_errors: &[String]) -> Map<String, Value> {
    Map::from_iter([
        ("stdout".to_string(), json!(result.stdout)),
        ("stderr".to_string(), json!(result.stderr)),
        ("exit_code".to_string(), json!(result.exit_code)),
        ("validation_errors".to_string(), json!(validation_errors)),
        ("error".to_string(), json!(failure_reason(result, validation_errors))),
    ])
}

/// A single human-readable summary of why a step failed, used as the
/// `error` field above and as `WORKFLOW_ABORTED`'s `reason` (§4.1).
fn failure_reason(result: &StepResult, validation_errors: &[String]) -> String {
    if !result.stderr.is_empty() {
        result.stderr.clone()
    } else if !validation_errors.is_empty() {
        validation_errors.join("; ")
    } else {
        result.stdout.clone()
    }
}
