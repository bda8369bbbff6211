//! Plan execution.
//!
//! Steps run strictly in plan order. A failed step does not stop the plan:
//! it is replaced by a degraded result, the user is told, and the next step
//! runs. Only cancellation aborts.

use planbot_core::capability::{CapabilityCall, CapabilityRegistry, ExecutionResult};
use planbot_core::channel::Replier;
use planbot_core::error::{CapabilityError, Error, PlanError};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::planner::Plan;

/// What running a plan produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Final reply text. May be empty when every step already showed its
    /// result to the user.
    pub answer: String,
    pub results: Vec<ExecutionResult>,
}

/// Run `plan` against the turn's registry.
pub async fn execute(
    plan: Plan,
    registry: &CapabilityRegistry,
    replier: &Replier,
    cancel: &CancellationToken,
) -> Result<ExecutionReport, Error> {
    let (steps, answer_template) = match plan {
        Plan::Answer(answer) => {
            return Ok(ExecutionReport {
                answer,
                results: Vec::new(),
            });
        }
        Plan::Steps {
            steps,
            answer_template,
        } => (steps, answer_template),
    };

    info!(steps = steps.len(), "Executing plan");
    let mut results: Vec<ExecutionResult> = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        let n = i + 1;
        let call = CapabilityCall {
            id: format!("step-{n}"),
            name: step.capability.clone(),
            arguments: substitute_value(&step.arguments, &summaries(&results)),
        };

        debug!(step = n, capability = %step.capability, "Running step");
        match registry.invoke(&call, cancel).await {
            Ok(result) => results.push(result),
            Err(CapabilityError::Cancelled(_)) => {
                warn!(step = n, "Plan cancelled");
                return Err(PlanError::Cancelled.into());
            }
            Err(e) => {
                let note = format!("Step {n} ({}) failed: {e}", step.capability);
                warn!(step = n, capability = %step.capability, error = %e, "Step degraded");
                replier.notify_text(note.clone()).await;
                results.push(ExecutionResult::degraded(note));
            }
        }
    }

    let answer = match answer_template {
        Some(template) => substitute(&template, &summaries(&results)),
        None => steps
            .iter()
            .zip(&results)
            .filter(|(step, result)| step.expects_result || !result.success)
            .map(|(_, result)| result.summary.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    };

    info!(
        steps = results.len(),
        failed = results.iter().filter(|r| !r.success).count(),
        "Plan executed"
    );
    Ok(ExecutionReport { answer, results })
}

fn summaries(results: &[ExecutionResult]) -> Vec<&str> {
    results.iter().map(|r| r.summary.as_str()).collect()
}

/// Replace `{{step.N}}` (1-based) and `{{last}}` with earlier summaries.
///
/// Placeholders that refer to a step not yet run are left as they are.
pub fn substitute(text: &str, summaries: &[&str]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after[..end].trim();
        match resolve(key, summaries) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn resolve<'a>(key: &str, summaries: &[&'a str]) -> Option<&'a str> {
    if key == "last" {
        return summaries.last().copied();
    }
    let n: usize = key.strip_prefix("step.")?.parse().ok()?;
    n.checked_sub(1).and_then(|i| summaries.get(i)).copied()
}

fn substitute_value(value: &Value, summaries: &[&str]) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, summaries)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, summaries)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, summaries)))
                .collect(),
        ),
        other => other.clone(),
    }
}
