//! Capability trait — the abstraction over the bot's plugins.
//!
//! A capability is a named action backed by an external service (image
//! generation, document search, SQL lookup, web search, ...). Each one
//! declares a typed parameter list; the registry validates and coerces
//! planner-supplied arguments against it before the handler runs, so handlers
//! only ever see arguments that match their schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CapabilityError;
use crate::provider::ToolDefinition;

/// The type of a capability parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }
}

/// One declared parameter of a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Build the JSON Schema object sent to the model for a parameter list.
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let mut properties = serde_json::Map::new();
    for p in params {
        let mut prop = serde_json::json!({
            "type": p.kind.json_type(),
            "description": p.description,
        });
        if let Some(default) = &p.default {
            prop["default"] = default.clone();
        }
        properties.insert(p.name.clone(), prop);
    }
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Arguments that passed schema validation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<(String, Value)>,
}

impl BoundArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// A string argument the capability cannot work without.
    pub fn require_str(&self, name: &str) -> Result<&str, CapabilityError> {
        self.str(name)
            .ok_or_else(|| CapabilityError::InvalidArguments(format!("Missing '{name}' argument")))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validate and coerce raw arguments against a parameter list.
///
/// `null` counts as "not supplied". Unknown argument names are rejected.
pub fn bind(params: &[ParamSpec], arguments: &Value) -> Result<BoundArguments, CapabilityError> {
    let empty = serde_json::Map::new();
    let supplied = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(CapabilityError::InvalidArguments(format!(
                "Arguments must be an object, got {other}"
            )));
        }
    };

    if let Some(unknown) = supplied.keys().find(|k| !params.iter().any(|p| &p.name == *k)) {
        return Err(CapabilityError::InvalidArguments(format!(
            "Unknown argument '{unknown}'"
        )));
    }

    let mut values = Vec::with_capacity(params.len());
    for spec in params {
        match supplied.get(&spec.name).filter(|v| !v.is_null()) {
            Some(raw) => values.push((spec.name.clone(), coerce(spec, raw)?)),
            None if spec.required => {
                return Err(CapabilityError::InvalidArguments(format!(
                    "Missing required argument '{}'",
                    spec.name
                )));
            }
            None => {
                if let Some(default) = &spec.default {
                    values.push((spec.name.clone(), default.clone()));
                }
            }
        }
    }

    Ok(BoundArguments { values })
}

fn coerce(spec: &ParamSpec, raw: &Value) -> Result<Value, CapabilityError> {
    let coerced = match (spec.kind, raw) {
        (ParamType::String, Value::String(_)) => Some(raw.clone()),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(Value::from),
        (ParamType::Integer, Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map(Value::from)
        }

        (ParamType::Number, Value::Number(_)) => Some(raw.clone()),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),

        (ParamType::Boolean, Value::Bool(_)) => Some(raw.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        _ => None,
    };

    coerced.ok_or_else(|| {
        CapabilityError::InvalidArguments(format!(
            "Argument '{}' expects {}, got {}",
            spec.name,
            spec.kind.json_type(),
            raw
        ))
    })
}

/// A whole float that fits in an `i64`.
fn integral(f: f64) -> Option<i64> {
    // i64::MAX rounds up to 2^63 as a float, so the upper bound is exclusive.
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

/// A request to invoke a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Call ID (matches the model's tool_call.id when there is one)
    pub id: String,

    /// Name of the capability
    pub name: String,

    /// Raw, unvalidated arguments
    pub arguments: Value,
}

/// The outcome of one capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    /// Short natural-language account of what was done
    pub summary: String,

    /// Optional structured payload (e.g. generated image URLs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ExecutionResult {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// A degraded result standing in for a failed step.
    pub fn degraded(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            data: None,
        }
    }
}

/// The core Capability trait.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability (e.g., "generate_images").
    fn name(&self) -> &str;

    /// What the capability does (sent to the model).
    fn description(&self) -> &str;

    /// Declared parameters, in order.
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Run the capability with validated arguments.
    async fn invoke(&self, arguments: BoundArguments) -> Result<ExecutionResult, CapabilityError>;

    /// Convert this capability into a ToolDefinition for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: parameters_schema(&self.parameters()),
        }
    }
}

/// The set of capabilities available for one turn.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Names must be unique.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Result<(), CapabilityError> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(CapabilityError::DuplicateName(name));
        }
        self.capabilities.insert(name, capability);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Definitions for the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.capabilities.values().map(|c| c.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.capabilities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Validate the call's arguments and run the capability.
    ///
    /// The handler future is dropped as soon as `cancel` fires.
    pub async fn invoke(
        &self,
        call: &CapabilityCall,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, CapabilityError> {
        let capability = self
            .capabilities
            .get(&call.name)
            .ok_or_else(|| CapabilityError::NotFound(call.name.clone()))?;

        let arguments = bind(&capability.parameters(), &call.arguments)?;
        debug!(capability = %call.name, args = arguments.len(), "Invoking capability");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CapabilityError::Cancelled(call.name.clone())),
            result = capability.invoke(arguments) => result,
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple capability for unit tests.
    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::required("text", ParamType::String, "Text to echo"),
                ParamSpec::optional("times", ParamType::Integer, "Repetitions").with_default(json!(1)),
            ]
        }
        async fn invoke(&self, args: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
            let text = args.require_str("text")?;
            let times = args.i64("times").unwrap_or(1).max(1) as usize;
            Ok(ExecutionResult::ok(text.repeat(times)))
        }
    }

    struct StuckCapability;

    #[async_trait]
    impl Capability for StuckCapability {
        fn name(&self) -> &str {
            "stuck"
        }
        fn description(&self) -> &str {
            "Never finishes"
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            vec![]
        }
        async fn invoke(&self, _args: BoundArguments) -> Result<ExecutionResult, CapabilityError> {
            std::future::pending().await
        }
    }

    fn call(name: &str, arguments: Value) -> CapabilityCall {
        CapabilityCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();
        let err = registry.register(Arc::new(EchoCapability)).unwrap_err();
        assert!(matches!(err, CapabilityError::DuplicateName(n) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_carry_schema() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StuckCapability)).unwrap();
        registry.register(Arc::new(EchoCapability)).unwrap();

        let defs = registry.definitions();
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "stuck");
        assert_eq!(defs[0].parameters["properties"]["times"]["type"], "integer");
        assert_eq!(defs[0].parameters["required"], json!(["text"]));
    }

    #[test]
    fn bind_applies_defaults_and_coerces() {
        let params = EchoCapability.parameters();
        let bound = bind(&params, &json!({"text": "hi", "times": "3"})).unwrap();
        assert_eq!(bound.str("text"), Some("hi"));
        assert_eq!(bound.i64("times"), Some(3));

        let bound = bind(&params, &json!({"text": 42})).unwrap();
        assert_eq!(bound.str("text"), Some("42"));
        assert_eq!(bound.i64("times"), Some(1));

        let bound = bind(&params, &json!({"text": "x", "times": 2.0})).unwrap();
        assert_eq!(bound.i64("times"), Some(2));
    }

    #[test]
    fn bind_fails_fast_on_mismatch() {
        let params = EchoCapability.parameters();
        assert!(matches!(
            bind(&params, &json!({})),
            Err(CapabilityError::InvalidArguments(m)) if m.contains("text")
        ));
        assert!(bind(&params, &json!({"text": "x", "times": "many"})).is_err());
        assert!(bind(&params, &json!({"text": "x", "times": 1.5})).is_err());
        assert!(bind(&params, &json!({"text": "x", "colour": "red"})).is_err());
        assert!(bind(&params, &json!(["x"])).is_err());
    }

    #[test]
    fn bind_rejects_integers_out_of_range() {
        let params = EchoCapability.parameters();
        for times in [json!(1e30), json!("1e30"), json!(u64::MAX), json!(-1e19)] {
            assert!(
                matches!(
                    bind(&params, &json!({"text": "x", "times": times})),
                    Err(CapabilityError::InvalidArguments(_))
                ),
                "{times} should be rejected"
            );
        }

        let bound = bind(&params, &json!({"text": "x", "times": 1e15})).unwrap();
        assert_eq!(bound.i64("times"), Some(1_000_000_000_000_000));
    }

    #[test]
    fn bind_booleans_and_numbers() {
        let params = vec![
            ParamSpec::required("flag", ParamType::Boolean, ""),
            ParamSpec::required("ratio", ParamType::Number, ""),
        ];
        let bound = bind(&params, &json!({"flag": "TRUE", "ratio": "0.5"})).unwrap();
        assert_eq!(bound.bool("flag"), Some(true));
        assert_eq!(bound.f64("ratio"), Some(0.5));
        assert!(bind(&params, &json!({"flag": "yes", "ratio": 1})).is_err());
    }

    #[tokio::test]
    async fn registry_invokes_capability() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();

        let result = registry
            .invoke(&call("echo", json!({"text": "ab", "times": 2})), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.summary, "abab");
    }

    #[tokio::test]
    async fn registry_invoke_missing_capability() {
        let registry = CapabilityRegistry::new();
        let err = registry
            .invoke(&call("nonexistent", json!({})), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StuckCapability)).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move { trigger.cancel() });

        let err = registry.invoke(&call("stuck", Value::Null), &cancel).await.unwrap_err();
        assert!(matches!(err, CapabilityError::Cancelled(n) if n == "stuck"));
    }
}
