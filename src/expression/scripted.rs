//! Optional richer evaluator exposing JS-like expression semantics to
//! activity handlers. The engine's own transition predicates never use
//! this; it is sandboxed behind a wall-clock limit and an operation/depth
//! bound so a misbehaving script cannot stall a worker.

use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, Scope};
use serde_json::Map;
use uuid::Uuid;

use super::{ExpressionError, JsonValue};

#[derive(Debug, Clone)]
pub struct ScriptEngineConfig {
    /// Per-evaluation wall-clock limit. Spec default: 5 seconds.
    pub timeout: Duration,
    pub max_expr_depth: usize,
    pub max_operations: u64,
}

impl Default for ScriptEngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_expr_depth: 64,
            max_operations: 500_000,
        }
    }
}

/// Sandboxed, host-embedded scripting evaluator built on `rhai`.
pub struct ScriptEngine {
    config: ScriptEngineConfig,
}

impl ScriptEngine {
    pub fn new(config: ScriptEngineConfig) -> Self {
        Self { config }
    }

    /// Evaluates `script` with `input`/`state`/`output` bound as scope
    /// variables. Fails with [`ExpressionError`] on syntax error or when
    /// either the wall-clock or the operation/depth bound is exceeded.
    pub async fn eval(
        &self,
        input: Map<String, JsonValue>,
        state: Map<String, JsonValue>,
        output: Map<String, JsonValue>,
        script: String,
    ) -> Result<JsonValue, ExpressionError> {
        let config = self.config.clone();
        let timeout = config.timeout;

        let handle = tokio::task::spawn_blocking(move || run(&config, input, state, output, &script));

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_err)) => Err(ExpressionError::LimitExceeded),
            Err(_elapsed) => Err(ExpressionError::LimitExceeded),
        }
    }
}

fn run(
    config: &ScriptEngineConfig,
    input: Map<String, JsonValue>,
    state: Map<String, JsonValue>,
    output: Map<String, JsonValue>,
    script: &str,
) -> Result<JsonValue, ExpressionError> {
    let deadline = Instant::now() + config.timeout;
    let mut engine = Engine::new();
    engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
    engine.set_max_operations(config.max_operations);
    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some(Dynamic::from("wall-clock limit exceeded".to_string()))
        } else {
            None
        }
    });

    register_utilities(&mut engine);

    let mut scope = Scope::new();
    scope.push(
        "input",
        rhai::serde::to_dynamic(JsonValue::Object(input)).map_err(|e| ExpressionError::Syntax(e.to_string()))?,
    );
    scope.push(
        "state",
        rhai::serde::to_dynamic(JsonValue::Object(state)).map_err(|e| ExpressionError::Syntax(e.to_string()))?,
    );
    scope.push(
        "output",
        rhai::serde::to_dynamic(JsonValue::Object(output)).map_err(|e| ExpressionError::Syntax(e.to_string()))?,
    );

    let result: Dynamic = engine
        .eval_with_scope(&mut scope, script)
        .map_err(|e| ExpressionError::Syntax(e.to_string()))?;

    rhai::serde::from_dynamic(&result).map_err(|e| ExpressionError::Syntax(e.to_string()))
}

fn register_utilities(engine: &mut Engine) {
    engine.register_fn("now", || chrono::Utc::now().timestamp_millis());
    engine.register_fn("uuid", || Uuid::now_v7().to_string());
    engine.register_fn("round", |x: f64| x.round());
    engine.register_fn("floor", |x: f64| x.floor());
    engine.register_fn("ceil", |x: f64| x.ceil());
    engine.register_fn("abs", |x: f64| x.abs());
    engine.register_fn("min", |a: f64, b: f64| a.min(b));
    engine.register_fn("max", |a: f64, b: f64| a.max(b));
    engine.register_fn("length", |s: &str| s.chars().count() as i64);
    engine.register_fn("length", |arr: rhai::Array| arr.len() as i64);
    engine.register_fn("first", |arr: rhai::Array| arr.first().cloned().unwrap_or(Dynamic::UNIT));
    engine.register_fn("last", |arr: rhai::Array| arr.last().cloned().unwrap_or(Dynamic::UNIT));
    engine.register_fn("isEmpty", |s: &str| s.is_empty());
    engine.register_fn("isEmpty", |arr: rhai::Array| arr.is_empty());
    engine.register_fn("coalesce", |a: Dynamic, b: Dynamic| if a.is_unit() { b } else { a });
    engine.register_fn("json_parse", |s: &str| -> Dynamic {
        serde_json::from_str::<JsonValue>(s)
            .ok()
            .and_then(|v| rhai::serde::to_dynamic(v).ok())
            .unwrap_or(Dynamic::UNIT)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn arithmetic_over_input() {
        let engine = ScriptEngine::new(ScriptEngineConfig::default());
        let mut input = Map::new();
        input.insert("n".into(), json!(10));
        let result = engine
            .eval(input, Map::new(), Map::new(), "input.n * 2".into())
            .await
            .unwrap();
        assert_eq!(result, json!(20));
    }

    #[tokio::test]
    async fn syntax_error_is_reported() {
        let engine = ScriptEngine::new(ScriptEngineConfig::default());
        let result = engine
            .eval(Map::new(), Map::new(), Map::new(), "this is not rhai (((".into())
            .await;
        assert!(matches!(result, Err(ExpressionError::Syntax(_))));
    }

    #[tokio::test]
    async fn infinite_loop_hits_operation_limit() {
        let mut config = ScriptEngineConfig::default();
        config.max_operations = 1_000;
        config.timeout = Duration::from_secs(2);
        let engine = ScriptEngine::new(config);
        let result = engine
            .eval(Map::new(), Map::new(), Map::new(), "let x = 0; loop { x += 1; }".into())
            .await;
        assert!(result.is_err());
    }
}
