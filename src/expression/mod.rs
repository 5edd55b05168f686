//! Path / predicate / interpolation evaluators over an instance's
//! input, state, and output, plus an optional sandboxed scripted evaluator.
//!
//! `JsonValue` is `serde_json::Value` itself: a tagged sum type already,
//! so the path evaluator walks it structurally instead of reflecting over
//! a host-language object.

mod interpolation;
mod path;
mod predicate;
mod scripted;

pub use interpolation::interpolate;
pub use path::resolve_path;
pub use predicate::evaluate_predicate;
pub use scripted::{ScriptEngine, ScriptEngineConfig};

use serde_json::Map;
use thiserror::Error;

pub type JsonValue = serde_json::Value;

/// Borrowed view over the three namespaces expressions resolve against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub input: &'a Map<String, JsonValue>,
    pub state: &'a Map<String, JsonValue>,
    pub output: &'a Map<String, JsonValue>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        input: &'a Map<String, JsonValue>,
        state: &'a Map<String, JsonValue>,
        output: &'a Map<String, JsonValue>,
    ) -> Self {
        Self {
            input,
            state,
            output,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("expression syntax error: {0}")]
    Syntax(String),

    #[error("expression exceeded its wall-clock or operation limit")]
    LimitExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(
        input: &'a Map<String, JsonValue>,
        state: &'a Map<String, JsonValue>,
        output: &'a Map<String, JsonValue>,
    ) -> EvalContext<'a> {
        EvalContext::new(input, state, output)
    }

    #[test]
    fn path_walks_nested_input() {
        let input = json!({"n": 42, "nested": {"a": "b"}})
            .as_object()
            .unwrap()
            .clone();
        let state = Map::new();
        let output = Map::new();
        let c = ctx(&input, &state, &output);
        assert_eq!(resolve_path(&c, "input.nested.a"), json!("b"));
        assert_eq!(resolve_path(&c, "input.n"), json!(42));
        assert_eq!(resolve_path(&c, "input.missing"), JsonValue::Null);
    }
}
