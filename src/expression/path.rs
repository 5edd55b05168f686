use super::{EvalContext, JsonValue};

/// Resolves a dotted path expression against an [`EvalContext`].
///
/// `input.X.Y…`, `state.X.Y…`, `output.X.Y…` walk the corresponding map;
/// a missing intermediate or leaf key yields `null`, never an error. A
/// quoted string (`"…"`) returns its unquoted contents literally.
/// Anything else is parsed, in order, as a number, then as a boolean
/// (`true`/`false`), falling back to the raw token.
pub fn resolve_path(ctx: &EvalContext<'_>, expr: &str) -> JsonValue {
    let expr = expr.trim();

    if expr.len() >= 2 && expr.starts_with('"') && expr.ends_with('"') {
        return JsonValue::String(expr[1..expr.len() - 1].to_string());
    }

    let mut segments = expr.split('.');
    let root = match segments.next() {
        Some(r) => r,
        None => return literal(expr),
    };

    let map = match root {
        "input" => ctx.input,
        "state" => ctx.state,
        "output" => ctx.output,
        _ => return literal(expr),
    };

    let mut current = match segments.next() {
        Some(first_key) => map.get(first_key).cloned().unwrap_or(JsonValue::Null),
        None => return JsonValue::Object(map.clone()),
    };

    for seg in segments {
        current = walk(&current, seg);
    }
    current
}

fn walk(value: &JsonValue, segment: &str) -> JsonValue {
    match value {
        JsonValue::Object(map) => map.get(segment).cloned().unwrap_or(JsonValue::Null),
        JsonValue::Array(arr) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| arr.get(i).cloned())
            .unwrap_or(JsonValue::Null),
        _ => JsonValue::Null,
    }
}

fn literal(token: &str) -> JsonValue {
    if let Ok(n) = token.parse::<i64>() {
        return JsonValue::from(n);
    }
    if let Ok(f) = token.parse::<f64>() {
        return JsonValue::from(f);
    }
    match token {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        _ => {}
    }
    JsonValue::String(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn empty<'a>() -> (Map<String, JsonValue>, Map<String, JsonValue>, Map<String, JsonValue>) {
        (Map::new(), Map::new(), Map::new())
    }

    #[test]
    fn missing_leaf_is_null() {
        let (input, state, output) = empty();
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(resolve_path(&ctx, "state.nope"), JsonValue::Null);
    }

    #[test]
    fn quoted_literal_unwraps() {
        let (input, state, output) = empty();
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(resolve_path(&ctx, "\"hello\""), json!("hello"));
    }

    #[test]
    fn bare_tokens_parse_as_number_then_bool_then_string() {
        let (input, state, output) = empty();
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(resolve_path(&ctx, "10"), json!(10));
        assert_eq!(resolve_path(&ctx, "true"), json!(true));
        assert_eq!(resolve_path(&ctx, "hello"), json!("hello"));
    }

    #[test]
    fn array_index_segment() {
        let mut state = Map::new();
        state.insert("items".into(), json!(["a", "b", "c"]));
        let input = Map::new();
        let output = Map::new();
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(resolve_path(&ctx, "state.items.1"), json!("b"));
    }
}
