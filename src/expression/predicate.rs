use super::{resolve_path, EvalContext, JsonValue};

/// Evaluates a three-token predicate `LHS OP RHS` against an [`EvalContext`].
///
/// Fewer than three whitespace-separated tokens evaluates to `true`
/// (treated as unconditional). `LHS`/`RHS` are resolved through the path
/// evaluator before the operator is applied.
pub fn evaluate_predicate(ctx: &EvalContext<'_>, expr: &str) -> bool {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    if tokens.len() < 3 {
        return true;
    }
    let (lhs, op, rhs) = (tokens[0], tokens[1], tokens[2]);

    let lhs_val = resolve_path(ctx, lhs);
    let rhs_val = resolve_path(ctx, rhs);
    let lhs_str = string_form(&lhs_val);
    let rhs_str = string_form(&rhs_val);

    match op {
        "==" => lhs_str == rhs_str,
        "!=" => lhs_str != rhs_str,
        "<" | "<=" | ">" | ">=" => {
            match (lhs_str.parse::<f64>(), rhs_str.parse::<f64>()) {
                (Ok(a), Ok(b)) => match op {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    ">=" => a >= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
        "contains" => lhs_str.contains(&rhs_str),
        "startsWith" => lhs_str.starts_with(&rhs_str),
        "endsWith" => lhs_str.ends_with(&rhs_str),
        _ => false,
    }
}

fn string_form(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn ctx_with<'a>(
        input: &'a Map<String, JsonValue>,
        state: &'a Map<String, JsonValue>,
        output: &'a Map<String, JsonValue>,
    ) -> EvalContext<'a> {
        EvalContext::new(input, state, output)
    }

    #[test]
    fn fewer_than_three_tokens_is_unconditional() {
        let (input, state, output) = (Map::new(), Map::new(), Map::new());
        let ctx = ctx_with(&input, &state, &output);
        assert!(evaluate_predicate(&ctx, ""));
        assert!(evaluate_predicate(&ctx, "input.n"));
    }

    #[test]
    fn numeric_comparison_on_input() {
        let mut input = Map::new();
        input.insert("n".into(), json!(42));
        let (state, output) = (Map::new(), Map::new());
        let ctx = ctx_with(&input, &state, &output);
        assert!(evaluate_predicate(&ctx, "input.n > 10"));
        assert!(!evaluate_predicate(&ctx, "input.n > 100"));
    }

    #[test]
    fn non_numeric_comparison_is_false() {
        let mut input = Map::new();
        input.insert("n".into(), json!("abc"));
        let (state, output) = (Map::new(), Map::new());
        let ctx = ctx_with(&input, &state, &output);
        assert!(!evaluate_predicate(&ctx, "input.n > 10"));
    }

    #[test]
    fn string_operators() {
        let mut input = Map::new();
        input.insert("name".into(), json!("flowforge"));
        let (state, output) = (Map::new(), Map::new());
        let ctx = ctx_with(&input, &state, &output);
        assert!(evaluate_predicate(&ctx, "input.name contains \"flow\""));
        assert!(evaluate_predicate(&ctx, "input.name startsWith \"flow\""));
        assert!(evaluate_predicate(&ctx, "input.name endsWith \"forge\""));
    }
}
