use super::{resolve_path, EvalContext, JsonValue};

/// Rewrites `${path}` placeholders in `template` by substituting each
/// `path` through the path evaluator. `null` resolves to the empty
/// string. An unmatched `${` (no closing `}`) terminates scanning; the
/// remainder of the template up to that point is still emitted verbatim.
pub fn interpolate(ctx: &EvalContext<'_>, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        match rest.find("${") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                match after_open.find('}') {
                    None => break,
                    Some(end) => {
                        let path = &after_open[..end];
                        let value = resolve_path(ctx, path);
                        out.push_str(&stringify(&value));
                        rest = &after_open[end + 1..];
                    }
                }
            }
        }
    }
    out
}

fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn substitutes_and_nulls_become_empty() {
        let mut input = Map::new();
        input.insert("name".into(), json!("world"));
        let (state, output) = (Map::new(), Map::new());
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(
            interpolate(&ctx, "hello ${input.name}${input.missing}!"),
            "hello world!"
        );
    }

    #[test]
    fn unmatched_open_terminates_scanning() {
        let (input, state, output) = (Map::new(), Map::new(), Map::new());
        let ctx = EvalContext::new(&input, &state, &output);
        assert_eq!(interpolate(&ctx, "abc ${unterminated"), "abc ");
    }
}
