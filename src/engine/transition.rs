//! Transition choice (§4.3.6) and output projection (§4.3.7).

use crate::expression::{evaluate_predicate, EvalContext};
use crate::model::{JsonMap, TransitionDefinition, WorkflowDefinition};

/// Given `from`, collects transitions sorted by `priority` ascending.
/// Iterates: skips `is_default` transitions; an empty `condition` matches
/// unconditionally; otherwise the predicate decides. If none matched,
/// falls back to the first `is_default` transition's `to`, else `None`
/// (which terminates the workflow).
pub fn choose_transition(definition: &WorkflowDefinition, from: &str, ctx: &EvalContext<'_>) -> Option<String> {
    let candidates = definition.transitions_from(from);

    for transition in &candidates {
        if transition.is_default {
            continue;
        }
        if matches(transition, ctx) {
            return Some(transition.to.clone());
        }
    }

    candidates.iter().find(|t| t.is_default).map(|t| t.to.clone())
}

fn matches(transition: &TransitionDefinition, ctx: &EvalContext<'_>) -> bool {
    match &transition.condition {
        None => true,
        Some(expr) if expr.trim().is_empty() => true,
        Some(expr) => evaluate_predicate(ctx, expr),
    }
}

/// If the definition has an `output_schema`, the final `output` is the
/// subset of `state` whose keys appear in `output_schema.properties`.
/// Otherwise `output = state`.
pub fn project_output(definition: &WorkflowDefinition, state: &JsonMap) -> JsonMap {
    match &definition.output_schema {
        Some(schema) => state
            .iter()
            .filter(|(k, _)| schema.properties.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityDefinition, PropertySchema, SchemaDescriptor, TriggerType};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;

    fn def_with_transitions(transitions: Vec<TransitionDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "t".into(),
            version: 1,
            start_activity_id: "a".into(),
            activities: vec![ActivityDefinition {
                id: "a".into(),
                activity_type: "log".into(),
                properties: JsonMap::new(),
                input_mappings: Default::default(),
                output_mappings: Default::default(),
                condition: None,
                timeout: None,
                retry_policy: None,
            }],
            transitions,
            input_schema: None,
            output_schema: None,
            trigger: TriggerType::Manual,
            cron_expression: None,
            default_retry_policy: None,
            timeout: None,
            tags: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn picks_first_matching_conditional_transition() {
        let def = def_with_transitions(vec![
            TransitionDefinition { from: "a".into(), to: "low".into(), condition: Some("input.n < 10".into()), priority: 1, is_default: false },
            TransitionDefinition { from: "a".into(), to: "high".into(), condition: Some("input.n >= 10".into()), priority: 2, is_default: false },
        ]);
        let mut input = JsonMap::new();
        input.insert("n".into(), json!(20));
        let state = JsonMap::new();
        let output = JsonMap::new();
        let ctx = EvalContext { input: &input, state: &state, output: &output };
        assert_eq!(choose_transition(&def, "a", &ctx), Some("high".into()));
    }

    #[test]
    fn falls_back_to_default_transition() {
        let def = def_with_transitions(vec![
            TransitionDefinition { from: "a".into(), to: "never".into(), condition: Some("input.n < 0".into()), priority: 1, is_default: false },
            TransitionDefinition { from: "a".into(), to: "fallback".into(), condition: None, priority: 100, is_default: true },
        ]);
        let input = JsonMap::new();
        let state = JsonMap::new();
        let output = JsonMap::new();
        let ctx = EvalContext { input: &input, state: &state, output: &output };
        assert_eq!(choose_transition(&def, "a", &ctx), Some("fallback".into()));
    }

    #[test]
    fn no_match_and_no_default_terminates() {
        let def = def_with_transitions(vec![]);
        let input = JsonMap::new();
        let state = JsonMap::new();
        let output = JsonMap::new();
        let ctx = EvalContext { input: &input, state: &state, output: &output };
        assert_eq!(choose_transition(&def, "a", &ctx), None);
    }

    #[test]
    fn output_projection_filters_to_schema_properties() {
        let mut def = def_with_transitions(vec![]);
        let mut properties = HashMap::new();
        properties.insert("kept".to_string(), PropertySchema { property_type: "string".into() });
        def.output_schema = Some(SchemaDescriptor { required: vec![], properties });

        let mut state = JsonMap::new();
        state.insert("kept".into(), json!("yes"));
        state.insert("dropped".into(), json!("no"));

        let output = project_output(&def, &state);
        assert_eq!(output.len(), 1);
        assert_eq!(output.get("kept"), Some(&json!("yes")));
    }

    #[test]
    fn no_output_schema_passes_through_full_state() {
        let def = def_with_transitions(vec![]);
        let mut state = JsonMap::new();
        state.insert("anything".into(), json!(1));
        assert_eq!(project_output(&def, &state), state);
    }
}
