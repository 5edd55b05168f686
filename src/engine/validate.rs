//! Input validation against a [`SchemaDescriptor`].

use crate::model::{JsonMap, SchemaDescriptor};

/// For each key in `schema.required`, `input` must contain a non-null
/// value. For each provided value whose schema type is one of
/// `string|number|integer|boolean|array|object`, the value's runtime type
/// must match. Returns the first violation, naming the field and the
/// expected type.
pub fn validate_input(schema: &SchemaDescriptor, input: &JsonMap) -> Result<(), String> {
    for field in &schema.required {
        match input.get(field) {
            Some(value) if !value.is_null() => {}
            _ => return Err(format!("missing required field '{field}'")),
        }
    }

    for (field, property) in &schema.properties {
        let Some(value) = input.get(field) else { continue };
        if value.is_null() {
            continue;
        }
        let matches = match property.property_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            return Err(format!(
                "field '{field}' expected type '{}'",
                property.property_type
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertySchema;
    use serde_json::json;
    use std::collections::HashMap;

    fn schema() -> SchemaDescriptor {
        let mut properties = HashMap::new();
        properties.insert("age".to_string(), PropertySchema { property_type: "integer".into() });
        SchemaDescriptor { required: vec!["name".into()], properties }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut input = JsonMap::new();
        input.insert("age".into(), json!(5));
        assert!(validate_input(&schema(), &input).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut input = JsonMap::new();
        input.insert("name".into(), json!("hi"));
        input.insert("age".into(), json!("not a number"));
        assert!(validate_input(&schema(), &input).is_err());
    }

    #[test]
    fn valid_input_passes() {
        let mut input = JsonMap::new();
        input.insert("name".into(), json!("hi"));
        input.insert("age".into(), json!(5));
        assert!(validate_input(&schema(), &input).is_ok());
    }
}
