// Sample values for generated test inputs.

use crate::spec::{FactSet, FieldSpec, FieldType, ParameterSpec};
use serde_json::{json, Map, Value};

const MAX_DEPTH: usize = 4;

/// Sample JSON value for a type
pub fn sample_value(ty: &FieldType, format: Option<&str>, facts: &FactSet) -> Value {
    sample_at(ty, format, facts, 0)
}

/// Sample for a parameter, honoring its default
pub fn sample_parameter(param: &ParameterSpec, facts: &FactSet) -> Value {
    param
        .default
        .clone()
        .unwrap_or_else(|| sample_value(&param.ty, param.format.as_deref(), facts))
}

fn sample_at(ty: &FieldType, format: Option<&str>, facts: &FactSet, depth: usize) -> Value {
    match ty {
        FieldType::String => match format {
            Some("date") => json!("2024-01-01"),
            Some("date-time") => json!("2024-01-01T00:00:00Z"),
            Some("time") => json!("12:00:00"),
            Some("uuid") => json!("00000000-0000-0000-0000-000000000001"),
            Some("email") => json!("user@example.com"),
            Some("uri") => json!("https://example.com"),
            _ => json!("example"),
        },
        FieldType::Integer => json!(42),
        FieldType::Number => json!(1.5),
        FieldType::Boolean => json!(true),
        FieldType::Array(_) => json!([]),
        FieldType::Map(_) | FieldType::Any => json!({}),
        FieldType::Object(name) => sample_object(name, facts, depth),
    }
}

fn sample_field(field: &FieldSpec, facts: &FactSet, depth: usize) -> Value {
    if let Some(first) = field.constraints.enum_values.first() {
        return first.clone();
    }
    if let Some(default) = &field.default {
        return default.clone();
    }
    sample_at(&field.ty, field.format.as_deref(), facts, depth)
}

/// Object with every required field filled in
fn sample_object(name: &str, facts: &FactSet, depth: usize) -> Value {
    let Some(schema) = facts.schema(name) else {
        return json!({});
    };
    if depth >= MAX_DEPTH {
        return json!({});
    }
    if let Some(alias) = &schema.alias {
        return sample_at(alias, None, facts, depth + 1);
    }
    if schema.is_union() {
        return schema
            .composition
            .as_ref()
            .and_then(|c| c.members.first())
            .map(|member| sample_object(member, facts, depth + 1))
            .unwrap_or_else(|| json!({}));
    }
    let mut map = Map::new();
    for field in schema.fields.iter().filter(|f| f.required) {
        map.insert(field.name.clone(), sample_field(field, facts, depth + 1));
    }
    Value::Object(map)
}
