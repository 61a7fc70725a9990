//! Python spellings of logical types and values.

use crate::error::Warning;
use crate::spec::FieldType;
use serde_json::Value;

const STRING_FORMATS: &[&str] = &[
    "email", "uri", "hostname", "ipv4", "ipv6", "password", "byte",
];

/// Python annotation for a field type
///
/// A `format` the target cannot express adds an `UnsupportedConstraint`
/// warning for `element` and falls back to the unformatted base type.
pub fn py_type(ty: &FieldType, format: Option<&str>, element: &str, warnings: &mut Vec<Warning>) -> String {
    match ty {
        FieldType::String => match format {
            None => "str".to_string(),
            Some("date") => "date".to_string(),
            Some("date-time") => "datetime".to_string(),
            Some("time") => "time".to_string(),
            Some("uuid") => "UUID".to_string(),
            Some("binary") => "bytes".to_string(),
            Some(f) if STRING_FORMATS.contains(&f) => "str".to_string(),
            Some(f) => {
                warnings.push(unsupported(element, f, "str"));
                "str".to_string()
            }
        },
        FieldType::Integer => match format {
            None | Some("int32") | Some("int64") => "int".to_string(),
            Some(f) => {
                warnings.push(unsupported(element, f, "int"));
                "int".to_string()
            }
        },
        FieldType::Number => match format {
            None | Some("float") | Some("double") => "float".to_string(),
            Some(f) => {
                warnings.push(unsupported(element, f, "float"));
                "float".to_string()
            }
        },
        FieldType::Boolean => "bool".to_string(),
        FieldType::Array(inner) => format!("List[{}]", py_type(inner, None, element, warnings)),
        FieldType::Map(inner) => format!("Dict[str, {}]", py_type(inner, None, element, warnings)),
        FieldType::Object(name) => name.clone(),
        FieldType::Any => "Any".to_string(),
    }
}

fn unsupported(element: &str, format: &str, fallback: &str) -> Warning {
    Warning::unsupported_constraint(
        element,
        format!("format '{format}' has no target representation; emitted as '{fallback}'"),
    )
}

/// Python literal for a JSON value
pub fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_string(s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(py_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", py_string(k), py_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Double-quoted Python string literal
pub fn py_string(s: &str) -> String {
    // JSON string escapes are a subset of Python's.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}

/// Text safe to place inside a triple-quoted docstring
pub fn py_docstring(s: &str) -> String {
    s.trim().replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}
