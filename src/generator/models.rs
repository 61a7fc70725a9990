use super::artifact::{ArtifactBody, ArtifactKind, GeneratedArtifact, ModelField, ModelSpec};
use super::python::{py_docstring, py_literal, py_string, py_type};
use super::templates::ModelTemplate;
use super::EmitContext;
use crate::error::Warning;
use crate::naming::{sanitize_field_name, to_snake_case};
use crate::spec::{FactSet, FieldSpec, FieldType, SchemaNode};
use askama::Template;
use serde_json::Value;
use std::collections::BTreeSet;

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    facts
        .schemas
        .iter()
        .map(|schema| emit_model(schema, facts, ctx))
        .collect()
}

fn emit_model(schema: &SchemaNode, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let mut warnings = Vec::new();
    let mut referenced = BTreeSet::new();
    let mut bases = Vec::new();
    let mut fields = Vec::new();
    let mut model_fields = Vec::new();
    let mut union_members = Vec::new();

    let alias_expr = if let Some(alias) = &schema.alias {
        collect_references(alias, &mut referenced);
        Some(py_type(alias, None, &schema.name, &mut warnings))
    } else if schema.is_union() {
        union_members = schema
            .composition
            .as_ref()
            .map(|c| c.members.clone())
            .unwrap_or_default();
        referenced.extend(union_members.iter().cloned());
        Some(format!("Union[{}]", union_members.join(", ")))
    } else {
        if let Some(composition) = &schema.composition {
            bases.extend(composition.members.iter().cloned());
            referenced.extend(composition.members.iter().cloned());
        }
        for field in &schema.fields {
            let line = if field.inherited_from.is_none() {
                collect_references(&field.ty, &mut referenced);
                let line = field_line(&schema.name, field, &mut warnings);
                fields.push(line.text.clone());
                line
            } else {
                // Declared on the parent class; its artifact carries the warnings.
                field_line(&schema.name, field, &mut Vec::new())
            };
            model_fields.push(line.field);
        }
        None
    };
    if bases.is_empty() {
        bases.push("BaseModel".to_string());
    }
    referenced.remove(&schema.name);

    let docstring = py_docstring(match &schema.description {
        Some(d) => d.as_str(),
        None if schema.synthesized => "Lifted from an inline object schema.",
        None => "Data model.",
    });
    let content = ModelTemplate {
        title: facts.info.title.clone(),
        name: schema.name.clone(),
        docstring,
        imports: referenced
            .iter()
            .map(|name| format!("from .{} import {name}", to_snake_case(name)))
            .collect(),
        alias_expr,
        bases: bases.join(", "),
        fields,
    }
    .render()?;

    let spec = ModelSpec {
        class_name: schema.name.clone(),
        fields: model_fields,
        parent: schema.parent().map(str::to_string),
        union_members,
    };
    Ok(GeneratedArtifact::new(
        ArtifactKind::Model,
        schema.name.clone(),
        format!("{}/models/{}.py", ctx.package, to_snake_case(&schema.name)),
        ArtifactBody::Model(spec),
        content,
    )
    .with_warnings(warnings))
}

fn collect_references(ty: &FieldType, out: &mut BTreeSet<String>) {
    match ty {
        FieldType::Object(name) => {
            out.insert(name.clone());
        }
        FieldType::Array(inner) | FieldType::Map(inner) => collect_references(inner, out),
        _ => {}
    }
}

/// One rendered class attribute and the shape it declares
struct FieldLine {
    text: String,
    field: ModelField,
}

/// `name: annotation = default` for one field
fn field_line(schema: &str, field: &FieldSpec, warnings: &mut Vec<Warning>) -> FieldLine {
    let element = format!("{schema}.{}", field.name);
    let mut annotation = py_type(&field.ty, field.format.as_deref(), &element, warnings);
    let enum_values = &field.constraints.enum_values;
    if field.ty == FieldType::String && !enum_values.is_empty() && enum_values.iter().all(Value::is_string) {
        annotation = format!(
            "Literal[{}]",
            enum_values.iter().map(py_literal).collect::<Vec<_>>().join(", ")
        );
    }
    let optional = field.is_optional();
    if optional {
        annotation = format!("Optional[{annotation}]");
    }

    let attr = sanitize_field_name(&field.name);
    let default = field
        .default
        .as_ref()
        .map(py_literal)
        .or_else(|| optional.then(|| "None".to_string()));

    let declared = ModelField {
        name: field.name.clone(),
        ty: field.ty.clone(),
        nullable: optional,
        required: default.is_none(),
    };

    let mut args = Vec::new();
    if attr != field.name {
        args.push(format!("alias={}", py_string(&field.name)));
    }
    let c = &field.constraints;
    if let Some(v) = c.min_length {
        args.push(format!("min_length={v}"));
    }
    if let Some(v) = c.max_length {
        args.push(format!("max_length={v}"));
    }
    if let Some(p) = &c.pattern {
        args.push(format!("pattern={}", py_string(p)));
    }
    if let Some(v) = c.minimum {
        args.push(format!("ge={v}"));
    }
    if let Some(v) = c.maximum {
        args.push(format!("le={v}"));
    }
    if let Some(d) = &field.description {
        args.push(format!("description={}", py_string(d)));
    }

    let assignment = match (args.is_empty(), default) {
        (true, Some(d)) => format!(" = {d}"),
        (true, None) => String::new(),
        (false, d) => format!(
            " = Field({}, {})",
            d.unwrap_or_else(|| "...".to_string()),
            args.join(", ")
        ),
    };
    FieldLine {
        text: format!("{attr}: {annotation}{assignment}"),
        field: declared,
    }
}
