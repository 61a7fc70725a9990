use super::artifact::{ArtifactBody, ArtifactKind, GeneratedArtifact, SyncSpec};
use super::persistence::{primary_key, table_name};
use super::python::py_string;
use super::templates::SyncTemplate;
use super::EmitContext;
use crate::naming::{sanitize_field_name, to_snake_case};
use crate::spec::{FactSet, FieldSpec, FieldType, SchemaNode};
use askama::Template;

/// Search-collection type of an indexable field
fn index_type(field: &FieldSpec) -> Option<&'static str> {
    match field.ty {
        FieldType::String if field.format.as_deref() == Some("binary") => None,
        FieldType::String => Some("string"),
        FieldType::Integer => Some("int64"),
        FieldType::Number => Some("float"),
        FieldType::Boolean => Some("bool"),
        _ => None,
    }
}

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    facts
        .schemas
        .iter()
        .filter(|s| s.is_entity())
        .map(|schema| emit_sync(schema, facts, ctx))
        .collect()
}

fn emit_sync(schema: &SchemaNode, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let snake = to_snake_case(&schema.name);
    let collection = table_name(&schema.name);
    let mut indexed = Vec::new();
    let mut schema_fields = Vec::new();
    for field in &schema.fields {
        let Some(ty) = index_type(field) else {
            continue;
        };
        let attr = sanitize_field_name(&field.name);
        let optional = if field.is_optional() { ", \"optional\": True" } else { "" };
        schema_fields.push(format!(
            "{{\"name\": {}, \"type\": {}{optional}}}",
            py_string(&attr),
            py_string(ty)
        ));
        indexed.push(attr);
    }

    let fields_literal = format!(
        "[{}]",
        indexed.iter().map(|f| py_string(f)).collect::<Vec<_>>().join(", ")
    );
    let content = SyncTemplate {
        title: facts.info.title.clone(),
        entity: schema.name.clone(),
        snake: snake.clone(),
        collection: collection.clone(),
        pk_name: sanitize_field_name(primary_key(schema).name),
        fields_literal,
        schema_fields,
    }
    .render()?;

    Ok(GeneratedArtifact::new(
        ArtifactKind::Sync,
        schema.name.clone(),
        format!("{}/sync/{snake}.py", ctx.package),
        ArtifactBody::Sync(SyncSpec {
            entity: schema.name.clone(),
            collection,
            indexed_fields: indexed,
        }),
        content,
    ))
}
