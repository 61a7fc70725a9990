use super::artifact::{ArtifactBody, ArtifactKind, CrudSpec, GeneratedArtifact};
use super::persistence::{primary_key, table_name};
use super::python::py_string;
use super::templates::{CrudSupportTemplate, CrudTemplate};
use super::EmitContext;
use crate::naming::{sanitize_field_name, to_snake_case};
use crate::spec::{FactSet, FieldType, SchemaNode};
use askama::Template;

/// Source id of the shared CRUD support module
pub(crate) const SUPPORT_SOURCE_ID: &str = "(support)";

/// Function names of an entity's CRUD module, in declaration order
pub(crate) fn function_names(entity: &str) -> [String; 5] {
    let snake = to_snake_case(entity);
    [
        format!("create_{snake}"),
        format!("get_{snake}"),
        format!("list_{snake}s"),
        format!("update_{snake}"),
        format!("delete_{snake}"),
    ]
}

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    let mut artifacts = vec![GeneratedArtifact::new(
        ArtifactKind::Crud,
        SUPPORT_SOURCE_ID,
        format!("{}/crud/support.py", ctx.package),
        ArtifactBody::Crud(CrudSpec {
            entity: String::new(),
            table: String::new(),
            functions: vec!["session_scope".to_string()],
        }),
        CrudSupportTemplate {
            title: facts.info.title.clone(),
        }
        .render()?,
    )];
    for schema in facts.schemas.iter().filter(|s| s.is_entity()) {
        artifacts.push(emit_entity(schema, facts, ctx)?);
    }
    Ok(artifacts)
}

fn emit_entity(schema: &SchemaNode, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let module = to_snake_case(&schema.name);
    let pk = primary_key(schema);
    let [create_fn, get_fn, list_fn, update_fn, delete_fn] = function_names(&schema.name);

    // Only plain columns are copied from the model; relationships are wired by callers.
    let columns: Vec<String> = schema
        .fields
        .iter()
        .filter(|f| !references_entity(&f.ty, facts))
        .map(|f| py_string(&sanitize_field_name(&f.name)))
        .collect();
    let columns_literal = if columns.is_empty() {
        "set()".to_string()
    } else {
        format!("{{{}}}", columns.join(", "))
    };

    let content = CrudTemplate {
        title: facts.info.title.clone(),
        entity: schema.name.clone(),
        module: module.clone(),
        columns_literal,
        pk_name: sanitize_field_name(pk.name),
        pk_type: pk.py_type().to_string(),
        create_fn: create_fn.clone(),
        get_fn: get_fn.clone(),
        list_fn: list_fn.clone(),
        update_fn: update_fn.clone(),
        delete_fn: delete_fn.clone(),
    }
    .render()?;

    Ok(GeneratedArtifact::new(
        ArtifactKind::Crud,
        schema.name.clone(),
        format!("{}/crud/{module}.py", ctx.package),
        ArtifactBody::Crud(CrudSpec {
            entity: schema.name.clone(),
            table: table_name(&schema.name),
            functions: vec![create_fn, get_fn, list_fn, update_fn, delete_fn],
        }),
        content,
    ))
}

fn references_entity(ty: &FieldType, facts: &FactSet) -> bool {
    ty.referenced_schema()
        .and_then(|name| facts.schema(name))
        .is_some_and(SchemaNode::is_entity)
}
