use super::artifact::{
    ArtifactBody, ArtifactKind, ColumnSpec, GeneratedArtifact, RelationshipSpec, TableSpec,
};
use super::python::{py_docstring, py_string};
use super::templates::{AttributeLine, DbBaseTemplate, PersistenceTemplate};
use super::EmitContext;
use crate::naming::{sanitize_field_name, to_snake_case};
use crate::spec::{FactSet, FieldSpec, FieldType, SchemaNode};
use askama::Template;

/// Source id of the shared declarative-base artifact
pub(crate) const BASE_SOURCE_ID: &str = "(base)";

/// Primary key of an entity
#[derive(Debug, Clone, Copy)]
pub struct PrimaryKey<'a> {
    /// Python attribute name
    pub name: &'a str,
    /// The field backing the key; `None` for a synthesized `id`
    pub field: Option<&'a FieldSpec>,
}

impl PrimaryKey<'_> {
    /// SQLAlchemy column type of the key
    pub fn sql_type(&self) -> String {
        self.field
            .map(|f| sql_type(&f.ty, f.format.as_deref(), f.constraints.max_length))
            .unwrap_or_else(|| "Integer".to_string())
    }

    /// Python annotation of the key
    pub fn py_type(&self) -> &'static str {
        match self.field.map(|f| (&f.ty, f.format.as_deref())) {
            None | Some((FieldType::Integer, _)) => "int",
            Some((FieldType::Number, _)) => "float",
            Some((FieldType::String, Some("uuid"))) => "UUID",
            _ => "str",
        }
    }
}

/// Marked field, else a field named `id`, else a synthesized integer `id`
pub fn primary_key(schema: &SchemaNode) -> PrimaryKey<'_> {
    let field = schema
        .fields
        .iter()
        .find(|f| f.primary_key)
        .or_else(|| schema.field("id"));
    PrimaryKey {
        name: field.map(|f| f.name.as_str()).unwrap_or("id"),
        field,
    }
}

/// Table name of an entity
pub(crate) fn table_name(schema: &str) -> String {
    to_snake_case(schema)
}

fn sql_type(ty: &FieldType, format: Option<&str>, max_length: Option<u64>) -> String {
    match (ty, format) {
        (FieldType::String, Some("date")) => "Date".to_string(),
        (FieldType::String, Some("date-time")) => "DateTime".to_string(),
        (FieldType::String, Some("time")) => "Time".to_string(),
        (FieldType::String, Some("uuid")) => "String(36)".to_string(),
        (FieldType::String, Some("binary")) => "LargeBinary".to_string(),
        (FieldType::String, _) => match max_length {
            Some(n) => format!("String({n})"),
            None => "String".to_string(),
        },
        (FieldType::Integer, Some("int64")) => "BigInteger".to_string(),
        (FieldType::Integer, _) => "Integer".to_string(),
        (FieldType::Number, _) => "Float".to_string(),
        (FieldType::Boolean, _) => "Boolean".to_string(),
        _ => "JSON".to_string(),
    }
}

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    let mut artifacts = vec![GeneratedArtifact::new(
        ArtifactKind::Persistence,
        BASE_SOURCE_ID,
        format!("{}/db/base.py", ctx.package),
        ArtifactBody::Persistence(TableSpec {
            class_name: "Base".to_string(),
            table: String::new(),
            primary_key: String::new(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }),
        DbBaseTemplate {
            title: facts.info.title.clone(),
        }
        .render()?,
    )];
    for schema in facts.schemas.iter().filter(|s| s.is_entity()) {
        artifacts.push(emit_table(schema, facts, ctx)?);
    }
    Ok(artifacts)
}

/// Column or relationship derived from one field
enum Mapped {
    Column(ColumnSpec),
    ForeignKey(ColumnSpec, RelationshipSpec),
    Many(RelationshipSpec, String),
}

fn map_field(schema: &SchemaNode, field: &FieldSpec, pk: &PrimaryKey<'_>, facts: &FactSet) -> Mapped {
    let attr = sanitize_field_name(&field.name);
    let is_pk = pk.field.is_some_and(|f| f.name == field.name);
    let entity = |name: &str| facts.schema(name).filter(|s| s.is_entity());

    match &field.ty {
        FieldType::Object(target) => {
            if let Some(target_schema) = entity(target) {
                let target_pk = primary_key(target_schema);
                let fk_attr = foreign_key_attr(schema, &attr);
                return Mapped::ForeignKey(
                    ColumnSpec {
                        name: fk_attr,
                        sql_type: target_pk.sql_type(),
                        nullable: field.is_optional(),
                        primary_key: false,
                        foreign_key: Some(format!(
                            "{}.{}",
                            table_name(target),
                            sanitize_field_name(target_pk.name)
                        )),
                    },
                    RelationshipSpec {
                        name: attr,
                        target: target.clone(),
                        many: false,
                    },
                );
            }
        }
        FieldType::Array(inner) => {
            if let FieldType::Object(target) = inner.as_ref() {
                if entity(target).is_some() {
                    let association = format!("{}_{}", table_name(&schema.name), to_snake_case(&attr));
                    return Mapped::Many(
                        RelationshipSpec {
                            name: attr,
                            target: target.clone(),
                            many: true,
                        },
                        association,
                    );
                }
            }
        }
        _ => {}
    }
    Mapped::Column(ColumnSpec {
        name: attr,
        sql_type: sql_type(&field.ty, field.format.as_deref(), field.constraints.max_length),
        nullable: !is_pk && field.is_optional(),
        primary_key: is_pk,
        foreign_key: None,
    })
}

/// `{field}_id`, suffixed when the schema already declares that name
fn foreign_key_attr(schema: &SchemaNode, attr: &str) -> String {
    let candidate = format!("{attr}_id");
    if schema.fields.iter().any(|f| sanitize_field_name(&f.name) == candidate) {
        format!("{attr}_fk_id")
    } else {
        candidate
    }
}

fn column_expr(column: &ColumnSpec, db_name: Option<&str>, autoincrement: bool) -> String {
    let mut args = Vec::new();
    if let Some(name) = db_name {
        args.push(py_string(name));
    }
    args.push(column.sql_type.clone());
    if let Some(fk) = &column.foreign_key {
        args.push(format!("ForeignKey({})", py_string(fk)));
    }
    if column.primary_key {
        args.push("primary_key=True".to_string());
    }
    if autoincrement {
        args.push("autoincrement=True".to_string());
    }
    if !column.primary_key {
        args.push(format!(
            "nullable={}",
            if column.nullable { "True" } else { "False" }
        ));
    }
    format!("Column({})", args.join(", "))
}

fn emit_table(schema: &SchemaNode, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let table = table_name(&schema.name);
    let pk = primary_key(schema);
    let mut spec = TableSpec {
        class_name: schema.name.clone(),
        table: table.clone(),
        primary_key: sanitize_field_name(pk.name),
        columns: Vec::new(),
        relationships: Vec::new(),
    };
    let mut columns = Vec::new();
    let mut relationships = Vec::new();
    let mut association_tables = Vec::new();

    if pk.field.is_none() {
        let column = ColumnSpec {
            name: "id".to_string(),
            sql_type: "Integer".to_string(),
            nullable: false,
            primary_key: true,
            foreign_key: None,
        };
        columns.push(AttributeLine {
            name: column.name.clone(),
            value: column_expr(&column, None, true),
        });
        spec.columns.push(column);
    }

    for field in &schema.fields {
        let attr = sanitize_field_name(&field.name);
        let db_name = (attr != field.name).then_some(field.name.as_str());
        match map_field(schema, field, &pk, facts) {
            Mapped::Column(column) => {
                columns.push(AttributeLine {
                    name: column.name.clone(),
                    value: column_expr(&column, db_name, false),
                });
                spec.columns.push(column);
            }
            Mapped::ForeignKey(column, relationship) => {
                columns.push(AttributeLine {
                    name: column.name.clone(),
                    value: column_expr(&column, None, false),
                });
                relationships.push(AttributeLine {
                    name: relationship.name.clone(),
                    value: format!(
                        "relationship({}, foreign_keys=[{}])",
                        py_string(&relationship.target),
                        column.name
                    ),
                });
                spec.columns.push(column);
                spec.relationships.push(relationship);
            }
            Mapped::Many(relationship, association) => {
                let target = facts.schema(&relationship.target).map(primary_key);
                let target_table = table_name(&relationship.target);
                let (target_pk_name, target_pk_type) = target
                    .map(|t| (sanitize_field_name(t.name), t.sql_type()))
                    .unwrap_or_else(|| ("id".to_string(), "Integer".to_string()));
                association_tables.push(AttributeLine {
                    name: association.clone(),
                    value: format!(
                        "Table({}, Base.metadata, Column({}, {}, ForeignKey({}), primary_key=True), Column({}, {}, ForeignKey({}), primary_key=True))",
                        py_string(&association),
                        py_string(&format!("{table}_id")),
                        pk.sql_type(),
                        py_string(&format!("{table}.{}", spec.primary_key)),
                        py_string(&format!("{target_table}_id")),
                        target_pk_type,
                        py_string(&format!("{target_table}.{target_pk_name}")),
                    ),
                });
                relationships.push(AttributeLine {
                    name: relationship.name.clone(),
                    value: format!(
                        "relationship({}, secondary={association})",
                        py_string(&relationship.target)
                    ),
                });
                spec.relationships.push(relationship);
            }
        }
    }

    let docstring = py_docstring(&format!("Persistence model for {}.", schema.name));
    let content = PersistenceTemplate {
        title: facts.info.title.clone(),
        class_name: schema.name.clone(),
        table: table.clone(),
        docstring,
        association_tables,
        columns,
        relationships,
    }
    .render()?;
    Ok(GeneratedArtifact::new(
        ArtifactKind::Persistence,
        schema.name.clone(),
        format!("{}/db/{table}.py", ctx.package),
        ArtifactBody::Persistence(spec),
        content,
    ))
}
