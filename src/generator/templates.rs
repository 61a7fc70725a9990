use askama::Template;

use super::auth::CredentialSource;
use super::python::py_string;

/// One attribute line of a generated class
#[derive(Debug, Clone)]
pub struct AttributeLine {
    /// Python attribute name
    pub name: String,
    /// Annotation (models) or right-hand side (persistence)
    pub value: String,
}

/// Template data for a pydantic model module
#[derive(Template)]
#[template(path = "model.py.txt", escape = "none")]
pub struct ModelTemplate {
    pub title: String,
    pub name: String,
    pub docstring: String,
    /// `from .x import X` lines for referenced models
    pub imports: Vec<String>,
    /// Right-hand side when the schema is an alias or union
    pub alias_expr: Option<String>,
    /// Base classes, e.g. `BaseModel` or `Pet`
    pub bases: String,
    /// `name: annotation = default` lines
    pub fields: Vec<String>,
}

/// Template data for the declarative base shared by persistence models
#[derive(Template)]
#[template(path = "db_base.py.txt", escape = "none")]
pub struct DbBaseTemplate {
    pub title: String,
}

/// Template data for a SQLAlchemy model module
#[derive(Template)]
#[template(path = "persistence.py.txt", escape = "none")]
pub struct PersistenceTemplate {
    pub title: String,
    pub class_name: String,
    pub table: String,
    pub docstring: String,
    /// Association tables as `(variable, expression)`
    pub association_tables: Vec<AttributeLine>,
    pub columns: Vec<AttributeLine>,
    pub relationships: Vec<AttributeLine>,
}

/// Template data for the CRUD support module (errors, session scope)
#[derive(Template)]
#[template(path = "crud_support.py.txt", escape = "none")]
pub struct CrudSupportTemplate {
    pub title: String,
}

/// Template data for an entity's CRUD module
#[derive(Template)]
#[template(path = "crud.py.txt", escape = "none")]
pub struct CrudTemplate {
    pub title: String,
    pub entity: String,
    pub module: String,
    /// Python set literal of column attribute names
    pub columns_literal: String,
    pub pk_name: String,
    pub pk_type: String,
    pub create_fn: String,
    pub get_fn: String,
    pub list_fn: String,
    pub update_fn: String,
    pub delete_fn: String,
}

/// Template data for a FastAPI route module
#[derive(Template)]
#[template(path = "route.py.txt", escape = "none")]
pub struct RouteTemplate {
    pub title: String,
    pub operation_id: String,
    pub handler: String,
    pub method: String,
    /// Remaining `from ... import ...` lines (models, guard)
    pub imports: Vec<String>,
    /// `keyword=value` arguments of the route decorator
    pub decorator_args: Vec<String>,
    /// Handler parameter lines
    pub params: Vec<String>,
    pub return_annotation: String,
}

/// Template data for the application entry module
#[derive(Template)]
#[template(path = "main.py.txt", escape = "none")]
pub struct MainTemplate {
    pub title: String,
    pub package: String,
    /// `keyword=value` arguments of the `FastAPI(...)` call
    pub app_args: Vec<String>,
    /// Route module names, one router each
    pub routers: Vec<String>,
}

/// Credential source rendered as Python string literals
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub scheme: String,
    pub location: String,
    pub parameter_name: String,
    pub prefix: String,
}

impl From<&CredentialSource> for TemplateSource {
    fn from(source: &CredentialSource) -> Self {
        TemplateSource {
            scheme: py_string(&source.scheme),
            location: py_string(source.location),
            parameter_name: py_string(&source.parameter_name),
            prefix: py_string(source.prefix.unwrap_or("")),
        }
    }
}

/// Template data for an authentication guard module
#[derive(Template)]
#[template(path = "auth.py.txt", escape = "none")]
pub struct AuthTemplate {
    pub title: String,
    pub tier: String,
    pub elevated: bool,
    pub secret_env: String,
    pub sources: Vec<TemplateSource>,
    pub peer_secret_env: String,
    pub peer_sources: Vec<TemplateSource>,
}

/// Template data for a search-index synchronization module
#[derive(Template)]
#[template(path = "sync.py.txt", escape = "none")]
pub struct SyncTemplate {
    pub title: String,
    pub entity: String,
    pub snake: String,
    pub collection: String,
    pub pk_name: String,
    /// Python list literal of indexed attribute names
    pub fields_literal: String,
    /// `{"name": ..., "type": ...}` entries of the collection schema
    pub schema_fields: Vec<String>,
}

/// One generated test function
#[derive(Debug, Clone)]
pub struct TestCaseLines {
    pub name: String,
    pub doc: String,
    pub expected_status: u16,
    pub params: String,
    pub headers: String,
    pub cookies: String,
}

/// Template data for a pytest module
#[derive(Template)]
#[template(path = "test_route.py.txt", escape = "none")]
pub struct TestTemplate {
    pub title: String,
    pub package: String,
    pub handler: String,
    pub operation_id: String,
    pub method: String,
    pub url: String,
    pub body: String,
    pub standard_env: String,
    pub elevated_env: String,
    pub cases: Vec<TestCaseLines>,
}
