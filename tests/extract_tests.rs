#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::INVENTORY_API;
use common::temp_files::SpecDir;
use ensemble_gen::generator::{guard_for, GuardTier};
use ensemble_gen::spec::{
    extract_facts, load_document, resolve_document, CompositionKind, ExtractOptions, FactSet, FieldType,
    LoaderOptions, ParameterLocation, SchemeTier, SecurityKind, SourceLocation,
};
use ensemble_gen::GenerateError;
use http::Method;
use serde_json::json;

fn extract_with(yaml: &str, options: &ExtractOptions) -> ensemble_gen::Result<FactSet> {
    let dir = SpecDir::new();
    let path = dir.write("openapi.yaml", yaml);
    let loader = LoaderOptions::default();
    let document = load_document(&SourceLocation::File(path), &loader)?;
    let resolved = resolve_document(document, &loader)?;
    extract_facts(&resolved, options)
}

fn inventory() -> FactSet {
    extract_with(INVENTORY_API, &ExtractOptions::default()).unwrap()
}

#[test]
fn test_api_info_and_servers() {
    let facts = inventory();
    assert_eq!(facts.info.title, "Inventory Service");
    assert_eq!(facts.info.version, "2.1.0");
    assert_eq!(facts.info.slug, "inventory_service");
    assert_eq!(facts.info.description.as_deref(), Some("Stock levels and suppliers"));
    assert_eq!(facts.base_path(), "/api");
}

#[test]
fn test_all_of_inheritance_and_lifting() {
    let facts = inventory();
    let supplier = facts.schema("Supplier").unwrap();

    assert_eq!(supplier.parent(), Some("Entity"));
    assert_eq!(supplier.composition.as_ref().unwrap().kind, CompositionKind::AllOf);
    assert_eq!(supplier.field("id").unwrap().inherited_from.as_deref(), Some("Entity"));
    assert!(supplier.field("id").unwrap().required);
    assert!(supplier.field("name").unwrap().inherited_from.is_none());
    assert_eq!(supplier.field("name").unwrap().constraints.max_length, Some(120));
    assert_eq!(
        supplier.field("contact").unwrap().ty,
        FieldType::Object("SupplierContact".into())
    );

    let contact = facts.schema("SupplierContact").unwrap();
    assert!(contact.synthesized);
    assert_eq!(contact.field("email").unwrap().format.as_deref(), Some("email"));
}

#[test]
fn test_item_fields() {
    let facts = inventory();
    let item = facts.schema("Item").unwrap();

    let names: Vec<&str> = item.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["sku", "quantity", "status", "supplier", "tags"]);
    assert!(item.field("sku").unwrap().primary_key);
    assert!(item.field("quantity").unwrap().required);
    assert_eq!(item.field("quantity").unwrap().constraints.minimum, Some(0.0));
    assert!(item.field("status").unwrap().is_optional());
    assert_eq!(
        item.field("status").unwrap().constraints.enum_values,
        vec![json!("active"), json!("retired")]
    );
    assert_eq!(item.field("supplier").unwrap().ty, FieldType::Object("Supplier".into()));
    assert_eq!(
        item.field("tags").unwrap().ty,
        FieldType::Array(Box::new(FieldType::String))
    );
}

#[test]
fn test_security_schemes_and_tiers() {
    let facts = inventory();

    let user = facts.security_scheme("userKey").unwrap();
    assert_eq!(user.kind, SecurityKind::ApiKeyHeader);
    assert_eq!(user.parameter_name, "X-User-Key");
    assert_eq!(user.tier, SchemeTier::Standard);

    let ops = facts.security_scheme("opsToken").unwrap();
    assert_eq!(ops.kind, SecurityKind::HttpBearer);
    assert_eq!(ops.parameter_name, "Authorization");
    assert_eq!(ops.tier, SchemeTier::Elevated);
}

#[test]
fn test_configured_elevated_schemes() {
    let options = ExtractOptions {
        elevated_schemes: vec!["userKey".to_string()],
    };
    let facts = extract_with(INVENTORY_API, &options).unwrap();
    assert!(facts.is_elevated("userKey"));
    assert_eq!(
        guard_for(facts.endpoint("listItems").unwrap(), &facts),
        GuardTier::Elevated
    );
}

#[test]
fn test_endpoints() {
    let facts = inventory();
    assert_eq!(facts.endpoints.len(), 5);

    let list = facts.endpoint("listItems").unwrap();
    assert_eq!(list.method, Method::GET);
    assert_eq!(list.handler_name, "list_items");
    assert_eq!(list.tags, vec!["items".to_string()]);
    assert_eq!(list.security.alternatives, vec![vec!["userKey".to_string()]]);
    let limit = &list.parameters[0];
    assert_eq!(limit.location, ParameterLocation::Query);
    assert!(!limit.required);
    assert_eq!(limit.default, Some(json!(20)));
    let response = list.success_response().unwrap();
    assert_eq!(response.schema.as_deref(), Some("Item"));
    assert!(response.is_array);

    let create = facts.endpoint("createItem").unwrap();
    assert_eq!(create.success_status(), 201);
    assert_eq!(create.error_statuses(), vec![409]);
    let body = create.request_body.as_ref().unwrap();
    assert!(body.required);
    assert_eq!(body.schema.as_deref(), Some("Item"));
    assert_eq!(body.content_type, "application/json");

    let restock = facts.endpoint("restockSupplier").unwrap();
    assert_eq!(restock.parameters[0].ty, FieldType::Integer);
    let body = restock.request_body.as_ref().unwrap();
    assert!(!body.required);
    assert_eq!(body.schema.as_deref(), Some("RestockSupplierRequest"));
    assert!(facts.schema("RestockSupplierRequest").unwrap().synthesized);
}

#[test]
fn test_guards_per_endpoint() {
    let facts = inventory();
    let guard = |id: &str| guard_for(facts.endpoint(id).unwrap(), &facts);

    assert_eq!(guard("listItems"), GuardTier::Standard);
    assert_eq!(guard("retireItem"), GuardTier::Elevated);
    // Either scheme satisfies it, so a standard credential is enough.
    assert_eq!(guard("restockSupplier"), GuardTier::Standard);
    assert_eq!(guard("status"), GuardTier::None);
    assert!(facts.endpoint("status").unwrap().security.declared);
}

#[test]
fn test_missing_operation_id_is_synthesized() {
    let facts = extract_with(
        r#"openapi: 3.0.3
info: {title: Anonymous Ops, version: "1"}
paths:
  /widgets/{id}/parts:
    get:
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
      responses:
        "200": {description: ok}
"#,
        &ExtractOptions::default(),
    )
    .unwrap();
    assert_eq!(facts.endpoints[0].operation_id, "get_widgets_id_parts");
    assert_eq!(facts.endpoints[0].handler_name, "get_widgets_id_parts");
}

#[test]
fn test_undeclared_template_parameter_is_invalid() {
    let err = extract_with(
        r#"openapi: 3.0.3
info: {title: Bad Template, version: "1"}
paths:
  /widgets/{id}:
    get:
      operationId: getWidget
      responses:
        "200": {description: ok}
"#,
        &ExtractOptions::default(),
    )
    .unwrap_err();
    match err {
        GenerateError::InvalidFact { element, .. } => assert_eq!(element, "getWidget"),
        other => panic!("expected InvalidFact, got {other:?}"),
    }
}
