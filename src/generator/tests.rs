#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::error::WarningKind;
use crate::spec::{
    extract_facts, resolve_document, ExtractOptions, FieldType, LoaderOptions, ParameterLocation,
    SourceLocation, SpecDocument,
};

fn facts(yaml: &str) -> FactSet {
    let document = SpecDocument::parse(yaml, SourceLocation::parse("inline.yaml")).unwrap();
    let resolved = resolve_document(document, &LoaderOptions::default()).unwrap();
    extract_facts(&resolved, &ExtractOptions::default()).unwrap()
}

fn emit_all(facts: &FactSet) -> EmitOutcome {
    emit_artifacts(facts, &EmitContext::default(), &ArtifactKind::ALL)
}

const SINGLE_WIDGET: &str = r#"
openapi: 3.0.3
info: {title: Widgets, version: "1.0"}
components:
  securitySchemes:
    apiKey: {type: apiKey, in: header, name: X-API-Key}
  schemas:
    Widget:
      type: object
      required: [id]
      properties:
        id: {type: string}
        name: {type: string}
paths:
  /widgets/{id}:
    get:
      operationId: getWidget
      security:
        - apiKey: []
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Widget'}
"#;

const STORE: &str = r#"
openapi: 3.1.0
info: {title: Widget Store, version: "2.0"}
servers:
  - url: https://api.example.com/v1
components:
  securitySchemes:
    apiKey: {type: apiKey, in: header, name: X-API-Key}
    adminToken: {type: http, scheme: bearer}
  schemas:
    Part:
      type: object
      required: [sku]
      properties:
        sku: {type: string, x-primary-key: true}
        weight: {type: number}
    Widget:
      type: object
      required: [id, label]
      properties:
        id: {type: integer}
        label: {type: string, maxLength: 40}
        main_part: {$ref: '#/components/schemas/Part'}
        parts:
          type: array
          items: {$ref: '#/components/schemas/Part'}
        attributes:
          type: object
          additionalProperties: {type: string}
    Shape:
      oneOf:
        - $ref: '#/components/schemas/Part'
        - $ref: '#/components/schemas/Widget'
security:
  - apiKey: []
paths:
  /widgets:
    get:
      operationId: listWidgets
      parameters:
        - {name: limit, in: query, required: true, schema: {type: integer}}
        - {name: X-Trace, in: header, schema: {type: string}}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: array
                items: {$ref: '#/components/schemas/Widget'}
    post:
      operationId: createWidget
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Widget'}
      responses:
        "201": {description: created}
        "422": {description: invalid}
  /widgets/{id}:
    delete:
      operationId: deleteWidget
      security:
        - adminToken: []
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
      responses:
        "204": {description: gone}
  /health:
    get:
      operationId: health
      security: []
      responses:
        "200": {description: ok}
"#;

#[test]
fn test_single_widget_artifacts() {
    let facts = facts(SINGLE_WIDGET);
    let outcome = emit_all(&facts);
    assert!(outcome.failures.is_empty());
    let set = &outcome.artifacts;

    let model = set.get(ArtifactKind::Model, "Widget").unwrap();
    let ArtifactBody::Model(spec) = &model.body else {
        panic!("expected a model body");
    };
    assert_eq!(spec.fields.len(), 2);
    let id = spec.fields.iter().find(|f| f.name == "id").unwrap();
    assert!(id.required && !id.nullable);
    let name = spec.fields.iter().find(|f| f.name == "name").unwrap();
    assert!(!name.required);
    assert!(name.nullable);
    assert!(model.content.contains("id: str\n"));
    assert!(model.content.contains("name: Optional[str] = None"));

    let route = set.get(ArtifactKind::Route, "getWidget").unwrap();
    let ArtifactBody::Route(spec) = &route.body else {
        panic!("expected a route body");
    };
    assert_eq!(spec.path, "/widgets/{id}");
    assert_eq!(spec.parameters.len(), 1);
    assert_eq!(spec.parameters[0].name, "id");
    assert_eq!(spec.parameters[0].location, ParameterLocation::Path);
    assert_eq!(spec.guard, GuardTier::Standard);
    assert_eq!(spec.response_model.as_deref(), Some("Widget"));
    assert!(route.content.contains("dependencies=[Depends(require_standard([[\"apiKey\"]]))]"));
    assert!(route.content.contains("from ..models.widget import Widget"));

    let suite = set.get(ArtifactKind::Test, "getWidget").unwrap();
    let ArtifactBody::Test(spec) = &suite.body else {
        panic!("expected a test body");
    };
    let statuses: Vec<u16> = spec.cases.iter().map(|c| c.expected_status).collect();
    assert_eq!(statuses, vec![200, 401]);
    assert!(suite.content.contains("URL = \"/widgets/example\""));
    assert!(suite.content.contains("headers={\"X-API-Key\": STANDARD_SECRET}"));
}

#[test]
fn test_unsupported_format_warns_but_emits_model() {
    let yaml = r#"
openapi: 3.0.3
info: {title: Gadgets, version: "1"}
components:
  schemas:
    Gadget:
      type: object
      properties:
        serial: {type: string, format: x-serial}
        size: {type: integer}
paths: {}
"#;
    let outcome = emit_all(&facts(yaml));
    let model = outcome.artifacts.get(ArtifactKind::Model, "Gadget").unwrap();
    assert!(model.content.contains("serial: Optional[str] = None"));
    assert!(model.content.contains("size: Optional[int] = None"));
    assert_eq!(model.warnings.len(), 1);
    assert_eq!(model.warnings[0].kind, WarningKind::UnsupportedConstraint);
    assert_eq!(model.warnings[0].element, "Gadget.serial");
    assert_eq!(outcome.artifacts.warnings().count(), 1);
}

#[test]
fn test_persistence_mapping() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let set = &outcome.artifacts;

    assert!(set.get(ArtifactKind::Persistence, "Shape").is_none());
    assert!(set.get(ArtifactKind::Persistence, "(base)").is_some());

    let widget = set.get(ArtifactKind::Persistence, "Widget").unwrap();
    let ArtifactBody::Persistence(table) = &widget.body else {
        panic!("expected a table body");
    };
    assert_eq!(table.table, "widget");
    assert_eq!(table.primary_key, "id");
    let column = |name: &str| table.columns.iter().find(|c| c.name == name).unwrap();
    assert!(column("id").primary_key);
    assert_eq!(column("label").sql_type, "String(40)");
    assert_eq!(column("main_part_id").foreign_key.as_deref(), Some("part.sku"));
    assert_eq!(column("attributes").sql_type, "JSON");
    let many: Vec<_> = table.relationships.iter().filter(|r| r.many).collect();
    assert_eq!(many.len(), 1);
    assert_eq!(many[0].name, "parts");
    assert!(widget.content.contains("secondary=widget_parts"));

    let part = set.get(ArtifactKind::Persistence, "Part").unwrap();
    let ArtifactBody::Persistence(table) = &part.body else {
        panic!("expected a table body");
    };
    assert_eq!(table.primary_key, "sku");
}

#[test]
fn test_synthesized_primary_key() {
    let facts = facts(
        &SINGLE_WIDGET
            .replace("id: {type: string}", "code: {type: string}")
            .replace("required: [id]", "required: [code]"),
    );
    let outcome = emit_all(&facts);
    let widget = outcome.artifacts.get(ArtifactKind::Persistence, "Widget").unwrap();
    assert!(widget
        .content
        .contains("id = Column(Integer, primary_key=True, autoincrement=True)"));
}

#[test]
fn test_crud_and_sync_per_entity() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let set = &outcome.artifacts;

    let crud = set.get(ArtifactKind::Crud, "Part").unwrap();
    let ArtifactBody::Crud(spec) = &crud.body else {
        panic!("expected a crud body");
    };
    assert_eq!(spec.functions[0], "create_part");
    assert_eq!(spec.functions[2], "list_parts");
    assert!(crud.content.contains("def get_part(session: Session, sku: str)"));
    assert!(set.get(ArtifactKind::Crud, "(support)").is_some());
    assert!(set.get(ArtifactKind::Crud, "Shape").is_none());

    let sync = set.get(ArtifactKind::Sync, "Widget").unwrap();
    let ArtifactBody::Sync(spec) = &sync.body else {
        panic!("expected a sync body");
    };
    assert_eq!(spec.indexed_fields, vec!["id", "label"]);
    assert!(sync.content.contains("def upsert_widget("));
}

#[test]
fn test_guards_follow_security() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let guard = |op: &str| match &outcome.artifacts.get(ArtifactKind::Route, op).unwrap().body {
        ArtifactBody::Route(spec) => spec.guard,
        _ => panic!("expected a route body"),
    };
    assert_eq!(guard("listWidgets"), GuardTier::Standard);
    assert_eq!(guard("deleteWidget"), GuardTier::Elevated);
    assert_eq!(guard("health"), GuardTier::None);

    let health = outcome.artifacts.get(ArtifactKind::Route, "health").unwrap();
    assert!(!health.content.contains("Depends(require_"));

    let auth: Vec<_> = outcome.artifacts.of_kind(ArtifactKind::Auth).collect();
    assert_eq!(auth.len(), 2);
    let elevated = outcome.artifacts.get(ArtifactKind::Auth, "elevated").unwrap();
    assert!(elevated.content.contains("ENSEMBLE_ELEVATED_SECRET"));
    assert!(elevated.content.contains("HTTP_403_FORBIDDEN"));
}

#[test]
fn test_route_binds_base_path_and_parameters() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let list = outcome.artifacts.get(ArtifactKind::Route, "listWidgets").unwrap();
    assert_eq!(list.logical_name, "app/routes/list_widgets.py");
    assert!(list.content.contains("@router.get(\n    \"/v1/widgets\","));
    assert!(list.content.contains("limit: int = Query(...)"));
    assert!(list.content.contains("x_trace: Optional[str] = Header(None, alias=\"X-Trace\")"));
    assert!(list.content.contains("response_model=List[Widget]"));

    let create = outcome.artifacts.get(ArtifactKind::Route, "createWidget").unwrap();
    assert!(create.content.contains("payload: Widget = Body(...)"));
    assert!(create.content.contains("status_code=201"));
}

#[test]
fn test_elevated_cases_include_forbidden() {
    let facts = facts(STORE);
    let delete = facts.endpoint("deleteWidget").unwrap();
    let cases = test_cases(delete, &facts);
    let summary: Vec<(&str, u16)> = cases.iter().map(|c| (c.name.as_str(), c.expected_status)).collect();
    assert_eq!(
        summary,
        vec![
            ("test_delete_widget_success", 204),
            ("test_delete_widget_missing_admin_token", 401),
            ("test_delete_widget_admin_token_rejects_standard", 403),
        ]
    );

    let create = facts.endpoint("createWidget").unwrap();
    let statuses: Vec<u16> = test_cases(create, &facts).iter().map(|c| c.expected_status).collect();
    assert_eq!(statuses, vec![201, 401, 422]);

    let health = facts.endpoint("health").unwrap();
    assert_eq!(test_cases(health, &facts).len(), 1);
}

#[test]
fn test_forbidden_case_presents_standard_credential() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let suite = outcome.artifacts.get(ArtifactKind::Test, "deleteWidget").unwrap();
    assert!(suite
        .content
        .contains("headers={\"Authorization\": \"Bearer \" + ELEVATED_SECRET}"));
    assert!(suite.content.contains("headers={\"X-API-Key\": STANDARD_SECRET}"));
    assert!(suite.content.contains("URL = \"/v1/widgets/42\""));
}

#[test]
fn test_emission_is_deterministic() {
    let facts = facts(STORE);
    let first = emit_all(&facts);
    let second = emit_all(&facts);
    assert_eq!(first.artifacts, second.artifacts);
    let fingerprints: Vec<_> = first.artifacts.iter().map(|a| a.fingerprint.clone()).collect();
    let again: Vec<_> = second.artifacts.iter().map(|a| a.fingerprint.clone()).collect();
    assert_eq!(fingerprints, again);
}

#[test]
fn test_enabled_kinds_filter_emitters() {
    let facts = facts(STORE);
    let outcome = emit_artifacts(&facts, &EmitContext::default(), &[ArtifactKind::Model]);
    assert!(outcome.artifacts.iter().all(|a| a.key.kind == ArtifactKind::Model));
    assert_eq!(outcome.artifacts.len(), facts.schemas.len());
}

fn failing_emit(_: &FactSet, _: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    anyhow::bail!("template exploded")
}

fn panicking_emit(_: &FactSet, _: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    panic!("emitter bug")
}

#[test]
fn test_failures_are_isolated() {
    let facts = facts(SINGLE_WIDGET);
    let emitters: [(ArtifactKind, EmitFn); 3] = [
        (ArtifactKind::Model, EMITTERS[0].1),
        (ArtifactKind::Crud, failing_emit),
        (ArtifactKind::Sync, panicking_emit),
    ];
    let outcome = run_emitters(&facts, &EmitContext::default(), &emitters);
    assert!(outcome.artifacts.get(ArtifactKind::Model, "Widget").is_some());
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.failures[0].kind, ArtifactKind::Crud);
    assert_eq!(outcome.failures[0].reason, "template exploded");
    assert_eq!(outcome.failures[1].kind, ArtifactKind::Sync);
    assert!(outcome.failures[1].reason.contains("emitter bug"));
}

#[test]
fn test_union_model_is_alias() {
    let facts = facts(STORE);
    let outcome = emit_all(&facts);
    let shape = outcome.artifacts.get(ArtifactKind::Model, "Shape").unwrap();
    assert!(shape.content.contains("Shape = Union[Part, Widget]"));
    assert!(shape.content.contains("from .part import Part"));
    let ArtifactBody::Model(spec) = &shape.body else {
        panic!("expected a model body");
    };
    assert_eq!(spec.union_members, vec!["Part", "Widget"]);
    assert!(matches!(
        facts.schema("Widget").unwrap().field("parts").unwrap().ty,
        FieldType::Array(_)
    ));
}
