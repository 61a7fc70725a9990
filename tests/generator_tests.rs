#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::{INVENTORY_API, WIDGET_API};
use common::temp_files::SpecDir;
use ensemble_gen::config::load_generator_config;
use ensemble_gen::generator::{ArtifactBody, Credential, CredentialCase, GuardOutcome, GuardTier};
use ensemble_gen::project::{write_artifacts, WriteAction, WriteOptions};
use ensemble_gen::spec::ParameterLocation;
use ensemble_gen::{generate, ArtifactKind, GeneratorConfig};
use std::collections::BTreeMap;

const PAIRED_KEYS_API: &str = r#"openapi: 3.0.3
info: {title: Paired Keys, version: "1"}
components:
  securitySchemes:
    apiKey: {type: apiKey, in: header, name: X-API-Key}
    clientId: {type: apiKey, in: header, name: X-Client-Id}
    partnerKey: {type: apiKey, in: query, name: partner}
paths:
  /reports:
    get:
      operationId: listReports
      security:
        - apiKey: []
          clientId: []
      responses:
        "200": {description: ok}
"#;

#[test]
fn test_single_endpoint_document() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", WIDGET_API), &GeneratorConfig::default()).unwrap();
    assert!(output.is_clean(), "{:?} {:?}", output.failures, output.discrepancies);

    let model = output.artifacts.get(ArtifactKind::Model, "Widget").unwrap();
    assert_eq!(model.logical_name, "app/models/widget.py");
    let ArtifactBody::Model(spec) = &model.body else {
        panic!("expected a model body");
    };
    assert_eq!(spec.fields.len(), 2);
    assert!(spec.fields[0].required && !spec.fields[0].nullable);
    assert_eq!(spec.fields[1].name, "name");
    assert!(!spec.fields[1].required);
    assert!(spec.fields[1].nullable);
    assert!(model.content.contains("name: Optional[str] = None"));

    let route = output.artifacts.get(ArtifactKind::Route, "getWidget").unwrap();
    let ArtifactBody::Route(spec) = &route.body else {
        panic!("expected a route body");
    };
    assert_eq!(spec.path, "/widgets/{id}");
    assert_eq!(spec.method, "GET");
    assert_eq!(spec.parameters.len(), 1);
    assert_eq!(spec.parameters[0].name, "id");
    assert_eq!(spec.parameters[0].location, ParameterLocation::Path);
    assert_eq!(spec.guard, GuardTier::Standard);

    let suite = output.artifacts.get(ArtifactKind::Test, "getWidget").unwrap();
    assert_eq!(suite.logical_name, "tests/test_get_widget.py");
    let ArtifactBody::Test(spec) = &suite.body else {
        panic!("expected a test body");
    };
    let statuses: Vec<u16> = spec.cases.iter().map(|c| c.expected_status).collect();
    assert_eq!(statuses, vec![200, 401]);
    assert_eq!(
        spec.cases[1].credential,
        CredentialCase::Missing {
            scheme: "apiKey".into()
        }
    );
}

#[test]
fn test_inventory_artifact_inventory() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", INVENTORY_API), &GeneratorConfig::default()).unwrap();
    assert!(output.failures.is_empty(), "{:?}", output.failures);
    assert!(output.discrepancies.is_empty(), "{:?}", output.discrepancies);

    let count = |kind| output.artifacts.of_kind(kind).count();
    let schemas = output.facts.schemas.len();
    let entities = output.facts.schemas.iter().filter(|s| s.is_entity()).count();
    assert_eq!(count(ArtifactKind::Model), schemas);
    assert_eq!(count(ArtifactKind::Persistence), entities + 1);
    assert_eq!(count(ArtifactKind::Crud), entities + 1);
    assert_eq!(count(ArtifactKind::Sync), entities);
    // One route per endpoint plus the application entry module.
    assert_eq!(count(ArtifactKind::Route), 6);
    assert_eq!(count(ArtifactKind::Test), 5);
    assert_eq!(count(ArtifactKind::Auth), 2);
    assert!(output.artifacts.get(ArtifactKind::Auth, "standard").is_some());
    assert!(output.artifacts.get(ArtifactKind::Auth, "elevated").is_some());
}

#[test]
fn test_item_table_links_supplier() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", INVENTORY_API), &GeneratorConfig::default()).unwrap();

    let table = output.artifacts.get(ArtifactKind::Persistence, "Item").unwrap();
    let ArtifactBody::Persistence(spec) = &table.body else {
        panic!("expected a persistence body");
    };
    assert_eq!(spec.primary_key, "sku");
    let fk = spec.columns.iter().find(|c| c.name == "supplier_id").unwrap();
    assert_eq!(fk.foreign_key.as_deref(), Some("supplier.id"));
    assert!(fk.nullable);
    let rel = spec.relationships.iter().find(|r| r.name == "supplier").unwrap();
    assert_eq!(rel.target, "Supplier");
    assert!(!rel.many);
}

#[test]
fn test_elevated_route_and_cases() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", INVENTORY_API), &GeneratorConfig::default()).unwrap();

    let route = output.artifacts.get(ArtifactKind::Route, "retireItem").unwrap();
    assert!(route.content.contains("from ..auth.elevated import require_elevated"));
    assert!(route.content.contains("\"/api/items/{sku}\""));

    let suite = output.artifacts.get(ArtifactKind::Test, "retireItem").unwrap();
    let ArtifactBody::Test(spec) = &suite.body else {
        panic!("expected a test body");
    };
    let cases: Vec<(&str, u16)> = spec
        .cases
        .iter()
        .map(|c| (c.name.as_str(), c.expected_status))
        .collect();
    assert_eq!(
        cases,
        vec![
            ("test_retire_item_success", 204),
            ("test_retire_item_missing_ops_token", 401),
            ("test_retire_item_ops_token_rejects_standard", 403),
        ]
    );

    let anonymous = output.artifacts.get(ArtifactKind::Route, "status").unwrap();
    let ArtifactBody::Route(spec) = &anonymous.body else {
        panic!("expected a route body");
    };
    assert_eq!(spec.guard, GuardTier::None);
}

#[test]
fn test_app_entry_wires_every_route() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", INVENTORY_API), &GeneratorConfig::default()).unwrap();

    let app = output.artifacts.get(ArtifactKind::Route, "(app)").unwrap();
    assert_eq!(app.logical_name, "app/main.py");
    let ArtifactBody::App(spec) = &app.body else {
        panic!("expected an app body");
    };
    assert_eq!(spec.title, "Inventory Service");
    assert_eq!(spec.version, "2.1.0");
    let handlers: Vec<&str> = output.facts.endpoints.iter().map(|e| e.handler_name.as_str()).collect();
    assert_eq!(spec.routers, handlers);

    assert!(app.content.contains("title=\"Inventory Service\""));
    assert!(app.content.contains("version=\"2.1.0\""));
    let positions: Vec<usize> = handlers
        .iter()
        .map(|h| app.content.find(&format!("app.include_router({h}_router)")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_and_security_group_end_to_end() {
    let dir = SpecDir::new();
    let output = generate(&dir.source("openapi.yaml", PAIRED_KEYS_API), &GeneratorConfig::default()).unwrap();
    assert!(output.is_clean(), "{:?} {:?}", output.failures, output.discrepancies);
    let both = vec![vec!["apiKey".to_string(), "clientId".to_string()]];
    assert_eq!(output.facts.endpoint("listReports").unwrap().security.alternatives, both);

    let route = output.artifacts.get(ArtifactKind::Route, "listReports").unwrap();
    let ArtifactBody::Route(spec) = &route.body else {
        panic!("expected a route body");
    };
    assert_eq!(spec.guard, GuardTier::Standard);
    assert_eq!(spec.security, both);
    assert!(route
        .content
        .contains("dependencies=[Depends(require_standard([[\"apiKey\", \"clientId\"]]))]"));
    assert!(!route.content.contains("partnerKey"));

    let auth = output.artifacts.get(ArtifactKind::Auth, "standard").unwrap();
    assert!(auth.content.contains("\"clientId\": (\"header\", \"X-Client-Id\", \"\"),"));
    assert!(auth.content.contains("def require_standard("));
    let ArtifactBody::Auth(guard) = &auth.body else {
        panic!("expected an auth body");
    };
    let secret = |_: &str| Some("k".to_string());
    let key = Credential { scheme: "apiKey", value: "k" };
    let client = Credential { scheme: "clientId", value: "k" };
    let partner = Credential { scheme: "partnerKey", value: "k" };
    assert_eq!(guard.check(&spec.security, &[key], secret), GuardOutcome::Unauthorized);
    assert_eq!(guard.check(&spec.security, &[partner], secret), GuardOutcome::Unauthorized);
    assert_eq!(guard.check(&spec.security, &[key, client], secret), GuardOutcome::Allowed);

    let suite = output.artifacts.get(ArtifactKind::Test, "listReports").unwrap();
    let ArtifactBody::Test(tests) = &suite.body else {
        panic!("expected a test body");
    };
    let cases: Vec<(&str, u16, Vec<&str>)> = tests
        .cases
        .iter()
        .map(|c| {
            let presented = c.presented.iter().map(String::as_str).collect();
            (c.name.as_str(), c.expected_status, presented)
        })
        .collect();
    assert_eq!(
        cases,
        vec![
            ("test_list_reports_success", 200, vec!["apiKey", "clientId"]),
            ("test_list_reports_missing_api_key", 401, vec!["clientId"]),
            ("test_list_reports_missing_client_id", 401, vec!["apiKey"]),
        ]
    );
    assert!(suite
        .content
        .contains("headers={\"X-API-Key\": STANDARD_SECRET, \"X-Client-Id\": STANDARD_SECRET}"));
    assert!(suite.content.contains("headers={\"X-Client-Id\": STANDARD_SECRET}"));
}

#[test]
fn test_generation_is_deterministic() {
    let dir = SpecDir::new();
    let source = dir.source("openapi.yaml", INVENTORY_API);
    let fingerprints = || -> BTreeMap<String, String> {
        generate(&source, &GeneratorConfig::default())
            .unwrap()
            .artifacts
            .iter()
            .map(|a| (a.key.to_string(), a.fingerprint.clone()))
            .collect()
    };
    assert_eq!(fingerprints(), fingerprints());
}

#[test]
fn test_rewrite_leaves_unchanged_files_alone() {
    let dir = SpecDir::new();
    let source = dir.source("openapi.yaml", INVENTORY_API);
    let out = dir.path().join("service");
    let output = generate(&source, &GeneratorConfig::default()).unwrap();

    let first = write_artifacts(&output.artifacts, &out, WriteOptions::default()).unwrap();
    assert!(first.created() >= output.artifacts.len());
    assert_eq!(first.skipped(), 0);

    let again = generate(&source, &GeneratorConfig::default()).unwrap();
    let second = write_artifacts(&again.artifacts, &out, WriteOptions::default()).unwrap();
    assert_eq!(second.created(), 0);
    assert_eq!(second.overwritten(), 0);
    assert_eq!(second.skipped(), 0);
    assert!(second
        .files
        .iter()
        .filter(|f| f.key.is_some())
        .all(|f| f.action == WriteAction::Unchanged));
}

#[test]
fn test_config_file_next_to_spec() {
    let dir = SpecDir::new();
    let source = dir.source("openapi.yaml", INVENTORY_API);
    dir.write(
        "ensemble-gen.toml",
        "package = \"inventory\"\nemitters = [\"model\", \"route\"]\n",
    );

    let config = load_generator_config(None, &source).unwrap();
    assert_eq!(config.package, "inventory");
    let output = generate(&source, &config).unwrap();

    assert!(output.artifacts.iter().all(|a| matches!(
        a.key.kind,
        ArtifactKind::Model | ArtifactKind::Route
    )));
    assert!(output
        .artifacts
        .of_kind(ArtifactKind::Route)
        .filter(|a| matches!(a.body, ArtifactBody::Route(_)))
        .all(|a| a.logical_name.starts_with("inventory/routes/")));
    let app = output.artifacts.get(ArtifactKind::Route, "(app)").unwrap();
    assert_eq!(app.logical_name, "inventory/main.py");
    assert!(output.discrepancies.is_empty(), "{:?}", output.discrepancies);
}
