#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::fixtures::INVENTORY_API;
use common::temp_files::SpecDir;
use ensemble_gen::generator::{ArtifactBody, GuardTier, RouteParameter};
use ensemble_gen::spec::ParameterLocation;
use ensemble_gen::{generate, validate_artifacts, ArtifactKind, DiscrepancyKind, GenerationOutput, GeneratorConfig};

fn inventory_output() -> GenerationOutput {
    let dir = SpecDir::new();
    generate(&dir.source("openapi.yaml", INVENTORY_API), &GeneratorConfig::default()).unwrap()
}

#[test]
fn test_fresh_generation_has_no_discrepancies() {
    let output = inventory_output();
    assert!(validate_artifacts(&output.artifacts, &output.facts).is_empty());
}

#[test]
fn test_removed_route_is_missing_endpoint() {
    let mut output = inventory_output();
    output.artifacts.remove(ArtifactKind::Route, "createItem").unwrap();

    let found = validate_artifacts(&output.artifacts, &output.facts);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, DiscrepancyKind::MissingEndpoint);
    assert_eq!(found[0].key, "createItem");
}

#[test]
fn test_route_for_unknown_endpoint_is_extra() {
    let mut output = inventory_output();
    let mut stray = output.artifacts.get(ArtifactKind::Route, "status").cloned().unwrap();
    stray.key.source_id = "ghostOperation".to_string();
    output.artifacts.insert(stray);

    let found = validate_artifacts(&output.artifacts, &output.facts);
    assert!(found
        .iter()
        .any(|d| d.kind == DiscrepancyKind::ExtraEndpoint && d.key == "ghostOperation"));
}

#[test]
fn test_tampered_route_reports_field_and_security_mismatch() {
    let mut output = inventory_output();
    let mut route = output.artifacts.get(ArtifactKind::Route, "retireItem").cloned().unwrap();
    if let ArtifactBody::Route(spec) = &mut route.body {
        spec.guard = GuardTier::Standard;
        spec.parameters.push(RouteParameter {
            name: "verbose".into(),
            location: ParameterLocation::Query,
            required: false,
        });
    }
    output.artifacts.insert(route);

    let found = validate_artifacts(&output.artifacts, &output.facts);
    let kinds: Vec<DiscrepancyKind> = found.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiscrepancyKind::FieldMismatch), "{found:?}");
    assert!(kinds.contains(&DiscrepancyKind::SecurityMismatch), "{found:?}");
    assert!(found.iter().all(|d| d.key == "retireItem"));
}

#[test]
fn test_model_missing_field_is_reported() {
    let mut output = inventory_output();
    let mut model = output.artifacts.get(ArtifactKind::Model, "Item").cloned().unwrap();
    if let ArtifactBody::Model(spec) = &mut model.body {
        spec.fields.retain(|f| f.name != "tags");
    }
    output.artifacts.insert(model);

    let found = validate_artifacts(&output.artifacts, &output.facts);
    assert_eq!(found.len(), 1, "{found:?}");
    assert_eq!(found[0].kind, DiscrepancyKind::FieldMismatch);
    assert_eq!(found[0].key, "Item");
    assert!(found[0].detail.contains("tags"));
}

#[test]
fn test_findings_are_sorted_by_key() {
    let mut output = inventory_output();
    output.artifacts.remove(ArtifactKind::Route, "status").unwrap();
    output.artifacts.remove(ArtifactKind::Route, "listItems").unwrap();

    let keys: Vec<String> = validate_artifacts(&output.artifacts, &output.facts)
        .into_iter()
        .map(|d| d.key)
        .collect();
    assert_eq!(keys, vec!["listItems".to_string(), "status".to_string()]);
}
