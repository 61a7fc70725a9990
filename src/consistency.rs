//! # Consistency Validator
//!
//! Cross-checks emitted artifacts against the facts they were derived from.
//!
//! ## Checks Performed
//!
//! 1. **Endpoint coverage** - every endpoint has a Route artifact and every
//!    Route artifact names a known endpoint
//! 2. **Route binding** - method, path and parameter list match the endpoint
//! 3. **Security** - the route guard and the alternatives it is bound to
//!    match the endpoint's security requirement
//! 4. **Model fields** - every field is declared with the nullability,
//!    requiredness and type its schema calls for
//!
//! Findings are advisory. Nothing is repaired and the output order is
//! deterministic: by key (operation id or schema name), then kind.

use crate::generator::{guard_for, ArtifactBody, ArtifactKind, ArtifactSet, GuardTier, ModelSpec, RouteSpec};
use crate::spec::{EndpointDescriptor, FactSet, FieldSpec, SchemaNode};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of mismatch between artifacts and facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscrepancyKind {
    /// An endpoint has no Route artifact
    MissingEndpoint,
    /// A Route artifact has no endpoint
    ExtraEndpoint,
    /// Fields or parameters differ
    FieldMismatch,
    /// The route guard differs from the endpoint's security
    SecurityMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingEndpoint => "missing_endpoint",
            DiscrepancyKind::ExtraEndpoint => "extra_endpoint",
            DiscrepancyKind::FieldMismatch => "field_mismatch",
            DiscrepancyKind::SecurityMismatch => "security_mismatch",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One advisory finding
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Discrepancy {
    /// Operation id or schema name
    pub key: String,
    pub kind: DiscrepancyKind,
    pub detail: String,
}

impl Discrepancy {
    fn new(kind: DiscrepancyKind, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Discrepancy {
            key: key.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.key, self.detail)
    }
}

/// Check every artifact kind the validator knows about
pub fn validate_artifacts(artifacts: &ArtifactSet, facts: &FactSet) -> Vec<Discrepancy> {
    validate_kinds(artifacts, facts, &ArtifactKind::ALL)
}

/// Check only the artifact kinds in `kinds`
///
/// Routes cover endpoints and security; models cover schema fields. Kinds
/// that were never emitted are left out so a partial run is not reported as
/// missing everything.
pub fn validate_kinds(artifacts: &ArtifactSet, facts: &FactSet, kinds: &[ArtifactKind]) -> Vec<Discrepancy> {
    let mut found = Vec::new();
    if kinds.contains(&ArtifactKind::Route) {
        check_routes(artifacts, facts, &mut found);
    }
    if kinds.contains(&ArtifactKind::Model) {
        check_models(artifacts, facts, &mut found);
    }
    found.sort();
    found.dedup();
    found
}

fn check_routes(artifacts: &ArtifactSet, facts: &FactSet, found: &mut Vec<Discrepancy>) {
    let routes: BTreeMap<&str, &RouteSpec> = artifacts
        .of_kind(ArtifactKind::Route)
        .filter_map(|a| match &a.body {
            ArtifactBody::Route(spec) => Some((a.key.source_id.as_str(), spec)),
            _ => None,
        })
        .collect();

    for endpoint in &facts.endpoints {
        match routes.get(endpoint.operation_id.as_str()) {
            None => found.push(Discrepancy::new(
                DiscrepancyKind::MissingEndpoint,
                &endpoint.operation_id,
                format!("{} {} has no route", endpoint.method, endpoint.path),
            )),
            Some(route) => compare_route(endpoint, route, facts, found),
        }
    }
    for (id, route) in &routes {
        if facts.endpoint(id).is_none() {
            found.push(Discrepancy::new(
                DiscrepancyKind::ExtraEndpoint,
                *id,
                format!("route {} {} matches no endpoint", route.method, route.path),
            ));
        }
    }
}

fn compare_route(endpoint: &EndpointDescriptor, route: &RouteSpec, facts: &FactSet, found: &mut Vec<Discrepancy>) {
    let key = &endpoint.operation_id;
    if route.method != endpoint.method.as_str() || route.path != endpoint.path {
        found.push(Discrepancy::new(
            DiscrepancyKind::FieldMismatch,
            key,
            format!(
                "route binds {} {}, endpoint is {} {}",
                route.method, route.path, endpoint.method, endpoint.path
            ),
        ));
    }

    let expected: BTreeSet<(String, &str, bool)> = endpoint
        .parameters
        .iter()
        .map(|p| (p.name.clone(), p.location.as_str(), p.required))
        .collect();
    let actual: BTreeSet<(String, &str, bool)> = route
        .parameters
        .iter()
        .map(|p| (p.name.clone(), p.location.as_str(), p.required))
        .collect();
    for (name, location, _) in expected.difference(&actual) {
        found.push(Discrepancy::new(
            DiscrepancyKind::FieldMismatch,
            key,
            format!("{location} parameter '{name}' is not bound by the route"),
        ));
    }
    for (name, location, _) in actual.difference(&expected) {
        found.push(Discrepancy::new(
            DiscrepancyKind::FieldMismatch,
            key,
            format!("route binds undeclared {location} parameter '{name}'"),
        ));
    }

    let guard = guard_for(endpoint, facts);
    if route.guard != guard {
        found.push(Discrepancy::new(
            DiscrepancyKind::SecurityMismatch,
            key,
            format!("route guard is {}, security requires {guard}", route.guard),
        ));
    }
    let alternatives: &[Vec<String>] = match guard {
        GuardTier::None => &[],
        _ => &endpoint.security.alternatives,
    };
    if route.security != alternatives {
        found.push(Discrepancy::new(
            DiscrepancyKind::SecurityMismatch,
            key,
            format!(
                "route accepts {:?}, security requires {:?}",
                route.security, alternatives
            ),
        ));
    }
}

fn check_models(artifacts: &ArtifactSet, facts: &FactSet, found: &mut Vec<Discrepancy>) {
    for schema in &facts.schemas {
        match artifacts.get(ArtifactKind::Model, &schema.name).map(|a| &a.body) {
            Some(ArtifactBody::Model(model)) => compare_model(schema, model, found),
            _ => found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                &schema.name,
                "schema has no model",
            )),
        }
    }
    for artifact in artifacts.of_kind(ArtifactKind::Model) {
        if facts.schema(&artifact.key.source_id).is_none() {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                &artifact.key.source_id,
                "model has no schema",
            ));
        }
    }
}

/// Nullability and requiredness a field's model attribute must declare
///
/// Required and non-nullable fields are plain attributes; anything else is
/// `Optional[...]`. An attribute is required when it has no default.
fn expected_shape(field: &FieldSpec) -> (bool, bool) {
    let nullable = field.is_optional();
    (nullable, !nullable && field.default.is_none())
}

fn compare_model(schema: &SchemaNode, model: &ModelSpec, found: &mut Vec<Discrepancy>) {
    let key = &schema.name;
    let expected: &[FieldSpec] = if schema.is_union() || schema.alias.is_some() {
        &[]
    } else {
        &schema.fields
    };
    for field in expected {
        let Some(emitted) = model.fields.iter().find(|f| f.name == field.name) else {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                key,
                format!("field '{}' is missing from the model", field.name),
            ));
            continue;
        };
        let (nullable, required) = expected_shape(field);
        if emitted.nullable != nullable {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                key,
                format!("field '{}' nullability differs", field.name),
            ));
        }
        if emitted.required != required {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                key,
                format!("field '{}' requiredness differs", field.name),
            ));
        }
        if emitted.ty != field.ty {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                key,
                format!("field '{}' type differs", field.name),
            ));
        }
    }
    for emitted in &model.fields {
        if !expected.iter().any(|f| f.name == emitted.name) {
            found.push(Discrepancy::new(
                DiscrepancyKind::FieldMismatch,
                key,
                format!("model has unexpected field '{}'", emitted.name),
            ));
        }
    }
}
