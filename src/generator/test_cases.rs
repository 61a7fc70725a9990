use super::artifact::{ArtifactBody, ArtifactKind, CredentialCase, GeneratedArtifact, TestCase, TestSuiteSpec};
use super::auth::{guard_for, CredentialSource, GuardTier};
use super::python::{py_docstring, py_literal, py_string};
use super::routes::{parameter_variable, served_path};
use super::sample::{sample_parameter, sample_value};
use super::templates::{TestCaseLines, TestTemplate};
use super::EmitContext;
use crate::naming::to_snake_case;
use crate::spec::{EndpointDescriptor, FactSet, ParameterLocation, SchemeTier};
use askama::Template;
use serde_json::Value;

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    facts
        .endpoints
        .iter()
        .map(|endpoint| emit_suite(endpoint, facts, ctx))
        .collect()
}

/// Cases generated for one endpoint, in emission order
///
/// The success case presents every scheme of one alternative the guard
/// accepts. A missing-credential case drops one scheme from that alternative;
/// when what remains would still pass (or, behind the elevated guard, would
/// earn a 403), the case presents nothing instead.
pub fn test_cases(endpoint: &EndpointDescriptor, facts: &FactSet) -> Vec<TestCase> {
    let handler = &endpoint.handler_name;
    let guard = guard_for(endpoint, facts);
    let valid = valid_group(endpoint, facts, guard);
    let mut cases = vec![TestCase {
        name: format!("test_{handler}_success"),
        expected_status: endpoint.success_status(),
        credential: CredentialCase::Valid,
        presented: valid.clone(),
    }];

    if guard != GuardTier::None {
        let first_standard = facts
            .schemes_of_tier(SchemeTier::Standard)
            .next()
            .map(|scheme| scheme.name.clone());
        for scheme in endpoint.security.accepted_schemes() {
            let snake = to_snake_case(scheme);
            let remainder: Vec<String> = valid.iter().filter(|s| s.as_str() != scheme).cloned().collect();
            let earns_forbidden =
                guard == GuardTier::Elevated && remainder.iter().any(|s| !facts.is_elevated(s));
            let presented = if satisfies(&endpoint.security.alternatives, &remainder) || earns_forbidden {
                Vec::new()
            } else {
                remainder
            };
            cases.push(TestCase {
                name: format!("test_{handler}_missing_{snake}"),
                expected_status: 401,
                credential: CredentialCase::Missing {
                    scheme: scheme.to_string(),
                },
                presented,
            });
            if guard == GuardTier::Elevated && facts.is_elevated(scheme) {
                if let Some(standard) = &first_standard {
                    cases.push(TestCase {
                        name: format!("test_{handler}_{snake}_rejects_standard"),
                        expected_status: 403,
                        credential: CredentialCase::StandardOnly {
                            scheme: scheme.to_string(),
                        },
                        presented: vec![standard.clone()],
                    });
                }
            }
        }
    }

    for status in endpoint.error_statuses() {
        cases.push(TestCase {
            name: format!("test_{handler}_status_{status}"),
            expected_status: status,
            credential: CredentialCase::Valid,
            presented: valid.clone(),
        });
    }
    cases
}

/// Schemes of the first alternative the endpoint's guard lets through
fn valid_group(endpoint: &EndpointDescriptor, facts: &FactSet, guard: GuardTier) -> Vec<String> {
    let alternatives = &endpoint.security.alternatives;
    let group = match guard {
        GuardTier::None => None,
        GuardTier::Standard => alternatives
            .iter()
            .find(|group| group.iter().all(|s| !facts.is_elevated(s)))
            .or_else(|| alternatives.first()),
        GuardTier::Elevated => alternatives.first(),
    };
    group.cloned().unwrap_or_default()
}

fn satisfies(alternatives: &[Vec<String>], presented: &[String]) -> bool {
    alternatives
        .iter()
        .any(|group| group.iter().all(|s| presented.contains(s)))
}

/// Python dict literals for params, headers and cookies
#[derive(Default)]
struct RequestParts {
    params: Vec<String>,
    headers: Vec<String>,
    cookies: Vec<String>,
}

impl RequestParts {
    fn push(&mut self, location: &str, key: &str, value: String) {
        let entry = format!("{}: {value}", py_string(key));
        match location {
            "query" => self.params.push(entry),
            "cookie" => self.cookies.push(entry),
            _ => self.headers.push(entry),
        }
    }

    fn push_credential(&mut self, source: &CredentialSource, secret: &str) {
        let value = match source.prefix {
            Some(prefix) => format!("{} + {secret}", py_string(prefix)),
            None => secret.to_string(),
        };
        self.push(source.location, &source.parameter_name, value);
    }
}

fn dict(entries: &[String]) -> String {
    format!("{{{}}}", entries.join(", "))
}

fn url_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn emit_suite(endpoint: &EndpointDescriptor, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let mut url = served_path(endpoint, facts);
    let mut base = RequestParts::default();
    for param in &endpoint.parameters {
        let sample = sample_parameter(param, facts);
        match param.location {
            ParameterLocation::Path => {
                let placeholder = format!("{{{}}}", parameter_variable(&param.name));
                url = url.replace(&placeholder, &url_segment(&sample));
            }
            _ if !param.required => {}
            location => base.push(location.as_str(), &param.name, py_literal(&sample)),
        }
    }
    let body = endpoint
        .request_body
        .as_ref()
        .map(|b| py_literal(&sample_value(&b.ty, None, facts)))
        .unwrap_or_else(|| "None".to_string());

    let cases = test_cases(endpoint, facts);
    let lines = cases
        .iter()
        .map(|case| {
            let mut parts = RequestParts {
                params: base.params.clone(),
                headers: base.headers.clone(),
                cookies: base.cookies.clone(),
            };
            for scheme in case.presented.iter().filter_map(|name| facts.security_scheme(name)) {
                let secret = match scheme.tier {
                    SchemeTier::Standard => "STANDARD_SECRET",
                    SchemeTier::Elevated => "ELEVATED_SECRET",
                };
                parts.push_credential(&CredentialSource::from_scheme(scheme), secret);
            }
            let doc = match &case.credential {
                CredentialCase::Valid => {
                    if case.expected_status == endpoint.success_status() {
                        format!("{} succeeds with valid input.", endpoint.operation_id)
                    } else {
                        format!("{} can answer {}.", endpoint.operation_id, case.expected_status)
                    }
                }
                CredentialCase::Missing { scheme } => {
                    format!("{} rejects a request without a {scheme} credential.", endpoint.operation_id)
                }
                CredentialCase::StandardOnly { scheme } => {
                    format!(
                        "{} forbids a standard credential where {scheme} is required.",
                        endpoint.operation_id
                    )
                }
            };
            TestCaseLines {
                name: case.name.clone(),
                doc: py_docstring(&doc),
                expected_status: case.expected_status,
                params: dict(&parts.params),
                headers: dict(&parts.headers),
                cookies: dict(&parts.cookies),
            }
        })
        .collect();

    let content = TestTemplate {
        title: facts.info.title.clone(),
        package: ctx.package.clone(),
        handler: endpoint.handler_name.clone(),
        operation_id: endpoint.operation_id.clone(),
        method: endpoint.method.as_str().to_string(),
        url: py_string(&url),
        body,
        standard_env: ctx.standard_secret_env.clone(),
        elevated_env: ctx.elevated_secret_env.clone(),
        cases: lines,
    }
    .render()?;

    Ok(GeneratedArtifact::new(
        ArtifactKind::Test,
        endpoint.operation_id.clone(),
        format!("tests/test_{}.py", endpoint.handler_name),
        ArtifactBody::Test(TestSuiteSpec {
            operation_id: endpoint.operation_id.clone(),
            cases,
        }),
        content,
    ))
}
