//! Authentication guards.
//!
//! Exactly two guard modules are emitted, one per [`SchemeTier`]. Each exports
//! a `require_<tier>(alternatives)` dependency factory: a route passes its
//! endpoint's security requirement (OR of AND groups) and the request is let
//! through when every scheme of some group carries a valid credential. A
//! credential is valid when it equals the secret of its scheme's tier.
//!
//! On failure the standard guard answers 401. The elevated guard answers 403
//! when the caller proved a valid *standard* credential, and 401 otherwise.
//! [`GuardSpec::check`] models the same decision so it can be exercised
//! without running the generated code.

use super::artifact::{ArtifactBody, ArtifactKind, GeneratedArtifact};
use super::templates::{AuthTemplate, TemplateSource};
use super::python::py_string;
use super::EmitContext;
use crate::spec::{EndpointDescriptor, FactSet, SchemeTier, SecurityKind, SecuritySchemeNode};
use askama::Template;
use std::fmt;

/// Guard a route handler depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GuardTier {
    /// Anonymous access
    None,
    Standard,
    Elevated,
}

impl GuardTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardTier::None => "none",
            GuardTier::Standard => "standard",
            GuardTier::Elevated => "elevated",
        }
    }
}

impl fmt::Display for GuardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the guard for an endpoint
///
/// Anonymous access (or no security at all) needs no guard. An endpoint is
/// elevated only when every alternative includes an elevated scheme, i.e. no
/// combination of standard schemes alone satisfies it.
pub fn guard_for(endpoint: &EndpointDescriptor, facts: &FactSet) -> GuardTier {
    if endpoint.security.allows_anonymous() {
        GuardTier::None
    } else if endpoint.security.requires_elevated(|s| facts.is_elevated(s)) {
        GuardTier::Elevated
    } else {
        GuardTier::Standard
    }
}

/// Where a guard looks for one scheme's credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub scheme: String,
    pub kind: SecurityKind,
    /// `header`, `query` or `cookie`
    pub location: &'static str,
    pub parameter_name: String,
    /// Prefix stripped from the header value (`Bearer `)
    pub prefix: Option<&'static str>,
}

impl CredentialSource {
    pub fn from_scheme(scheme: &SecuritySchemeNode) -> Self {
        let (location, prefix) = match scheme.kind {
            SecurityKind::ApiKeyHeader => ("header", None),
            SecurityKind::ApiKeyQuery => ("query", None),
            SecurityKind::ApiKeyCookie => ("cookie", None),
            SecurityKind::HttpBasic => ("header", Some("Basic ")),
            SecurityKind::HttpBearer | SecurityKind::OAuth2 | SecurityKind::OpenIdConnect => {
                ("header", Some("Bearer "))
            }
        };
        CredentialSource {
            scheme: scheme.name.clone(),
            kind: scheme.kind,
            location,
            parameter_name: scheme.parameter_name.clone(),
            prefix,
        }
    }
}

/// A credential presented by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential<'a> {
    pub scheme: &'a str,
    /// Raw value with any `Bearer ` prefix already removed
    pub value: &'a str,
}

/// Decision of a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
}

impl GuardOutcome {
    /// HTTP status the generated guard answers with, `None` when it lets the request through
    pub fn status(&self) -> Option<u16> {
        match self {
            GuardOutcome::Allowed => None,
            GuardOutcome::Unauthorized => Some(401),
            GuardOutcome::Forbidden => Some(403),
        }
    }
}

/// Logical structure of one guard artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSpec {
    pub tier: SchemeTier,
    pub sources: Vec<CredentialSource>,
    /// Name of the environment variable holding the expected secret
    pub secret_env: String,
    /// Schemes of the other tier; groups may mix tiers
    pub peer_sources: Vec<CredentialSource>,
    pub peer_secret_env: String,
}

impl GuardSpec {
    /// Decide a request the way the generated guard does
    ///
    /// `requirement` is the route's list of alternatives; each inner list must
    /// be satisfied in full. `secret` maps an environment variable name to its
    /// value; an unset secret never validates anything.
    pub fn check(
        &self,
        requirement: &[Vec<String>],
        presented: &[Credential<'_>],
        secret: impl Fn(&str) -> Option<String>,
    ) -> GuardOutcome {
        let valid = |scheme: &str| self.scheme_is_valid(scheme, presented, &secret);
        if requirement
            .iter()
            .any(|group| group.iter().all(|scheme| valid(scheme.as_str())))
        {
            return GuardOutcome::Allowed;
        }
        if self.tier == SchemeTier::Elevated && self.peer_sources.iter().any(|s| valid(s.scheme.as_str())) {
            return GuardOutcome::Forbidden;
        }
        GuardOutcome::Unauthorized
    }

    fn scheme_is_valid(
        &self,
        scheme: &str,
        presented: &[Credential<'_>],
        secret: &impl Fn(&str) -> Option<String>,
    ) -> bool {
        let env = if self.sources.iter().any(|s| s.scheme == scheme) {
            &self.secret_env
        } else if self.peer_sources.iter().any(|s| s.scheme == scheme) {
            &self.peer_secret_env
        } else {
            return false;
        };
        let Some(expected) = secret(env).filter(|s| !s.is_empty()) else {
            return false;
        };
        presented
            .iter()
            .any(|c| c.scheme == scheme && c.value == expected)
    }
}

/// Build the guard specs for both tiers
pub fn guard_specs(facts: &FactSet, ctx: &EmitContext) -> [GuardSpec; 2] {
    let sources = |tier| {
        facts
            .schemes_of_tier(tier)
            .map(CredentialSource::from_scheme)
            .collect::<Vec<_>>()
    };
    let standard = sources(SchemeTier::Standard);
    let elevated = sources(SchemeTier::Elevated);
    [
        GuardSpec {
            tier: SchemeTier::Standard,
            sources: standard.clone(),
            secret_env: ctx.standard_secret_env.clone(),
            peer_sources: elevated.clone(),
            peer_secret_env: ctx.elevated_secret_env.clone(),
        },
        GuardSpec {
            tier: SchemeTier::Elevated,
            sources: elevated,
            secret_env: ctx.elevated_secret_env.clone(),
            peer_sources: standard,
            peer_secret_env: ctx.standard_secret_env.clone(),
        },
    ]
}

/// Python literal for a requirement, e.g. `[["apiKey", "clientId"]]`
pub(crate) fn requirement_literal(requirement: &[Vec<String>]) -> String {
    let groups: Vec<String> = requirement
        .iter()
        .map(|group| {
            let names: Vec<String> = group.iter().map(|name| py_string(name)).collect();
            format!("[{}]", names.join(", "))
        })
        .collect();
    format!("[{}]", groups.join(", "))
}

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    guard_specs(facts, ctx)
        .into_iter()
        .map(|spec| {
            let tier = spec.tier.to_string();
            let content = AuthTemplate {
                title: facts.info.title.clone(),
                tier: tier.clone(),
                elevated: spec.tier == SchemeTier::Elevated,
                secret_env: spec.secret_env.clone(),
                sources: spec.sources.iter().map(TemplateSource::from).collect(),
                peer_secret_env: spec.peer_secret_env.clone(),
                peer_sources: spec.peer_sources.iter().map(TemplateSource::from).collect(),
            }
            .render()?;
            Ok(GeneratedArtifact::new(
                ArtifactKind::Auth,
                tier.clone(),
                format!("{}/auth/{tier}.py", ctx.package),
                ArtifactBody::Auth(spec),
                content,
            ))
        })
        .collect()
}
