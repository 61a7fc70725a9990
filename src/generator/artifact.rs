//! Generated artifacts and their language-neutral logical structure.
//!
//! The rendered `content` is what lands on disk; the [`ArtifactBody`] is what
//! the consistency validator reads back.

use super::auth::{GuardSpec, GuardTier};
use crate::error::Warning;
use crate::spec::{FieldType, ParameterLocation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of artifact, one per emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Persistence,
    Crud,
    Route,
    Auth,
    Sync,
    Test,
}

impl ArtifactKind {
    /// Every kind in emission order
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Model,
        ArtifactKind::Persistence,
        ArtifactKind::Crud,
        ArtifactKind::Route,
        ArtifactKind::Auth,
        ArtifactKind::Sync,
        ArtifactKind::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Persistence => "persistence",
            ArtifactKind::Crud => "crud",
            ArtifactKind::Route => "route",
            ArtifactKind::Auth => "auth",
            ArtifactKind::Sync => "sync",
            ArtifactKind::Test => "test",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown artifact kind '{s}' (expected one of: {})",
                    ArtifactKind::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}

/// Identity of an artifact: its kind plus the fact it was derived from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    /// Schema name, operation id or guard tier
    pub source_id: String,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.source_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelField {
    pub name: String,
    pub ty: FieldType,
    pub nullable: bool,
    pub required: bool,
}

/// Declared shape of a data model class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub class_name: String,
    /// All fields, inherited ones included
    pub fields: Vec<ModelField>,
    pub parent: Option<String>,
    /// Members of a oneOf/anyOf union alias
    pub union_members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    /// SQL column type as emitted (`String`, `Integer`, `JSON`, ...)
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// `table.column` for foreign keys
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipSpec {
    pub name: String,
    pub target: String,
    pub many: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub class_name: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnSpec>,
    pub relationships: Vec<RelationshipSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudSpec {
    pub entity: String,
    pub table: String,
    /// Function names in emission order
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
}

/// Declared surface of a route handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub operation_id: String,
    pub handler: String,
    pub method: String,
    pub path: String,
    pub parameters: Vec<RouteParameter>,
    pub request_model: Option<String>,
    pub response_model: Option<String>,
    pub status_code: u16,
    pub guard: GuardTier,
    /// Alternatives handed to the guard dependency; empty without a guard
    pub security: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSpec {
    pub entity: String,
    pub collection: String,
    pub indexed_fields: Vec<String>,
}

/// The application entry module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
    pub title: String,
    pub version: String,
    /// Route modules included, in endpoint order
    pub routers: Vec<String>,
}

/// Credential presented by a generated test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCase {
    /// Valid credentials for the endpoint's guard
    Valid,
    /// No credential for the named scheme
    Missing { scheme: String },
    /// A valid standard credential where an elevated one is required
    StandardOnly { scheme: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub expected_status: u16,
    pub credential: CredentialCase,
    /// Schemes whose credentials the request carries
    pub presented: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuiteSpec {
    pub operation_id: String,
    pub cases: Vec<TestCase>,
}

/// Logical structure of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactBody {
    Model(ModelSpec),
    Persistence(TableSpec),
    Crud(CrudSpec),
    Route(RouteSpec),
    App(AppSpec),
    Auth(GuardSpec),
    Sync(SyncSpec),
    Test(TestSuiteSpec),
}

/// One emitted unit of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub key: ArtifactKey,
    /// Relative output name, e.g. `app/models/widget.py`
    pub logical_name: String,
    pub body: ArtifactBody,
    pub content: String,
    /// SHA-256 of `content`, lowercase hex
    pub fingerprint: String,
    pub warnings: Vec<Warning>,
}

impl GeneratedArtifact {
    pub fn new(
        kind: ArtifactKind,
        source_id: impl Into<String>,
        logical_name: impl Into<String>,
        body: ArtifactBody,
        content: String,
    ) -> Self {
        GeneratedArtifact {
            key: ArtifactKey {
                kind,
                source_id: source_id.into(),
            },
            logical_name: logical_name.into(),
            body,
            fingerprint: fingerprint(content.as_bytes()),
            content,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// SHA-256 of `content` as lowercase hex
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Artifacts ordered by key, so iteration (and output) is deterministic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    artifacts: BTreeMap<ArtifactKey, GeneratedArtifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact, returning the one it replaced
    pub fn insert(&mut self, artifact: GeneratedArtifact) -> Option<GeneratedArtifact> {
        self.artifacts.insert(artifact.key.clone(), artifact)
    }

    pub fn get(&self, kind: ArtifactKind, source_id: &str) -> Option<&GeneratedArtifact> {
        self.artifacts.get(&ArtifactKey {
            kind,
            source_id: source_id.to_string(),
        })
    }

    pub fn remove(&mut self, kind: ArtifactKind, source_id: &str) -> Option<GeneratedArtifact> {
        self.artifacts.remove(&ArtifactKey {
            kind,
            source_id: source_id.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.artifacts.values()
    }

    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &GeneratedArtifact> {
        self.artifacts.values().filter(move |a| a.key.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Warnings of every artifact, in artifact order
    pub fn warnings(&self) -> impl Iterator<Item = (&ArtifactKey, &Warning)> {
        self.artifacts
            .values()
            .flat_map(|a| a.warnings.iter().map(move |w| (&a.key, w)))
    }
}

impl Extend<GeneratedArtifact> for ArtifactSet {
    fn extend<T: IntoIterator<Item = GeneratedArtifact>>(&mut self, iter: T) {
        for artifact in iter {
            self.insert(artifact);
        }
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a GeneratedArtifact;
    type IntoIter = std::collections::btree_map::Values<'a, ArtifactKey, GeneratedArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.values()
    }
}
