use http::Method;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Logical type of a field, parameter or payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Homogeneous list
    Array(Box<FieldType>),
    /// String-keyed map (`additionalProperties`)
    Map(Box<FieldType>),
    /// Reference to a named [`SchemaNode`]
    Object(String),
    /// Untyped / free-form value
    Any,
}

impl FieldType {
    /// The schema this type points at, directly or as array items
    pub fn referenced_schema(&self) -> Option<&str> {
        match self {
            FieldType::Object(name) => Some(name),
            FieldType::Array(inner) => match inner.as_ref() {
                FieldType::Object(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    /// Strings, numbers and booleans
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Integer | FieldType::Number | FieldType::Boolean
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Array(inner) => write!(f, "array<{inner}>"),
            FieldType::Map(inner) => write!(f, "map<{inner}>"),
            FieldType::Object(name) => write!(f, "{name}"),
            FieldType::Any => write!(f, "any"),
        }
    }
}

/// Validation keywords carried over from the schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConstraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// `enum` values in declaration order
    pub enum_values: Vec<Value>,
}

impl FieldConstraints {
    pub fn is_empty(&self) -> bool {
        *self == FieldConstraints::default()
    }
}

/// One property of a [`SchemaNode`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Property name as written in the document
    pub name: String,
    pub ty: FieldType,
    /// `format` keyword, verbatim
    pub format: Option<String>,
    pub nullable: bool,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: FieldConstraints,
    pub description: Option<String>,
    /// Marked with `x-primary-key: true` / `primary_key: true`
    pub primary_key: bool,
    /// Set when the field was merged in from an `allOf` parent
    pub inherited_from: Option<String>,
}

impl FieldSpec {
    /// Absent values are allowed (not required, or explicitly nullable)
    pub fn is_optional(&self) -> bool {
        !self.required || self.nullable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionKind {
    AllOf,
    OneOf,
    AnyOf,
}

impl fmt::Display for CompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionKind::AllOf => write!(f, "allOf"),
            CompositionKind::OneOf => write!(f, "oneOf"),
            CompositionKind::AnyOf => write!(f, "anyOf"),
        }
    }
}

/// Schema composition
///
/// For `allOf` the first named member is the parent and the fields of all
/// members are merged into the owning schema. For `oneOf`/`anyOf` the schema is
/// a union of its members and has no fields of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub kind: CompositionKind,
    /// Named member schemas in declaration order
    pub members: Vec<String>,
}

/// A named entity
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub description: Option<String>,
    /// Fields in declaration order (allOf parents first)
    pub fields: Vec<FieldSpec>,
    pub required: BTreeSet<String>,
    pub composition: Option<Composition>,
    /// Set for named schemas that are not objects (`Id: {type: string}`)
    pub alias: Option<FieldType>,
    /// Lifted from an inline object rather than declared under `components`
    pub synthesized: bool,
}

impl SchemaNode {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The allOf parent, if any
    pub fn parent(&self) -> Option<&str> {
        match &self.composition {
            Some(Composition {
                kind: CompositionKind::AllOf,
                members,
            }) => members.first().map(String::as_str),
            _ => None,
        }
    }

    /// oneOf / anyOf unions have no table of their own
    pub fn is_union(&self) -> bool {
        matches!(
            self.composition,
            Some(Composition {
                kind: CompositionKind::OneOf | CompositionKind::AnyOf,
                ..
            })
        )
    }

    /// Whether the schema is persisted as an entity
    pub fn is_entity(&self) -> bool {
        !self.is_union() && self.alias.is_none()
    }

    /// Fields declared on this schema itself (not inherited)
    pub fn own_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.inherited_from.is_none())
    }
}

/// How a credential is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityKind {
    ApiKeyHeader,
    ApiKeyQuery,
    ApiKeyCookie,
    HttpBearer,
    HttpBasic,
    OAuth2,
    OpenIdConnect,
}

impl SecurityKind {
    /// Whether the credential travels in the `Authorization` header
    pub fn uses_authorization_header(&self) -> bool {
        matches!(
            self,
            SecurityKind::HttpBearer
                | SecurityKind::HttpBasic
                | SecurityKind::OAuth2
                | SecurityKind::OpenIdConnect
        )
    }
}

impl fmt::Display for SecurityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityKind::ApiKeyHeader => "apiKey (header)",
            SecurityKind::ApiKeyQuery => "apiKey (query)",
            SecurityKind::ApiKeyCookie => "apiKey (cookie)",
            SecurityKind::HttpBearer => "http bearer",
            SecurityKind::HttpBasic => "http basic",
            SecurityKind::OAuth2 => "oauth2",
            SecurityKind::OpenIdConnect => "openIdConnect",
        };
        write!(f, "{s}")
    }
}

/// Privilege tier of a scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemeTier {
    Standard,
    Elevated,
}

impl fmt::Display for SchemeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeTier::Standard => write!(f, "standard"),
            SchemeTier::Elevated => write!(f, "elevated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySchemeNode {
    pub name: String,
    pub kind: SecurityKind,
    /// Header, query or cookie name carrying the credential
    pub parameter_name: String,
    pub tier: SchemeTier,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Parse the `in` keyword of a parameter object
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "Path"),
            ParameterLocation::Query => write!(f, "Query"),
            ParameterLocation::Header => write!(f, "Header"),
            ParameterLocation::Cookie => write!(f, "Cookie"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub ty: FieldType,
    pub format: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodySpec {
    /// Named schema of the body (array items when `is_array`)
    pub schema: Option<String>,
    pub is_array: bool,
    /// Full body type, also set for primitive bodies
    pub ty: FieldType,
    pub content_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub description: Option<String>,
    /// Named schema of the payload (array items when `is_array`)
    pub schema: Option<String>,
    pub is_array: bool,
    /// Payload type, `None` when the response has no content
    pub ty: Option<FieldType>,
    pub content_type: Option<String>,
}

/// Security alternatives of an endpoint
///
/// `alternatives` is an OR of AND groups. An empty group grants anonymous
/// access. `declared` is false when neither the operation nor the document
/// says anything about security.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRequirements {
    pub alternatives: Vec<Vec<String>>,
    pub declared: bool,
}

impl SecurityRequirements {
    /// Every scheme that appears in any alternative, in first-seen order
    pub fn accepted_schemes(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.alternatives
            .iter()
            .flatten()
            .filter(|name| seen.insert(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// No credential needed
    pub fn allows_anonymous(&self) -> bool {
        self.alternatives.is_empty() || self.alternatives.iter().any(Vec::is_empty)
    }

    /// Every alternative contains a scheme for which `is_elevated` holds
    pub fn requires_elevated(&self, is_elevated: impl Fn(&str) -> bool) -> bool {
        !self.allows_anonymous()
            && self
                .alternatives
                .iter()
                .all(|group| group.iter().any(|name| is_elevated(name)))
    }
}

/// One operation of the API
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub operation_id: String,
    /// Snake-case function name derived from the operation id
    pub handler_name: String,
    pub method: Method,
    /// Path template, e.g. `/widgets/{id}`
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
    pub request_body: Option<RequestBodySpec>,
    /// Keyed by the status as written (`200`, `404`, `default`)
    pub responses: BTreeMap<String, ResponseSpec>,
    pub security: SecurityRequirements,
    pub deprecated: bool,
}

impl EndpointDescriptor {
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Lowest declared 2xx status, or 200 when none is declared
    pub fn success_status(&self) -> u16 {
        self.numeric_statuses()
            .find(|code| (200..300).contains(code))
            .unwrap_or(200)
    }

    /// Response declared for [`Self::success_status`]
    pub fn success_response(&self) -> Option<&ResponseSpec> {
        self.responses.get(&self.success_status().to_string())
    }

    /// Declared numeric statuses outside 2xx, ascending
    pub fn error_statuses(&self) -> Vec<u16> {
        self.numeric_statuses()
            .filter(|code| !(200..300).contains(code))
            .collect()
    }

    fn numeric_statuses(&self) -> impl Iterator<Item = u16> + '_ {
        let mut codes: Vec<u16> = self
            .responses
            .keys()
            .filter_map(|k| k.parse::<u16>().ok())
            .collect();
        codes.sort_unstable();
        codes.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMeta {
    pub url: String,
    pub description: Option<String>,
    /// Path component of the URL without a trailing slash (`""` for root)
    pub base_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Lowercase identifier derived from the title
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub description: Option<String>,
}

/// Everything the emitters need, and nothing else
#[derive(Debug, Clone, PartialEq)]
pub struct FactSet {
    pub info: ApiInfo,
    pub servers: Vec<ServerMeta>,
    pub tags: Vec<Tag>,
    /// Declared schemas in document order, followed by lifted ones
    pub schemas: Vec<SchemaNode>,
    pub security_schemes: Vec<SecuritySchemeNode>,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl FactSet {
    pub fn schema(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn security_scheme(&self, name: &str) -> Option<&SecuritySchemeNode> {
        self.security_schemes.iter().find(|s| s.name == name)
    }

    pub fn endpoint(&self, operation_id: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.operation_id == operation_id)
    }

    /// Whether the named scheme exists and is elevated
    pub fn is_elevated(&self, scheme: &str) -> bool {
        self.security_scheme(scheme)
            .is_some_and(|s| s.tier == SchemeTier::Elevated)
    }

    pub fn schemes_of_tier(&self, tier: SchemeTier) -> impl Iterator<Item = &SecuritySchemeNode> {
        self.security_schemes.iter().filter(move |s| s.tier == tier)
    }

    /// First server's base path, `""` when no server is declared
    pub fn base_path(&self) -> &str {
        self.servers.first().map(|s| s.base_path.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(statuses: &[&str]) -> EndpointDescriptor {
        EndpointDescriptor {
            operation_id: "op".into(),
            handler_name: "op".into(),
            method: Method::GET,
            path: "/".into(),
            summary: None,
            description: None,
            tags: vec![],
            parameters: vec![],
            request_body: None,
            responses: statuses
                .iter()
                .map(|s| {
                    (
                        s.to_string(),
                        ResponseSpec {
                            description: None,
                            schema: None,
                            is_array: false,
                            ty: None,
                            content_type: None,
                        },
                    )
                })
                .collect(),
            security: SecurityRequirements::default(),
            deprecated: false,
        }
    }

    #[test]
    fn test_success_status_is_lowest_2xx() {
        assert_eq!(endpoint(&["404", "204", "201"]).success_status(), 201);
        assert_eq!(endpoint(&["default", "400"]).success_status(), 200);
        assert_eq!(endpoint(&["200", "404", "400", "default"]).error_statuses(), vec![400, 404]);
    }

    #[test]
    fn test_security_requirements_views() {
        let reqs = SecurityRequirements {
            alternatives: vec![vec!["admin".into()], vec!["key".into(), "admin".into()]],
            declared: true,
        };
        assert_eq!(reqs.accepted_schemes(), vec!["admin", "key"]);
        assert!(!reqs.allows_anonymous());
        assert!(reqs.requires_elevated(|s| s == "admin"));

        let mixed = SecurityRequirements {
            alternatives: vec![vec!["admin".into()], vec!["key".into()]],
            declared: true,
        };
        assert!(!mixed.requires_elevated(|s| s == "admin"));

        let open = SecurityRequirements {
            alternatives: vec![vec!["key".into()], vec![]],
            declared: true,
        };
        assert!(open.allows_anonymous());
    }

    #[test]
    fn test_referenced_schema() {
        let ty = FieldType::Array(Box::new(FieldType::Object("Widget".into())));
        assert_eq!(ty.referenced_schema(), Some("Widget"));
        assert_eq!(ty.to_string(), "array<Widget>");
        assert_eq!(FieldType::Map(Box::new(FieldType::Any)).referenced_schema(), None);
    }
}
