//! Conversion of a resolved document into typed facts.
//!
//! Everything downstream of this module works on [`FactSet`]; structural
//! problems that would make a fact ambiguous are reported here as
//! `InvalidFact` so emitters never have to guess.

use super::load::{PathItem, SpecDocument};
use super::node::Node;
use super::resolve::REF_NAME_KEY;
use super::types::*;
use crate::error::{GenerateError, Result};
use crate::naming::{is_valid_identifier, slugify, to_camel_case, to_snake_case};
use http::Method;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Options for fact extraction
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Security scheme names to treat as elevated regardless of markers
    pub elevated_schemes: Vec<String>,
}

/// Extract typed facts from a resolved document
///
/// # Errors
///
/// `InvalidFact` when an identifier cannot be formed, names collide, a
/// parameter is declared twice, a path template parameter is undeclared, a
/// security requirement names an unknown scheme, or a structural element has
/// the wrong shape.
pub fn extract_facts(document: &SpecDocument, options: &ExtractOptions) -> Result<FactSet> {
    info!(source = %document.source(), "extracting facts");
    check_section_shapes(document)?;

    let security_schemes = extract_security_schemes(document, options)?;
    let mut extractor = Extractor {
        schemas: SchemaBuilder::new(document)?,
        schemes: &security_schemes,
        default_security: document.root().get("security"),
    };

    for (name, node) in document.schemas() {
        extractor.schemas.declare(name, node)?;
    }

    let mut endpoints = Vec::new();
    for item in document.path_items() {
        endpoints.extend(extractor.path_item(item)?);
    }
    check_endpoint_uniqueness(&endpoints)?;

    let schemas = extractor.schemas.finish()?;
    let tags = extract_tags(document, &endpoints);
    let facts = FactSet {
        info: extract_info(document),
        servers: extract_servers(document),
        tags,
        schemas,
        security_schemes,
        endpoints,
    };
    info!(
        schemas = facts.schemas.len(),
        endpoints = facts.endpoints.len(),
        security_schemes = facts.security_schemes.len(),
        "facts extracted"
    );
    Ok(facts)
}

fn check_section_shapes(document: &SpecDocument) -> Result<()> {
    let root = document.root();
    if let Some(components) = root.get("components") {
        if !components.is_mapping() {
            return Err(GenerateError::invalid_fact("components", "must be a mapping"));
        }
        for section in ["schemas", "securitySchemes"] {
            if components.get(section).is_some_and(|s| !s.is_mapping()) {
                return Err(GenerateError::invalid_fact(
                    format!("components.{section}"),
                    "must be a mapping",
                ));
            }
        }
    }
    if root.get("paths").is_some_and(|p| !p.is_mapping()) {
        return Err(GenerateError::invalid_fact("paths", "must be a mapping"));
    }
    Ok(())
}

fn str_field(node: &Node, key: &str) -> Option<String> {
    node.get(key).and_then(Node::as_str).map(str::to_string)
}

/// CamelCase fragment usable inside a synthesized type name
fn type_name_part(raw: &str) -> String {
    to_camel_case(raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn named_schema(node: &Node) -> Option<&str> {
    node.get(REF_NAME_KEY).and_then(Node::as_str)
}

/// `type` keyword, accepting the 3.1 list form (`[string, "null"]`)
fn declared_type(node: &Node) -> (Option<String>, bool) {
    match node.get("type") {
        Some(Node::Sequence(items)) => {
            let names: Vec<&str> = items.iter().filter_map(Node::as_str).collect();
            let nullable = names.contains(&"null");
            let ty = names.into_iter().find(|n| *n != "null").map(str::to_string);
            (ty, nullable)
        }
        Some(other) => (other.as_str().map(str::to_string), false),
        None => (None, false),
    }
}

fn is_null_schema(node: &Node) -> bool {
    let (ty, nullable) = declared_type(node);
    ty.as_deref() == Some("null") || (ty.is_none() && nullable)
}

/// `oneOf`/`anyOf` members, unless the construct only marks a value nullable
fn union_variants(node: &Node) -> Option<(CompositionKind, &[Node])> {
    for (key, kind) in [("oneOf", CompositionKind::OneOf), ("anyOf", CompositionKind::AnyOf)] {
        if let Some(variants) = node.get(key).and_then(Node::as_sequence) {
            let non_null = variants.iter().filter(|v| !is_null_schema(v)).count();
            if non_null == 1 && non_null < variants.len() {
                return None;
            }
            return Some((kind, variants));
        }
    }
    None
}

fn nullable_wrapper(node: &Node) -> Option<&Node> {
    for key in ["oneOf", "anyOf"] {
        if let Some(variants) = node.get(key).and_then(Node::as_sequence) {
            let mut non_null = variants.iter().filter(|v| !is_null_schema(v));
            if let (Some(only), None) = (non_null.next(), non_null.next()) {
                if variants.len() > 1 {
                    return Some(only);
                }
            }
        }
    }
    None
}

/// Declares properties or composes other schemas
fn has_structure(node: &Node) -> bool {
    node.get("properties").is_some() || node.get("allOf").is_some() || union_variants(node).is_some()
}

/// Whether a named schema describes an entity rather than a plain value
fn is_object_like(node: &Node) -> bool {
    has_structure(node)
        || (declared_type(node).0.as_deref() == Some("object")
            && node.get("additionalProperties").is_none())
}

fn constraints(node: &Node) -> FieldConstraints {
    let unsigned = |key: &str| node.get(key).and_then(Node::as_i64).and_then(|v| u64::try_from(v).ok());
    FieldConstraints {
        min_length: unsigned("minLength"),
        max_length: unsigned("maxLength"),
        pattern: str_field(node, "pattern"),
        minimum: node.get("minimum").and_then(Node::as_f64),
        maximum: node.get("maximum").and_then(Node::as_f64),
        enum_values: node
            .get("enum")
            .and_then(Node::as_sequence)
            .map(|values| values.iter().map(Node::to_json).collect())
            .unwrap_or_default(),
    }
}

/// Builds [`SchemaNode`]s for declared schemas and everything they lift
struct SchemaBuilder {
    declared_names: HashSet<String>,
    declared: Vec<SchemaNode>,
    extra: Vec<SchemaNode>,
    /// Names already built or being built, with the node they came from
    sources: HashMap<String, Node>,
}

impl SchemaBuilder {
    fn new(document: &SpecDocument) -> Result<Self> {
        let mut declared_names = HashSet::new();
        for (name, _) in document.schemas() {
            if !declared_names.insert(name.to_string()) {
                return Err(GenerateError::invalid_fact(name, "duplicate schema name"));
            }
        }
        Ok(SchemaBuilder {
            declared_names,
            declared: Vec::new(),
            extra: Vec::new(),
            sources: HashMap::new(),
        })
    }

    fn declare(&mut self, name: &str, node: &Node) -> Result<()> {
        if !is_valid_identifier(name) {
            return Err(GenerateError::invalid_fact(
                name,
                "schema name cannot form a valid identifier",
            ));
        }
        self.sources.insert(name.to_string(), node.clone());
        let schema = self.build(name, node, false)?;
        debug!(schema = name, fields = schema.fields.len(), "schema extracted");
        self.declared.push(schema);
        Ok(())
    }

    /// Make sure a referenced named schema exists
    ///
    /// Schemas declared in the root document are built by [`Self::declare`];
    /// named schemas pulled in from external documents are built on first use.
    fn ensure_named(&mut self, name: &str, node: &Node) -> Result<()> {
        if self.declared_names.contains(name) || self.sources.contains_key(name) {
            return Ok(());
        }
        if !is_valid_identifier(name) {
            return Err(GenerateError::invalid_fact(
                name,
                "schema name cannot form a valid identifier",
            ));
        }
        self.sources.insert(name.to_string(), node.clone());
        let schema = self.build(name, node, false)?;
        debug!(schema = name, "external schema extracted");
        self.extra.push(schema);
        Ok(())
    }

    /// Lift an inline schema into a synthesized named one
    fn lift(&mut self, name: &str, node: &Node) -> Result<()> {
        if !is_valid_identifier(name) {
            return Err(GenerateError::invalid_fact(
                name,
                "synthesized schema name cannot form a valid identifier",
            ));
        }
        match self.sources.get(name) {
            Some(existing) if existing == node => return Ok(()),
            Some(_) => {
                return Err(GenerateError::invalid_fact(
                    name,
                    "synthesized schema name collides with another schema",
                ))
            }
            None if self.declared_names.contains(name) => {
                return Err(GenerateError::invalid_fact(
                    name,
                    "synthesized schema name collides with a declared schema",
                ))
            }
            None => {}
        }
        self.sources.insert(name.to_string(), node.clone());
        let schema = self.build(name, node, true)?;
        debug!(schema = name, "inline schema lifted");
        self.extra.push(schema);
        Ok(())
    }

    fn build(&mut self, name: &str, node: &Node, synthesized: bool) -> Result<SchemaNode> {
        let mut schema = SchemaNode {
            name: name.to_string(),
            description: str_field(node, "description"),
            fields: Vec::new(),
            required: BTreeSet::new(),
            composition: None,
            alias: None,
            synthesized,
        };

        if !is_object_like(node) {
            let (ty, _) = self.field_type(node, &format!("{name}Value"))?;
            schema.alias = Some(ty);
            return Ok(schema);
        }

        if let Some((kind, variants)) = union_variants(node) {
            let mut members = Vec::new();
            for (i, variant) in variants.iter().enumerate() {
                if is_null_schema(variant) {
                    continue;
                }
                let member = match named_schema(variant) {
                    Some(n) => {
                        self.ensure_named(n, variant)?;
                        n.to_string()
                    }
                    None => {
                        let lifted = format!("{name}Option{}", i + 1);
                        self.lift(&lifted, variant)?;
                        lifted
                    }
                };
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            schema.composition = Some(Composition { kind, members });
            return Ok(schema);
        }

        let mut parents = Vec::new();
        if let Some(members) = node.get("allOf").and_then(Node::as_sequence) {
            for member in members {
                if let Some(parent) = named_schema(member).filter(|_| is_object_like(member)) {
                    self.ensure_named(parent, member)?;
                    parents.push(parent.to_string());
                }
            }
        }
        self.collect_properties(name, node, None, &mut schema.fields, &mut schema.required)?;
        for field in &mut schema.fields {
            field.required = schema.required.contains(&field.name);
        }
        if !parents.is_empty() {
            schema.composition = Some(Composition {
                kind: CompositionKind::AllOf,
                members: parents,
            });
        }
        Ok(schema)
    }

    fn collect_properties(
        &mut self,
        owner: &str,
        node: &Node,
        inherited: Option<&str>,
        fields: &mut Vec<FieldSpec>,
        required: &mut BTreeSet<String>,
    ) -> Result<()> {
        if let Some(members) = node.get("allOf").and_then(Node::as_sequence) {
            for member in members {
                let from = inherited.or_else(|| named_schema(member).filter(|_| is_object_like(member)));
                self.collect_properties(owner, member, from, fields, required)?;
            }
        }
        if let Some(names) = node.get("required").and_then(Node::as_sequence) {
            required.extend(names.iter().filter_map(Node::as_str).map(str::to_string));
        }
        let Some(props) = node.get("properties") else {
            return Ok(());
        };
        let props = props
            .as_mapping()
            .ok_or_else(|| GenerateError::invalid_fact(owner, "'properties' must be a mapping"))?;
        for (prop_name, prop) in props {
            let field = self.field(inherited.unwrap_or(owner), prop_name, prop, inherited)?;
            match fields.iter_mut().find(|f| f.name == *prop_name) {
                Some(existing) => *existing = field,
                None => fields.push(field),
            }
        }
        Ok(())
    }

    fn field(&mut self, owner: &str, name: &str, node: &Node, inherited: Option<&str>) -> Result<FieldSpec> {
        let lift_name = format!("{owner}{}", type_name_part(name));
        let (ty, nullable) = self.field_type(node, &lift_name)?;
        let marker = |key: &str| node.get(key).and_then(Node::as_bool).unwrap_or(false);
        let described = nullable_wrapper(node).unwrap_or(node);
        Ok(FieldSpec {
            name: name.to_string(),
            ty,
            format: str_field(described, "format"),
            nullable,
            required: false,
            default: node.get("default").map(Node::to_json),
            constraints: constraints(described),
            description: str_field(node, "description"),
            primary_key: marker("x-primary-key") || marker("primary_key"),
            inherited_from: inherited.map(str::to_string),
        })
    }

    /// Type of a value schema, lifting inline objects under `lift_name`
    fn field_type(&mut self, node: &Node, lift_name: &str) -> Result<(FieldType, bool)> {
        let nullable_flag = node.get("nullable").and_then(Node::as_bool).unwrap_or(false);

        if let Some(name) = named_schema(node) {
            if is_object_like(node) {
                self.ensure_named(name, node)?;
                return Ok((FieldType::Object(name.to_string()), nullable_flag));
            }
        }
        if let Some(inner) = nullable_wrapper(node) {
            let (ty, _) = self.field_type(inner, lift_name)?;
            return Ok((ty, true));
        }
        if let Some([only]) = node.get("allOf").and_then(Node::as_sequence) {
            if named_schema(only).is_some() && node.get("properties").is_none() {
                let (ty, nullable) = self.field_type(only, lift_name)?;
                return Ok((ty, nullable || nullable_flag));
            }
        }

        let (type_name, type_nullable) = declared_type(node);
        let nullable = nullable_flag || type_nullable;
        let ty = match type_name.as_deref() {
            Some("string") => FieldType::String,
            Some("integer") => FieldType::Integer,
            Some("number") => FieldType::Number,
            Some("boolean") => FieldType::Boolean,
            Some("array") => match node.get("items") {
                Some(items) => {
                    let (inner, _) = self.field_type(items, &format!("{lift_name}Item"))?;
                    FieldType::Array(Box::new(inner))
                }
                None => FieldType::Array(Box::new(FieldType::Any)),
            },
            _ if has_structure(node) => {
                self.lift(lift_name, node)?;
                FieldType::Object(lift_name.to_string())
            }
            Some("object") => match node.get("additionalProperties") {
                Some(values) if values.is_mapping() => {
                    let (inner, _) = self.field_type(values, &format!("{lift_name}Value"))?;
                    FieldType::Map(Box::new(inner))
                }
                _ => FieldType::Map(Box::new(FieldType::Any)),
            },
            _ => FieldType::Any,
        };
        Ok((ty, nullable))
    }

    /// Declared schemas in document order, then external and lifted ones
    fn finish(self) -> Result<Vec<SchemaNode>> {
        let mut schemas = self.declared;
        schemas.extend(self.extra);
        let mut modules: HashMap<String, &str> = HashMap::new();
        for schema in &schemas {
            let module = to_snake_case(&schema.name);
            if let Some(other) = modules.insert(module.clone(), schema.name.as_str()) {
                return Err(GenerateError::invalid_fact(
                    &schema.name,
                    format!("maps to the same identifier '{module}' as schema '{other}'"),
                ));
            }
        }
        Ok(schemas)
    }
}

struct Extractor<'a> {
    schemas: SchemaBuilder,
    schemes: &'a [SecuritySchemeNode],
    default_security: Option<&'a Node>,
}

impl Extractor<'_> {
    fn path_item(&mut self, item: PathItem<'_>) -> Result<Vec<EndpointDescriptor>> {
        let entries = item
            .node
            .as_mapping()
            .ok_or_else(|| GenerateError::invalid_fact(item.path, "path item must be a mapping"))?;
        let shared = match item.node.get("parameters") {
            Some(list) => self.parameters(list, item.path, &type_name_part(&item.path.replace('/', "_")))?,
            None => Vec::new(),
        };

        let mut endpoints = Vec::new();
        for (key, operation) in entries {
            let lower = key.to_ascii_lowercase();
            if !METHODS.contains(&lower.as_str()) {
                continue;
            }
            let method = Method::from_bytes(lower.to_ascii_uppercase().as_bytes())
                .map_err(|e| GenerateError::invalid_fact(format!("{key} {}", item.path), e.to_string()))?;
            let endpoint = self.operation(item.path, method, operation, &shared)?;
            debug!(
                operation_id = %endpoint.operation_id,
                method = %endpoint.method,
                path = %endpoint.path,
                parameters = endpoint.parameters.len(),
                "endpoint extracted"
            );
            endpoints.push(endpoint);
        }
        Ok(endpoints)
    }

    fn operation(
        &mut self,
        path: &str,
        method: Method,
        node: &Node,
        shared: &[ParameterSpec],
    ) -> Result<EndpointDescriptor> {
        let element = format!("{method} {path}");
        if !node.is_mapping() {
            return Err(GenerateError::invalid_fact(element, "operation must be a mapping"));
        }
        let operation_id = match node.get("operationId") {
            Some(id) => id
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| GenerateError::invalid_fact(&element, "operationId must be a non-empty string"))?
                .to_string(),
            None => synthesize_operation_id(&method, path),
        };
        let handler_name = to_snake_case(&operation_id);
        if !is_valid_identifier(&handler_name) {
            return Err(GenerateError::invalid_fact(
                &operation_id,
                "operation id cannot form a valid handler name",
            ));
        }
        let prefix = type_name_part(&operation_id);

        let own = match node.get("parameters") {
            Some(list) => self.parameters(list, &operation_id, &prefix)?,
            None => Vec::new(),
        };
        let parameters = merge_parameters(shared, own);
        check_path_template(path, &parameters, &operation_id)?;

        let request_body = match node.get("requestBody") {
            Some(body) => Some(self.request_body(body, &operation_id, &prefix)?),
            None => None,
        };
        let responses = match node.get("responses") {
            Some(responses) => self.responses(responses, &operation_id, &prefix)?,
            None => BTreeMap::new(),
        };
        let security = self.security(node.get("security").or(self.default_security), &operation_id)?;

        Ok(EndpointDescriptor {
            operation_id,
            handler_name,
            method,
            path: path.to_string(),
            summary: str_field(node, "summary"),
            description: str_field(node, "description"),
            tags: node
                .get("tags")
                .and_then(Node::as_sequence)
                .map(|tags| tags.iter().filter_map(Node::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            parameters,
            request_body,
            responses,
            security,
            deprecated: node.get("deprecated").and_then(Node::as_bool).unwrap_or(false),
        })
    }

    /// Parse a parameter list, rejecting a name repeated within one location
    fn parameters(&mut self, list: &Node, element: &str, prefix: &str) -> Result<Vec<ParameterSpec>> {
        let items = list
            .as_sequence()
            .ok_or_else(|| GenerateError::invalid_fact(element, "'parameters' must be a sequence"))?;
        let mut out: Vec<ParameterSpec> = Vec::new();
        for item in items {
            let param = self.parameter(item, element, prefix)?;
            if out
                .iter()
                .any(|p| p.name == param.name && p.location == param.location)
            {
                return Err(GenerateError::invalid_fact(
                    element,
                    format!(
                        "parameter '{}' is declared twice in {}",
                        param.name,
                        param.location.as_str()
                    ),
                ));
            }
            out.push(param);
        }
        Ok(out)
    }

    fn parameter(&mut self, node: &Node, element: &str, prefix: &str) -> Result<ParameterSpec> {
        let name = str_field(node, "name")
            .ok_or_else(|| GenerateError::invalid_fact(element, "parameter without a 'name'"))?;
        let raw_location = node.get("in").and_then(Node::as_str).unwrap_or("");
        let location = ParameterLocation::parse(raw_location).ok_or_else(|| {
            GenerateError::invalid_fact(
                element,
                format!("parameter '{name}' has unsupported location '{raw_location}'"),
            )
        })?;
        let schema = node.get("schema");
        let (ty, format, default) = match schema {
            Some(schema) => {
                let lift_name = format!("{prefix}{}Param", type_name_part(&name));
                let (ty, _) = self.schemas.field_type(schema, &lift_name)?;
                (ty, str_field(schema, "format"), schema.get("default").map(Node::to_json))
            }
            None => (FieldType::String, None, None),
        };
        let required = location == ParameterLocation::Path
            || node.get("required").and_then(Node::as_bool).unwrap_or(false);
        Ok(ParameterSpec {
            name,
            location,
            required,
            ty,
            format,
            description: str_field(node, "description"),
            default,
        })
    }

    fn request_body(&mut self, node: &Node, element: &str, prefix: &str) -> Result<RequestBodySpec> {
        let (content_type, ty) = self
            .payload(node.get("content"), &format!("{prefix}Request"), element)?
            .ok_or_else(|| GenerateError::invalid_fact(element, "requestBody has no content"))?;
        let (schema, is_array) = payload_schema(&ty);
        Ok(RequestBodySpec {
            schema,
            is_array,
            ty,
            content_type,
            required: node.get("required").and_then(Node::as_bool).unwrap_or(false),
        })
    }

    fn responses(
        &mut self,
        node: &Node,
        element: &str,
        prefix: &str,
    ) -> Result<BTreeMap<String, ResponseSpec>> {
        let entries = node
            .as_mapping()
            .ok_or_else(|| GenerateError::invalid_fact(element, "'responses' must be a mapping"))?;
        let mut out = BTreeMap::new();
        for (status, response) in entries {
            let lift_name = format!("{prefix}Response{}", type_name_part(status));
            let payload = self.payload(response.get("content"), &lift_name, element)?;
            let (content_type, ty) = match payload {
                Some((content_type, ty)) => (Some(content_type), Some(ty)),
                None => (None, None),
            };
            let (schema, is_array) = ty.as_ref().map(payload_schema).unwrap_or((None, false));
            out.insert(
                status.clone(),
                ResponseSpec {
                    description: str_field(response, "description"),
                    schema,
                    is_array,
                    ty,
                    content_type,
                },
            );
        }
        Ok(out)
    }

    /// Pick `application/json` (else the first media type) and type its schema
    fn payload(
        &mut self,
        content: Option<&Node>,
        lift_name: &str,
        element: &str,
    ) -> Result<Option<(String, FieldType)>> {
        let Some(content) = content else {
            return Ok(None);
        };
        let entries = content
            .as_mapping()
            .ok_or_else(|| GenerateError::invalid_fact(element, "'content' must be a mapping"))?;
        let chosen = entries
            .iter()
            .find(|(media, _)| media == "application/json")
            .or_else(|| entries.first());
        let Some((media_type, media)) = chosen else {
            return Ok(None);
        };
        let ty = match media.get("schema") {
            Some(schema) => self.schemas.field_type(schema, lift_name)?.0,
            None => FieldType::Any,
        };
        Ok(Some((media_type.clone(), ty)))
    }

    fn security(&self, node: Option<&Node>, element: &str) -> Result<SecurityRequirements> {
        let Some(node) = node else {
            return Ok(SecurityRequirements::default());
        };
        let items = node
            .as_sequence()
            .ok_or_else(|| GenerateError::invalid_fact(element, "'security' must be a sequence"))?;
        let mut alternatives = Vec::with_capacity(items.len());
        for item in items {
            let entries = item.as_mapping().ok_or_else(|| {
                GenerateError::invalid_fact(element, "security requirement must be a mapping")
            })?;
            let mut group: Vec<String> = Vec::new();
            for (name, _scopes) in entries {
                if self.schemes.iter().all(|s| s.name != *name) {
                    return Err(GenerateError::invalid_fact(
                        element,
                        format!("security requirement names undeclared scheme '{name}'"),
                    ));
                }
                if !group.contains(name) {
                    group.push(name.clone());
                }
            }
            alternatives.push(group);
        }
        Ok(SecurityRequirements {
            alternatives,
            declared: true,
        })
    }
}

fn payload_schema(ty: &FieldType) -> (Option<String>, bool) {
    match ty {
        FieldType::Object(name) => (Some(name.clone()), false),
        FieldType::Array(inner) => match inner.as_ref() {
            FieldType::Object(name) => (Some(name.clone()), true),
            _ => (None, false),
        },
        _ => (None, false),
    }
}

/// `GET /widgets/{id}` → `get_widgets_id`
fn synthesize_operation_id(method: &Method, path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .map(|s| s.trim_start_matches('{').trim_end_matches('}'))
        .filter(|s| !s.is_empty())
        .map(to_snake_case)
        .filter(|s| !s.is_empty())
        .collect();
    let method = method.as_str().to_ascii_lowercase();
    if segments.is_empty() {
        format!("{method}_root")
    } else {
        format!("{method}_{}", segments.join("_"))
    }
}

/// Operation parameters override path-item parameters with the same name and location
fn merge_parameters(shared: &[ParameterSpec], own: Vec<ParameterSpec>) -> Vec<ParameterSpec> {
    let mut merged = shared.to_vec();
    for param in own {
        match merged
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            Some(existing) => *existing = param,
            None => merged.push(param),
        }
    }
    merged
}

/// Names between braces in a path template
fn template_parameters(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        names.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    names
}

fn check_path_template(path: &str, parameters: &[ParameterSpec], operation_id: &str) -> Result<()> {
    let template = template_parameters(path);
    for name in &template {
        let declared = parameters
            .iter()
            .any(|p| p.location == ParameterLocation::Path && p.name == *name);
        if !declared {
            return Err(GenerateError::invalid_fact(
                operation_id,
                format!("path parameter '{name}' in '{path}' has no matching 'in: path' parameter"),
            ));
        }
    }
    for param in parameters.iter().filter(|p| p.location == ParameterLocation::Path) {
        if !template.contains(&param.name.as_str()) {
            return Err(GenerateError::invalid_fact(
                operation_id,
                format!("path parameter '{}' does not appear in '{path}'", param.name),
            ));
        }
    }
    Ok(())
}

/// Path template with parameter names erased: `/a/{id}` → `/a/{}`
pub fn normalize_template(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_param = false;
    for c in path.chars() {
        match c {
            '{' => {
                in_param = true;
                out.push_str("{}");
            }
            '}' => in_param = false,
            _ if in_param => {}
            _ => out.push(c),
        }
    }
    out
}

fn check_endpoint_uniqueness(endpoints: &[EndpointDescriptor]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::new();
    let mut handlers: HashMap<&str, &str> = HashMap::new();
    let mut routes: HashMap<(Method, String), &str> = HashMap::new();
    for endpoint in endpoints {
        if !ids.insert(endpoint.operation_id.as_str()) {
            return Err(GenerateError::invalid_fact(
                &endpoint.operation_id,
                "duplicate operation id",
            ));
        }
        if let Some(other) = handlers.insert(endpoint.handler_name.as_str(), endpoint.operation_id.as_str()) {
            return Err(GenerateError::invalid_fact(
                &endpoint.operation_id,
                format!(
                    "handler name '{}' collides with operation '{other}'",
                    endpoint.handler_name
                ),
            ));
        }
        let key = (endpoint.method.clone(), normalize_template(&endpoint.path));
        if let Some(other) = routes.insert(key, &endpoint.operation_id) {
            return Err(GenerateError::invalid_fact(
                format!("{} {}", endpoint.method, endpoint.path),
                format!("duplicates the path and method of operation '{other}'"),
            ));
        }
    }
    Ok(())
}

fn extract_security_schemes(
    document: &SpecDocument,
    options: &ExtractOptions,
) -> Result<Vec<SecuritySchemeNode>> {
    let mut out: Vec<SecuritySchemeNode> = Vec::new();
    for (name, node) in document.security_schemes() {
        if out.iter().any(|s| s.name == name) {
            return Err(GenerateError::invalid_fact(name, "duplicate security scheme name"));
        }
        let scheme_type = node
            .get("type")
            .and_then(Node::as_str)
            .ok_or_else(|| GenerateError::invalid_fact(name, "security scheme has no 'type'"))?;
        let (kind, parameter_name) = match scheme_type {
            "apiKey" => {
                let parameter = str_field(node, "name").ok_or_else(|| {
                    GenerateError::invalid_fact(name, "apiKey scheme has no 'name'")
                })?;
                let kind = match node.get("in").and_then(Node::as_str) {
                    Some("header") => SecurityKind::ApiKeyHeader,
                    Some("query") => SecurityKind::ApiKeyQuery,
                    Some("cookie") => SecurityKind::ApiKeyCookie,
                    other => {
                        return Err(GenerateError::invalid_fact(
                            name,
                            format!("apiKey scheme has unsupported location '{}'", other.unwrap_or("")),
                        ))
                    }
                };
                (kind, parameter)
            }
            "http" => {
                let scheme = node
                    .get("scheme")
                    .and_then(Node::as_str)
                    .unwrap_or("")
                    .to_ascii_lowercase();
                let kind = match scheme.as_str() {
                    "bearer" => SecurityKind::HttpBearer,
                    "basic" => SecurityKind::HttpBasic,
                    other => {
                        return Err(GenerateError::invalid_fact(
                            name,
                            format!("unsupported http auth scheme '{other}'"),
                        ))
                    }
                };
                (kind, "Authorization".to_string())
            }
            "oauth2" => (SecurityKind::OAuth2, "Authorization".to_string()),
            "openIdConnect" => (SecurityKind::OpenIdConnect, "Authorization".to_string()),
            other => {
                return Err(GenerateError::invalid_fact(
                    name,
                    format!("unsupported security scheme type '{other}'"),
                ))
            }
        };
        let elevated = options.elevated_schemes.iter().any(|s| s == name)
            || node.get("x-elevated").and_then(Node::as_bool).unwrap_or(false)
            || name.to_ascii_lowercase().contains("admin");
        let tier = if elevated {
            SchemeTier::Elevated
        } else {
            SchemeTier::Standard
        };
        debug!(scheme = name, kind = %kind, tier = %tier, "security scheme extracted");
        out.push(SecuritySchemeNode {
            name: name.to_string(),
            kind,
            parameter_name,
            tier,
            description: str_field(node, "description"),
        });
    }
    Ok(out)
}

fn extract_info(document: &SpecDocument) -> ApiInfo {
    let info = document.info();
    let get = |key: &str| info.and_then(|i| str_field(i, key));
    let title = get("title").unwrap_or_else(|| "api".to_string());
    let slug = match slugify(&title) {
        s if s.is_empty() => "api".to_string(),
        s => s,
    };
    ApiInfo {
        version: get("version").unwrap_or_else(|| "0.0.0".to_string()),
        description: get("description"),
        title,
        slug,
    }
}

fn extract_servers(document: &SpecDocument) -> Vec<ServerMeta> {
    document
        .servers()
        .iter()
        .filter_map(|server| {
            let url = str_field(server, "url")?;
            Some(ServerMeta {
                base_path: base_path(&url),
                description: str_field(server, "description"),
                url,
            })
        })
        .collect()
}

/// Path component of a server URL; relative URLs are supported
fn base_path(url: &str) -> String {
    let relative = if url.starts_with('/') {
        format!("http://localhost{url}")
    } else {
        format!("http://localhost/{url}")
    };
    url::Url::parse(url)
        .or_else(|_| url::Url::parse(&relative))
        .map(|u| {
            let p = u.path().trim_end_matches('/');
            if p == "/" || p.is_empty() {
                String::new()
            } else {
                p.to_string()
            }
        })
        .unwrap_or_default()
}

fn extract_tags(document: &SpecDocument, endpoints: &[EndpointDescriptor]) -> Vec<Tag> {
    let mut tags: Vec<Tag> = document
        .root()
        .get("tags")
        .and_then(Node::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| {
                    Some(Tag {
                        name: str_field(t, "name")?,
                        description: str_field(t, "description"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    for name in endpoints.iter().flat_map(|e| e.tags.iter()) {
        if tags.iter().all(|t| t.name != *name) {
            tags.push(Tag {
                name: name.clone(),
                description: None,
            });
        }
    }
    tags
}
