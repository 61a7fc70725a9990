use super::artifact::{AppSpec, ArtifactBody, ArtifactKind, GeneratedArtifact, RouteParameter, RouteSpec};
use super::auth::{guard_for, requirement_literal, GuardTier};
use super::python::{py_literal, py_string, py_type};
use super::templates::{MainTemplate, RouteTemplate};
use super::EmitContext;
use crate::error::Warning;
use crate::naming::{sanitize_field_name, to_snake_case};
use crate::spec::{EndpointDescriptor, FactSet, FieldType, ParameterLocation, ParameterSpec};
use askama::Template;
use std::collections::BTreeSet;

/// Locations in handler signature order
const LOCATIONS: [ParameterLocation; 4] = [
    ParameterLocation::Path,
    ParameterLocation::Query,
    ParameterLocation::Header,
    ParameterLocation::Cookie,
];

/// Source id of the application entry module
pub(crate) const APP_SOURCE_ID: &str = "(app)";

pub(crate) fn emit(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>> {
    let mut artifacts = vec![emit_app(facts, ctx)?];
    for endpoint in &facts.endpoints {
        artifacts.push(emit_route(endpoint, facts, ctx)?);
    }
    Ok(artifacts)
}

fn emit_app(facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let routers: Vec<String> = facts.endpoints.iter().map(|e| e.handler_name.clone()).collect();
    let mut app_args = vec![
        format!("title={}", py_string(&facts.info.title)),
        format!("version={}", py_string(&facts.info.version)),
    ];
    if let Some(description) = &facts.info.description {
        app_args.push(format!("description={}", py_string(description)));
    }
    let content = MainTemplate {
        title: facts.info.title.clone(),
        package: ctx.package.clone(),
        app_args,
        routers: routers.clone(),
    }
    .render()?;
    Ok(GeneratedArtifact::new(
        ArtifactKind::Route,
        APP_SOURCE_ID,
        format!("{}/main.py", ctx.package),
        ArtifactBody::App(AppSpec {
            title: facts.info.title.clone(),
            version: facts.info.version.clone(),
            routers,
        }),
        content,
    ))
}

/// Python variable bound to a parameter
pub(crate) fn parameter_variable(name: &str) -> String {
    sanitize_field_name(&to_snake_case(name))
}

/// Path as served: base path prefixed, template names rewritten to variables
pub(crate) fn served_path(endpoint: &EndpointDescriptor, facts: &FactSet) -> String {
    let mut path = format!("{}{}", facts.base_path(), endpoint.path);
    for param in endpoint.parameters_in(ParameterLocation::Path) {
        let variable = parameter_variable(&param.name);
        if variable != param.name {
            path = path.replace(&format!("{{{}}}", param.name), &format!("{{{variable}}}"));
        }
    }
    path
}

fn collect_models(ty: &FieldType, out: &mut BTreeSet<String>) {
    match ty {
        FieldType::Object(name) => {
            out.insert(name.clone());
        }
        FieldType::Array(inner) | FieldType::Map(inner) => collect_models(inner, out),
        _ => {}
    }
}

fn parameter_line(endpoint: &EndpointDescriptor, param: &ParameterSpec, warnings: &mut Vec<Warning>) -> String {
    let element = format!("{}.{}", endpoint.operation_id, param.name);
    let variable = parameter_variable(&param.name);
    let mut annotation = py_type(&param.ty, param.format.as_deref(), &element, warnings);
    let default = match (&param.default, param.required) {
        (Some(value), _) => py_literal(value),
        (None, true) => "...".to_string(),
        (None, false) => {
            annotation = format!("Optional[{annotation}]");
            "None".to_string()
        }
    };
    let mut args = vec![default];
    // Path names are rewritten in the route itself; other locations keep the wire name.
    if param.location != ParameterLocation::Path
        && (variable != param.name || param.location == ParameterLocation::Header)
    {
        args.push(format!("alias={}", py_string(&param.name)));
    }
    if let Some(description) = &param.description {
        args.push(format!("description={}", py_string(description)));
    }
    format!("{variable}: {annotation} = {}({})", param.location, args.join(", "))
}

fn emit_route(endpoint: &EndpointDescriptor, facts: &FactSet, ctx: &EmitContext) -> anyhow::Result<GeneratedArtifact> {
    let mut warnings = Vec::new();
    let mut models = BTreeSet::new();
    let guard = guard_for(endpoint, facts);
    let status_code = endpoint.success_status();

    let mut params = Vec::new();
    let mut route_params = Vec::new();
    for location in LOCATIONS {
        for param in endpoint.parameters_in(location) {
            collect_models(&param.ty, &mut models);
            params.push(parameter_line(endpoint, param, &mut warnings));
            route_params.push(RouteParameter {
                name: param.name.clone(),
                location,
                required: param.required,
            });
        }
    }

    let request_model = endpoint.request_body.as_ref().map(|body| {
        collect_models(&body.ty, &mut models);
        let element = format!("{}.body", endpoint.operation_id);
        let annotation = py_type(&body.ty, None, &element, &mut warnings);
        if body.required {
            params.push(format!("payload: {annotation} = Body(...)"));
        } else {
            params.push(format!("payload: Optional[{annotation}] = Body(None)"));
        }
        annotation
    });

    let response_model = endpoint
        .success_response()
        .and_then(|response| response.ty.as_ref())
        .map(|ty| {
            collect_models(ty, &mut models);
            let element = format!("{}.response", endpoint.operation_id);
            py_type(ty, None, &element, &mut warnings)
        });

    let mut decorator_args = vec![
        py_string(&served_path(endpoint, facts)),
        format!("operation_id={}", py_string(&endpoint.operation_id)),
        format!("status_code={status_code}"),
    ];
    if let Some(model) = &response_model {
        decorator_args.push(format!("response_model={model}"));
    }
    if let Some(summary) = &endpoint.summary {
        decorator_args.push(format!("summary={}", py_string(summary)));
    }
    if let Some(description) = &endpoint.description {
        decorator_args.push(format!("description={}", py_string(description)));
    }
    if !endpoint.tags.is_empty() {
        let tags: Vec<String> = endpoint.tags.iter().map(|t| py_string(t)).collect();
        decorator_args.push(format!("tags=[{}]", tags.join(", ")));
    }
    if endpoint.deprecated {
        decorator_args.push("deprecated=True".to_string());
    }

    let mut imports: Vec<String> = models
        .iter()
        .map(|name| format!("from ..models.{} import {name}", to_snake_case(name)))
        .collect();
    let security = match guard {
        GuardTier::None => Vec::new(),
        _ => endpoint.security.alternatives.clone(),
    };
    if guard != GuardTier::None {
        decorator_args.push(format!(
            "dependencies=[Depends(require_{guard}({}))]",
            requirement_literal(&security)
        ));
        imports.push(format!("from ..auth.{guard} import require_{guard}"));
    }

    let content = RouteTemplate {
        title: facts.info.title.clone(),
        operation_id: endpoint.operation_id.clone(),
        handler: endpoint.handler_name.clone(),
        method: endpoint.method.as_str().to_ascii_lowercase(),
        imports,
        decorator_args,
        params,
        return_annotation: response_model.clone().unwrap_or_else(|| "None".to_string()),
    }
    .render()?;

    let spec = RouteSpec {
        operation_id: endpoint.operation_id.clone(),
        handler: endpoint.handler_name.clone(),
        method: endpoint.method.as_str().to_string(),
        path: endpoint.path.clone(),
        parameters: route_params,
        request_model,
        response_model,
        status_code,
        guard,
        security,
    };
    Ok(GeneratedArtifact::new(
        ArtifactKind::Route,
        endpoint.operation_id.clone(),
        format!("{}/routes/{}.py", ctx.package, endpoint.handler_name),
        ArtifactBody::Route(spec),
        content,
    )
    .with_warnings(warnings))
}
