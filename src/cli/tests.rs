//! Unit tests for CLI commands

use super::commands::{inspect_json, inspect_text};
use crate::cli::{run, Cli, Commands};
use crate::config::GeneratorConfig;
use crate::generator::ArtifactKind;
use crate::pipeline::generate;
use clap::Parser;

const DOC: &str = r#"
openapi: 3.0.3
info: {title: Pet Shop, version: "0.3"}
components:
  securitySchemes:
    apiKey: {type: apiKey, in: header, name: X-API-Key}
  schemas:
    Pet:
      type: object
      required: [id]
      properties:
        id: {type: integer}
        name: {type: string}
security:
  - apiKey: []
paths:
  /pets/{id}:
    get:
      operationId: getPet
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Pet'}
"#;

fn write_spec(dir: &std::path::Path) -> String {
    let path = dir.join("openapi.yaml");
    std::fs::write(&path, DOC).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_generate_command_with_flags() {
    let cli = Cli::try_parse_from([
        "ensemble-gen",
        "generate",
        "--spec",
        "api.yaml",
        "--output",
        "out",
        "--force",
        "--dry-run",
        "--only",
        "model,route",
    ])
    .unwrap();

    match cli.command {
        Commands::Generate {
            spec,
            output,
            force,
            dry_run,
            only,
            config,
        } => {
            assert_eq!(spec, "api.yaml");
            assert_eq!(output.unwrap().to_string_lossy(), "out");
            assert!(force);
            assert!(dry_run);
            assert!(config.is_none());
            assert_eq!(only.unwrap(), vec![ArtifactKind::Model, ArtifactKind::Route]);
        }
        _ => panic!("Expected Generate command"),
    }
}

#[test]
fn test_unknown_only_kind_is_rejected() {
    let result = Cli::try_parse_from(["ensemble-gen", "generate", "--spec", "a.yaml", "--only", "graphql"]);
    assert!(result.is_err());
}

#[test]
fn test_check_and_inspect_parse() {
    let cli = Cli::try_parse_from([
        "ensemble-gen",
        "--log-level",
        "debug",
        "check",
        "--spec",
        "a.yaml",
        "--fail-on-discrepancy",
    ])
    .unwrap();
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert!(matches!(
        cli.command,
        Commands::Check {
            fail_on_discrepancy: true,
            ..
        }
    ));

    let cli = Cli::try_parse_from(["ensemble-gen", "inspect", "--spec", "a.yaml", "--json"]).unwrap();
    assert!(matches!(cli.command, Commands::Inspect { json: true, .. }));
}

#[test]
fn test_generate_writes_project() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path());
    let output = dir.path().join("out");
    let cli = Cli::try_parse_from([
        "ensemble-gen",
        "generate",
        "--spec",
        &spec,
        "--output",
        &output.to_string_lossy(),
    ])
    .unwrap();
    run(cli).unwrap();

    assert!(output.join("app/models/pet.py").exists());
    assert!(output.join("app/routes/get_pet.py").exists());
    assert!(output.join("app/main.py").exists());
    assert!(output.join("app/auth/elevated.py").exists());
    assert!(output.join("app/__init__.py").exists());
    assert!(output.join("tests/test_get_pet.py").exists());
}

#[test]
fn test_check_succeeds_on_clean_document() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path());
    let cli = Cli::try_parse_from(["ensemble-gen", "check", "--spec", &spec, "--fail-on-discrepancy"]).unwrap();
    run(cli).unwrap();
}

#[test]
fn test_missing_spec_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("absent.yaml");
    let cli = Cli::try_parse_from(["ensemble-gen", "check", "--spec", &spec.to_string_lossy()]).unwrap();
    let err = run(cli).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to generate from"));
}

#[test]
fn test_inspect_output() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(dir.path());
    let result = generate(&spec, &GeneratorConfig::default()).unwrap();

    let text = inspect_text(&result);
    assert!(text.starts_with("Pet Shop 0.3 (pet_shop)\n"));
    assert!(text.contains("getPet [standard]"));
    assert!(text.contains("Pet {id: integer, name: string?}"));

    let json = inspect_json(&result);
    assert_eq!(json["endpoints"][0]["operation_id"], "getPet");
    assert_eq!(json["endpoints"][0]["parameters"][0]["in"], "path");
    assert_eq!(json["schemas"][0]["fields"][1]["required"], false);
}
