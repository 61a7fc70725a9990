use crate::config::{load_generator_config, GeneratorConfig};
use crate::generator::{guard_for, ArtifactKind};
use crate::pipeline::{generate, GenerationOutput};
use crate::project::{write_artifacts, WriteAction, WriteOptions, WriteReport};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Command-line interface for the Ensemble Service generator
#[derive(Parser)]
#[command(name = "ensemble-gen")]
#[command(about = "Generate FastAPI services from OpenAPI descriptions", long_about = None, version)]
pub struct Cli {
    /// Log level (trace/debug/info/warn/error); `RUST_LOG` takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate artifacts and write them to disk
    Generate {
        /// Path or http(s) URL of the OpenAPI description (YAML or JSON)
        #[arg(short, long)]
        spec: String,

        /// Output directory (default: the API's slug)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (default: ensemble-gen.toml next to the OpenAPI document)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite files that differ, keeping a .bak copy
        #[arg(short, long, default_value_t = false)]
        force: bool,

        /// Show what would change without writing files
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Limit generation to specific artifact kinds (comma-separated or repeated)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        only: Option<Vec<ArtifactKind>>,
    },
    /// Run the pipeline without writing and report findings
    Check {
        /// Path or http(s) URL of the OpenAPI description
        #[arg(short, long)]
        spec: String,

        /// Config file (default: ensemble-gen.toml next to the OpenAPI document)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Exit non-zero when any discrepancy is found
        #[arg(long, default_value_t = false)]
        fail_on_discrepancy: bool,
    },
    /// Print the extracted endpoints and schemas
    Inspect {
        /// Path or http(s) URL of the OpenAPI description
        #[arg(short, long)]
        spec: String,

        /// Config file (default: ensemble-gen.toml next to the OpenAPI document)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Parse arguments, set up logging and run
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    crate::logging::init_logging(cli.log_level.as_deref())?;
    run(cli)
}

/// Run an already-parsed command
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate {
            spec,
            output,
            config,
            force,
            dry_run,
            only,
        } => {
            let mut settings = load_generator_config(config.as_deref(), &spec)?;
            if let Some(kinds) = only {
                settings.emitters = kinds;
            }
            let result = run_pipeline(&spec, &settings)?;
            print_findings(&result);

            let output = output.unwrap_or_else(|| PathBuf::from(&result.facts.info.slug));
            let report = write_artifacts(&result.artifacts, &output, WriteOptions { force, dry_run })?;
            print_report(&report, &output);

            if !result.failures.is_empty() {
                bail!("{} emitter(s) failed", result.failures.len());
            }
            Ok(())
        }
        Commands::Check {
            spec,
            config,
            fail_on_discrepancy,
        } => {
            let settings = load_generator_config(config.as_deref(), &spec)?;
            let result = run_pipeline(&spec, &settings)?;
            print_findings(&result);
            println!(
                "{} artifacts, {} warnings, {} discrepancies, {} failed emitters",
                result.artifacts.len(),
                result.warnings().count(),
                result.discrepancies.len(),
                result.failures.len()
            );
            if !result.failures.is_empty() {
                bail!("{} emitter(s) failed", result.failures.len());
            }
            if fail_on_discrepancy && !result.discrepancies.is_empty() {
                bail!("{} discrepancies found", result.discrepancies.len());
            }
            Ok(())
        }
        Commands::Inspect { spec, config, json } => {
            let mut settings = load_generator_config(config.as_deref(), &spec)?;
            // Facts only; nothing needs rendering.
            settings.emitters.clear();
            let result = run_pipeline(&spec, &settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspect_json(&result))?);
            } else {
                print!("{}", inspect_text(&result));
            }
            Ok(())
        }
    }
}

fn run_pipeline(spec: &str, settings: &GeneratorConfig) -> anyhow::Result<GenerationOutput> {
    generate(spec, settings).with_context(|| format!("Failed to generate from {spec}"))
}

fn print_findings(result: &GenerationOutput) {
    for (key, warning) in result.warnings() {
        eprintln!("⚠️  {key}: {warning}");
    }
    for failure in &result.failures {
        eprintln!("❌ {failure}");
    }
    for discrepancy in &result.discrepancies {
        eprintln!("⚠️  {discrepancy}");
    }
}

fn print_report(report: &WriteReport, output: &Path) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    for file in &report.files {
        match &file.action {
            WriteAction::Created => println!("{prefix}✅ Created {}", file.path.display()),
            WriteAction::Overwritten { backup } => println!(
                "{prefix}✅ Overwrote {} (backup: {})",
                file.path.display(),
                backup.display()
            ),
            WriteAction::Skipped => println!(
                "{prefix}ℹ️  Skipping existing file {} (use --force to overwrite)",
                file.path.display()
            ),
            WriteAction::Unchanged => {}
        }
    }
    println!(
        "{prefix}{}: {} created, {} overwritten, {} unchanged, {} skipped",
        output.display(),
        report.created(),
        report.overwritten(),
        report.unchanged(),
        report.skipped()
    );
}

/// Text listing of endpoints and schemas
pub(crate) fn inspect_text(result: &GenerationOutput) -> String {
    let facts = &result.facts;
    let mut out = format!("{} {} ({})\n", facts.info.title, facts.info.version, facts.info.slug);
    out.push_str("\nEndpoints:\n");
    for endpoint in &facts.endpoints {
        out.push_str(&format!(
            "  {:<7} {:<40} {} [{}]\n",
            endpoint.method.as_str(),
            endpoint.path,
            endpoint.operation_id,
            guard_for(endpoint, facts)
        ));
    }
    out.push_str("\nSchemas:\n");
    for schema in &facts.schemas {
        let fields: Vec<String> = schema
            .fields
            .iter()
            .map(|f| format!("{}: {}{}", f.name, f.ty, if f.is_optional() { "?" } else { "" }))
            .collect();
        out.push_str(&format!("  {} {{{}}}\n", schema.name, fields.join(", ")));
    }
    out.push_str("\nSecurity schemes:\n");
    for scheme in &facts.security_schemes {
        out.push_str(&format!("  {} ({}, {})\n", scheme.name, scheme.kind, scheme.tier));
    }
    out
}

pub(crate) fn inspect_json(result: &GenerationOutput) -> serde_json::Value {
    let facts = &result.facts;
    json!({
        "title": facts.info.title,
        "version": facts.info.version,
        "slug": facts.info.slug,
        "endpoints": facts.endpoints.iter().map(|e| json!({
            "operation_id": e.operation_id,
            "handler": e.handler_name,
            "method": e.method.as_str(),
            "path": e.path,
            "guard": guard_for(e, facts).as_str(),
            "parameters": e.parameters.iter().map(|p| json!({
                "name": p.name,
                "in": p.location.as_str(),
                "required": p.required,
                "type": p.ty.to_string(),
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "schemas": facts.schemas.iter().map(|s| json!({
            "name": s.name,
            "synthesized": s.synthesized,
            "fields": s.fields.iter().map(|f| json!({
                "name": f.name,
                "type": f.ty.to_string(),
                "required": f.required,
                "nullable": f.nullable,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "security_schemes": facts.security_schemes.iter().map(|s| json!({
            "name": s.name,
            "kind": s.kind.to_string(),
            "tier": s.tier.to_string(),
        })).collect::<Vec<_>>(),
    })
}
