//! The end-to-end generation run.
//!
//! ```text
//! load ─► resolve ─► extract ─► emit (concurrent) ─► validate
//! ```
//!
//! The first three stages are fatal on error. Emission failures and
//! validation findings are collected into [`GenerationOutput`].

use crate::config::GeneratorConfig;
use crate::consistency::{validate_kinds, Discrepancy};
use crate::error::{Result, Warning};
use crate::generator::{emit_artifacts, ArtifactFailure, ArtifactKey, ArtifactSet};
use crate::spec::{extract_facts, load_document, resolve_document, FactSet, SourceLocation};
use std::time::Instant;
use tracing::{info, info_span, warn};

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub facts: FactSet,
    pub artifacts: ArtifactSet,
    /// Emitters that failed; their siblings' artifacts are still present
    pub failures: Vec<ArtifactFailure>,
    pub discrepancies: Vec<Discrepancy>,
}

impl GenerationOutput {
    /// Warnings raised by emitters, in artifact order
    pub fn warnings(&self) -> impl Iterator<Item = (&ArtifactKey, &Warning)> {
        self.artifacts.warnings()
    }

    /// No failed emitter and no discrepancy
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.discrepancies.is_empty()
    }
}

/// Generate every enabled artifact for the API description at `source`
///
/// `source` is a file path or an `http(s)` URL.
pub fn generate(source: &str, config: &GeneratorConfig) -> Result<GenerationOutput> {
    let span = info_span!("generate", source = %source);
    let _enter = span.enter();
    let started = Instant::now();

    let location = SourceLocation::parse(source);
    let loader = config.loader_options();
    let document = load_document(&location, &loader)?;
    let resolved = resolve_document(document, &loader)?;
    let facts = extract_facts(&resolved, &config.extract_options())?;
    info!(
        schemas = facts.schemas.len(),
        endpoints = facts.endpoints.len(),
        security_schemes = facts.security_schemes.len(),
        "facts extracted"
    );

    let outcome = emit_artifacts(&facts, &config.emit_context(), &config.emitters);
    let discrepancies = validate_kinds(&outcome.artifacts, &facts, &config.emitters);
    for discrepancy in &discrepancies {
        warn!(key = %discrepancy.key, kind = %discrepancy.kind, "{}", discrepancy.detail);
    }
    info!(
        artifacts = outcome.artifacts.len(),
        failures = outcome.failures.len(),
        discrepancies = discrepancies.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "generation finished"
    );

    Ok(GenerationOutput {
        facts,
        artifacts: outcome.artifacts,
        failures: outcome.failures,
        discrepancies,
    })
}
