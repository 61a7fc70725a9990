//! # Generator Module
//!
//! Emits the artifacts of an Ensemble Service from extracted facts.
//!
//! ## Overview
//!
//! Each [`ArtifactKind`] has one emitter:
//!
//! - **Model** - pydantic data models, one per schema
//! - **Persistence** - SQLAlchemy models, one per entity schema
//! - **Crud** - create/read/update/delete functions, one per entity
//! - **Route** - FastAPI handlers, one per endpoint
//! - **Auth** - the standard and elevated authentication guards
//! - **Sync** - search-index synchronization stubs, one per entity
//! - **Test** - pytest modules, one per endpoint
//!
//! ## Architecture
//!
//! ```text
//! FactSet ─┬─► Model ───────┐
//!          ├─► Persistence ─┤
//!          ├─► ...          ├─► ArtifactSet (ordered by kind, source id)
//!          └─► Test ────────┘
//! ```
//!
//! Emitters run concurrently on scoped threads. They only read the shared
//! [`FactSet`] and produce disjoint keys, so no synchronization is needed. A
//! failing or panicking emitter becomes an [`ArtifactFailure`]; its siblings
//! still finish.
//!
//! ## Templates
//!
//! Content is rendered with Askama templates from `templates/`:
//!
//! - `model.py.txt`, `persistence.py.txt`, `db_base.py.txt`
//! - `crud.py.txt`, `crud_support.py.txt`
//! - `route.py.txt`, `auth.py.txt`, `sync.py.txt`, `test_route.py.txt`

mod artifact;
mod auth;
mod crud;
mod models;
mod persistence;
mod python;
mod routes;
mod sample;
mod sync;
mod templates;
mod test_cases;
#[cfg(test)]
mod tests;

pub use artifact::*;
pub use auth::{guard_for, guard_specs, Credential, CredentialSource, GuardOutcome, GuardSpec, GuardTier};
pub use persistence::primary_key;
pub use python::py_type;
pub use sample::sample_value;
pub use test_cases::test_cases;

use crate::spec::FactSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Default environment variable holding the standard guard's secret
pub const DEFAULT_STANDARD_SECRET_ENV: &str = "ENSEMBLE_STANDARD_SECRET";
/// Default environment variable holding the elevated guard's secret
pub const DEFAULT_ELEVATED_SECRET_ENV: &str = "ENSEMBLE_ELEVATED_SECRET";

/// Settings shared by every emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitContext {
    /// Python package the generated modules live in
    pub package: String,
    /// Environment variable *names*; the generator never reads their values
    pub standard_secret_env: String,
    pub elevated_secret_env: String,
}

impl Default for EmitContext {
    fn default() -> Self {
        EmitContext {
            package: "app".to_string(),
            standard_secret_env: DEFAULT_STANDARD_SECRET_ENV.to_string(),
            elevated_secret_env: DEFAULT_ELEVATED_SECRET_ENV.to_string(),
        }
    }
}

/// Signature every emitter implements
pub type EmitFn = fn(&FactSet, &EmitContext) -> anyhow::Result<Vec<GeneratedArtifact>>;

/// Static dispatch table, in emission order
pub const EMITTERS: [(ArtifactKind, EmitFn); 7] = [
    (ArtifactKind::Model, models::emit),
    (ArtifactKind::Persistence, persistence::emit),
    (ArtifactKind::Crud, crud::emit),
    (ArtifactKind::Route, routes::emit),
    (ArtifactKind::Auth, auth::emit),
    (ArtifactKind::Sync, sync::emit),
    (ArtifactKind::Test, test_cases::emit),
];

/// One emitter that did not produce its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFailure {
    pub kind: ArtifactKind,
    pub reason: String,
}

impl fmt::Display for ArtifactFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} emitter failed: {}", self.kind, self.reason)
    }
}

/// Artifacts of one emission run plus the emitters that failed
#[derive(Debug, Clone, Default)]
pub struct EmitOutcome {
    pub artifacts: ArtifactSet,
    pub failures: Vec<ArtifactFailure>,
}

/// Run the enabled emitters over `facts`
pub fn emit_artifacts(facts: &FactSet, ctx: &EmitContext, enabled: &[ArtifactKind]) -> EmitOutcome {
    let selected: Vec<(ArtifactKind, EmitFn)> = EMITTERS
        .iter()
        .copied()
        .filter(|(kind, _)| enabled.contains(kind))
        .collect();
    run_emitters(facts, ctx, &selected)
}

/// Run emitters concurrently; results are merged in table order
pub fn run_emitters(facts: &FactSet, ctx: &EmitContext, emitters: &[(ArtifactKind, EmitFn)]) -> EmitOutcome {
    info!(emitters = emitters.len(), "emitting artifacts");
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = emitters
            .iter()
            .map(|&(kind, emit)| (kind, scope.spawn(move || emit(facts, ctx))))
            .collect();
        handles
            .into_iter()
            .map(|(kind, handle)| (kind, handle.join()))
            .collect::<Vec<_>>()
    });

    let mut outcome = EmitOutcome::default();
    for (kind, result) in results {
        let reason = match result {
            Ok(Ok(artifacts)) => {
                debug!(kind = %kind, artifacts = artifacts.len(), "emitter finished");
                for artifact in &artifacts {
                    for warning in &artifact.warnings {
                        warn!(artifact = %artifact.key, "{warning}");
                    }
                }
                outcome.artifacts.extend(artifacts);
                continue;
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };
        warn!(kind = %kind, reason = %reason, "emitter failed");
        outcome.failures.push(ArtifactFailure { kind, reason });
    }
    info!(
        artifacts = outcome.artifacts.len(),
        failures = outcome.failures.len(),
        "artifacts emitted"
    );
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
