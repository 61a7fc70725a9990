//! # ensemble-gen
//!
//! **ensemble-gen** turns an [OpenAPI 3.x](https://spec.openapis.org/oas/v3.1.0)
//! description into the artifacts of an Ensemble Service: a FastAPI
//! application with pydantic models, SQLAlchemy persistence, CRUD functions,
//! authentication guards, search-index synchronization stubs and pytest
//! suites.
//!
//! ## Architecture
//!
//! - **[`spec`]** - loading, `$ref` resolution and fact extraction
//! - **[`generator`]** - the artifact emitters and their templates
//! - **[`consistency`]** - cross-checks artifacts against the facts
//! - **[`pipeline`]** - the end-to-end [`generate`] run
//! - **[`project`]** - writes artifacts to disk
//! - **[`config`]** / **[`logging`]** - run settings and tracing setup
//! - **[`cli`]** - the `ensemble-gen` command line
//!
//! ### Generation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant CLI as CLI<br/>(ensemble-gen)
//!     participant Load as spec::load_document
//!     participant Resolve as spec::resolve_document
//!     participant Extract as spec::extract_facts
//!     participant Emit as generator::emit_artifacts
//!     participant Check as consistency::validate_artifacts
//!     participant FS as project::write_artifacts
//!
//!     CLI->>Load: source path or URL
//!     Load-->>Resolve: SpecDocument
//!     Resolve->>Resolve: fetch external documents<br/>(concurrent per layer)
//!     Resolve-->>Extract: reference-free SpecDocument
//!     Extract-->>Emit: FactSet
//!     Emit->>Emit: one emitter per kind<br/>(scoped threads)
//!     Emit-->>Check: ArtifactSet + failures
//!     Check-->>CLI: discrepancies
//!     CLI->>FS: write, skip or back up
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use ensemble_gen::{generate, GeneratorConfig};
//!
//! let output = generate("openapi.yaml", &GeneratorConfig::default())?;
//! for artifact in output.artifacts.iter() {
//!     println!("{} -> {}", artifact.key, artifact.logical_name);
//! }
//! # Ok::<(), ensemble_gen::GenerateError>(())
//! ```

pub mod cli;
pub mod config;
pub mod consistency;
pub mod error;
pub mod generator;
pub mod logging;
mod naming;
pub mod pipeline;
pub mod project;
pub mod spec;

pub use config::GeneratorConfig;
pub use consistency::{validate_artifacts, Discrepancy, DiscrepancyKind};
pub use error::{GenerateError, Result, Stage, Warning, WarningKind};
pub use generator::{ArtifactFailure, ArtifactKind, ArtifactSet, GeneratedArtifact};
pub use pipeline::{generate, GenerationOutput};
pub use spec::{FactSet, SpecDocument};
