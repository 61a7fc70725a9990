//! # CLI Module
//!
//! Command-line interface of the `ensemble-gen` binary.
//!
//! ## Commands
//!
//! ### `generate`
//!
//! Run the full pipeline and write the artifacts:
//!
//! ```bash
//! ensemble-gen generate --spec openapi.yaml --output my-service
//! ```
//!
//! Options:
//! - `--spec <SRC>` - Path or URL of the OpenAPI description (required)
//! - `--output <DIR>` - Output directory (default: the API slug)
//! - `--config <FILE>` - Config file (default: `ensemble-gen.toml` next to the OpenAPI document)
//! - `--force` - Overwrite differing files, keeping `<name>.bak`
//! - `--dry-run` - Report what would change
//! - `--only <KINDS>` - e.g. `--only model,route`
//!
//! ### `check`
//!
//! Run the pipeline without writing; print warnings and discrepancies:
//!
//! ```bash
//! ensemble-gen check --spec openapi.yaml --fail-on-discrepancy
//! ```
//!
//! ### `inspect`
//!
//! Print the extracted endpoints, schemas and security schemes:
//!
//! ```bash
//! ensemble-gen inspect --spec openapi.yaml --json
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run, run_cli, Cli, Commands};
