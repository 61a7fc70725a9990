//! # Spec Module
//!
//! Reading an API description and turning it into typed facts:
//!
//! 1. [`load_document`] parses JSON/YAML into a [`Node`] tree
//! 2. [`resolve_document`] replaces every `$ref` with its target
//! 3. [`extract_facts`] converts the resolved tree into a [`FactSet`]
//!
//! Each stage consumes the immutable output of the previous one.

mod extract;
mod load;
mod node;
mod resolve;
mod types;

pub use extract::{extract_facts, normalize_template, ExtractOptions};
pub use load::{
    load_document, parse_fragment, LoaderOptions, PathItem, SourceLocation, SpecDocument,
    DEFAULT_FETCH_TIMEOUT,
};
pub use node::{Node, Scalar};
pub use resolve::{resolve_document, REF_NAME_KEY};
pub use types::*;
