//! # Error Taxonomy
//!
//! Fatal failures of a generation run are reported as [`GenerateError`]. Every
//! variant belongs to exactly one pipeline [`Stage`]; when one is returned no
//! artifacts are produced.
//!
//! Non-fatal findings never surface through `Result`:
//!
//! - [`Warning`] - a target-representation limitation inside an emitter
//!   (the artifact is still produced, degraded)
//! - [`crate::generator::ArtifactFailure`] - one emitter failed, its siblings
//!   still ran
//! - [`crate::consistency::Discrepancy`] - advisory validator finding

use std::fmt;

/// Pipeline stage that produced a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Reading and parsing the source document
    Load,
    /// Resolving `$ref` cross-references
    Resolve,
    /// Converting the resolved tree into typed facts
    Extract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Resolve => write!(f, "resolve"),
            Stage::Extract => write!(f, "extract"),
        }
    }
}

/// Fatal generation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// I/O or network failure (including timeouts) reading a document
    UnreadableSource {
        /// The path or URL that could not be read
        source: String,
        /// Underlying failure
        reason: String,
        /// Stage that attempted the read (load, or resolve for external refs)
        stage: Stage,
    },
    /// Syntactically invalid text, or a root missing the required sections
    MalformedDocument {
        /// The path or URL of the offending document
        source: String,
        /// What is wrong with it
        reason: String,
    },
    /// A `$ref` whose target does not exist
    UnresolvableReference {
        /// The reference string as written
        reference: String,
        /// Where the reference was found
        location: String,
        /// Why it could not be resolved
        reason: String,
    },
    /// A reference chain that revisits a node already on the active path
    ///
    /// `path[0]` is the first node encountered twice; the last element repeats it.
    CyclicReference {
        /// Node names along the cycle, e.g. `["X", "Y", "X"]`
        path: Vec<String>,
    },
    /// A structural requirement on the extracted facts is violated
    InvalidFact {
        /// Identity of the offending element (schema name, operation id, ...)
        element: String,
        /// Which requirement was violated
        reason: String,
    },
}

impl GenerateError {
    /// The pipeline stage this error aborted
    pub fn stage(&self) -> Stage {
        match self {
            GenerateError::UnreadableSource { stage, .. } => *stage,
            GenerateError::MalformedDocument { .. } => Stage::Load,
            GenerateError::UnresolvableReference { .. } | GenerateError::CyclicReference { .. } => {
                Stage::Resolve
            }
            GenerateError::InvalidFact { .. } => Stage::Extract,
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::UnreadableSource { .. } => "UnreadableSource",
            GenerateError::MalformedDocument { .. } => "MalformedDocument",
            GenerateError::UnresolvableReference { .. } => "UnresolvableReference",
            GenerateError::CyclicReference { .. } => "CyclicReference",
            GenerateError::InvalidFact { .. } => "InvalidFact",
        }
    }

    pub(crate) fn unreadable(source: impl Into<String>, reason: impl fmt::Display, stage: Stage) -> Self {
        GenerateError::UnreadableSource {
            source: source.into(),
            reason: reason.to_string(),
            stage,
        }
    }

    pub(crate) fn malformed(source: impl Into<String>, reason: impl fmt::Display) -> Self {
        GenerateError::MalformedDocument {
            source: source.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_fact(element: impl Into<String>, reason: impl Into<String>) -> Self {
        GenerateError::InvalidFact {
            element: element.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: ", self.stage(), self.kind())?;
        match self {
            GenerateError::UnreadableSource { source, reason, .. } => {
                write!(f, "cannot read '{source}': {reason}")
            }
            GenerateError::MalformedDocument { source, reason } => {
                write!(f, "'{source}' is not a valid API description: {reason}")
            }
            GenerateError::UnresolvableReference {
                reference,
                location,
                reason,
            } => write!(f, "'{reference}' at {location}: {reason}"),
            GenerateError::CyclicReference { path } => {
                let first = path.first().map(String::as_str).unwrap_or("?");
                write!(f, "'{first}' is part of a reference cycle: {}", path.join(" -> "))
            }
            GenerateError::InvalidFact { element, reason } => write!(f, "'{element}': {reason}"),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Kind of a non-fatal finding raised while emitting artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningKind {
    /// A constraint the target representation cannot express; a best-effort type was emitted
    UnsupportedConstraint,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::UnsupportedConstraint => write!(f, "UnsupportedConstraint"),
        }
    }
}

/// Non-fatal finding attached to a degraded artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Warning {
    /// Warning category
    pub kind: WarningKind,
    /// The element that lost information, e.g. `Gadget.serial`
    pub element: String,
    /// Human-readable explanation
    pub message: String,
}

impl Warning {
    /// Create an `UnsupportedConstraint` warning
    pub fn unsupported_constraint(element: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            kind: WarningKind::UnsupportedConstraint,
            element: element.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.element, self.message)
    }
}

/// Result alias for the fatal pipeline stages
pub type Result<T> = std::result::Result<T, GenerateError>;
