use super::node::Node;
use crate::error::{GenerateError, Result, Stage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info};

/// Default bound on any single document read
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a document comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceLocation {
    /// A local file
    File(PathBuf),
    /// A remote document fetched over HTTP(S)
    Url(url::Url),
}

impl SourceLocation {
    /// Interpret a user-supplied source identifier
    ///
    /// `http(s)://` identifiers become URLs, `file://` URLs become paths, and
    /// everything else is treated as a filesystem path.
    pub fn parse(raw: &str) -> SourceLocation {
        match url::Url::parse(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => SourceLocation::Url(url),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(SourceLocation::File)
                .unwrap_or_else(|_| SourceLocation::File(PathBuf::from(raw))),
            _ => SourceLocation::File(PathBuf::from(raw)),
        }
    }

    /// Resolve a relative document reference against this location
    pub fn join(&self, relative: &str) -> std::result::Result<SourceLocation, String> {
        if let Ok(url) = url::Url::parse(relative) {
            if url.scheme() == "http" || url.scheme() == "https" || url.scheme() == "file" {
                return Ok(SourceLocation::parse(relative));
            }
        }
        match self {
            SourceLocation::File(path) => {
                let candidate = Path::new(relative);
                if candidate.is_absolute() {
                    return Ok(SourceLocation::File(candidate.to_path_buf()));
                }
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(SourceLocation::File(normalize_path(&base.join(candidate))))
            }
            SourceLocation::Url(base) => base
                .join(relative)
                .map(SourceLocation::Url)
                .map_err(|e| e.to_string()),
        }
    }

    /// Whether the document should be parsed as JSON rather than YAML
    pub fn is_json(&self) -> bool {
        let path = match self {
            SourceLocation::File(p) => p.to_string_lossy().to_string(),
            SourceLocation::Url(u) => u.path().to_string(),
        };
        path.to_ascii_lowercase().ends_with(".json")
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(p) => write!(f, "{}", p.display()),
            SourceLocation::Url(u) => write!(f, "{u}"),
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Options for reading documents
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Upper bound on a single read or fetch
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// A parsed API description
///
/// Holds the source location (the base for relative external references)
/// and the document tree. The typed views below read straight from the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    source: SourceLocation,
    root: Node,
}

/// One entry of the `paths` section
#[derive(Debug, Clone, Copy)]
pub struct PathItem<'a> {
    /// The path template, e.g. `/widgets/{id}`
    pub path: &'a str,
    /// The path item object
    pub node: &'a Node,
}

impl SpecDocument {
    /// Wrap an already-built tree without checking its shape
    pub fn new(source: SourceLocation, root: Node) -> Self {
        SpecDocument { source, root }
    }

    /// Parse text and check the top-level shape
    pub fn parse(text: &str, source: SourceLocation) -> Result<Self> {
        let root = parse_fragment(text, &source)?;
        validate_top_level(&root, &source)?;
        Ok(SpecDocument { source, root })
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn into_parts(self) -> (SourceLocation, Node) {
        (self.source, self.root)
    }

    /// Entries of `components/<section>` in document order
    pub fn component_section(&self, section: &str) -> Vec<(&str, &Node)> {
        self.root
            .get("components")
            .and_then(|c| c.get(section))
            .and_then(Node::as_mapping)
            .map(|entries| entries.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    /// Component schemas in document order
    pub fn schemas(&self) -> Vec<(&str, &Node)> {
        self.component_section("schemas")
    }

    /// Security schemes in document order
    pub fn security_schemes(&self) -> Vec<(&str, &Node)> {
        self.component_section("securitySchemes")
    }

    /// Path items in document order
    pub fn path_items(&self) -> Vec<PathItem<'_>> {
        self.root
            .get("paths")
            .and_then(Node::as_mapping)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(path, node)| PathItem { path, node })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `servers` list
    pub fn servers(&self) -> &[Node] {
        self.root
            .get("servers")
            .and_then(Node::as_sequence)
            .unwrap_or(&[])
    }

    /// The `info` object
    pub fn info(&self) -> Option<&Node> {
        self.root.get("info")
    }
}

/// Load and shape-check an API description
///
/// # Errors
///
/// - `UnreadableSource` when the path or URL cannot be read within the timeout
/// - `MalformedDocument` when the text is not valid JSON/YAML, the root is not
///   a mapping, or it has neither a `components` nor a `paths` section
pub fn load_document(location: &SourceLocation, options: &LoaderOptions) -> Result<SpecDocument> {
    info!(source = %location, "loading API description");
    let text = read_source(location, options, Stage::Load)?;
    let document = SpecDocument::parse(&text, location.clone())?;
    debug!(
        source = %location,
        version = document.root().get("openapi").and_then(Node::as_str).unwrap_or("unknown"),
        paths = document.path_items().len(),
        schemas = document.schemas().len(),
        "document loaded"
    );
    Ok(document)
}

/// Parse document text without checking the top-level shape
///
/// Used for external reference targets, which may be bare schema files.
pub fn parse_fragment(text: &str, source: &SourceLocation) -> Result<Node> {
    if source.is_json() || text.trim_start().starts_with('{') {
        serde_json::from_str::<Node>(text)
            .map_err(|e| GenerateError::malformed(source.to_string(), e))
    } else {
        serde_yaml::from_str::<Node>(text)
            .map_err(|e| GenerateError::malformed(source.to_string(), e))
    }
}

fn validate_top_level(root: &Node, source: &SourceLocation) -> Result<()> {
    if !root.is_mapping() {
        return Err(GenerateError::malformed(
            source.to_string(),
            format!("document root must be a mapping, found {}", root.kind_name()),
        ));
    }
    if root.get("components").is_none() && root.get("paths").is_none() {
        return Err(GenerateError::malformed(
            source.to_string(),
            "document has neither a 'components' nor a 'paths' section",
        ));
    }
    Ok(())
}

/// Read a document's text, bounded by the configured timeout
pub(crate) fn read_source(location: &SourceLocation, options: &LoaderOptions, stage: Stage) -> Result<String> {
    match location {
        SourceLocation::File(path) => read_file_bounded(path, options.timeout)
            .map_err(|reason| GenerateError::unreadable(location.to_string(), reason, stage)),
        SourceLocation::Url(url) => fetch_url(url, options.timeout)
            .map_err(|reason| GenerateError::unreadable(location.to_string(), reason, stage)),
    }
}

/// Read a local file on a helper thread and wait at most `timeout` for it.
///
/// A read that outlives the timeout is abandoned, not cancelled: its thread
/// runs until the OS call returns and the result is discarded.
fn read_file_bounded(path: &Path, timeout: Duration) -> std::result::Result<String, String> {
    let (tx, rx) = mpsc::channel();
    let owned = path.to_path_buf();
    std::thread::spawn(move || {
        let result = std::fs::read(&owned).map_err(|e| e.to_string());
        if tx.send(result).is_err() {
            debug!("file read finished after the caller timed out");
        }
    });
    let bytes = rx
        .recv_timeout(timeout)
        .map_err(|_| format!("read did not complete within {} ms", timeout.as_millis()))??;
    String::from_utf8(bytes).map_err(|_| "document is not valid UTF-8".to_string())
}

fn fetch_url(url: &url::Url, timeout: Duration) -> std::result::Result<String, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(url.as_str())
        .send()
        .map_err(|e| e.to_string())?
        .error_for_status()
        .map_err(|e| e.to_string())?;
    response.text().map_err(|e| e.to_string())
}
