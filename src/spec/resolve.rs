//! `$ref` resolution.
//!
//! Resolution runs in two phases:
//!
//! 1. **Prefetch** - external documents named by references are loaded
//!    breadth-first into an arena. Every layer of new sources is fetched on
//!    scoped threads and merged back in document order of the originating
//!    reference, so error reporting stays deterministic.
//! 2. **Walk** - an explicit work stack rebuilds the tree with every
//!    reference replaced by its resolved target. Targets are interned to
//!    indices; the active resolution path is a stack of those indices, and a
//!    target already on it is a [`GenerateError::CyclicReference`].
//!
//! Top-level sections are walked `components` first, then `paths`, then the
//! rest, each in document order. That order decides which node a cycle error
//! names. The rebuilt root keeps the original key order.

use super::load::{parse_fragment, read_source, LoaderOptions, SourceLocation, SpecDocument};
use super::node::{Node, Scalar};
use crate::error::{GenerateError, Result, Stage};
use std::collections::HashMap;
use tracing::{debug, info};

/// Key under which a resolved component schema records its name
pub const REF_NAME_KEY: &str = "x-ref-name";

const SCHEMA_POINTER_PREFIX: &str = "/components/schemas/";

/// Resolve every reference in `document`
///
/// Relative external references are resolved against the document's source
/// location. Resolving an already-resolved document returns it unchanged.
///
/// # Errors
///
/// - `UnresolvableReference` when a target does not exist or a `$ref` is malformed
/// - `CyclicReference` when a reference chain revisits a node on the active path
/// - `UnreadableSource` / `MalformedDocument` when an external document cannot be fetched or parsed
pub fn resolve_document(document: SpecDocument, options: &LoaderOptions) -> Result<SpecDocument> {
    let (source, root) = document.into_parts();
    info!(source = %source, references = root.count_references(), "resolving references");

    let mut arena = Arena::new(source.clone(), root);
    prefetch(&mut arena, options)?;
    if arena.docs.len() > 1 {
        debug!(external_documents = arena.docs.len() - 1, "external documents loaded");
    }

    let mut walker = Walker::new(&arena);
    let resolved = walker.resolve_root()?;
    debug!(targets = walker.targets.keys.len(), "reference walk complete");
    Ok(SpecDocument::new(source, resolved))
}

/// Documents taking part in one resolution run; index 0 is the root document
struct Arena {
    docs: Vec<ArenaDoc>,
    index: HashMap<SourceLocation, usize>,
}

struct ArenaDoc {
    source: SourceLocation,
    root: Node,
}

impl Arena {
    fn new(source: SourceLocation, root: Node) -> Self {
        let mut arena = Arena {
            docs: Vec::new(),
            index: HashMap::new(),
        };
        arena.push(source, root);
        arena
    }

    fn push(&mut self, source: SourceLocation, root: Node) -> usize {
        let id = self.docs.len();
        self.index.insert(source.clone(), id);
        self.docs.push(ArenaDoc { source, root });
        id
    }
}

fn prefetch(arena: &mut Arena, options: &LoaderOptions) -> Result<()> {
    let mut frontier = vec![0usize];
    while !frontier.is_empty() {
        let mut pending: Vec<SourceLocation> = Vec::new();
        for &doc in &frontier {
            let base = &arena.docs[doc].source;
            for (reference, location) in collect_references(&arena.docs[doc].root) {
                let (doc_part, _) = split_reference(&reference);
                if doc_part.is_empty() {
                    continue;
                }
                let target = base.join(doc_part).map_err(|reason| GenerateError::UnresolvableReference {
                    reference: reference.clone(),
                    location: format!("{base}#{location}"),
                    reason,
                })?;
                if !arena.index.contains_key(&target) && !pending.contains(&target) {
                    pending.push(target);
                }
            }
        }

        let fetched: Vec<Result<Node>> = std::thread::scope(|scope| {
            let handles: Vec<_> = pending
                .iter()
                .map(|location| scope.spawn(move || fetch_fragment(location, options)))
                .collect();
            handles
                .into_iter()
                .zip(&pending)
                .map(|(handle, location)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(GenerateError::unreadable(
                            location.to_string(),
                            "fetch worker panicked",
                            Stage::Resolve,
                        ))
                    })
                })
                .collect()
        });

        frontier.clear();
        for (location, result) in pending.into_iter().zip(fetched) {
            let root = result?;
            debug!(source = %location, "external document fetched");
            frontier.push(arena.push(location, root));
        }
    }
    Ok(())
}

fn fetch_fragment(location: &SourceLocation, options: &LoaderOptions) -> Result<Node> {
    let text = read_source(location, options, Stage::Resolve)?;
    parse_fragment(&text, location)
}

/// All `$ref` strings below `root` with their JSON pointer locations, in document order
fn collect_references(root: &Node) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut stack: Vec<(&Node, String)> = vec![(root, String::new())];
    while let Some((node, location)) = stack.pop() {
        match node {
            Node::Mapping(entries) => {
                if let Some(reference) = node.reference() {
                    found.push((reference.to_string(), location.clone()));
                }
                for (key, child) in entries.iter().rev() {
                    stack.push((child, format!("{location}/{}", escape_token(key))));
                }
            }
            Node::Sequence(items) => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((child, format!("{location}/{i}")));
                }
            }
            Node::Scalar(_) => {}
        }
    }
    found
}

fn split_reference(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((doc, fragment)) => (doc, fragment),
        None => (reference, ""),
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// A reference target: a node inside one arena document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TargetKey {
    doc: usize,
    pointer: String,
}

/// Interned reference targets
#[derive(Default)]
struct Targets {
    keys: Vec<TargetKey>,
    ids: HashMap<TargetKey, usize>,
}

impl Targets {
    fn intern(&mut self, key: TargetKey) -> usize {
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let id = self.keys.len();
        self.ids.insert(key.clone(), id);
        self.keys.push(key);
        id
    }
}

enum Task<'a> {
    /// Rebuild `node` (found in arena document `doc`) and push it on the output stack
    Visit {
        node: &'a Node,
        doc: usize,
        location: String,
    },
    /// Pop `keys.len()` values and push them as a mapping
    Mapping { keys: Vec<String> },
    /// Pop `len` values and push them as a sequence
    Sequence { len: usize },
    /// A reference target finished resolving
    Exit {
        target: usize,
        overrides: Vec<(String, Node)>,
    },
}

struct Walker<'a> {
    arena: &'a Arena,
    targets: Targets,
    resolved: HashMap<usize, Node>,
    active: Vec<usize>,
}

impl<'a> Walker<'a> {
    fn new(arena: &'a Arena) -> Self {
        Walker {
            arena,
            targets: Targets::default(),
            resolved: HashMap::new(),
            active: Vec::new(),
        }
    }

    fn resolve_root(&mut self) -> Result<Node> {
        let arena: &'a Arena = self.arena;
        let root = &arena.docs[0].root;
        let entries = match root.as_mapping() {
            Some(entries) => entries,
            None => return self.resolve_value(root, 0, String::new()),
        };

        let rank = |key: &str| match key {
            "components" => 0,
            "paths" => 1,
            _ => 2,
        };
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by_key(|&i| rank(entries[i].0.as_str()));

        let mut rebuilt: Vec<Option<Node>> = vec![None; entries.len()];
        for i in order {
            let (key, value) = &entries[i];
            let node = if key == "components" {
                self.resolve_components(value)?
            } else {
                self.resolve_value(value, 0, format!("/{}", escape_token(key)))?
            };
            rebuilt[i] = Some(node);
        }

        Ok(Node::Mapping(
            entries
                .iter()
                .zip(rebuilt)
                .map(|((key, _), node)| (key.clone(), node.unwrap_or_else(Node::null)))
                .collect(),
        ))
    }

    /// Each component entry is walked as its own reference target, so a cycle
    /// through `components/schemas/X` names `X` even when X was entered directly.
    fn resolve_components(&mut self, components: &'a Node) -> Result<Node> {
        let sections = match components.as_mapping() {
            Some(sections) => sections,
            None => return self.resolve_value(components, 0, "/components".to_string()),
        };
        let mut out = Vec::with_capacity(sections.len());
        for (section, entries) in sections {
            let location = format!("/components/{}", escape_token(section));
            let node = match entries.as_mapping() {
                Some(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for (name, _) in items {
                        let pointer = format!("{location}/{}", escape_token(name));
                        let target = self.targets.intern(TargetKey { doc: 0, pointer });
                        resolved.push((name.clone(), self.resolve_target(target)?));
                    }
                    Node::Mapping(resolved)
                }
                None => self.resolve_value(entries, 0, location)?,
            };
            out.push((section.clone(), node));
        }
        Ok(Node::Mapping(out))
    }

    fn resolve_value(&mut self, node: &'a Node, doc: usize, location: String) -> Result<Node> {
        self.drain(vec![Task::Visit { node, doc, location }], Vec::new())
    }

    fn resolve_target(&mut self, target: usize) -> Result<Node> {
        let mut tasks = Vec::new();
        let mut output = Vec::new();
        self.enter(target, Vec::new(), "#", &mut tasks, &mut output)?;
        self.drain(tasks, output)
    }

    fn drain(&mut self, mut tasks: Vec<Task<'a>>, mut output: Vec<Node>) -> Result<Node> {
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit {
                    node,
                    doc,
                    location,
                } => self.visit(node, doc, location, &mut tasks, &mut output)?,
                Task::Mapping { keys } => {
                    let values = output.split_off(output.len().saturating_sub(keys.len()));
                    output.push(Node::Mapping(keys.into_iter().zip(values).collect()));
                }
                Task::Sequence { len } => {
                    let values = output.split_off(output.len().saturating_sub(len));
                    output.push(Node::Sequence(values));
                }
                Task::Exit { target, overrides } => {
                    let mut value = output.pop().unwrap_or_else(Node::null);
                    if let Some(name) = self.schema_name(target) {
                        annotate_ref_name(&mut value, name);
                    }
                    self.resolved.insert(target, value.clone());
                    self.active.pop();
                    output.push(apply_overrides(value, &overrides));
                }
            }
        }
        Ok(output.pop().unwrap_or_else(Node::null))
    }

    fn visit(
        &mut self,
        node: &'a Node,
        doc: usize,
        location: String,
        tasks: &mut Vec<Task<'a>>,
        output: &mut Vec<Node>,
    ) -> Result<()> {
        match node {
            Node::Mapping(entries) => {
                if let Some(ref_value) = node.get("$ref") {
                    let reference = ref_value.as_str().ok_or_else(|| GenerateError::UnresolvableReference {
                        reference: format!("<{}>", ref_value.kind_name()),
                        location: self.describe(doc, &location),
                        reason: "$ref must be a string".to_string(),
                    })?;
                    let target = self.target_for(reference, doc, &location)?;
                    let overrides: Vec<(String, Node)> = entries
                        .iter()
                        .filter(|(k, v)| k != "$ref" && matches!(v, Node::Scalar(_)))
                        .cloned()
                        .collect();
                    let from = self.describe(doc, &location);
                    return self.enter(target, overrides, &from, tasks, output);
                }
                tasks.push(Task::Mapping {
                    keys: entries.iter().map(|(k, _)| k.clone()).collect(),
                });
                for (key, child) in entries.iter().rev() {
                    tasks.push(Task::Visit {
                        node: child,
                        doc,
                        location: format!("{location}/{}", escape_token(key)),
                    });
                }
            }
            Node::Sequence(items) => {
                tasks.push(Task::Sequence { len: items.len() });
                for (i, child) in items.iter().enumerate().rev() {
                    tasks.push(Task::Visit {
                        node: child,
                        doc,
                        location: format!("{location}/{i}"),
                    });
                }
            }
            Node::Scalar(_) => output.push(node.clone()),
        }
        Ok(())
    }

    fn enter(
        &mut self,
        target: usize,
        overrides: Vec<(String, Node)>,
        from: &str,
        tasks: &mut Vec<Task<'a>>,
        output: &mut Vec<Node>,
    ) -> Result<()> {
        if let Some(pos) = self.active.iter().position(|&id| id == target) {
            let mut path: Vec<String> = self.active[pos..].iter().map(|&id| self.display_target(id)).collect();
            path.push(self.display_target(target));
            return Err(GenerateError::CyclicReference { path });
        }
        if let Some(done) = self.resolved.get(&target) {
            output.push(apply_overrides(done.clone(), &overrides));
            return Ok(());
        }

        let arena: &'a Arena = self.arena;
        let key = self.targets.keys[target].clone();
        let node = arena.docs[key.doc]
            .root
            .pointer(&key.pointer)
            .ok_or_else(|| GenerateError::UnresolvableReference {
                reference: self.display_target(target),
                location: from.to_string(),
                reason: "target not found".to_string(),
            })?;

        self.active.push(target);
        tasks.push(Task::Exit { target, overrides });
        tasks.push(Task::Visit {
            node,
            doc: key.doc,
            location: key.pointer,
        });
        Ok(())
    }

    fn target_for(&mut self, reference: &str, doc: usize, location: &str) -> Result<usize> {
        let (doc_part, fragment) = split_reference(reference);
        let unresolvable = |reason: String| GenerateError::UnresolvableReference {
            reference: reference.to_string(),
            location: self.describe(doc, location),
            reason,
        };
        let target_doc = if doc_part.is_empty() {
            doc
        } else {
            let source = self.arena.docs[doc].source.join(doc_part).map_err(&unresolvable)?;
            *self
                .arena
                .index
                .get(&source)
                .ok_or_else(|| unresolvable(format!("document '{source}' was not loaded")))?
        };
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(unresolvable("only JSON pointer fragments are supported".to_string()));
        }
        Ok(self.targets.intern(TargetKey {
            doc: target_doc,
            pointer: fragment.to_string(),
        }))
    }

    /// Component schema name for targets under `/components/schemas/<Name>`
    fn schema_name(&self, target: usize) -> Option<String> {
        let key = &self.targets.keys[target];
        let rest = key.pointer.strip_prefix(SCHEMA_POINTER_PREFIX)?;
        if rest.contains('/') {
            return None;
        }
        Some(rest.replace("~1", "/").replace("~0", "~"))
    }

    fn display_target(&self, target: usize) -> String {
        if let Some(name) = self.schema_name(target) {
            return name;
        }
        let key = &self.targets.keys[target];
        self.describe(key.doc, &key.pointer)
    }

    fn describe(&self, doc: usize, location: &str) -> String {
        if doc == 0 {
            format!("#{location}")
        } else {
            format!("{}#{location}", self.arena.docs[doc].source)
        }
    }
}

fn annotate_ref_name(node: &mut Node, name: String) {
    if let Node::Mapping(entries) = node {
        if !entries.iter().any(|(k, _)| k == REF_NAME_KEY) {
            entries.push((REF_NAME_KEY.to_string(), Node::Scalar(Scalar::Str(name))));
        }
    }
}

fn apply_overrides(mut node: Node, overrides: &[(String, Node)]) -> Node {
    if overrides.is_empty() {
        return node;
    }
    if let Node::Mapping(entries) = &mut node {
        for (key, value) in overrides {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => entries.push((key.clone(), value.clone())),
            }
        }
    }
    node
}
