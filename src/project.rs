//! Places generated artifacts on disk.
//!
//! Logical names map under the output directory. Existing files are left
//! alone unless `force` is set, in which case the previous content is kept as
//! `<name>.bak`. A file whose content already matches the artifact's
//! fingerprint is never rewritten. Python package directories get an empty
//! `__init__.py` when they have none.

use crate::generator::{fingerprint, ArtifactKey, ArtifactSet};
use anyhow::{bail, Context};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// How existing files are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Overwrite existing files that differ, keeping a `.bak` copy
    pub force: bool,
    /// Report what would happen without touching the filesystem
    pub dry_run: bool,
}

/// What happened (or would happen) to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    Created,
    /// Replaced; the previous content was moved to `backup`
    Overwritten { backup: PathBuf },
    /// Content already matches
    Unchanged,
    /// Exists with different content and `force` is off
    Skipped,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAction::Created => write!(f, "created"),
            WriteAction::Overwritten { .. } => write!(f, "overwritten"),
            WriteAction::Unchanged => write!(f, "unchanged"),
            WriteAction::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// `None` for package `__init__.py` files
    pub key: Option<ArtifactKey>,
    pub action: WriteAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub files: Vec<WrittenFile>,
    pub dry_run: bool,
}

impl WriteReport {
    pub fn count(&self, action: fn(&WriteAction) -> bool) -> usize {
        self.files.iter().filter(|f| action(&f.action)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|a| matches!(a, WriteAction::Created))
    }

    pub fn overwritten(&self) -> usize {
        self.count(|a| matches!(a, WriteAction::Overwritten { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|a| matches!(a, WriteAction::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|a| matches!(a, WriteAction::Skipped))
    }
}

/// Reject names that would escape the output directory
fn relative_path(logical_name: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(logical_name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if logical_name.is_empty() || escapes {
        bail!("artifact name '{logical_name}' is not a relative path inside the output directory");
    }
    Ok(path.to_path_buf())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Decide what to do with `path`, then do it unless `dry_run`
fn place(path: &Path, content: &str, options: WriteOptions) -> anyhow::Result<WriteAction> {
    if !path.exists() {
        if !options.dry_run {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        return Ok(WriteAction::Created);
    }

    let existing = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if fingerprint(&existing) == fingerprint(content.as_bytes()) {
        return Ok(WriteAction::Unchanged);
    }
    if !options.force {
        return Ok(WriteAction::Skipped);
    }
    let backup = backup_path(path);
    if !options.dry_run {
        fs::rename(path, &backup)
            .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(WriteAction::Overwritten { backup })
}

/// Package directories (relative) that need an `__init__.py`
fn package_dirs(artifacts: &ArtifactSet) -> anyhow::Result<BTreeSet<PathBuf>> {
    let mut dirs = BTreeSet::new();
    for artifact in artifacts.iter() {
        let relative = relative_path(&artifact.logical_name)?;
        if relative.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let mut dir = relative.parent();
        while let Some(d) = dir.filter(|d| !d.as_os_str().is_empty()) {
            if d == Path::new("tests") {
                break;
            }
            dirs.insert(d.to_path_buf());
            dir = d.parent();
        }
    }
    Ok(dirs)
}

/// Write every artifact under `output_dir`
pub fn write_artifacts(artifacts: &ArtifactSet, output_dir: &Path, options: WriteOptions) -> anyhow::Result<WriteReport> {
    info!(output = %output_dir.display(), force = options.force, dry_run = options.dry_run, "writing artifacts");
    let mut report = WriteReport {
        files: Vec::new(),
        dry_run: options.dry_run,
    };

    for artifact in artifacts.iter() {
        let path = output_dir.join(relative_path(&artifact.logical_name)?);
        let action = place(&path, &artifact.content, options)?;
        debug!(artifact = %artifact.key, path = %path.display(), action = %action, "placed artifact");
        report.files.push(WrittenFile {
            path,
            key: Some(artifact.key.clone()),
            action,
        });
    }

    for dir in package_dirs(artifacts)? {
        let path = output_dir.join(dir).join("__init__.py");
        if path.exists() {
            continue;
        }
        let action = place(&path, "", options)?;
        report.files.push(WrittenFile {
            path,
            key: None,
            action,
        });
    }

    info!(
        created = report.created(),
        overwritten = report.overwritten(),
        unchanged = report.unchanged(),
        skipped = report.skipped(),
        "artifacts written"
    );
    Ok(report)
}
