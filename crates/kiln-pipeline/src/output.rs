//! Build artifacts and writing them to disk.
//!
//! A production build is assembled completely in memory. [`OutputSet::publish`]
//! then writes it into a staging directory next to the output root and swaps
//! the staging directory into place, so a failed build never leaves a
//! half-written output root behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::Serialize;

use crate::error::{Diagnostic, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Script,
    Style,
    Document,
    Asset,
    Compressed,
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// `/`-separated path relative to the output root.
    pub path: String,
    pub contents: Vec<u8>,
    pub kind: ArtifactKind,
}

impl OutputFile {
    pub fn size(&self) -> usize {
        self.contents.len()
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next()?;
        name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// Output files keyed by relative path, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    files: IndexMap<String, OutputFile>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>, kind: ArtifactKind) {
        let path = path.into();
        self.files.insert(
            path.clone(),
            OutputFile {
                path,
                contents: contents.into(),
                kind,
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&OutputFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputFile> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.files.values().map(OutputFile::size).sum()
    }

    /// Write every file below `dir`, creating directories as needed.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if a path escapes `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let dir = dir.clean();
        let targets = self
            .files
            .values()
            .map(|file| Ok((validate_output_path(&dir, &file.path)?, file)))
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(&dir)?;
        for (target, file) in targets {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &file.contents)?;
        }
        Ok(())
    }

    /// Replace `root` with exactly this output set.
    ///
    /// Files are written to a sibling staging directory first; `root` is only
    /// touched once every write has succeeded.
    pub fn publish(&self, root: &Path) -> Result<()> {
        let root = root.clean();
        let staging = staging_dir(&root)?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        if let Err(err) = self.write_to(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::rename(&staging, &root)?;
        tracing::debug!(root = %root.display(), files = self.len(), "output published");
        Ok(())
    }
}

fn staging_dir(root: &Path) -> Result<PathBuf> {
    let name = root
        .file_name()
        .ok_or_else(|| Error::InvalidOutputPath(format!("'{}' has no directory name", root.display())))?;
    let mut staging = name.to_os_string();
    staging.push(".kiln-staging");
    Ok(root.with_file_name(staging))
}

fn validate_output_path(base_dir: &Path, relative: &str) -> Result<PathBuf> {
    if relative.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "file name contains a null byte".to_string(),
        ));
    }
    let full = base_dir.join(Path::new(relative).clean()).clean();
    if !full.starts_with(base_dir) || full == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "'{relative}' escapes output directory '{}'",
            base_dir.display()
        )));
    }
    Ok(full)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkKind {
    Manifest,
    Vendor,
    SharedAsync,
    Entry,
    Async,
}

impl ChunkKind {
    /// Loaded on demand rather than from the document.
    pub fn is_async(self) -> bool {
        matches!(self, ChunkKind::SharedAsync | ChunkKind::Async)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub id: String,
    pub kind: ChunkKind,
    pub file: String,
    pub size: usize,
    /// Public ids of the modules rendered standalone in the chunk.
    pub modules: Vec<String>,
}

/// Everything a build produced.
#[derive(Debug, Clone, Default)]
pub struct BuildArtifacts {
    pub outputs: OutputSet,
    pub chunks: Vec<ChunkSummary>,
    /// Warnings, plus errors when the caller chose to render anyway.
    pub diagnostics: Vec<Diagnostic>,
    pub module_count: usize,
    pub duration: Duration,
}

impl BuildArtifacts {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Relative path of the emitted document, if one was emitted.
    pub fn document(&self) -> Option<&OutputFile> {
        self.outputs.iter().find(|f| f.kind == ArtifactKind::Document)
    }
}
