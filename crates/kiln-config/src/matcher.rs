//! Declarative module predicates.
//!
//! Rules and split policies describe which modules they apply to with a small
//! tagged predicate language instead of arbitrary callbacks, so every
//! predicate can be serialized, printed and tested in isolation.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A serializable module predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Matcher {
    /// File extension (without the dot) is one of `values`.
    Extension { values: Vec<String> },
    /// Path starts with `prefix`. Relative prefixes are anchored at the
    /// project context when the matcher is compiled.
    PathPrefix { prefix: PathBuf },
    /// Regular expression tested against the `/`-separated path.
    Pattern { regex: String },
    /// The module is referenced from at least `min` places.
    ReferenceCount { min: usize },
    All { of: Vec<Matcher> },
    Any { of: Vec<Matcher> },
}

/// What a predicate can observe about a module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleFacts<'a> {
    pub path: &'a Path,
    pub reference_count: usize,
}

impl<'a> ModuleFacts<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            reference_count: 0,
        }
    }

    pub fn with_references(mut self, count: usize) -> Self {
        self.reference_count = count;
        self
    }
}

impl Matcher {
    pub fn extensions<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Matcher::Extension {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn path_prefix(prefix: impl Into<PathBuf>) -> Self {
        Matcher::PathPrefix {
            prefix: prefix.into(),
        }
    }

    pub fn pattern(regex: impl Into<String>) -> Self {
        Matcher::Pattern {
            regex: regex.into(),
        }
    }

    /// Compile regexes and anchor relative prefixes at `context`.
    pub fn compile(&self, context: &Path) -> Result<CompiledMatcher, regex::Error> {
        Ok(match self {
            Matcher::Extension { values } => CompiledMatcher::Extension(
                values
                    .iter()
                    .map(|v| v.trim_start_matches('.').to_string())
                    .collect(),
            ),
            Matcher::PathPrefix { prefix } => {
                let anchored = if prefix.is_absolute() {
                    prefix.clone()
                } else {
                    context.join(prefix)
                };
                CompiledMatcher::PathPrefix(path_clean::clean(anchored))
            }
            Matcher::Pattern { regex } => CompiledMatcher::Pattern(Regex::new(regex)?),
            Matcher::ReferenceCount { min } => CompiledMatcher::ReferenceCount(*min),
            Matcher::All { of } => CompiledMatcher::All(
                of.iter()
                    .map(|m| m.compile(context))
                    .collect::<Result<_, _>>()?,
            ),
            Matcher::Any { of } => CompiledMatcher::Any(
                of.iter()
                    .map(|m| m.compile(context))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// First regex inside this predicate, for error reporting.
    pub(crate) fn first_pattern(&self) -> Option<&str> {
        match self {
            Matcher::Pattern { regex } => Some(regex),
            Matcher::All { of } | Matcher::Any { of } => of.iter().find_map(Matcher::first_pattern),
            _ => None,
        }
    }
}

/// A [`Matcher`] ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Extension(Vec<String>),
    PathPrefix(PathBuf),
    Pattern(Regex),
    ReferenceCount(usize),
    All(Vec<CompiledMatcher>),
    Any(Vec<CompiledMatcher>),
}

impl CompiledMatcher {
    pub fn matches(&self, facts: &ModuleFacts<'_>) -> bool {
        match self {
            CompiledMatcher::Extension(values) => extension_of(facts.path)
                .map(|ext| values.iter().any(|v| v == ext))
                .unwrap_or(false),
            CompiledMatcher::PathPrefix(prefix) => facts.path.starts_with(prefix),
            CompiledMatcher::Pattern(regex) => regex.is_match(&slash_path(facts.path)),
            CompiledMatcher::ReferenceCount(min) => facts.reference_count >= *min,
            CompiledMatcher::All(of) => of.iter().all(|m| m.matches(facts)),
            CompiledMatcher::Any(of) => of.iter().any(|m| m.matches(facts)),
        }
    }
}

/// Drop a `?query` suffix from a request path.
pub fn strip_query(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match raw.find('?') {
        Some(idx) => PathBuf::from(&raw[..idx]),
        None => path.to_path_buf(),
    }
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

pub(crate) fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
