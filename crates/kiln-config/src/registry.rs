//! Ordered transform rule registry.
//!
//! Rules are evaluated in registration order. The first normal rule whose
//! predicate matches supplies the module's main chain; `Pre` rules (lint)
//! are collected separately and run ahead of it.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::asset::AssetCategoryRule;
use crate::error::{ConfigError, Result};
use crate::matcher::{self, CompiledMatcher, ModuleFacts};
use crate::rules::{Concern, TransformId, TransformRule};

/// No normal rule claimed the module.
///
/// The engine treats the module as an opaque pass-through asset; it is
/// never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transform rule matches {}", .path.display())]
pub struct NoMatch {
    pub path: PathBuf,
}

/// One transformer invocation with the options of the rule that scheduled it.
#[derive(Debug, Clone, Copy)]
pub struct ChainStep<'r> {
    pub transform: TransformId,
    pub rule: &'r str,
    pub options: &'r Value,
}

#[derive(Debug, Clone)]
pub struct ResolvedChain<'r> {
    pub rule: &'r str,
    pub concern: Concern,
    /// Pre-stage steps first, then the main chain, in execution order.
    pub steps: Vec<ChainStep<'r>>,
    pub asset: Option<&'r AssetCategoryRule>,
}

impl ResolvedChain<'_> {
    pub fn transforms(&self) -> impl Iterator<Item = TransformId> + '_ {
        self.steps.iter().map(|s| s.transform)
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.transforms().any(|t| t == id)
    }

    pub fn options_for(&self, id: TransformId) -> Option<&Value> {
        self.steps.iter().find(|s| s.transform == id).map(|s| s.options)
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: TransformRule,
    test: CompiledMatcher,
    include: Vec<PathBuf>,
}

impl CompiledRule {
    fn applies_to(&self, path: &Path) -> bool {
        let in_scope =
            self.include.is_empty() || self.include.iter().any(|prefix| path.starts_with(prefix));
        in_scope && self.test.matches(&ModuleFacts::new(path))
    }
}

#[derive(Debug)]
pub struct RuleRegistry {
    rules: Vec<CompiledRule>,
}

impl RuleRegistry {
    /// Compile `rules`, anchoring relative paths at `context`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if a rule carries a bad regex.
    pub fn new(rules: &[TransformRule], context: &Path) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let test =
                    rule.test
                        .compile(context)
                        .map_err(|source| ConfigError::InvalidPattern {
                            rule: rule.name.clone(),
                            pattern: rule.test.first_pattern().unwrap_or_default().to_string(),
                            source,
                        })?;
                let include = rule
                    .include
                    .iter()
                    .map(|p| path_clean::clean(context.join(p)))
                    .collect();
                Ok(CompiledRule {
                    rule: rule.clone(),
                    test,
                    include,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rules = rules.len(), "compiled transform rules");
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolve the transform chain for the module at `path`.
    ///
    /// Query suffixes (`logo.png?inline`) are ignored when testing.
    pub fn resolve_chain(&self, path: &Path) -> std::result::Result<ResolvedChain<'_>, NoMatch> {
        let path = matcher::strip_query(path);
        let mut pre = Vec::new();

        for compiled in &self.rules {
            if !compiled.applies_to(&path) {
                continue;
            }
            let rule = &compiled.rule;
            if rule.is_pre() {
                pre.extend(steps_of(rule));
                continue;
            }

            let mut steps = pre;
            steps.extend(steps_of(rule));
            return Ok(ResolvedChain {
                rule: &rule.name,
                concern: rule.concern,
                steps,
                asset: rule.asset.as_ref(),
            });
        }

        Err(NoMatch { path })
    }
}

fn steps_of(rule: &TransformRule) -> impl Iterator<Item = ChainStep<'_>> {
    rule.chain.iter().map(move |&transform| ChainStep {
        transform,
        rule: &rule.name,
        options: &rule.options,
    })
}
