//! Configuration model for the kiln build orchestrator.
//!
//! - [`discovery`] loads `kiln.toml` into a [`ProjectConfig`]
//! - [`defaults`] turns it into a base layer plus a mode overlay
//! - [`compose`] merges the layers into an immutable [`BuildDescriptor`]
//! - [`registry`] resolves the transform chain for each module

pub mod asset;
pub mod compose;
pub mod defaults;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod matcher;
pub mod mode;
pub mod options;
pub mod paths;
pub mod project;
pub mod registry;
pub mod rules;
pub mod split;
pub mod stage;

pub use asset::{mime_type, AssetCategory, AssetCategoryRule, AssetDecision, DEFAULT_INLINE_LIMIT};
pub use compose::{compose, ConfigLayer, DevServerLayer};
pub use defaults::describe;
pub use descriptor::{BuildDescriptor, DevServerOptions, ModeProfile, ResolveOptions};
pub use discovery::{ConfigDiscovery, ConfigSource};
pub use error::{ConfigError, Result};
pub use matcher::{CompiledMatcher, Matcher, ModuleFacts};
pub use mode::BuildMode;
pub use options::{LintOptions, StyleOptions, TemplateOptions};
pub use paths::{OutputKind, PathResolver, TemplateVars};
pub use project::{BaseSettings, BuildSettings, DevSettings, ProjectConfig};
pub use registry::{ChainStep, NoMatch, ResolvedChain, RuleRegistry};
pub use rules::{Concern, Enforce, TransformId, TransformRule};
pub use split::{ChunkSplitPolicy, DEFAULT_MIN_SHARED_REFERENCES};
pub use stage::{BuildFlag, BuildFlags, Condition, OptimizationStage, Stage, StageKind};
