//! Chunk split policies.

use serde::{Deserialize, Serialize};

use crate::matcher::Matcher;

/// Modules shared by at least this many async chunks move into the shared
/// async chunk.
pub const DEFAULT_MIN_SHARED_REFERENCES: usize = 3;

/// Determines which modules are pulled into a named output chunk.
///
/// `membership == None` means no module qualifies by predicate; such a chunk
/// only carries what the pipeline puts there itself (the runtime manifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSplitPolicy {
    pub name: String,
    pub membership: Option<Matcher>,
    pub min_shared_references: Option<usize>,
}

impl ChunkSplitPolicy {
    /// Third-party script modules resolved from `node_modules`.
    pub fn vendor() -> Self {
        Self {
            name: "vendor".to_string(),
            membership: Some(Matcher::All {
                of: vec![
                    Matcher::path_prefix("node_modules"),
                    Matcher::extensions(["js", "mjs", "cjs"]),
                ],
            }),
            min_shared_references: None,
        }
    }

    pub fn runtime_manifest() -> Self {
        Self {
            name: "manifest".to_string(),
            membership: None,
            min_shared_references: None,
        }
    }

    pub fn shared_async(min_references: usize) -> Self {
        Self {
            name: "vendor-async".to_string(),
            membership: Some(Matcher::ReferenceCount {
                min: min_references,
            }),
            min_shared_references: Some(min_references),
        }
    }
}
