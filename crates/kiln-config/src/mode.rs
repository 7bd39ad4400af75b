//! Build mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Selects which configuration overlay is composed onto the base layer.
///
/// The mode is decided once per invocation and then frozen inside the
/// [`BuildDescriptor`](crate::BuildDescriptor); nothing downstream consults
/// the environment again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    /// Read the mode from `KILN_MODE`, falling back to `NODE_ENV`.
    ///
    /// Returns `None` when neither variable holds a recognizable mode so the
    /// caller can apply the subcommand's natural default.
    pub fn from_env() -> Option<Self> {
        ["KILN_MODE", "NODE_ENV"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find_map(|value| value.parse().ok())
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(ConfigError::invalid(
                "mode",
                format!("'{other}' is not a build mode (expected development or production)"),
            )),
        }
    }
}
