//! Binary asset categories and the inline-or-emit decision.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::paths::{self, PathResolver, TemplateVars, ASSET_HASH_LENGTH};

/// Assets strictly smaller than this many bytes are inlined.
pub const DEFAULT_INLINE_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Images,
    Media,
    Fonts,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 3] = [
        AssetCategory::Images,
        AssetCategory::Media,
        AssetCategory::Fonts,
    ];

    /// Output directory below the assets subdirectory.
    pub fn dir(self) -> &'static str {
        match self {
            AssetCategory::Images => "img",
            AssetCategory::Media => "media",
            AssetCategory::Fonts => "fonts",
        }
    }

    /// Suffix test used by the built-in rule for this category.
    pub fn pattern(self) -> &'static str {
        match self {
            AssetCategory::Images => r"\.(png|jpe?g|gif|svg)$",
            AssetCategory::Media => r"\.(mp4|webm|ogg|mp3|wav|flac|aac)$",
            AssetCategory::Fonts => r"\.(woff2?|eot|ttf|otf)$",
        }
    }
}

/// Size-threshold policy for one asset category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCategoryRule {
    pub category: AssetCategory,
    pub size_threshold_bytes: u64,
    pub name_template: String,
}

/// Outcome of [`AssetCategoryRule::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetDecision {
    /// Embed the bytes in the referencing module.
    Inline { data_uri: String },
    /// Emit a separate file at `file_name` (relative to the output root).
    Emit { file_name: String, hash: String },
}

impl AssetCategoryRule {
    pub fn new(category: AssetCategory, size_threshold_bytes: u64, resolver: &PathResolver) -> Self {
        Self {
            category,
            size_threshold_bytes,
            name_template: resolver.template(paths::OutputKind::Asset(category)),
        }
    }

    /// Inline when `bytes.len() < size_threshold_bytes`, emit otherwise.
    ///
    /// The decision only looks at the size; the emitted name embeds a
    /// 7-character hash of the content so it changes iff the bytes change.
    pub fn decide(&self, bytes: &[u8], source: &Path) -> AssetDecision {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        if (bytes.len() as u64) < self.size_threshold_bytes {
            return AssetDecision::Inline {
                data_uri: format!("data:{};base64,{}", mime_type(ext), STANDARD.encode(bytes)),
            };
        }

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset");
        let hash = paths::short_hash(bytes, ASSET_HASH_LENGTH);
        let file_name = paths::render(
            &self.name_template,
            &TemplateVars {
                name: stem,
                ext,
                hash: &hash,
                ..Default::default()
            },
        );
        AssetDecision::Emit { file_name, hash }
    }
}

/// MIME type for a file extension, as served by the dev server and used in
/// data URIs.
pub fn mime_type(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
