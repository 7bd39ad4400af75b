//! Typed per-transform options.
//!
//! Rules carry their options as opaque JSON; the transformers that consume
//! them deserialize into these types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Options for the lint pre-stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintOptions {
    /// Report violations as warnings (console only) instead of errors.
    pub emit_warning: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self { emit_warning: true }
    }
}

/// Options forwarded to the component template compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    /// Element name to the attributes whose values are module references.
    pub transform_asset_urls: IndexMap<String, Vec<String>>,
    /// Append a content hash to referenced asset URLs in development.
    pub cache_busting: bool,
    pub css_source_map: bool,
    /// Styles inside components are extracted (production) rather than injected.
    pub extract_styles: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        let mut urls = IndexMap::new();
        urls.insert("video".to_string(), vec!["src".to_string(), "poster".to_string()]);
        urls.insert("source".to_string(), vec!["src".to_string()]);
        urls.insert("img".to_string(), vec!["src".to_string()]);
        urls.insert("image".to_string(), vec!["xlink:href".to_string()]);
        Self {
            transform_asset_urls: urls,
            cache_busting: true,
            css_source_map: true,
            extract_styles: false,
        }
    }
}

/// Options for the style chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub source_map: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_asset_urls_cover_media_elements() {
        let opts = TemplateOptions::default();
        assert_eq!(opts.transform_asset_urls["video"], vec!["src", "poster"]);
        assert_eq!(opts.transform_asset_urls["image"], vec!["xlink:href"]);
    }

    #[test]
    fn lint_options_deserialize_from_partial_json() {
        let opts: LintOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(opts.emit_warning);
    }
}
