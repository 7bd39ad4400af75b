//! Layered configuration composition.
//!
//! A build descriptor is produced by merging a mode overlay onto a base
//! layer. Merging is structural:
//!
//! - scalars: the overlay wins when it sets a value
//! - maps: merged key-wise (overlay replaces shared keys, adds novel ones)
//! - lists: concatenated, base first
//! - dev server settings: merged field by field with the same rules
//!
//! The merge is associative, so `a.merge(b).merge(c) == a.merge(b.merge(c))`.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::descriptor::{BuildDescriptor, DevServerOptions, ModeProfile, ResolveOptions};
use crate::error::{ConfigError, Result};
use crate::mode::BuildMode;
use crate::rules::TransformRule;
use crate::stage::{BuildFlags, OptimizationStage};

/// A partial configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub context: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub public_path: Option<String>,
    pub assets_subdir: Option<String>,
    pub html_template: Option<PathBuf>,
    pub html_filename: Option<String>,
    pub gzip: Option<bool>,
    pub report: Option<bool>,
    pub source_map: Option<bool>,
    pub dev_server: Option<DevServerLayer>,

    pub entry: IndexMap<String, PathBuf>,
    pub alias: IndexMap<String, PathBuf>,
    pub define: IndexMap<String, String>,

    pub extensions: Vec<String>,
    pub main_fields: Vec<String>,
    pub condition_names: Vec<String>,
    pub rules: Vec<TransformRule>,
    pub stages: Vec<OptimizationStage>,
}

/// Partial development server settings.
///
/// Unset fields fall back to [`DevServerOptions::default`] when the layer
/// is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevServerLayer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub port_scan_limit: Option<u16>,
    pub history_fallback: Option<bool>,
    pub error_overlay: Option<bool>,
    pub live_reload: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub open_browser: Option<bool>,
    pub proxy: IndexMap<String, String>,
}

impl DevServerLayer {
    pub fn merge(self, overlay: DevServerLayer) -> DevServerLayer {
        DevServerLayer {
            host: overlay.host.or(self.host),
            port: overlay.port.or(self.port),
            port_scan_limit: overlay.port_scan_limit.or(self.port_scan_limit),
            history_fallback: overlay.history_fallback.or(self.history_fallback),
            error_overlay: overlay.error_overlay.or(self.error_overlay),
            live_reload: overlay.live_reload.or(self.live_reload),
            poll_interval_ms: overlay.poll_interval_ms.or(self.poll_interval_ms),
            open_browser: overlay.open_browser.or(self.open_browser),
            proxy: merge_maps(self.proxy, overlay.proxy),
        }
    }

    pub fn finalize(self) -> DevServerOptions {
        let defaults = DevServerOptions::default();
        DevServerOptions {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            port_scan_limit: self.port_scan_limit.unwrap_or(defaults.port_scan_limit),
            history_fallback: self.history_fallback.unwrap_or(defaults.history_fallback),
            error_overlay: self.error_overlay.unwrap_or(defaults.error_overlay),
            live_reload: self.live_reload.unwrap_or(defaults.live_reload),
            poll_interval_ms: self.poll_interval_ms.or(defaults.poll_interval_ms),
            open_browser: self.open_browser.unwrap_or(defaults.open_browser),
            proxy: self.proxy,
        }
    }
}

impl From<DevServerOptions> for DevServerLayer {
    fn from(options: DevServerOptions) -> Self {
        DevServerLayer {
            host: Some(options.host),
            port: Some(options.port),
            port_scan_limit: Some(options.port_scan_limit),
            history_fallback: Some(options.history_fallback),
            error_overlay: Some(options.error_overlay),
            live_reload: Some(options.live_reload),
            poll_interval_ms: options.poll_interval_ms,
            open_browser: Some(options.open_browser),
            proxy: options.proxy,
        }
    }
}

impl ConfigLayer {
    /// Merge `overlay` on top of `self`.
    pub fn merge(self, overlay: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            context: overlay.context.or(self.context),
            output_root: overlay.output_root.or(self.output_root),
            public_path: overlay.public_path.or(self.public_path),
            assets_subdir: overlay.assets_subdir.or(self.assets_subdir),
            html_template: overlay.html_template.or(self.html_template),
            html_filename: overlay.html_filename.or(self.html_filename),
            gzip: overlay.gzip.or(self.gzip),
            report: overlay.report.or(self.report),
            source_map: overlay.source_map.or(self.source_map),
            dev_server: match (self.dev_server, overlay.dev_server) {
                (Some(base), Some(overlay)) => Some(base.merge(overlay)),
                (base, overlay) => overlay.or(base),
            },

            entry: merge_maps(self.entry, overlay.entry),
            alias: merge_maps(self.alias, overlay.alias),
            define: merge_maps(self.define, overlay.define),

            extensions: concat(self.extensions, overlay.extensions),
            main_fields: concat(self.main_fields, overlay.main_fields),
            condition_names: concat(self.condition_names, overlay.condition_names),
            rules: concat(self.rules, overlay.rules),
            stages: concat(self.stages, overlay.stages),
        }
    }

    /// Validate and freeze the layer into a descriptor for `mode`.
    ///
    /// # Errors
    ///
    /// - `MissingField` when `context`, `entry` or `output_root` are absent,
    ///   or a development build has no server settings
    /// - `ModeMismatch` when a layer carries the other mode's settings
    pub fn finalize(self, mode: BuildMode) -> Result<BuildDescriptor> {
        let context = self
            .context
            .ok_or(ConfigError::MissingField { field: "context" })?;
        if !context.is_absolute() {
            return Err(ConfigError::invalid(
                "context",
                format!("{} must be an absolute path", context.display()),
            ));
        }
        let context = path_clean::clean(context);

        if self.entry.is_empty() {
            return Err(ConfigError::MissingField { field: "entry" });
        }
        let output_root = self
            .output_root
            .ok_or(ConfigError::MissingField { field: "output_root" })?;

        let profile = match mode {
            BuildMode::Production => {
                if self.dev_server.is_some() {
                    return Err(ConfigError::ModeMismatch {
                        mode,
                        field: "dev server settings",
                    });
                }
                ModeProfile::Production(self.stages)
            }
            BuildMode::Development => {
                if !self.stages.is_empty() {
                    return Err(ConfigError::ModeMismatch {
                        mode,
                        field: "optimization stages",
                    });
                }
                let server = self
                    .dev_server
                    .ok_or(ConfigError::MissingField { field: "dev_server" })?;
                ModeProfile::Development(server.finalize())
            }
        };

        let entry_points = self
            .entry
            .into_iter()
            .map(|(name, path)| (name, anchor(&context, path)))
            .collect();
        let alias = self
            .alias
            .into_iter()
            .map(|(key, path)| (key, anchor(&context, path)))
            .collect();

        Ok(BuildDescriptor {
            mode,
            output_root: anchor(&context, output_root),
            html_template: self.html_template.map(|p| anchor(&context, p)),
            html_filename: self
                .html_filename
                .unwrap_or_else(|| "index.html".to_string()),
            output_public_path: self.public_path.unwrap_or_else(|| "/".to_string()),
            assets_subdir: self.assets_subdir.unwrap_or_default(),
            transform_rules: self.rules,
            resolve: ResolveOptions {
                extensions: self.extensions,
                alias,
                main_fields: dedup(self.main_fields),
                condition_names: dedup(self.condition_names),
            },
            define: self.define,
            flags: BuildFlags {
                gzip: self.gzip.unwrap_or(false),
                report: self.report.unwrap_or(false),
                source_map: self.source_map.unwrap_or(false),
            },
            entry_points,
            profile,
            context,
        })
    }
}

/// Merge `overlay` onto `base` and freeze the result for `mode`.
pub fn compose(base: ConfigLayer, overlay: ConfigLayer, mode: BuildMode) -> Result<BuildDescriptor> {
    base.merge(overlay).finalize(mode)
}

fn merge_maps<V>(mut base: IndexMap<String, V>, overlay: IndexMap<String, V>) -> IndexMap<String, V> {
    for (key, value) in overlay {
        base.insert(key, value);
    }
    base
}

fn concat<T>(mut base: Vec<T>, overlay: Vec<T>) -> Vec<T> {
    base.extend(overlay);
    base
}

/// Drop repeated entries, keeping the first occurrence.
fn dedup(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .collect::<indexmap::IndexSet<_>>()
        .into_iter()
        .collect()
}

fn anchor(context: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path_clean::clean(path)
    } else {
        path_clean::clean(context.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::rules::{Concern, TransformId};
    use crate::stage::Stage;

    fn rule(name: &str) -> TransformRule {
        TransformRule::new(name, Concern::Script, Matcher::extensions(["js"]), [TransformId::Script])
    }

    fn dev_server() -> DevServerLayer {
        DevServerOptions {
            host: "localhost".into(),
            port: 8080,
            port_scan_limit: 10,
            ..Default::default()
        }
        .into()
    }

    fn base() -> ConfigLayer {
        let mut layer = ConfigLayer {
            context: Some(PathBuf::from("/app")),
            output_root: Some(PathBuf::from("dist")),
            public_path: Some("/".into()),
            rules: vec![rule("script")],
            ..Default::default()
        };
        layer.entry.insert("app".into(), PathBuf::from("src/main.js"));
        layer
    }

    #[test]
    fn scalars_are_replaced_by_overlay() {
        let overlay = ConfigLayer {
            public_path: Some("/cdn/".into()),
            ..Default::default()
        };
        let merged = base().merge(overlay);
        assert_eq!(merged.public_path.as_deref(), Some("/cdn/"));
        assert_eq!(merged.output_root, Some(PathBuf::from("dist")));
    }

    #[test]
    fn maps_merge_key_wise() {
        let mut overlay = ConfigLayer::default();
        overlay.entry.insert("admin".into(), PathBuf::from("src/admin.js"));
        overlay.define.insert("DEBUG".into(), "false".into());
        let merged = base().merge(overlay);
        assert_eq!(merged.entry.keys().collect::<Vec<_>>(), vec!["app", "admin"]);
        assert_eq!(merged.define["DEBUG"], "false");
    }

    #[test]
    fn lists_concatenate_base_first() {
        let overlay = ConfigLayer {
            rules: vec![rule("style")],
            ..Default::default()
        };
        let merged = base().merge(overlay);
        let names: Vec<_> = merged.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["script", "style"]);
    }

    #[test]
    fn development_requires_server_settings() {
        let err = compose(base(), ConfigLayer::default(), BuildMode::Development).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "dev_server" }));
    }

    #[test]
    fn development_profile_has_no_stages() {
        let overlay = ConfigLayer {
            dev_server: Some(dev_server()),
            ..Default::default()
        };
        let descriptor = compose(base(), overlay, BuildMode::Development).unwrap();
        assert!(descriptor.optimization_stages().is_empty());
        assert_eq!(descriptor.dev_server_options().map(|d| d.port), Some(8080));
        assert_eq!(descriptor.output_root, PathBuf::from("/app/dist"));
        assert_eq!(descriptor.entry_points["app"], PathBuf::from("/app/src/main.js"));
    }

    #[test]
    fn production_rejects_dev_server_settings() {
        let overlay = ConfigLayer {
            dev_server: Some(dev_server()),
            ..Default::default()
        };
        let err = compose(base(), overlay, BuildMode::Production).unwrap_err();
        assert!(matches!(err, ConfigError::ModeMismatch { .. }));
    }

    #[test]
    fn development_rejects_stages() {
        let overlay = ConfigLayer {
            dev_server: Some(dev_server()),
            stages: vec![OptimizationStage::always(Stage::ConcatenateModules)],
            ..Default::default()
        };
        let err = compose(base(), overlay, BuildMode::Development).unwrap_err();
        assert!(matches!(err, ConfigError::ModeMismatch { .. }));
    }

    #[test]
    fn dev_server_settings_merge_field_by_field() {
        let mut proxied = DevServerLayer {
            port: Some(9000),
            ..Default::default()
        };
        proxied.proxy.insert("/api".into(), "http://localhost:3000".into());
        let base = ConfigLayer {
            dev_server: Some(DevServerLayer {
                host: Some("0.0.0.0".into()),
                error_overlay: Some(false),
                ..dev_server()
            }),
            ..base()
        };
        let overlay = ConfigLayer {
            dev_server: Some(proxied),
            ..Default::default()
        };

        let descriptor = compose(base, overlay, BuildMode::Development).unwrap();
        let server = descriptor.dev_server_options().unwrap();
        assert_eq!(server.port, 9000);
        assert_eq!(server.host, "0.0.0.0");
        assert!(!server.error_overlay);
        assert_eq!(server.port_scan_limit, 10);
        assert_eq!(server.proxy["/api"], "http://localhost:3000");
    }

    #[test]
    fn unset_dev_server_fields_take_defaults() {
        let overlay = ConfigLayer {
            dev_server: Some(DevServerLayer {
                port: Some(3000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let descriptor = compose(base(), overlay, BuildMode::Development).unwrap();
        let server = descriptor.dev_server_options().unwrap();
        assert_eq!(server.port, 3000);
        assert_eq!(server.host, "localhost");
        assert!(server.live_reload);
    }

    #[test]
    fn resolution_fields_are_deduplicated() {
        let base = ConfigLayer {
            main_fields: vec!["browser".into(), "main".into()],
            ..base()
        };
        let overlay = ConfigLayer {
            main_fields: vec!["module".into(), "main".into()],
            condition_names: vec!["import".into()],
            ..Default::default()
        };
        let descriptor = compose(base, overlay, BuildMode::Production).unwrap();
        assert_eq!(descriptor.resolve.main_fields, vec!["browser", "main", "module"]);
        assert_eq!(descriptor.resolve.condition_names, vec!["import"]);
    }

    #[test]
    fn missing_entry_is_reported() {
        let mut layer = base();
        layer.entry.clear();
        let err = layer.finalize(BuildMode::Production).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "entry" }));
    }

    #[test]
    fn relative_context_is_rejected() {
        let layer = ConfigLayer {
            context: Some(PathBuf::from("app")),
            ..base()
        };
        assert!(layer.finalize(BuildMode::Production).is_err());
    }
}
