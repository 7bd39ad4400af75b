//! Built-in configuration layers.
//!
//! Turns a [`ProjectConfig`] into the base layer and the mode overlay that
//! [`compose`](crate::compose) merges into a descriptor. Mode-dependent
//! values are chosen here, once, from `mode.is_production()`.

use std::path::Path;

use serde_json::json;

use crate::asset::{AssetCategory, AssetCategoryRule};
use crate::compose::{compose, ConfigLayer, DevServerLayer};
use crate::descriptor::BuildDescriptor;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::mode::BuildMode;
use crate::options::{LintOptions, StyleOptions, TemplateOptions};
use crate::paths::{OutputKind, PathResolver};
use crate::project::ProjectConfig;
use crate::rules::{Concern, TransformId, TransformRule};
use crate::split::ChunkSplitPolicy;
use crate::stage::{
    AnalyzeOptions, BuildFlag, ChunkOrder, CompressOptions, DedupeStylesOptions, EmitHtmlOptions,
    ExtractStylesOptions, HashModuleIdsOptions, HtmlMinify, MinifyOptions, NameOutputsOptions,
    OptimizationStage, SplitChunksOptions, Stage, DEFAULT_COMPRESS_MIN_RATIO,
    DEFAULT_COMPRESS_THRESHOLD,
};

/// Build the descriptor for `project` rooted at `context`.
pub fn describe(project: &ProjectConfig, context: &Path, mode: BuildMode) -> Result<BuildDescriptor> {
    let (base, overlay) = layers(project, context, mode);
    compose(base, overlay, mode)
}

/// The base layer and the overlay for `mode`.
pub fn layers(project: &ProjectConfig, context: &Path, mode: BuildMode) -> (ConfigLayer, ConfigLayer) {
    let overlay = match mode {
        BuildMode::Development => development_layer(project),
        BuildMode::Production => production_layer(project),
    };
    (base_layer(project, context, mode), overlay)
}

pub fn base_layer(project: &ProjectConfig, context: &Path, mode: BuildMode) -> ConfigLayer {
    let base = &project.base;
    let production = mode.is_production();
    let (assets_subdir, public_path) = if production {
        (&project.build.assets_subdir, &project.build.assets_public_path)
    } else {
        (&project.dev.assets_subdir, &project.dev.assets_public_path)
    };
    let resolver = PathResolver::new(assets_subdir.clone(), mode);

    let mut rules = Vec::new();
    if base.use_eslint {
        let lint = LintOptions {
            emit_warning: !base.show_eslint_errors_in_overlay,
        };
        rules.push(
            TransformRule::new(
                "lint",
                Concern::Lint,
                Matcher::pattern(r"\.(js|vue)$"),
                [TransformId::Lint],
            )
            .include([base.source_dir.clone(), base.test_dir.clone()])
            .enforce_pre()
            .options(json!(lint)),
        );
    }

    let template = TemplateOptions {
        css_source_map: if production {
            project.build.production_source_map
        } else {
            project.dev.css_source_map
        },
        cache_busting: !production && project.dev.cache_busting,
        extract_styles: production,
        ..base.template.clone()
    };
    rules.push(
        TransformRule::new(
            "template",
            Concern::Template,
            Matcher::extensions(["vue"]),
            [TransformId::Template],
        )
        .options(json!(template)),
    );
    rules.push(
        TransformRule::new(
            "script",
            Concern::Script,
            Matcher::pattern(r"\.js$"),
            [TransformId::Script],
        )
        .include([
            base.source_dir.clone(),
            base.test_dir.clone(),
            "node_modules".into(),
        ]),
    );
    for category in AssetCategory::ALL {
        rules.push(
            TransformRule::new(
                format!("asset-{}", category.dir()),
                Concern::Asset,
                Matcher::pattern(category.pattern()),
                [TransformId::Url],
            )
            .asset(AssetCategoryRule::new(
                category,
                base.asset_inline_limit,
                &resolver,
            )),
        );
    }
    rules.push(TransformRule::new(
        "json",
        Concern::Data,
        Matcher::extensions(["json"]),
        [TransformId::Json],
    ));
    rules.extend(base.rules.iter().cloned());

    let html_template = if production {
        project.build.template.clone()
    } else {
        project.dev.index.clone()
    };

    ConfigLayer {
        context: Some(context.to_path_buf()),
        output_root: Some(project.build.assets_root.clone()),
        public_path: Some(public_path.clone()),
        assets_subdir: Some(assets_subdir.clone()),
        html_template: context.join(&html_template).is_file().then_some(html_template),
        source_map: Some(if production {
            project.build.production_source_map
        } else {
            project.dev.css_source_map
        }),
        entry: base.entry.clone(),
        alias: base.alias.clone(),
        define: base.define.clone(),
        extensions: base.extensions.clone(),
        main_fields: base.main_fields.clone(),
        condition_names: base.condition_names.clone(),
        rules,
        ..Default::default()
    }
}

pub fn development_layer(project: &ProjectConfig) -> ConfigLayer {
    let dev = &project.dev;
    let mut rules = style_rules(TransformId::StyleInject, dev.css_source_map);
    rules.extend(dev.rules.iter().cloned());

    let mut layer = ConfigLayer {
        html_filename: Some("index.html".to_string()),
        dev_server: Some(DevServerLayer {
            host: Some(dev.host.clone()),
            port: Some(dev.port),
            port_scan_limit: Some(dev.port_scan_limit),
            history_fallback: Some(true),
            error_overlay: Some(dev.error_overlay),
            live_reload: Some(true),
            poll_interval_ms: dev.poll,
            open_browser: Some(dev.auto_open_browser),
            proxy: dev.proxy.clone(),
        }),
        rules,
        ..Default::default()
    };
    layer
        .define
        .insert("process.env.NODE_ENV".into(), "\"development\"".into());
    layer
}

pub fn production_layer(project: &ProjectConfig) -> ConfigLayer {
    let build = &project.build;
    let resolver = PathResolver::new(build.assets_subdir.clone(), BuildMode::Production);
    let mut rules = style_rules(TransformId::StyleExtract, build.production_source_map);
    rules.extend(build.rules.iter().cloned());

    let stages = vec![
        OptimizationStage::always(Stage::ExtractStyles(ExtractStylesOptions {
            filename: resolver.template(OutputKind::Style),
            all_chunks: true,
        })),
        OptimizationStage::always(Stage::DedupeStyles(DedupeStylesOptions { safe: true })),
        OptimizationStage::always(Stage::Minify(MinifyOptions {
            parallel: true,
            drop_warnings: true,
        })),
        OptimizationStage::always(Stage::HashModuleIds(HashModuleIdsOptions {
            digest_length: 4,
        })),
        OptimizationStage::always(Stage::ConcatenateModules),
        OptimizationStage::always(Stage::SplitChunks(SplitChunksOptions {
            vendor: ChunkSplitPolicy::vendor(),
            runtime: ChunkSplitPolicy::runtime_manifest(),
            shared_async: ChunkSplitPolicy::shared_async(build.min_shared_references),
        })),
        OptimizationStage::always(Stage::NameOutputs(NameOutputsOptions {
            script: resolver.template(OutputKind::Script),
            async_script: resolver.template(OutputKind::AsyncScript),
        })),
        OptimizationStage::always(Stage::EmitHtml(EmitHtmlOptions {
            inject: true,
            minify: Some(HtmlMinify {
                remove_comments: true,
                collapse_whitespace: true,
                remove_attribute_quotes: true,
            }),
            chunk_order: ChunkOrder::Dependency,
        })),
        OptimizationStage::when(
            BuildFlag::Gzip,
            Stage::Compress(CompressOptions {
                algorithm: "gzip".to_string(),
                extensions: build.production_gzip_extensions.clone(),
                threshold: DEFAULT_COMPRESS_THRESHOLD,
                min_ratio: DEFAULT_COMPRESS_MIN_RATIO,
            }),
        ),
        OptimizationStage::when(
            BuildFlag::Report,
            Stage::Analyze(AnalyzeOptions {
                report_filename: "report.html".to_string(),
                stats_filename: "stats.json".to_string(),
            }),
        ),
    ];

    let mut layer = ConfigLayer {
        html_filename: Some(build.index.clone()),
        gzip: Some(build.production_gzip),
        report: Some(build.bundle_analyzer_report),
        rules,
        stages,
        ..Default::default()
    };
    layer
        .define
        .insert("process.env.NODE_ENV".into(), "\"production\"".into());
    layer
}

/// Style rules for plain CSS and each preprocessor, finishing with `sink`
/// (inject in development, extract in production).
pub fn style_rules(sink: TransformId, source_map: bool) -> Vec<TransformRule> {
    let options = json!(StyleOptions { source_map });
    let langs: [(&str, &str, Option<TransformId>); 5] = [
        ("css", r"\.css$", None),
        ("less", r"\.less$", Some(TransformId::Less)),
        ("sass", r"\.sass$", Some(TransformId::Sass)),
        ("scss", r"\.scss$", Some(TransformId::Scss)),
        ("stylus", r"\.(stylus|styl)$", Some(TransformId::Stylus)),
    ];

    langs
        .into_iter()
        .map(|(name, pattern, preprocessor)| {
            let chain = preprocessor
                .into_iter()
                .chain([TransformId::Postcss, TransformId::Css, sink]);
            TransformRule::new(
                format!("style-{name}"),
                Concern::Style,
                Matcher::pattern(pattern),
                chain,
            )
            .options(options.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;

    fn project() -> ProjectConfig {
        ProjectConfig::default()
    }

    #[test]
    fn production_stage_order_is_fixed() {
        let descriptor = describe(&project(), Path::new("/app"), BuildMode::Production).unwrap();
        let kinds: Vec<_> = descriptor
            .optimization_stages()
            .iter()
            .map(|s| s.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::ExtractStyles,
                StageKind::DedupeStyles,
                StageKind::Minify,
                StageKind::HashModuleIds,
                StageKind::ConcatenateModules,
                StageKind::SplitChunks,
                StageKind::NameOutputs,
                StageKind::EmitHtml,
                StageKind::Compress,
                StageKind::Analyze,
            ]
        );
        assert!(!descriptor.flags.gzip);
    }

    #[test]
    fn public_path_follows_mode() {
        let mut config = project();
        config.build.assets_public_path = "/cdn/".into();
        let prod = describe(&config, Path::new("/app"), BuildMode::Production).unwrap();
        let dev = describe(&config, Path::new("/app"), BuildMode::Development).unwrap();
        assert_eq!(prod.output_public_path, "/cdn/");
        assert_eq!(dev.output_public_path, "/");
    }

    #[test]
    fn lint_rule_is_optional() {
        let mut config = project();
        config.base.use_eslint = false;
        let descriptor = describe(&config, Path::new("/app"), BuildMode::Development).unwrap();
        assert!(descriptor.transform_rules.iter().all(|r| r.name != "lint"));
    }

    #[test]
    fn lint_emits_warnings_unless_overlay_requested() {
        let mut config = project();
        config.base.show_eslint_errors_in_overlay = true;
        let descriptor = describe(&config, Path::new("/app"), BuildMode::Development).unwrap();
        let lint = descriptor
            .transform_rules
            .iter()
            .find(|r| r.name == "lint")
            .unwrap();
        assert_eq!(lint.options["emit_warning"], false);
    }

    #[test]
    fn style_chain_ends_with_mode_sink() {
        let registry_for = |mode| {
            describe(&project(), Path::new("/app"), mode)
                .unwrap()
                .rule_registry()
                .unwrap()
        };

        let dev = registry_for(BuildMode::Development);
        let chain = dev.resolve_chain(Path::new("/app/src/app.css")).unwrap();
        assert_eq!(chain.transforms().last(), Some(TransformId::StyleInject));

        let prod = registry_for(BuildMode::Production);
        let chain = prod.resolve_chain(Path::new("/app/src/app.scss")).unwrap();
        assert_eq!(
            chain.transforms().collect::<Vec<_>>(),
            vec![
                TransformId::Scss,
                TransformId::Postcss,
                TransformId::Css,
                TransformId::StyleExtract
            ]
        );
    }

    #[test]
    fn component_modules_are_linted_then_compiled() {
        let descriptor = describe(&project(), Path::new("/app"), BuildMode::Development).unwrap();
        let registry = descriptor.rule_registry().unwrap();
        let chain = registry.resolve_chain(Path::new("/app/src/App.vue")).unwrap();
        assert_eq!(
            chain.transforms().collect::<Vec<_>>(),
            vec![TransformId::Lint, TransformId::Template]
        );
    }

    #[test]
    fn images_resolve_to_asset_rule() {
        let descriptor = describe(&project(), Path::new("/app"), BuildMode::Production).unwrap();
        let registry = descriptor.rule_registry().unwrap();
        let chain = registry
            .resolve_chain(Path::new("/app/src/assets/logo.png"))
            .unwrap();
        assert_eq!(chain.concern, Concern::Asset);
        let asset = chain.asset.unwrap();
        assert_eq!(asset.name_template, "static/img/[name].[hash:7].[ext]");
    }

    #[test]
    fn user_rules_are_appended() {
        let mut config = project();
        config.build.rules.push(TransformRule::new(
            "markdown",
            Concern::Data,
            Matcher::extensions(["md"]),
            [TransformId::Json],
        ));
        let descriptor = describe(&config, Path::new("/app"), BuildMode::Production).unwrap();
        assert_eq!(
            descriptor.transform_rules.last().map(|r| r.name.as_str()),
            Some("markdown")
        );
    }
}
