//! Specifier resolution.
//!
//! Node-style lookup through `oxc_resolver`: aliases, extension probing,
//! nested `node_modules`, `package.json` entry fields and `exports`
//! conditions. The resolver caches directory and manifest reads, so one
//! instance serves a whole build.

use std::path::{Component, Path, PathBuf};

use kiln_config::ResolveOptions;
use oxc_resolver::{AliasValue, Resolver as OxcResolver};

pub use oxc_resolver::ResolveError;

pub const DEPENDENCY_DIR: &str = "node_modules";

pub struct Resolver {
    context: PathBuf,
    inner: OxcResolver,
}

impl Resolver {
    pub fn new(options: &ResolveOptions, context: &Path) -> Self {
        let alias = options
            .alias
            .iter()
            .map(|(key, target)| {
                (
                    key.clone(),
                    vec![AliasValue::Path(target.to_string_lossy().into_owned())],
                )
            })
            .collect();
        let extensions = options
            .extensions
            .iter()
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .collect();

        let inner = OxcResolver::new(oxc_resolver::ResolveOptions {
            alias,
            extensions,
            main_fields: options.main_fields.clone(),
            condition_names: options.condition_names.clone(),
            alias_fields: vec![vec!["browser".into()]],
            // Keep paths as written so module ids stay relative to the context.
            symlinks: false,
            ..Default::default()
        });
        Self {
            context: context.to_path_buf(),
            inner,
        }
    }

    /// Resolve `specifier` as imported from `importer`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf, ResolveError> {
        let specifier = specifier.split('?').next().unwrap_or(specifier);
        let specifier = specifier.strip_prefix('~').unwrap_or(specifier);
        let dir = importer.parent().unwrap_or(&self.context);
        let resolution = self.inner.resolve(dir, specifier)?;
        Ok(path_clean::clean(resolution.path()))
    }
}

/// Whether `path` lives inside an installed package.
pub fn is_dependency(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == DEPENDENCY_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/main.js", "");
        write(root, "src/components/Hello.vue", "");
        write(root, "src/components/index.js", "");
        write(
            root,
            "node_modules/vue/package.json",
            r#"{ "main": "dist/vue.runtime.js", "module": "dist/vue.esm.js" }"#,
        );
        write(root, "node_modules/vue/dist/vue.runtime.js", "");
        write(root, "node_modules/vue/dist/vue.esm.js", "");
        write(root, "node_modules/@scope/pkg/lib/util.js", "");

        let mut alias = IndexMap::new();
        alias.insert("@".to_string(), root.join("src"));
        let resolver = Resolver::new(
            &ResolveOptions {
                extensions: vec![".js".into(), ".vue".into(), ".json".into()],
                alias,
                main_fields: vec!["browser".into(), "module".into(), "main".into()],
                condition_names: vec!["browser".into(), "import".into(), "default".into()],
            },
            root,
        );
        (dir, resolver)
    }

    #[test]
    fn relative_specifiers_probe_extensions_and_index() {
        let (dir, resolver) = project();
        let importer = dir.path().join("src/main.js");
        assert_eq!(
            resolver.resolve("./components/Hello", &importer).unwrap(),
            dir.path().join("src/components/Hello.vue")
        );
        assert_eq!(
            resolver.resolve("./components", &importer).unwrap(),
            dir.path().join("src/components/index.js")
        );
    }

    #[test]
    fn alias_and_query_are_handled() {
        let (dir, resolver) = project();
        let importer = dir.path().join("src/main.js");
        assert_eq!(
            resolver.resolve("@/components/Hello.vue?raw", &importer).unwrap(),
            dir.path().join("src/components/Hello.vue")
        );
        assert_eq!(
            resolver.resolve("~@/components/Hello.vue", &importer).unwrap(),
            dir.path().join("src/components/Hello.vue")
        );
    }

    #[test]
    fn packages_use_main_fields_in_order_and_subpaths() {
        let (dir, resolver) = project();
        let importer = dir.path().join("src/main.js");
        assert_eq!(
            resolver.resolve("vue", &importer).unwrap(),
            dir.path().join("node_modules/vue/dist/vue.esm.js")
        );
        assert_eq!(
            resolver.resolve("@scope/pkg/lib/util", &importer).unwrap(),
            dir.path().join("node_modules/@scope/pkg/lib/util.js")
        );
        assert!(matches!(
            resolver.resolve("left-pad", &importer),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn nested_dependencies_resolve_from_the_importing_package() {
        let (dir, resolver) = project();
        let root = dir.path();
        write(root, "node_modules/a/package.json", r#"{ "main": "index.js" }"#);
        write(root, "node_modules/a/index.js", "import b from 'b';");
        write(root, "node_modules/a/node_modules/b/package.json", r#"{ "main": "lib.js" }"#);
        write(root, "node_modules/a/node_modules/b/lib.js", "");

        let importer = root.join("node_modules/a/index.js");
        assert_eq!(
            resolver.resolve("b", &importer).unwrap(),
            root.join("node_modules/a/node_modules/b/lib.js")
        );
        // Not visible from the project's own sources.
        assert!(resolver.resolve("b", &root.join("src/main.js")).is_err());
    }

    #[test]
    fn exports_maps_use_browser_conditions() {
        let (dir, resolver) = project();
        let root = dir.path();
        write(
            root,
            "node_modules/env/package.json",
            r#"{ "exports": { ".": { "browser": "./browser.js", "default": "./node.js" } } }"#,
        );
        write(root, "node_modules/env/browser.js", "");
        write(root, "node_modules/env/node.js", "");

        assert_eq!(
            resolver.resolve("env", &root.join("src/main.js")).unwrap(),
            root.join("node_modules/env/browser.js")
        );
    }

    #[test]
    fn dependency_paths_are_detected_at_any_depth() {
        assert!(is_dependency(Path::new("/app/node_modules/vue/index.js")));
        assert!(is_dependency(Path::new("/app/node_modules/a/node_modules/b/lib.js")));
        assert!(!is_dependency(Path::new("/app/src/node_modules_docs.js")));
    }
}
