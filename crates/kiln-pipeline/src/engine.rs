//! The bundling engine seam.
//!
//! An engine turns a [`BuildDescriptor`] into a [`ModuleGraph`] plus
//! diagnostics. Optimization and rendering happen afterwards and do not care
//! which engine produced the graph.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kiln_config::paths::{self, TemplateVars, ASSET_HASH_LENGTH};
use kiln_config::{BuildDescriptor, RuleRegistry};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Diagnostic, Error, Result};
use crate::graph::{Dependency, EmittedFile, ModuleGraph, ModuleId, ModuleKind};
use crate::resolve::{self, ResolveError, Resolver};
use crate::scan::{self, ImportRequest, CSS_URL};
use crate::transform::{Defines, SourceModule, TransformContext, TransformerSet};

/// Result of one engine run.
#[derive(Debug)]
pub struct EngineOutput {
    pub graph: ModuleGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

impl EngineOutput {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Anything that can build a module graph from a descriptor.
pub trait BundlingEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the graph.
    ///
    /// Per-module failures are reported as diagnostics in the output; `Err`
    /// is reserved for failures that prevent a graph from being produced.
    fn build(&self, descriptor: &BuildDescriptor) -> Result<EngineOutput>;
}

/// Built-in engine: resolves and transforms modules wave by wave, each wave
/// in parallel on a pool bounded by the number of cores.
pub struct NativeEngine {
    transformers: TransformerSet,
    threads: usize,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct Processed {
    module: SourceModule,
    imports: Vec<(ImportRequest, std::result::Result<PathBuf, ResolveError>)>,
}

struct Session<'a> {
    descriptor: &'a BuildDescriptor,
    registry: RuleRegistry,
    resolver: Resolver,
    defines: Defines,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            transformers: TransformerSet::builtin(),
            threads: num_cpus::get(),
        }
    }

    pub fn with_transformers(mut self, transformers: TransformerSet) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    fn process(&self, path: &Path, session: &Session<'_>) -> Processed {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                let mut module = SourceModule::new(path.to_path_buf(), Vec::new());
                module.diagnostics.push(Diagnostic::unresolved(
                    path.to_path_buf(),
                    &path.display().to_string(),
                    err,
                ));
                return Processed {
                    module,
                    imports: Vec::new(),
                };
            }
        };

        let mut module = SourceModule::new(path.to_path_buf(), bytes);
        match session.registry.resolve_chain(path) {
            Ok(chain) => {
                let cx = TransformContext {
                    descriptor: session.descriptor,
                    defines: &session.defines,
                    chain: &chain,
                };
                if let Err(err) = self.transformers.run_chain(&mut module, &cx) {
                    module
                        .diagnostics
                        .push(Diagnostic::transform(path.to_path_buf(), err));
                    module.code.clear();
                    module.style = None;
                    module.imports.clear();
                }
            }
            Err(no_match) => {
                tracing::debug!("{no_match}; emitting as-is");
                pass_through(&mut module, session.descriptor);
            }
        }

        let mut requests = match module.kind {
            ModuleKind::Script | ModuleKind::Data => match scan::script_imports(&module.code) {
                Ok(requests) => requests,
                Err(err) => {
                    module
                        .diagnostics
                        .push(Diagnostic::syntax(path.to_path_buf(), err));
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        for request in std::mem::take(&mut module.imports) {
            if !requests.contains(&request) {
                requests.push(request);
            }
        }

        let imports = requests
            .into_iter()
            .map(|request| {
                let resolved = session.resolver.resolve(&request.specifier, path);
                (request, resolved)
            })
            .collect();
        Processed { module, imports }
    }
}

impl BundlingEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn build(&self, descriptor: &BuildDescriptor) -> Result<EngineOutput> {
        let started = Instant::now();
        let session = Session {
            descriptor,
            registry: descriptor.rule_registry()?,
            resolver: Resolver::new(&descriptor.resolve, &descriptor.context),
            defines: Defines::new(&descriptor.define),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| Error::Engine(e.to_string()))?;

        let mut graph = ModuleGraph::new();
        let mut diagnostics = Vec::new();
        let mut frontier: Vec<PathBuf> = Vec::new();

        for (name, path) in &descriptor.entry_points {
            let path = path_clean::clean(path);
            if !path.is_file() {
                return Err(Error::EntryNotFound {
                    name: name.clone(),
                    path,
                });
            }
            let known = graph.id_of(&path).is_some();
            let id = graph.add_module(path.clone(), ModuleKind::Script);
            graph.add_entry(name.clone(), id);
            if !known {
                frontier.push(path);
            }
        }

        let mut waves = 0;
        while !frontier.is_empty() {
            waves += 1;
            let processed: Vec<Processed> = pool.install(|| {
                frontier
                    .par_iter()
                    .map(|path| self.process(path, &session))
                    .collect()
            });

            let mut next = Vec::new();
            for Processed { module: source, imports } in processed {
                let id = graph.add_module(source.path.clone(), source.kind);
                diagnostics.extend(source.diagnostics);

                let mut dependencies = Vec::new();
                for (request, resolved) in imports {
                    match resolved {
                        Ok(target) => {
                            let target_id = match graph.id_of(&target) {
                                Some(existing) => existing,
                                None => {
                                    next.push(target.clone());
                                    graph.add_module(target, ModuleKind::Script)
                                }
                            };
                            dependencies.push(Dependency {
                                specifier: request.specifier,
                                target: target_id,
                                kind: request.kind,
                            });
                        }
                        Err(err) => diagnostics.push(Diagnostic::unresolved(
                            source.path.clone(),
                            &request.specifier,
                            err,
                        )),
                    }
                }

                let public_id = relative_id(&source.path, &descriptor.context);
                let module = graph.module_mut(id);
                module.kind = source.kind;
                module.source_size = source.bytes.len();
                module.code = source.code;
                module.style = source.style;
                module.style_sink = source.style_sink;
                module.asset_url = source.asset_url;
                module.emitted = source.emitted;
                module.dependencies = dependencies;
                module.is_vendor = resolve::is_dependency(&source.path);
                module.public_id = public_id;
            }
            frontier = next;
        }

        link_style_urls(&mut graph);

        let output = EngineOutput {
            graph,
            diagnostics,
            duration: started.elapsed(),
        };
        tracing::debug!(
            modules = output.graph.len(),
            waves,
            errors = output.errors().count(),
            warnings = output.warnings().count(),
            "module graph built"
        );
        Ok(output)
    }
}

/// `./src/main.js` style identifier relative to the project context.
pub(crate) fn relative_id(path: &Path, context: &Path) -> String {
    match path.strip_prefix(context) {
        Ok(rel) => format!("./{}", rel.to_string_lossy().replace('\\', "/")),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

/// Emit a module no rule claimed as a hashed file.
fn pass_through(module: &mut SourceModule, descriptor: &BuildDescriptor) {
    let resolver = descriptor.path_resolver();
    let template = resolver.assets_path(&format!("[name].[hash:{ASSET_HASH_LENGTH}].[ext]"));
    let hash = paths::short_hash(&module.bytes, ASSET_HASH_LENGTH);
    let name = module
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = module
        .path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin");
    let file_name = paths::render(
        &template,
        &TemplateVars {
            name,
            ext,
            hash: &hash,
            ..Default::default()
        },
    );
    let url = descriptor.public_url(&file_name);
    module.emitted = Some(EmittedFile {
        file_name,
        contents: module.bytes.clone(),
    });
    module.export_url(url);
    module.kind = ModuleKind::Opaque;
}

/// Point `url()` references in styles at the final asset URLs.
fn link_style_urls(graph: &mut ModuleGraph) {
    let mut rewrites: Vec<(ModuleId, FxHashMap<String, String>)> = Vec::new();
    for module in graph.modules() {
        if module.style.is_none() {
            continue;
        }
        let urls: FxHashMap<String, String> = module
            .dependencies
            .iter()
            .filter_map(|dep| {
                graph
                    .module(dep.target)
                    .asset_url
                    .clone()
                    .map(|url| (dep.specifier.clone(), url))
            })
            .collect();
        if !urls.is_empty() {
            rewrites.push((module.id, urls));
        }
    }

    for (id, urls) in rewrites {
        let module = graph.module_mut(id);
        if let Some(style) = &module.style {
            let linked = CSS_URL.replace_all(style, |caps: &regex::Captures<'_>| {
                match urls.get(caps[1].trim()) {
                    Some(url) => format!("url({})", crate::transform::json_string(url)),
                    None => caps[0].to_string(),
                }
            });
            module.style = Some(linked.into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ImportKind, StyleSink};
    use kiln_config::{describe, BuildMode, ProjectConfig};
    use tempfile::TempDir;

    fn project(files: &[(&str, &[u8])]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        dir
    }

    fn build(dir: &TempDir, mode: BuildMode) -> EngineOutput {
        let descriptor = describe(&ProjectConfig::default(), dir.path(), mode).unwrap();
        NativeEngine::new().threads(2).build(&descriptor).unwrap()
    }

    #[test]
    fn walks_static_and_dynamic_imports() {
        let dir = project(&[
            ("src/main.js", b"import { a } from './a'\nconst lazy = () => import('./lazy')\n"),
            ("src/a.js", b"export const a = 1\n"),
            ("src/lazy.js", b"import { a } from './a'\nexport default a\n"),
        ]);
        let out = build(&dir, BuildMode::Development);
        assert!(!out.has_errors(), "{:?}", out.diagnostics);
        assert_eq!(out.graph.len(), 3);

        let main = out.graph.entries()["app"];
        let kinds: Vec<_> = out
            .graph
            .module(main)
            .dependencies
            .iter()
            .map(|d| (d.specifier.as_str(), d.kind))
            .collect();
        assert_eq!(kinds, vec![("./a", ImportKind::Static), ("./lazy", ImportKind::Dynamic)]);
        assert_eq!(out.graph.module(main).public_id, "./src/main.js");
    }

    #[test]
    fn unresolved_imports_are_error_diagnostics() {
        let dir = project(&[("src/main.js", b"import './missing'\n")]);
        let out = build(&dir, BuildMode::Development);
        assert!(out.has_errors());
        assert!(out.errors().next().unwrap().message.contains("./missing"));
    }

    #[test]
    fn missing_entry_aborts() {
        let dir = project(&[]);
        let descriptor = describe(&ProjectConfig::default(), dir.path(), BuildMode::Development).unwrap();
        let err = NativeEngine::new().build(&descriptor).unwrap_err();
        assert!(matches!(err, Error::EntryNotFound { .. }));
    }

    #[test]
    fn style_urls_point_at_emitted_assets() {
        let big = vec![0u8; 20_000];
        let dir = project(&[
            ("src/main.js", b"import './app.css'\n"),
            ("src/app.css", b".a { background: url(./bg.png) }\n"),
            ("src/bg.png", &big),
        ]);
        let out = build(&dir, BuildMode::Production);
        let css = out.graph.id_of(&dir.path().join("src/app.css")).unwrap();
        let module = out.graph.module(css);
        assert_eq!(module.style_sink, StyleSink::Extract);
        let style = module.style.as_deref().unwrap();
        assert!(style.contains("url(\"/static/img/bg."), "{style}");
    }

    #[test]
    fn unclaimed_files_pass_through() {
        let dir = project(&[
            ("src/main.js", b"import notes from './notes.txt'\n"),
            ("src/notes.txt", b"hello"),
        ]);
        let out = build(&dir, BuildMode::Production);
        let notes = out.graph.id_of(&dir.path().join("src/notes.txt")).unwrap();
        let module = out.graph.module(notes);
        assert_eq!(module.kind, ModuleKind::Opaque);
        assert!(module.emitted.as_ref().unwrap().file_name.starts_with("static/notes."));
    }

    #[test]
    fn vendor_modules_are_flagged() {
        let dir = project(&[
            ("src/main.js", b"import lib from 'lib'\n"),
            ("node_modules/lib/index.js", b"export default 1\n"),
        ]);
        let out = build(&dir, BuildMode::Production);
        let lib = out
            .graph
            .id_of(&dir.path().join("node_modules/lib/index.js"))
            .unwrap();
        assert!(out.graph.module(lib).is_vendor);
    }

    #[test]
    fn commented_out_imports_are_not_followed() {
        let dir = project(&[(
            "src/main.js",
            b"// const old = () => import('./old.js');\n/* import './gone' */\nconsole.log('ok');\n",
        )]);
        let out = build(&dir, BuildMode::Production);
        assert!(!out.has_errors(), "{:?}", out.diagnostics);
        assert_eq!(out.graph.len(), 1);
    }

    #[test]
    fn nested_dependencies_are_found() {
        let dir = project(&[
            ("src/main.js", b"import a from 'a'\n"),
            ("node_modules/a/index.js", b"import b from 'b'\nexport default b\n"),
            ("node_modules/a/node_modules/b/index.js", b"export default 2\n"),
        ]);
        let out = build(&dir, BuildMode::Production);
        assert!(!out.has_errors(), "{:?}", out.diagnostics);
        let b = out
            .graph
            .id_of(&dir.path().join("node_modules/a/node_modules/b/index.js"))
            .unwrap();
        assert!(out.graph.module(b).is_vendor);
    }

    #[test]
    fn unparsable_scripts_are_syntax_diagnostics() {
        let dir = project(&[("src/main.js", b"import { from './a'\n")]);
        let out = build(&dir, BuildMode::Development);
        let error = out.errors().next().unwrap();
        assert!(matches!(error.kind, crate::error::DiagnosticKind::Syntax));
        assert!(error.message.starts_with("Syntax error"));
    }
}
