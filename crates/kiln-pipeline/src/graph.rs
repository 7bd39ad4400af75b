//! Module graph produced by the bundling engine.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Index of a module inside its [`ModuleGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    Script,
    Style,
    Data,
    Asset,
    /// Claimed by no rule; emitted verbatim.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Static,
    Dynamic,
}

/// Where a module's style text ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleSink {
    /// Injected into the document at runtime by the module itself.
    #[default]
    Inject,
    /// Pulled into a standalone sheet by the extract stage.
    Extract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub specifier: String,
    pub target: ModuleId,
    pub kind: ImportKind,
}

/// A file the module asks to be emitted next to the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub kind: ModuleKind,
    /// Script representation, ES module syntax.
    pub code: String,
    pub style: Option<String>,
    pub style_sink: StyleSink,
    /// URL the module's default export evaluates to (assets only).
    pub asset_url: Option<String>,
    pub emitted: Option<EmittedFile>,
    pub dependencies: Vec<Dependency>,
    pub is_entry: bool,
    /// Resolved from the third-party dependency directory.
    pub is_vendor: bool,
    pub source_size: usize,
    /// Identifier the module is registered under in rendered output.
    pub public_id: String,
    /// Set by the concatenate stage; the module is rendered inside this one.
    pub concatenated_into: Option<ModuleId>,
}

impl Module {
    pub fn is_async_target(&self, graph: &ModuleGraph) -> bool {
        graph.importers_of(self.id).any(|(_, kind)| kind == ImportKind::Dynamic)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    entries: IndexMap<String, ModuleId>,
    by_path: FxHashMap<PathBuf, ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning the existing id if the path is already known.
    pub fn add_module(&mut self, path: PathBuf, kind: ModuleKind) -> ModuleId {
        if let Some(id) = self.by_path.get(&path) {
            return *id;
        }
        let id = ModuleId(self.modules.len() as u32);
        self.by_path.insert(path.clone(), id);
        self.modules.push(Module {
            id,
            path,
            kind,
            code: String::new(),
            style: None,
            style_sink: StyleSink::default(),
            asset_url: None,
            emitted: None,
            dependencies: Vec::new(),
            is_entry: false,
            is_vendor: false,
            source_size: 0,
            public_id: String::new(),
            concatenated_into: None,
        });
        id
    }

    pub fn add_entry(&mut self, name: impl Into<String>, id: ModuleId) {
        self.modules[id.index()].is_entry = true;
        self.entries.insert(name.into(), id);
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut()
    }

    pub(crate) fn modules_slice_mut(&mut self) -> &mut [Module] {
        &mut self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn entries(&self) -> &IndexMap<String, ModuleId> {
        &self.entries
    }

    pub fn id_of(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    /// Modules importing `id`, with the kind of each import.
    pub fn importers_of(&self, id: ModuleId) -> impl Iterator<Item = (ModuleId, ImportKind)> + '_ {
        self.modules.iter().flat_map(move |m| {
            m.dependencies
                .iter()
                .filter(move |d| d.target == id)
                .map(move |d| (m.id, d.kind))
        })
    }

    /// Targets of dynamic imports, in discovery order, without duplicates.
    pub fn async_roots(&self) -> Vec<ModuleId> {
        let mut seen = FxHashSet::default();
        let mut roots = Vec::new();
        for module in &self.modules {
            for dep in &module.dependencies {
                if dep.kind == ImportKind::Dynamic && seen.insert(dep.target) {
                    roots.push(dep.target);
                }
            }
        }
        roots
    }

    /// Modules reachable from `root` through static imports, dependencies
    /// before dependents.
    pub fn static_closure(&self, root: ModuleId) -> Vec<ModuleId> {
        self.closure(root, false)
    }

    /// Like [`static_closure`](Self::static_closure) but also following
    /// dynamic imports.
    pub fn full_closure(&self, root: ModuleId) -> Vec<ModuleId> {
        self.closure(root, true)
    }

    fn closure(&self, root: ModuleId, follow_dynamic: bool) -> Vec<ModuleId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        // Explicit stack of (module, next dependency index) for post-order.
        let mut stack = vec![(root, 0usize)];
        visited.insert(root);

        while let Some((current, next)) = stack.pop() {
            let deps = &self.modules[current.index()].dependencies;
            match deps.get(next) {
                Some(dep) => {
                    stack.push((current, next + 1));
                    let follow = follow_dynamic || dep.kind == ImportKind::Static;
                    if follow && visited.insert(dep.target) {
                        stack.push((dep.target, 0));
                    }
                }
                None => order.push(current),
            }
        }
        order
    }

    /// Walk `concatenated_into` links up to the module rendered standalone.
    pub fn render_root(&self, id: ModuleId) -> ModuleId {
        let mut current = id;
        while let Some(parent) = self.modules[current.index()].concatenated_into {
            current = parent;
        }
        current
    }

    /// Modules concatenated directly into `id`, in import order.
    pub fn inlined_children(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut children = Vec::new();
        for dep in &self.modules[id.index()].dependencies {
            let target = self.module(dep.target);
            if target.concatenated_into == Some(id) && !children.contains(&dep.target) {
                children.push(dep.target);
            }
        }
        children
    }
}
