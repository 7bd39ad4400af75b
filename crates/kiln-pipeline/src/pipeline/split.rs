//! Chunk assignment.
//!
//! Modules are handed out in a fixed order: vendor, runtime manifest, shared
//! async, then the per-entry and per-async-root application chunks. Each
//! step consumes the pool of unassigned modules and returns the pool in its
//! next state, so the steps can only be taken in that order and a module can
//! only ever land in one chunk.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::path::Path;

use kiln_config::stage::SplitChunksOptions;
use kiln_config::{BuildDescriptor, ChunkSplitPolicy, CompiledMatcher, ModuleFacts};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{BuildState, StageResult};
use crate::graph::{ModuleGraph, ModuleId};
use crate::output::ChunkKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub kind: ChunkKind,
    /// Modules rendered standalone in this chunk.
    pub modules: Vec<ModuleId>,
    /// Module executed once the chunk and its requirements are installed.
    pub entry_module: Option<ModuleId>,
}

impl Chunk {
    fn new(id: impl Into<String>, kind: ChunkKind, modules: Vec<ModuleId>) -> Self {
        Self {
            id: id.into(),
            kind,
            modules,
            entry_module: None,
        }
    }
}

/// Final assignment of modules to chunks.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    owner: FxHashMap<ModuleId, usize>,
}

impl ChunkPlan {
    pub fn new(mut chunks: Vec<Chunk>, graph: &ModuleGraph) -> Self {
        let mut owner = FxHashMap::default();
        for (idx, chunk) in chunks.iter_mut().enumerate() {
            chunk
                .modules
                .sort_by(|a, b| graph.module(*a).public_id.cmp(&graph.module(*b).public_id));
            for module in &chunk.modules {
                owner.insert(*module, idx);
            }
        }
        Self { chunks, owner }
    }

    pub fn chunk_of(&self, module: ModuleId) -> Option<&Chunk> {
        self.owner.get(&module).map(|idx| &self.chunks[*idx])
    }

    /// Ids of the chunks holding `root`'s static import closure, in plan
    /// order.
    pub fn required_chunks(&self, graph: &ModuleGraph, root: ModuleId) -> Vec<String> {
        let indices: BTreeSet<usize> = graph
            .static_closure(root)
            .into_iter()
            .filter_map(|m| self.owner.get(&graph.render_root(m)).copied())
            .collect();
        indices
            .into_iter()
            .map(|idx| self.chunks[idx].id.clone())
            .collect()
    }
}

pub struct Fresh;
pub struct VendorTaken;
pub struct RuntimeTaken;
pub struct SharedTaken;

/// Modules not yet assigned to a chunk.
pub struct Unassigned<S> {
    pending: BTreeSet<ModuleId>,
    _stage: PhantomData<S>,
}

impl<S> Unassigned<S> {
    fn advance<T>(self) -> Unassigned<T> {
        Unassigned {
            pending: self.pending,
            _stage: PhantomData,
        }
    }

    fn take_where(&mut self, mut keep: impl FnMut(ModuleId) -> bool) -> Vec<ModuleId> {
        let taken: Vec<ModuleId> = self.pending.iter().copied().filter(|id| keep(*id)).collect();
        for id in &taken {
            self.pending.remove(id);
        }
        taken
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn compile(policy: &ChunkSplitPolicy, context: &Path) -> Result<Option<CompiledMatcher>, String> {
    policy
        .membership
        .as_ref()
        .map(|m| m.compile(context))
        .transpose()
        .map_err(|e| format!("chunk '{}': {e}", policy.name))
}

fn take_matching<S>(
    pool: &mut Unassigned<S>,
    graph: &ModuleGraph,
    policy: &ChunkSplitPolicy,
    context: &Path,
) -> Result<Vec<ModuleId>, String> {
    let Some(matcher) = compile(policy, context)? else {
        return Ok(Vec::new());
    };
    Ok(pool.take_where(|id| matcher.matches(&ModuleFacts::new(&graph.module(id).path))))
}

fn roots_of(graph: &ModuleGraph, closure: Vec<ModuleId>) -> Vec<ModuleId> {
    let mut seen = FxHashSet::default();
    closure
        .into_iter()
        .map(|m| graph.render_root(m))
        .filter(|m| seen.insert(*m))
        .collect()
}

impl Unassigned<Fresh> {
    /// Every module rendered standalone.
    pub fn new(graph: &ModuleGraph) -> Self {
        Self {
            pending: graph
                .ids()
                .filter(|id| graph.module(*id).concatenated_into.is_none())
                .collect(),
            _stage: PhantomData,
        }
    }

    pub fn take_vendor(
        mut self,
        graph: &ModuleGraph,
        policy: &ChunkSplitPolicy,
        context: &Path,
    ) -> Result<(Chunk, Unassigned<VendorTaken>), String> {
        let modules = take_matching(&mut self, graph, policy, context)?;
        Ok((
            Chunk::new(&policy.name, ChunkKind::Vendor, modules),
            self.advance(),
        ))
    }
}

impl Unassigned<VendorTaken> {
    /// The runtime manifest. It usually holds no modules; a membership
    /// predicate on the policy can still claim some.
    pub fn take_runtime(
        mut self,
        graph: &ModuleGraph,
        policy: &ChunkSplitPolicy,
        context: &Path,
    ) -> Result<(Chunk, Unassigned<RuntimeTaken>), String> {
        let modules = take_matching(&mut self, graph, policy, context)?;
        Ok((
            Chunk::new(&policy.name, ChunkKind::Manifest, modules),
            self.advance(),
        ))
    }
}

impl Unassigned<RuntimeTaken> {
    /// Modules that appear in at least the policy's minimum number of async
    /// chunks and are not already loaded by an entry.
    pub fn take_shared_async(
        mut self,
        graph: &ModuleGraph,
        policy: &ChunkSplitPolicy,
        context: &Path,
    ) -> Result<(Chunk, Unassigned<SharedTaken>), String> {
        let counts = async_reference_counts(graph);
        let matcher = compile(policy, context)?;
        let modules = self.take_where(|id| {
            let count = counts.get(&id).copied().unwrap_or(0);
            if count == 0 {
                return false;
            }
            match &matcher {
                Some(m) => m.matches(&ModuleFacts::new(&graph.module(id).path).with_references(count)),
                None => policy.min_shared_references.is_some_and(|min| count >= min),
            }
        });
        Ok((
            Chunk::new(&policy.name, ChunkKind::SharedAsync, modules),
            self.advance(),
        ))
    }
}

impl Unassigned<SharedTaken> {
    /// One chunk per entry, then one per async root, each taking what is
    /// left of its static closure.
    pub fn into_app_chunks(mut self, graph: &ModuleGraph) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (name, &entry) in graph.entries() {
            let closure: FxHashSet<ModuleId> =
                roots_of(graph, graph.static_closure(entry)).into_iter().collect();
            let modules = self.take_where(|id| closure.contains(&id));
            let mut chunk = Chunk::new(name, ChunkKind::Entry, modules);
            chunk.entry_module = Some(entry);
            chunks.push(chunk);
        }

        for root in graph.async_roots() {
            let closure: FxHashSet<ModuleId> =
                roots_of(graph, graph.static_closure(root)).into_iter().collect();
            let modules = self.take_where(|id| closure.contains(&id));
            if !modules.is_empty() {
                chunks.push(Chunk::new(
                    graph.module(root).public_id.clone(),
                    ChunkKind::Async,
                    modules,
                ));
            }
        }

        if !self.is_empty() {
            let leftovers = self.take_where(|_| true);
            tracing::debug!(count = leftovers.len(), "unreachable modules added to first entry chunk");
            if let Some(first) = chunks.first_mut() {
                first.modules.extend(leftovers);
            }
        }
        chunks
    }
}

/// For each module, the number of async roots whose static closure holds it
/// outside every entry's initial closure.
fn async_reference_counts(graph: &ModuleGraph) -> FxHashMap<ModuleId, usize> {
    let initial: FxHashSet<ModuleId> = graph
        .entries()
        .values()
        .flat_map(|entry| roots_of(graph, graph.static_closure(*entry)))
        .collect();

    let mut counts = FxHashMap::default();
    for root in graph.async_roots() {
        for module in roots_of(graph, graph.static_closure(root)) {
            if !initial.contains(&module) {
                *counts.entry(module).or_insert(0) += 1;
            }
        }
    }
    counts
}

pub(super) fn run(
    state: &mut BuildState,
    opts: &SplitChunksOptions,
    descriptor: &BuildDescriptor,
) -> StageResult {
    let graph = &state.graph;
    let context = descriptor.context.as_path();

    let (vendor, pool) = Unassigned::new(graph).take_vendor(graph, &opts.vendor, context)?;
    let (manifest, pool) = pool.take_runtime(graph, &opts.runtime, context)?;
    let (shared, pool) = pool.take_shared_async(graph, &opts.shared_async, context)?;
    let app = pool.into_app_chunks(graph);

    let mut chunks = vec![manifest];
    if !vendor.modules.is_empty() {
        chunks.push(vendor);
    }
    if !shared.modules.is_empty() {
        chunks.push(shared);
    }
    chunks.extend(app);

    tracing::debug!(chunks = chunks.len(), "chunks assigned");
    state.plan = Some(ChunkPlan::new(chunks, graph));
    Ok(())
}
