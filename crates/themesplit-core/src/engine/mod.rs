//! Theme fan-out and reconciliation, driven through the host's build hooks.
//!
//! [`ThemeEngine`] owns all mutable state of the stages: the themed subtree
//! set, the class identifier cache and the mutation history. The registry is
//! shared and never changes after construction.

mod canonical;
mod fanout;
mod partition;
mod reconcile;
mod request;
mod rewrite;

pub use canonical::{ClassIdentifierCache, IdentifierCanonicalizer};
pub use fanout::{DependencyFanout, FanoutOutcome};
pub use partition::{OutputPartitioner, PartitionSummary};
pub use reconcile::{MutationHistory, RebuildReconciler, ReconcileState, RemovedMember};
pub use request::{
    is_stylesheet_request, mark_request, parse_marker, RequestIdentityTagger, ThemeImportLoader,
    THEME_LOADER_NAME,
};
pub use rewrite::{rewrite_imports, ImportRewriter, SlotTarget};

use std::path::Path;
use std::sync::Arc;

use crate::bundle::{
    Assets, BuildHooks, ChunkGraph, IdentContext, LocalIdentGenerator, Module, ModuleGraph, ModuleId,
    ResolveRequest, SplitRule,
};
use crate::config::ThemesConfig;
use crate::errors::ConfigError;
use crate::fs::FileSystem;
use crate::registry::ThemeRegistry;

#[derive(Debug)]
pub struct ThemeEngine {
    registry: Arc<ThemeRegistry>,
    fanout: DependencyFanout,
    tagger: RequestIdentityTagger,
    canonicalizer: IdentifierCanonicalizer,
    partitioner: OutputPartitioner,
    reconciler: RebuildReconciler,
}

impl ThemeEngine {
    /// Validate `config` and set up every stage. Fails before any build
    /// work when the configuration is unusable.
    pub fn new(config: &ThemesConfig, project_root: &Path, fs: &dyn FileSystem) -> Result<Self, ConfigError> {
        let registry = ThemeRegistry::from_config(config, project_root, fs)?;
        Ok(Self::from_registry(Arc::new(registry)))
    }

    pub fn from_registry(registry: Arc<ThemeRegistry>) -> Self {
        Self {
            fanout: DependencyFanout::new(registry.non_default_theme_keys().to_vec()),
            tagger: RequestIdentityTagger::new(&registry),
            canonicalizer: IdentifierCanonicalizer::new(),
            partitioner: OutputPartitioner::new(&registry),
            reconciler: RebuildReconciler::new(),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ThemeRegistry> {
        &self.registry
    }

    pub fn identifier_cache(&self) -> &ClassIdentifierCache {
        self.canonicalizer.cache()
    }

    pub fn reconciler(&self) -> &RebuildReconciler {
        &self.reconciler
    }

    pub fn fanout(&self) -> &DependencyFanout {
        &self.fanout
    }
}

impl BuildHooks for ThemeEngine {
    fn split_rules(&self) -> Vec<SplitRule> {
        self.partitioner.split_rules()
    }

    fn before_resolve(&mut self, request: &mut ResolveRequest) {
        self.tagger.tag_request(request);
    }

    fn module_created(&mut self, module: &mut Module) {
        self.tagger.tag_module(module);
    }

    fn module_succeeded(&mut self, graph: &mut ModuleGraph, module: ModuleId) {
        self.fanout.module_succeeded(graph, module);
    }

    fn local_ident(&mut self, ctx: &IdentContext<'_>, local: &str, generator: &dyn LocalIdentGenerator) -> String {
        self.canonicalizer.local_ident(&self.registry, ctx, local, generator)
    }

    fn optimize_chunk_modules(&mut self, graph: &mut ModuleGraph, chunks: &mut ChunkGraph) {
        self.partitioner
            .partition_modules(graph, chunks, self.reconciler.history_mut());
        self.partitioner.detach_theme_chunks(chunks);
    }

    fn optimize_chunk_assets(&mut self, chunks: &mut ChunkGraph, assets: &mut Assets) {
        self.partitioner.strip_theme_assets(chunks, assets);
    }

    fn compilation_done(&mut self, graph: &mut ModuleGraph, chunks: &mut ChunkGraph) {
        self.reconciler.reconcile(graph, chunks);
    }
}
