//! Reference host: a small module bundler with the lifecycle hooks the
//! theme engine plugs into.
//!
//! One chunk group per entry. Stylesheet modules are split into a script
//! half (class name exports) and an [`ModuleKind::ExtractedCss`] half that
//! lands in `<chunk>.css`. The module graph is kept between compilations so
//! [`Bundler::rebuild`] only rebuilds modules whose files changed.

mod chunk;
mod graph;
mod hooks;
mod naming;
pub mod parse;

pub use chunk::{split_chunk_reason, Assets, Chunk, ChunkGraph, ChunkGroup, ChunkId, GroupId, SplitRule};
pub use graph::{Composition, DependencyEdge, DependencyKind, Module, ModuleGraph, ModuleId, ModuleKind};
pub use hooks::{
    BuildHooks, IdentContext, Loader, LoaderContext, LocalIdentGenerator, NoopHooks, ResolveRequest,
};
pub use naming::HashedIdentGenerator;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::config::DEFAULT_LOCAL_IDENT_NAME;
use crate::errors::{BuildError, Result};
use crate::fs::{normalize_path, resolve_path, FileSystem};

/// Extensions tried, in order, for requests without one
const RESOLVE_EXTENSIONS: [&str; 7] = ["js", "jsx", "ts", "tsx", "scss", "sass", "css"];

/// Prefix of the identifier of a stylesheet's extracted CSS module
const EXTRACTED_PREFIX: &str = "css-extract!";

#[derive(Debug, Clone)]
pub struct BundleOptions {
    pub project_root: PathBuf,
    /// Entry name to path, relative to `project_root`
    pub entries: IndexMap<String, PathBuf>,
    pub local_ident_name: String,
}

impl BundleOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            entries: IndexMap::new(),
            local_ident_name: DEFAULT_LOCAL_IDENT_NAME.to_string(),
        }
    }

    pub fn entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.entries.insert(name.into(), path.into());
        self
    }
}

pub struct Bundler {
    fs: Arc<dyn FileSystem>,
    options: BundleOptions,
    generator: Box<dyn LocalIdentGenerator>,
    graph: ModuleGraph,
    chunks: ChunkGraph,
}

/// Per-pass bookkeeping
struct Pass<'a> {
    invalidated: Option<&'a FxHashSet<PathBuf>>,
    built: FxHashSet<ModuleId>,
    visited: FxHashSet<ModuleId>,
    queue: VecDeque<ModuleId>,
}

impl<'a> Pass<'a> {
    fn needs_build(&self, module: &Module) -> bool {
        // extracted halves are produced by their stylesheet's build
        if module.kind == ModuleKind::ExtractedCss || self.built.contains(&module.id) {
            return false;
        }
        // new in this pass, or left unbuilt by a failed one
        if !module.built {
            return true;
        }
        match self.invalidated {
            None => true,
            Some(changed) => changed.iter().any(|path| module.depends_on_file(path)),
        }
    }
}

impl Bundler {
    pub fn new(fs: Arc<dyn FileSystem>, options: BundleOptions) -> Self {
        Self {
            fs,
            options,
            generator: Box::new(HashedIdentGenerator::new()),
            graph: ModuleGraph::new(),
            chunks: ChunkGraph::new(),
        }
    }

    pub fn with_generator(mut self, generator: Box<dyn LocalIdentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Chunk graph of the last compilation
    pub fn chunks(&self) -> &ChunkGraph {
        &self.chunks
    }

    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// Build every module from scratch
    pub fn compile(&mut self, hooks: &mut dyn BuildHooks) -> Result<Assets> {
        self.graph = ModuleGraph::new();
        self.run(hooks, None)
    }

    /// Rebuild modules whose resource is in `changed` plus any module never
    /// built before; everything else keeps the state the previous
    /// compilation left behind.
    pub fn rebuild(&mut self, changed: &[PathBuf], hooks: &mut dyn BuildHooks) -> Result<Assets> {
        if self.graph.is_empty() {
            return self.compile(hooks);
        }
        let changed: FxHashSet<PathBuf> = changed
            .iter()
            .map(|p| normalize_path(&resolve_path(&self.options.project_root, p)))
            .collect();
        info!("Rebuilding after {} changed file(s)", changed.len());
        self.run(hooks, Some(&changed))
    }

    fn run(&mut self, hooks: &mut dyn BuildHooks, invalidated: Option<&FxHashSet<PathBuf>>) -> Result<Assets> {
        if self.options.entries.is_empty() {
            return Err(BuildError::NoEntries);
        }

        let rules = hooks.split_rules();
        let mut pass = Pass {
            invalidated,
            built: FxHashSet::default(),
            visited: FxHashSet::default(),
            queue: VecDeque::new(),
        };

        let mut entry_modules = Vec::with_capacity(self.options.entries.len());
        for (name, path) in self.options.entries.clone() {
            let request = resolve_path(&self.options.project_root, &path);
            let edge = DependencyEdge::new(
                request.to_string_lossy(),
                self.options.project_root.clone(),
                DependencyKind::Entry,
            );
            let id = self.resolve_dependency(&edge, None, hooks, &mut pass)?;
            entry_modules.push((name, id));
        }

        while let Some(id) = pass.queue.pop_front() {
            if pass.needs_build(self.graph.get(id)) {
                self.build_module(id, hooks)?;
                self.graph.get_mut(id).built = true;
                pass.built.insert(id);
                hooks.module_succeeded(&mut self.graph, id);
            }
            self.process_dependencies(id, hooks, &mut pass)?;
        }

        let mut chunks = self.build_chunks(&entry_modules, &rules);
        hooks.optimize_chunk_modules(&mut self.graph, &mut chunks);

        let mut assets = self.emit(&mut chunks);
        hooks.optimize_chunk_assets(&mut chunks, &mut assets);
        hooks.compilation_done(&mut self.graph, &mut chunks);

        info!(
            "Compiled {} module(s) into {} chunk(s), {} asset(s)",
            pass.built.len(),
            chunks.chunks.len(),
            assets.len()
        );
        self.chunks = chunks;
        Ok(assets)
    }

    /// Resolve one dependency into a module, creating it if needed, and
    /// queue it for this pass.
    fn resolve_dependency(
        &mut self,
        edge: &DependencyEdge,
        issuer: Option<ModuleId>,
        hooks: &mut dyn BuildHooks,
        pass: &mut Pass<'_>,
    ) -> Result<ModuleId> {
        let mut request = ResolveRequest {
            request: edge.request.clone(),
            context: edge.context.clone(),
            kind: edge.kind,
            theme_tag: edge.theme_tag.clone(),
        };
        hooks.before_resolve(&mut request);

        let (resource_request, query) = match request.request.split_once("??") {
            Some((resource, query)) => (resource, Some(query)),
            None => (request.request.as_str(), None),
        };
        let resource = self.resolve_resource(&request.context, resource_request)?;
        let identifier = match query {
            Some(query) => format!("{}??{}", resource.display(), query),
            None => resource.display().to_string(),
        };

        let id = match self.graph.lookup(&identifier) {
            Some(id) => id,
            None => {
                let kind = ModuleKind::from_path(&resource).unwrap_or(ModuleKind::Script);
                let mut module = Module::new(identifier, resource, kind);
                hooks.module_created(&mut module);
                trace!("Created module {}", module.identifier);
                self.graph.insert(module)
            }
        };
        if let Some(issuer) = issuer {
            self.graph.set_issuer(id, issuer);
        }

        if pass.visited.insert(id) {
            pass.queue.push_back(id);
        }
        Ok(id)
    }

    fn resolve_resource(&self, context: &Path, request: &str) -> Result<PathBuf> {
        let base = resolve_path(context, request);
        if base.extension().is_some() && self.fs.exists(&base) {
            return Ok(base);
        }
        let file_name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let candidates = RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| base.with_file_name(format!("{}.{}", file_name, ext)))
            .chain(RESOLVE_EXTENSIONS.iter().map(|ext| base.join(format!("index.{}", ext))));

        for candidate in candidates {
            if self.fs.exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(BuildError::Unresolved {
            request: request.to_string(),
            context: context.to_path_buf(),
        })
    }

    /// Read, run loaders and compile one module, replacing its dependencies
    fn build_module(&mut self, id: ModuleId, hooks: &mut dyn BuildHooks) -> Result<()> {
        let module = self.graph.get(id);
        let resource = module.resource.clone();
        let context = module.context().to_path_buf();
        let kind = module.kind;
        let loaders = module.loaders.clone();
        debug!("Building {}", module.identifier);

        let mut content = self
            .fs
            .read_to_string(&resource)
            .map_err(|source| BuildError::Read {
                path: resource.clone(),
                source,
            })?;
        let loader_ctx = LoaderContext {
            resource: &resource,
            context: &context,
        };
        for loader in &loaders {
            content = loader.load(&content, &loader_ctx)?;
        }

        match kind {
            ModuleKind::ExtractedCss => {}
            ModuleKind::Script => {
                let dependencies = parse::script_requests(&content)
                    .into_iter()
                    .map(|request| DependencyEdge::new(request, context.clone(), DependencyKind::Import))
                    .collect();
                let module = self.graph.get_mut(id);
                module.source = content;
                module.dependencies = dependencies;
            }
            ModuleKind::Stylesheet => {
                let root = self.options.project_root.clone();
                let pattern = self.options.local_ident_name.clone();
                let generator = self.generator.as_ref();
                let compiled = parse::compile_stylesheet(&content, &context, self.fs.as_ref(), |local| {
                    let ctx = IdentContext {
                        resource: &resource,
                        root_context: &root,
                        pattern: &pattern,
                    };
                    hooks.local_ident(&ctx, local, generator)
                })?;

                let mut dependencies: Vec<DependencyEdge> = Vec::new();
                for composition in &compiled.compositions {
                    let Some(ref request) = composition.request else {
                        continue;
                    };
                    if !dependencies.iter().any(|d| &d.request == request) {
                        dependencies.push(DependencyEdge::new(
                            request.clone(),
                            context.clone(),
                            DependencyKind::Composes,
                        ));
                    }
                }

                let extracted = self.extracted_module(id, compiled.css);
                let extracted_identifier = self.graph.get(extracted).identifier.clone();
                let mut edge = DependencyEdge::new(extracted_identifier, context, DependencyKind::Extracted);
                edge.module = Some(extracted);
                dependencies.push(edge);

                let module = self.graph.get_mut(id);
                module.source = String::new();
                module.exports = compiled.exports;
                module.compositions = compiled.compositions;
                module.file_dependencies = compiled.file_dependencies;
                module.dependencies = dependencies;
            }
        }
        Ok(())
    }

    /// Create or refresh the CSS half of stylesheet module `owner`
    fn extracted_module(&mut self, owner: ModuleId, css: String) -> ModuleId {
        let identifier = format!("{}{}", EXTRACTED_PREFIX, self.graph.get(owner).identifier);
        let id = match self.graph.lookup(&identifier) {
            Some(id) => id,
            None => {
                let resource = self.graph.get(owner).resource.clone();
                let id = self.graph.insert(Module::new(identifier, resource, ModuleKind::ExtractedCss));
                self.graph.set_issuer(id, owner);
                id
            }
        };
        self.graph.get_mut(id).source = css;
        id
    }

    fn process_dependencies(&mut self, id: ModuleId, hooks: &mut dyn BuildHooks, pass: &mut Pass<'_>) -> Result<()> {
        let count = self.graph.get(id).dependencies.len();
        let mut seen = FxHashSet::default();

        for index in 0..count {
            let edge = self.graph.get(id).dependencies[index].clone();
            if !seen.insert(edge.resource_identifier()) {
                continue;
            }

            match edge.module {
                Some(target) => {
                    if pass.visited.insert(target) {
                        pass.queue.push_back(target);
                    }
                }
                None if edge.is_resolvable() => {
                    let target = self.resolve_dependency(&edge, Some(id), hooks, pass)?;
                    self.graph.get_mut(id).dependencies[index].module = Some(target);
                }
                None => {}
            }
        }
        Ok(())
    }

    /// One chunk per entry holding everything reachable from it, then split
    /// rules move matching modules into their own chunks.
    fn build_chunks(&self, entries: &[(String, ModuleId)], rules: &[SplitRule]) -> ChunkGraph {
        let mut chunks = ChunkGraph::new();

        for (name, entry) in entries {
            let chunk = chunks.add_chunk(name.clone(), None);
            let group = chunks.add_group(name.clone());
            chunks.connect(group, chunk);
            chunks.chunk_mut(chunk).modules = self.reachable_from(*entry);
        }

        for rule in rules {
            let mut matched: Vec<ModuleId> = Vec::new();
            let mut sources: Vec<ChunkId> = Vec::new();
            for chunk in &chunks.chunks {
                let mut hit = false;
                for module in &chunk.modules {
                    if rule.matches(*module, &self.graph) {
                        hit = true;
                        if !matched.contains(module) {
                            matched.push(*module);
                        }
                    }
                }
                if hit {
                    sources.push(chunk.id);
                }
            }

            if matched.is_empty() {
                debug!("Split rule '{}' matched nothing", rule.name);
                continue;
            }

            let split = chunks.add_chunk(rule.name.clone(), Some(split_chunk_reason(&rule.name)));
            for source in &sources {
                chunks.chunk_mut(*source).modules.retain(|m| !matched.contains(m));
                let groups = chunks.chunk(*source).groups.clone();
                for group in groups {
                    chunks.connect(group, split);
                }
            }
            chunks.chunk_mut(split).modules = matched;
        }

        chunks
    }

    /// Depth-first, dependencies in declaration order
    fn reachable_from(&self, entry: ModuleId) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![entry];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let targets: Vec<ModuleId> = self
                .graph
                .get(id)
                .dependencies
                .iter()
                .filter_map(|d| d.module)
                .collect();
            stack.extend(targets.into_iter().rev());
        }
        order
    }

    fn emit(&self, chunks: &mut ChunkGraph) -> Assets {
        let mut assets = Assets::new();

        for index in 0..chunks.chunks.len() {
            let chunk = &chunks.chunks[index];
            let js_name = format!("{}.js", chunk.name);
            let js = self.render_script(chunk, chunks);
            let css = self.render_styles(chunk);

            let mut files = vec![js_name.clone()];
            assets.insert(js_name, js);
            if let Some(css) = css {
                let css_name = format!("{}.css", chunk.name);
                files.push(css_name.clone());
                assets.insert(css_name, css);
            }
            chunks.chunks[index].files = files;
        }

        assets
    }

    fn relative(&self, path: &Path) -> String {
        pathdiff::diff_paths(path, &self.options.project_root)
            .unwrap_or_else(|| path.to_path_buf())
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn render_script(&self, chunk: &Chunk, chunks: &ChunkGraph) -> String {
        let mut out = format!("/* chunk: {} */\n", chunk.name);

        for group in &chunk.groups {
            let group = chunks.group(*group);
            if group.chunks.first() == Some(&chunk.id) {
                let names: Vec<&str> = group
                    .chunks
                    .iter()
                    .map(|c| chunks.chunk(*c).name.as_str())
                    .collect();
                out.push_str(&format!("/* entry {}: {} */\n", group.name, names.join(", ")));
            }
        }

        for id in &chunk.modules {
            let module = self.graph.get(*id);
            match module.kind {
                ModuleKind::Script => {
                    out.push_str(&format!("// module: {}\n", self.relative(&module.resource)));
                    out.push_str(module.source.trim_end());
                    out.push('\n');
                }
                ModuleKind::Stylesheet => {
                    let exports = self.resolved_exports(module);
                    let json = serde_json::to_string(&exports).unwrap_or_default();
                    out.push_str(&format!("// module: {}\n", self.relative(&module.resource)));
                    out.push_str(&format!("module.exports = {};\n", json));
                }
                ModuleKind::ExtractedCss => {}
            }
        }
        out
    }

    fn render_styles(&self, chunk: &Chunk) -> Option<String> {
        let mut out = String::new();
        let mut any = false;
        for id in &chunk.modules {
            let module = self.graph.get(*id);
            if module.kind != ModuleKind::ExtractedCss {
                continue;
            }
            any = true;
            out.push_str(&format!("/* {} */\n", self.relative(&module.resource)));
            out.push_str(&module.source);
        }
        any.then_some(out)
    }

    /// Export map with composed identifiers appended
    fn resolved_exports(&self, module: &Module) -> IndexMap<String, String> {
        let mut exports = module.exports.clone();

        for composition in &module.compositions {
            let composed: Vec<String> = match &composition.request {
                None => composition
                    .names
                    .iter()
                    .filter_map(|name| module.exports.get(name).cloned())
                    .collect(),
                Some(request) => {
                    let target = module
                        .dependencies
                        .iter()
                        .filter(|d| &d.request == request)
                        .find(|d| d.theme_tag == module.theme_tag)
                        .or_else(|| module.dependencies.iter().find(|d| &d.request == request))
                        .and_then(|d| d.module);
                    match target {
                        Some(target) => {
                            let target = self.graph.get(target);
                            composition
                                .names
                                .iter()
                                .filter_map(|name| target.exports.get(name).cloned())
                                .collect()
                        }
                        None => Vec::new(),
                    }
                }
            };

            if let Some(value) = exports.get_mut(&composition.local) {
                let joined = std::iter::once(value.as_str())
                    .chain(composed.iter().map(String::as_str))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                *value = joined;
            }
        }
        exports
    }
}
