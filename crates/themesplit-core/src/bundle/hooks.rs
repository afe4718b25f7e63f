//! Extension points the host invokes during a compilation.
//!
//! Phase order within one pass: `split_rules`, then per dependency
//! `before_resolve`, per new module `module_created`, build,
//! `module_succeeded`; after the graph is complete `optimize_chunk_modules`,
//! emission, `optimize_chunk_assets` and finally `compilation_done`.

use std::fmt;
use std::path::{Path, PathBuf};

use super::chunk::{Assets, ChunkGraph, SplitRule};
use super::graph::{DependencyKind, Module, ModuleGraph, ModuleId};
use crate::errors::LoaderError;

/// A dependency about to be resolved into a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub request: String,
    pub context: PathBuf,
    pub kind: DependencyKind,
    pub theme_tag: Option<String>,
}

pub struct LoaderContext<'a> {
    pub resource: &'a Path,
    /// Directory of the resource
    pub context: &'a Path,
}

/// Content transform attached to a module's processing chain
pub trait Loader: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, content: &str, ctx: &LoaderContext<'_>) -> Result<String, LoaderError>;
}

pub struct IdentContext<'a> {
    /// File the class is declared in
    pub resource: &'a Path,
    pub root_context: &'a Path,
    /// e.g. `[name]__[local]___[hash:base64:5]`
    pub pattern: &'a str,
}

/// Scoped class name generator
pub trait LocalIdentGenerator: Send + Sync {
    fn generate(&self, ctx: &IdentContext<'_>, local: &str) -> String;
}

pub trait BuildHooks {
    fn split_rules(&self) -> Vec<SplitRule> {
        Vec::new()
    }

    fn before_resolve(&mut self, _request: &mut ResolveRequest) {}

    fn module_created(&mut self, _module: &mut Module) {}

    fn module_succeeded(&mut self, _graph: &mut ModuleGraph, _module: ModuleId) {}

    fn local_ident(
        &mut self,
        ctx: &IdentContext<'_>,
        local: &str,
        generator: &dyn LocalIdentGenerator,
    ) -> String {
        generator.generate(ctx, local)
    }

    fn optimize_chunk_modules(&mut self, _graph: &mut ModuleGraph, _chunks: &mut ChunkGraph) {}

    fn optimize_chunk_assets(&mut self, _chunks: &mut ChunkGraph, _assets: &mut Assets) {}

    fn compilation_done(&mut self, _graph: &mut ModuleGraph, _chunks: &mut ChunkGraph) {}
}

/// Hooks that change nothing; builds the plain single-theme output
#[derive(Debug, Default)]
pub struct NoopHooks;

impl BuildHooks for NoopHooks {}
