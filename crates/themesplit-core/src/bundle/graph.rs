use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::hooks::Loader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Stylesheet,
    /// Style half of a stylesheet module, issued by it
    ExtractedCss,
}

impl ModuleKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "js" | "jsx" | "ts" | "tsx" | "mjs" => Some(ModuleKind::Script),
            "scss" | "sass" | "css" => Some(ModuleKind::Stylesheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Entry,
    Import,
    Composes,
    Extracted,
}

/// An edge from a consuming module to a resource it requires.
///
/// Edges are owned by the consuming module. `module` is filled in once the
/// host has resolved the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub request: String,
    pub context: PathBuf,
    pub kind: DependencyKind,
    pub theme_tag: Option<String>,
    pub module: Option<ModuleId>,
}

impl DependencyEdge {
    pub fn new(request: impl Into<String>, context: impl Into<PathBuf>, kind: DependencyKind) -> Self {
        Self {
            request: request.into(),
            context: context.into(),
            kind,
            theme_tag: None,
            module: None,
        }
    }

    /// Unresolved copy of this edge tagged for `theme`
    pub fn clone_for_theme(&self, theme: &str) -> Self {
        Self {
            theme_tag: Some(theme.to_string()),
            module: None,
            ..self.clone()
        }
    }

    /// Identity the host uses to group equal dependencies
    pub fn resource_identifier(&self) -> String {
        match &self.theme_tag {
            Some(theme) => format!("{}?theme={}", self.request, theme),
            None => self.request.clone(),
        }
    }

    /// Whether the host resolves this edge through its resolver
    pub fn is_resolvable(&self) -> bool {
        !matches!(self.kind, DependencyKind::Extracted)
    }
}

/// A `composes: a b from '<request>'` declaration lifted out of a stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub local: String,
    pub names: Vec<String>,
    /// `None` composes classes of the same file
    pub request: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Cache key: absolute resource plus any `??` query
    pub identifier: String,
    pub resource: PathBuf,
    pub kind: ModuleKind,
    pub dependencies: Vec<DependencyEdge>,
    pub theme_tag: Option<String>,
    pub loaders: Vec<Arc<dyn Loader>>,
    /// Script body, or compiled CSS for stylesheet modules
    pub source: String,
    /// Local class name to scoped identifier
    pub exports: IndexMap<String, String>,
    pub compositions: Vec<Composition>,
    /// Other files whose content went into this module
    pub file_dependencies: Vec<PathBuf>,
    /// Set once a build of this module succeeded
    pub built: bool,
}

impl Module {
    pub fn new(identifier: impl Into<String>, resource: impl Into<PathBuf>, kind: ModuleKind) -> Self {
        Self {
            id: ModuleId(usize::MAX),
            identifier: identifier.into(),
            resource: resource.into(),
            kind,
            dependencies: Vec::new(),
            theme_tag: None,
            loaders: Vec::new(),
            source: String::new(),
            exports: IndexMap::new(),
            compositions: Vec::new(),
            file_dependencies: Vec::new(),
            built: false,
        }
    }

    /// Directory relative requests of this module resolve against
    pub fn context(&self) -> &Path {
        self.resource.parent().unwrap_or(Path::new("/"))
    }

    pub fn has_loader(&self, name: &str) -> bool {
        self.loaders.iter().any(|l| l.name() == name)
    }

    /// Whether a change to `path` invalidates this module
    pub fn depends_on_file(&self, path: &Path) -> bool {
        self.resource == path || self.file_dependencies.iter().any(|f| f == path)
    }
}

/// Owner of every module built so far. Survives incremental rebuilds.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    by_identifier: FxHashMap<String, ModuleId>,
    /// module -> module whose dependency first produced it
    issuers: FxHashMap<ModuleId, ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len());
        module.id = id;
        self.by_identifier.insert(module.identifier.clone(), id);
        self.modules.push(module);
        id
    }

    pub fn lookup(&self, identifier: &str) -> Option<ModuleId> {
        self.by_identifier.get(identifier).copied()
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn issuer(&self, id: ModuleId) -> Option<ModuleId> {
        self.issuers.get(&id).copied()
    }

    /// Record the first issuer only; later importers don't replace it.
    pub fn set_issuer(&mut self, id: ModuleId, issuer: ModuleId) {
        self.issuers.entry(id).or_insert(issuer);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Find a module by resource and theme tag
    pub fn find(&self, resource: &Path, theme_tag: Option<&str>) -> Option<&Module> {
        self.modules.iter().find(|m| {
            m.kind != ModuleKind::ExtractedCss
                && m.resource == resource
                && m.theme_tag.as_deref() == theme_tag
        })
    }
}
