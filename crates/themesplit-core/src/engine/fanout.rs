use rustc_hash::FxHashSet;
use tracing::debug;

use super::request::is_stylesheet_request;
use crate::bundle::{DependencyEdge, DependencyKind, ModuleGraph, ModuleId};

/// Duplicates stylesheet dependencies once per alternate theme.
///
/// Modules reached through a themed edge are not fanned out again: a tagged
/// module retags its own stylesheet dependencies in place so the whole
/// subtree carries the one tag of its themed ancestor.
#[derive(Debug, Default)]
pub struct DependencyFanout {
    theme_keys: Vec<String>,
    /// Identifiers of modules inside a themed subtree
    themed: FxHashSet<String>,
}

/// What fan-out did to one module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// Clones appended for every alternate theme
    Cloned(usize),
    /// Stylesheet dependencies retagged with the module's own tag
    Retagged(usize),
    /// Module sits below a themed module
    Propagated,
    /// No stylesheet dependencies
    Untouched,
}

fn is_stylesheet_dependency(edge: &DependencyEdge) -> bool {
    matches!(edge.kind, DependencyKind::Import | DependencyKind::Composes) && is_stylesheet_request(&edge.request)
}

impl DependencyFanout {
    pub fn new(theme_keys: Vec<String>) -> Self {
        Self {
            theme_keys,
            themed: FxHashSet::default(),
        }
    }

    pub fn is_in_themed_subtree(&self, graph: &ModuleGraph, id: ModuleId) -> bool {
        self.themed.contains(&graph.get(id).identifier)
    }

    /// Fan out, retag or propagate for a freshly built module.
    ///
    /// Propagation looks at the issuer only, which is the first module that
    /// requested this one. An untagged module shared between a themed and a
    /// plain stylesheet is therefore fanned out or not depending on which of
    /// the two reached it first.
    pub fn module_succeeded(&mut self, graph: &mut ModuleGraph, id: ModuleId) -> FanoutOutcome {
        if let Some(tag) = graph.get(id).theme_tag.clone() {
            let module = graph.get_mut(id);
            let mut retagged = 0;
            for edge in module.dependencies.iter_mut().filter(|e| is_stylesheet_dependency(e)) {
                edge.theme_tag = Some(tag.clone());
                edge.module = None;
                retagged += 1;
            }
            self.themed.insert(module.identifier.clone());
            debug!("Retagged {} dependency(ies) of {} with '{}'", retagged, module.identifier, tag);
            return FanoutOutcome::Retagged(retagged);
        }

        if let Some(issuer) = graph.issuer(id) {
            if self.is_in_themed_subtree(graph, issuer) {
                self.themed.insert(graph.get(id).identifier.clone());
                return FanoutOutcome::Propagated;
            }
        }

        let module = graph.get_mut(id);
        let clones: Vec<DependencyEdge> = module
            .dependencies
            .iter()
            .filter(|edge| edge.theme_tag.is_none() && is_stylesheet_dependency(edge))
            .flat_map(|edge| self.theme_keys.iter().map(move |key| edge.clone_for_theme(key)))
            .collect();

        if clones.is_empty() {
            return FanoutOutcome::Untouched;
        }

        let count = clones.len();
        module.dependencies.extend(clones);
        debug!("Fanned out {} themed dependency(ies) from {}", count, module.identifier);
        FanoutOutcome::Cloned(count)
    }
}
