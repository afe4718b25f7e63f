use tracing::debug;

use crate::bundle::{ChunkGraph, ChunkId, DependencyEdge, ModuleGraph, ModuleId};

/// A chunk membership dropped during partitioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedMember {
    pub module: ModuleId,
    pub chunk: ChunkId,
    pub index: usize,
}

/// Graph mutations made for output partitioning that must not outlive the
/// compilation that made them.
#[derive(Debug, Default, Clone)]
pub struct MutationHistory {
    dependencies: Vec<(ModuleId, Vec<DependencyEdge>)>,
    members: Vec<RemovedMember>,
}

impl MutationHistory {
    pub fn record_dependencies(&mut self, module: ModuleId, prior: Vec<DependencyEdge>) {
        // first record holds the pre-partition sequence
        if self.dependencies.iter().any(|(m, _)| *m == module) {
            return;
        }
        self.dependencies.push((module, prior));
    }

    pub fn record_removal(&mut self, module: ModuleId, chunk: ChunkId, index: usize) {
        self.members.push(RemovedMember { module, chunk, index });
    }

    pub fn dependency_records(&self) -> usize {
        self.dependencies.len()
    }

    pub fn removal_records(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileState {
    #[default]
    Clean,
    Dirty,
}

/// Puts dependency sequences and chunk membership back the way the host
/// built them, so the next incremental pass starts from an unmutated graph.
#[derive(Debug, Default)]
pub struct RebuildReconciler {
    history: MutationHistory,
    state: ReconcileState,
}

impl RebuildReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn history(&self) -> &MutationHistory {
        &self.history
    }

    /// Mutable history; recording into it marks the reconciler dirty
    pub fn history_mut(&mut self) -> &mut MutationHistory {
        self.state = ReconcileState::Dirty;
        &mut self.history
    }

    pub fn reconcile(&mut self, graph: &mut ModuleGraph, chunks: &mut ChunkGraph) {
        if self.state == ReconcileState::Clean {
            return;
        }
        let history = std::mem::take(&mut self.history);

        let restored = history.dependencies.len();
        for (module, prior) in history.dependencies {
            graph.get_mut(module).dependencies = prior;
        }

        // reverse order so recorded indices are valid again
        let reattached = history.members.len();
        for member in history.members.into_iter().rev() {
            chunks.chunk_mut(member.chunk).insert_module(member.index, member.module);
        }

        self.state = ReconcileState::Clean;
        debug!(
            "Reconciled {} dependency sequence(s) and {} chunk member(s)",
            restored, reattached
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{DependencyKind, Module, ModuleKind};

    #[test]
    fn test_reconcile_restores_dependencies_and_membership() {
        let mut graph = ModuleGraph::new();
        let mut index = Module::new("/p/index.js", "/p/index.js", ModuleKind::Script);
        let edge = DependencyEdge::new("./A.scss", "/p", DependencyKind::Import);
        index.dependencies = vec![edge.clone(), edge.clone_for_theme("dark")];
        let index = graph.insert(index);
        let a = graph.insert(Module::new("/p/A.scss", "/p/A.scss", ModuleKind::Stylesheet));
        let b = graph.insert(Module::new("/p/A.scss??theme:dark", "/p/A.scss", ModuleKind::Stylesheet));
        let c = graph.insert(Module::new("/p/B.scss??theme:dark", "/p/B.scss", ModuleKind::Stylesheet));

        let mut chunks = ChunkGraph::new();
        let main = chunks.add_chunk("main", None);
        chunks.chunk_mut(main).modules = vec![index, b, a, c];
        let before_graph = graph.get(index).dependencies.clone();
        let before_chunks = chunks.clone();

        let mut reconciler = RebuildReconciler::new();
        let prior = graph.get(index).dependencies.clone();
        reconciler.history_mut().record_dependencies(index, prior);
        graph.get_mut(index).dependencies.truncate(1);
        for module in [b, c] {
            let at = chunks.chunk_mut(main).remove_module(module).unwrap();
            reconciler.history_mut().record_removal(module, main, at);
        }
        assert_eq!(reconciler.state(), ReconcileState::Dirty);

        reconciler.reconcile(&mut graph, &mut chunks);

        assert_eq!(graph.get(index).dependencies, before_graph);
        assert_eq!(chunks, before_chunks);
        assert_eq!(reconciler.state(), ReconcileState::Clean);
        assert!(reconciler.history().is_empty());
    }

    #[test]
    fn test_first_dependency_record_wins() {
        let mut history = MutationHistory::default();
        let edge = DependencyEdge::new("./A.scss", "/p", DependencyKind::Import);
        history.record_dependencies(ModuleId(0), vec![edge.clone(), edge.clone_for_theme("dark")]);
        history.record_dependencies(ModuleId(0), vec![edge]);

        assert_eq!(history.dependency_records(), 1);
        assert_eq!(history.dependencies[0].1.len(), 2);
    }
}
