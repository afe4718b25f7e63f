//! Separates per-theme styles from the main build output.
//!
//! Three passes run at different host phases:
//! 1. before emission, themed modules leave the main chunks, modules that
//!    mix tagged and untagged dependencies drop the tagged ones, and theme
//!    chunks lose the default theme's own CSS;
//! 2. right after, per-theme chunks are detached from every chunk group so
//!    entrypoints never load them;
//! 3. after emission, per-theme chunks keep only their `.css` files.

use std::path::PathBuf;
use tracing::{debug, info};

use super::reconcile::MutationHistory;
use crate::bundle::{Assets, ChunkGraph, DependencyEdge, ModuleGraph, ModuleId, ModuleKind, SplitRule};
use crate::registry::ThemeRegistry;

#[derive(Debug, Clone, Default)]
pub struct OutputPartitioner {
    /// `(theme key, chunk name)` for every alternate theme
    theme_chunks: Vec<(String, String)>,
    /// Entry files of the default theme
    default_entries: Vec<PathBuf>,
}

/// Counts reported by [`OutputPartitioner::partition_modules`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub filtered_modules: usize,
    pub removed_members: usize,
}

fn is_partitioned_edge(edge: &DependencyEdge) -> bool {
    edge.is_resolvable()
}

impl OutputPartitioner {
    pub fn new(registry: &ThemeRegistry) -> Self {
        let theme_chunks = registry
            .non_default_theme_keys()
            .iter()
            .map(|key| (key.clone(), registry.theme_chunk_name(key)))
            .collect();
        let default_entries = registry
            .default_theme()
            .entry_paths()
            .map(|p| p.to_path_buf())
            .collect();
        Self {
            theme_chunks,
            default_entries,
        }
    }

    /// One rule per alternate theme: extracted CSS whose stylesheet carries
    /// the theme's tag goes to the theme's chunk.
    pub fn split_rules(&self) -> Vec<SplitRule> {
        self.theme_chunks
            .iter()
            .map(|(key, name)| {
                let key = key.clone();
                SplitRule::new(name.clone(), move |id, graph: &ModuleGraph| {
                    graph.get(id).kind == ModuleKind::ExtractedCss
                        && graph
                            .issuer(id)
                            .is_some_and(|issuer| graph.get(issuer).theme_tag.as_deref() == Some(key.as_str()))
                })
            })
            .collect()
    }

    fn is_theme_chunk_reason(&self, reason: &str) -> bool {
        self.theme_chunks
            .iter()
            .any(|(_, name)| reason.contains(&format!("(cache group: {})", name)))
    }

    /// Extracted CSS of a default theme file compiled for an alternate theme.
    /// Its rules belong to the main output only.
    fn is_retagged_default_css(&self, graph: &ModuleGraph, id: ModuleId) -> bool {
        let module = graph.get(id);
        module.kind == ModuleKind::ExtractedCss
            && self.default_entries.contains(&module.resource)
            && graph
                .issuer(id)
                .is_some_and(|issuer| graph.get(issuer).theme_tag.is_some())
    }

    /// Pass 1
    pub fn partition_modules(
        &self,
        graph: &mut ModuleGraph,
        chunks: &mut ChunkGraph,
        history: &mut MutationHistory,
    ) -> PartitionSummary {
        let mut summary = PartitionSummary::default();

        for chunk_index in 0..chunks.chunks.len() {
            let members = chunks.chunks[chunk_index].modules.clone();
            let chunk_id = chunks.chunks[chunk_index].id;

            for id in members {
                let module = graph.get(id);
                let edges = || module.dependencies.iter().filter(|e| is_partitioned_edge(e));
                let has_tagged = edges().any(|e| e.theme_tag.is_some());
                let has_untagged = edges().any(|e| e.theme_tag.is_none());

                if has_tagged && has_untagged {
                    history.record_dependencies(id, module.dependencies.clone());
                    graph
                        .get_mut(id)
                        .dependencies
                        .retain(|e| !is_partitioned_edge(e) || e.theme_tag.is_none());
                    summary.filtered_modules += 1;
                }

                if graph.get(id).theme_tag.is_some() || self.is_retagged_default_css(graph, id) {
                    if let Some(index) = chunks.chunks[chunk_index].remove_module(id) {
                        history.record_removal(id, chunk_id, index);
                        summary.removed_members += 1;
                    }
                }
            }
        }

        info!(
            "Partitioned output: {} module(s) filtered, {} themed module(s) moved out of chunks",
            summary.filtered_modules, summary.removed_members
        );
        summary
    }

    /// Pass 2. Returns the number of chunks detached.
    pub fn detach_theme_chunks(&self, chunks: &mut ChunkGraph) -> usize {
        let theme_chunks: Vec<_> = chunks
            .chunks
            .iter()
            .filter(|c| c.reason.as_deref().is_some_and(|r| self.is_theme_chunk_reason(r)))
            .map(|c| c.id)
            .collect();

        for id in &theme_chunks {
            chunks.detach_chunk(*id);
            debug!("Detached theme chunk {}", chunks.chunk(*id).name);
        }
        theme_chunks.len()
    }

    /// Pass 3. Returns the removed file names.
    pub fn strip_theme_assets(&self, chunks: &mut ChunkGraph, assets: &mut Assets) -> Vec<String> {
        let mut removed = Vec::new();

        for chunk in chunks.chunks.iter_mut() {
            if !chunk.reason.as_deref().is_some_and(|r| self.is_theme_chunk_reason(r)) {
                continue;
            }
            let (css, other): (Vec<String>, Vec<String>) =
                chunk.files.drain(..).partition(|f| f.ends_with(".css"));
            chunk.files = css;
            for file in other {
                assets.shift_remove(&file);
                removed.push(file);
            }
        }

        if !removed.is_empty() {
            debug!("Removed non-CSS theme assets: {:?}", removed);
        }
        removed
    }
}
