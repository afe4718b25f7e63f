//! Mock implementations for testing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use themesplit_core::bundle::{IdentContext, LocalIdentGenerator};

/// Readable `<file stem>__<local>` identifiers, counting every call
#[derive(Debug, Default)]
pub struct CountingIdentGenerator {
    calls: Arc<AtomicUsize>,
}

impl CountingIdentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that keeps counting after the generator moved into a bundler
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocalIdentGenerator for CountingIdentGenerator {
    fn generate(&self, ctx: &IdentContext<'_>, local: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = ctx
            .resource
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}__{}", stem, local)
    }
}
