use rustc_hash::FxHashMap;
use tracing::trace;

use crate::bundle::{IdentContext, LocalIdentGenerator};
use crate::registry::ThemeRegistry;

/// `(slot, local class) -> scoped identifier`
#[derive(Debug, Default, Clone)]
pub struct ClassIdentifierCache {
    entries: FxHashMap<(String, String), String>,
}

impl ClassIdentifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &str, local: &str) -> Option<&str> {
        self.entries
            .get(&(slot.to_string(), local.to_string()))
            .map(String::as_str)
    }

    pub fn insert(&mut self, slot: &str, local: &str, ident: String) {
        self.entries.insert((slot.to_string(), local.to_string()), ident);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Makes every theme file of one slot produce the same scoped class names,
/// so markup compiled against the default theme works with any theme.
///
/// The first theme file of a slot to declare a class fixes its identifier.
#[derive(Debug, Default)]
pub struct IdentifierCanonicalizer {
    cache: ClassIdentifierCache,
}

impl IdentifierCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ClassIdentifierCache {
        &self.cache
    }

    pub fn local_ident(
        &mut self,
        registry: &ThemeRegistry,
        ctx: &IdentContext<'_>,
        local: &str,
        generator: &dyn LocalIdentGenerator,
    ) -> String {
        let Some(slot) = registry.slot_for_file(ctx.resource) else {
            return generator.generate(ctx, local);
        };

        if let Some(ident) = self.cache.get(slot, local) {
            return ident.to_string();
        }

        let ident = generator.generate(ctx, local);
        trace!("Canonical identifier for {}:{} is {}", slot, local, ident);
        self.cache.insert(slot, local, ident.clone());
        ident
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemesConfig;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl LocalIdentGenerator for Counting {
        fn generate(&self, ctx: &IdentContext<'_>, local: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = ctx.resource.file_stem().unwrap().to_string_lossy();
            format!("{}__{}", stem, local)
        }
    }

    fn registry() -> ThemeRegistry {
        let config = ThemesConfig::new("default")
            .theme("default", [("composers", "themes/default_composers.scss")])
            .theme("dark", [("composers", "themes/dark_composers.scss")]);
        ThemeRegistry::normalize(&config, Path::new("/p")).unwrap()
    }

    fn ctx(resource: &Path) -> IdentContext<'_> {
        IdentContext {
            resource,
            root_context: Path::new("/p"),
            pattern: "[name]__[local]",
        }
    }

    #[test]
    fn test_theme_files_of_one_slot_share_identifiers() {
        let registry = registry();
        let generator = Counting::default();
        let mut canonicalizer = IdentifierCanonicalizer::new();

        let default = canonicalizer.local_ident(
            &registry,
            &ctx(Path::new("/p/themes/default_composers.scss")),
            "heading",
            &generator,
        );
        let dark = canonicalizer.local_ident(
            &registry,
            &ctx(Path::new("/p/themes/dark_composers.scss")),
            "heading",
            &generator,
        );

        assert_eq!(default, "default_composers__heading");
        assert_eq!(dark, default);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(canonicalizer.cache().len(), 1);
    }

    #[test]
    fn test_non_theme_files_pass_through() {
        let registry = registry();
        let generator = Counting::default();
        let mut canonicalizer = IdentifierCanonicalizer::new();

        for _ in 0..2 {
            let ident = canonicalizer.local_ident(&registry, &ctx(Path::new("/p/src/Button.scss")), "title", &generator);
            assert_eq!(ident, "Button__title");
        }

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert!(canonicalizer.cache().is_empty());
    }
}
