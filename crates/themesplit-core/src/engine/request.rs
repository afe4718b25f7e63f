//! Encodes a theme tag into the request so `(resource, theme)` pairs resolve
//! to distinct modules, then decodes it again on module creation.

use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, LazyLock};
use tracing::{trace, warn};

use super::rewrite::{ImportRewriter, SlotTarget};
use crate::bundle::{Loader, LoaderContext, Module, ResolveRequest};
use crate::errors::LoaderError;
use crate::registry::ThemeRegistry;

static STYLESHEET_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.s[ac]ss$").expect("valid stylesheet pattern"));

static THEME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?\?.*theme:([^:?!]+)").expect("valid marker pattern"));

pub const THEME_LOADER_NAME: &str = "themesplit-theme-loader";

/// Whether `request` names a `.scss`/`.sass` file
pub fn is_stylesheet_request(request: &str) -> bool {
    STYLESHEET_REQUEST.is_match(request)
}

/// `<request>??theme:<key>`
pub fn mark_request(request: &str, theme: &str) -> String {
    format!("{}??theme:{}", request, theme)
}

/// Theme key encoded in a module identifier, if any
pub fn parse_marker(identifier: &str) -> Option<&str> {
    THEME_MARKER
        .captures(identifier)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Rewrites default theme references to one theme's files
#[derive(Debug)]
pub struct ThemeImportLoader {
    theme: String,
    slots: Vec<SlotTarget>,
    rewriter: ImportRewriter,
}

impl ThemeImportLoader {
    pub fn new(theme: impl Into<String>, slots: Vec<SlotTarget>) -> Self {
        let rewriter = ImportRewriter::new(&slots);
        Self {
            theme: theme.into(),
            slots,
            rewriter,
        }
    }

    /// Pair the default theme's slots with `theme`'s, slot by slot
    pub fn for_theme(registry: &ThemeRegistry, theme: &str) -> Option<Self> {
        let target = registry.theme(theme)?;
        let default = registry.default_theme();
        let slots = default
            .entries
            .iter()
            .zip(registry.default_entry_basenames())
            .filter_map(|(slot, basename)| {
                Some(SlotTarget {
                    default_basename: basename.clone(),
                    default_path: slot.path.clone(),
                    target_path: target.entry(&slot.name)?.to_path_buf(),
                })
            })
            .collect();
        Some(Self::new(theme, slots))
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn slots(&self) -> &[SlotTarget] {
        &self.slots
    }
}

impl Loader for ThemeImportLoader {
    fn name(&self) -> &str {
        THEME_LOADER_NAME
    }

    fn load(&self, content: &str, ctx: &LoaderContext<'_>) -> Result<String, LoaderError> {
        Ok(self.rewriter.rewrite(content, ctx.context))
    }
}

/// Tags stylesheet requests on the way in and attaches the theme loader to
/// the modules they create.
#[derive(Debug, Default)]
pub struct RequestIdentityTagger {
    loaders: FxHashMap<String, Arc<ThemeImportLoader>>,
}

impl RequestIdentityTagger {
    pub fn new(registry: &ThemeRegistry) -> Self {
        let loaders = registry
            .non_default_theme_keys()
            .iter()
            .filter_map(|key| {
                let loader = ThemeImportLoader::for_theme(registry, key)?;
                Some((key.clone(), Arc::new(loader)))
            })
            .collect();
        Self { loaders }
    }

    pub fn loader(&self, theme: &str) -> Option<&Arc<ThemeImportLoader>> {
        self.loaders.get(theme)
    }

    pub fn tag_request(&self, request: &mut ResolveRequest) {
        let Some(theme) = request.theme_tag.as_deref() else {
            return;
        };
        if !is_stylesheet_request(&request.request) {
            return;
        }
        let marked = mark_request(&request.request, theme);
        trace!("Tagged request {}", marked);
        request.request = marked;
    }

    pub fn tag_module(&self, module: &mut Module) {
        let Some(theme) = parse_marker(&module.identifier).map(str::to_string) else {
            return;
        };

        if !module.has_loader(THEME_LOADER_NAME) {
            match self.loaders.get(&theme) {
                Some(loader) => module.loaders.push(loader.clone()),
                None => warn!("No theme '{}' configured for {}", theme, module.identifier),
            }
        }
        trace!("Module {} tagged '{}'", module.identifier, theme);
        module.theme_tag = Some(theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{DependencyKind, ModuleKind};
    use crate::config::ThemesConfig;
    use std::path::{Path, PathBuf};

    fn registry() -> ThemeRegistry {
        let config = ThemesConfig::new("default")
            .theme("default", "themes/default.scss")
            .theme("dark", "themes/dark.scss");
        ThemeRegistry::normalize(&config, Path::new("/p")).unwrap()
    }

    #[test]
    fn test_marker_round_trip() {
        let marked = mark_request("./Button.scss", "dark");
        assert_eq!(marked, "./Button.scss??theme:dark");
        assert_eq!(parse_marker(&format!("/p/src/{}", &marked[2..])), Some("dark"));
        assert_eq!(parse_marker("/p/src/Button.scss"), None);
    }

    #[test]
    fn test_only_tagged_stylesheet_requests_are_marked() {
        let tagger = RequestIdentityTagger::new(&registry());
        let mut request = ResolveRequest {
            request: "./Button.scss".to_string(),
            context: PathBuf::from("/p/src"),
            kind: DependencyKind::Import,
            theme_tag: None,
        };

        tagger.tag_request(&mut request);
        assert_eq!(request.request, "./Button.scss");

        request.theme_tag = Some("dark".to_string());
        tagger.tag_request(&mut request);
        assert_eq!(request.request, "./Button.scss??theme:dark");

        let mut script = ResolveRequest {
            request: "./util.js".to_string(),
            theme_tag: Some("dark".to_string()),
            ..request
        };
        tagger.tag_request(&mut script);
        assert_eq!(script.request, "./util.js");
    }

    #[test]
    fn test_loader_attached_once() {
        let tagger = RequestIdentityTagger::new(&registry());
        let mut module = Module::new(
            "/p/src/Button.scss??theme:dark",
            "/p/src/Button.scss",
            ModuleKind::Stylesheet,
        );

        tagger.tag_module(&mut module);
        tagger.tag_module(&mut module);

        assert_eq!(module.theme_tag.as_deref(), Some("dark"));
        assert_eq!(module.loaders.len(), 1);
        assert_eq!(module.loaders[0].name(), THEME_LOADER_NAME);
    }

    #[test]
    fn test_untagged_module_is_left_alone() {
        let tagger = RequestIdentityTagger::new(&registry());
        let mut module = Module::new("/p/src/Button.scss", "/p/src/Button.scss", ModuleKind::Stylesheet);

        tagger.tag_module(&mut module);

        assert_eq!(module.theme_tag, None);
        assert!(module.loaders.is_empty());
    }

    #[test]
    fn test_loader_retargets_default_theme() {
        let tagger = RequestIdentityTagger::new(&registry());
        let loader = tagger.loader("dark").unwrap();
        assert_eq!(loader.theme(), "dark");
        assert_eq!(loader.slots().len(), 1);

        let ctx = LoaderContext {
            resource: Path::new("/p/src/Button.scss"),
            context: Path::new("/p/src"),
        };
        let out = loader.load("@import '../themes/default';", &ctx).unwrap();
        assert_eq!(out, "@import '../themes/dark.scss';");
    }
}
