//! Retargets theme file references inside stylesheet content.
//!
//! Only `@import '<path>'` and `composes: <names> from '<path>'` are touched,
//! and only when `<path>` resolves to the default theme's file for a slot.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fs::resolve_path;

/// One slot to retarget: references to `default_path` become references to
/// `target_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTarget {
    /// File name of the default entry without extension
    pub default_basename: String,
    pub default_path: PathBuf,
    pub target_path: PathBuf,
}

#[derive(Debug, Clone)]
struct SlotRewrite {
    pattern: Regex,
    default_stem: PathBuf,
    target_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ImportRewriter {
    slots: Vec<SlotRewrite>,
}

impl ImportRewriter {
    pub fn new(slots: &[SlotTarget]) -> Self {
        let slots = slots
            .iter()
            // a slot mapped onto itself is the identity
            .filter(|slot| strip_style_extension(&slot.default_path) != strip_style_extension(&slot.target_path))
            .map(|slot| SlotRewrite {
                pattern: statement_pattern(&slot.default_basename),
                default_stem: strip_style_extension(&slot.default_path),
                target_path: slot.target_path.clone(),
            })
            .collect();
        Self { slots }
    }

    pub fn is_identity(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rewrite `content` of a module living in `dir`
    pub fn rewrite(&self, content: &str, dir: &Path) -> String {
        let mut out = content.to_string();

        for slot in &self.slots {
            let mut rewritten = 0usize;
            let replaced = slot.pattern.replace_all(&out, |caps: &Captures<'_>| {
                let path = &caps["path"];
                if strip_style_extension(&resolve_path(dir, path)) != slot.default_stem {
                    return caps[0].to_string();
                }
                rewritten += 1;
                format!(
                    "{}{}{}{}",
                    &caps["prefix"],
                    &caps["open"],
                    relative_request(&slot.target_path, dir),
                    &caps["close"]
                )
            });
            let replaced = replaced.into_owned();

            if rewritten > 0 {
                debug!(
                    "Retargeted {} reference(s) to {} in {}",
                    rewritten,
                    slot.default_stem.display(),
                    dir.display()
                );
            }
            out = replaced;
        }

        out
    }
}

/// Convenience wrapper for one-off rewrites
pub fn rewrite_imports(content: &str, dir: &Path, slots: &[SlotTarget]) -> String {
    ImportRewriter::new(slots).rewrite(content, dir)
}

fn statement_pattern(basename: &str) -> Regex {
    let pattern = format!(
        r#"(?P<prefix>@import\s+|composes\s*:\s*[^;{{}}'"]+?\s+from\s+)(?P<open>['"])(?P<path>[^'"]*{}(?:\.scss|\.sass)?)(?P<close>['"])"#,
        regex::escape(basename)
    );
    Regex::new(&pattern).expect("escaped basename forms a valid pattern")
}

fn strip_style_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("scss" | "sass" | "css") => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

/// `target` relative to `dir`, always starting with `.` so it stays a
/// relative request
fn relative_request(target: &Path, dir: &Path) -> String {
    let relative = pathdiff::diff_paths(target, dir).unwrap_or_else(|| target.to_path_buf());
    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.starts_with('.') || relative.starts_with('/') {
        relative
    } else {
        format!("./{}", relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn dark_slot() -> SlotTarget {
        SlotTarget {
            default_basename: "default".to_string(),
            default_path: PathBuf::from("/p/themes/default.scss"),
            target_path: PathBuf::from("/p/themes/dark.scss"),
        }
    }

    #[test]
    fn test_import_is_retargeted() {
        let out = rewrite_imports(
            "@import '../themes/default';\n.a { color: $primary; }\n",
            Path::new("/p/src"),
            &[dark_slot()],
        );
        assert_eq!(out, "@import '../themes/dark.scss';\n.a { color: $primary; }\n");
    }

    #[test]
    fn test_extension_and_quote_style_preserved_around_literal() {
        let out = rewrite_imports(
            "@import \"../themes/default.scss\";",
            Path::new("/p/src"),
            &[dark_slot()],
        );
        assert_eq!(out, "@import \"../themes/dark.scss\";");
    }

    #[test]
    fn test_same_basename_elsewhere_is_untouched() {
        let content = indoc! {"
            @import './default';
            @import '../vendor/default.scss';
            @import '../themes/default';
        "};
        let out = rewrite_imports(content, Path::new("/p/src"), &[dark_slot()]);
        assert_eq!(
            out,
            indoc! {"
                @import './default';
                @import '../vendor/default.scss';
                @import '../themes/dark.scss';
            "}
        );
    }

    #[test]
    fn test_composes_is_retargeted_with_dot_prefix() {
        let slot = SlotTarget {
            default_basename: "default_composers".to_string(),
            default_path: PathBuf::from("/p/src/default_composers.scss"),
            target_path: PathBuf::from("/p/src/dark_composers.scss"),
        };
        let out = rewrite_imports(
            ".title { composes: heading bold from './default_composers.scss'; }",
            Path::new("/p/src"),
            &[slot],
        );
        assert_eq!(out, ".title { composes: heading bold from './dark_composers.scss'; }");
    }

    #[test]
    fn test_slots_are_independent() {
        let main = SlotTarget {
            default_basename: "default_main".to_string(),
            default_path: PathBuf::from("/p/themes/default_main.scss"),
            target_path: PathBuf::from("/p/themes/dark_main.scss"),
        };
        let composers = SlotTarget {
            default_basename: "default_composers".to_string(),
            default_path: PathBuf::from("/p/themes/default_composers.scss"),
            target_path: PathBuf::from("/p/themes/dark_composers.scss"),
        };
        let content = indoc! {"
            @import '../themes/default_main';
            .x { composes: y from '../themes/default_composers.scss'; }
        "};

        let out = rewrite_imports(content, Path::new("/p/src"), &[main, composers]);
        assert!(out.contains("@import '../themes/dark_main.scss';"));
        assert!(out.contains("composes: y from '../themes/dark_composers.scss';"));
    }

    #[test]
    fn test_default_target_is_identity() {
        let slot = SlotTarget {
            target_path: PathBuf::from("/p/themes/default.scss"),
            ..dark_slot()
        };
        let rewriter = ImportRewriter::new(&[slot]);
        assert!(rewriter.is_identity());

        let content = "@import '../themes/default';";
        assert_eq!(rewriter.rewrite(content, Path::new("/p/src")), content);
    }
}
