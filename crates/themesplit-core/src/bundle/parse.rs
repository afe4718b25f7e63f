//! Source scanning for the reference host.
//!
//! Scripts contribute `import`/`require` dependencies. Stylesheets are
//! compiled just far enough to produce scoped output: `@import`s are
//! inlined, top-level `$variables` substituted, `composes` declarations
//! lifted out and class selectors renamed through a callback.

use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::graph::Composition;
use crate::errors::{BuildError, Result};
use crate::fs::{resolve_path, FileSystem};

static SCRIPT_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[\w*${}\s,]+?\s+from\s+)?['"]([^'"]+)['"]"#)
        .expect("valid import pattern")
});

static SCRIPT_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid require pattern")
});

static STYLE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+['"]([^'"]+)['"]\s*;?"#).expect("valid @import pattern")
});

static COMPOSES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"composes\s*:\s*([^;{}]+?)(?:\s+from\s+['"]([^'"]+)['"])?\s*(?:;|$)"#)
        .expect("valid composes pattern")
});

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment pattern"));

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*//[^\n]*\n?").expect("valid comment pattern"));

static VARIABLE_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\$([\w-]+)\s*:\s*([^;]+?)\s*(?:!default\s*)?;[ \t]*\n?")
        .expect("valid variable pattern")
});

static VARIABLE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([\w-]+)").expect("valid variable pattern"));

static CLASS_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)").expect("valid class pattern"));

const STYLE_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Requests a script imports, in source order. Bare package specifiers are
/// externals and skipped.
pub fn script_requests(source: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut requests = Vec::new();

    let imports = SCRIPT_IMPORT.captures_iter(source);
    let requires = SCRIPT_REQUIRE.captures_iter(source);
    let mut found: Vec<(usize, &str)> = imports
        .chain(requires)
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    found.sort_by_key(|(start, _)| *start);

    for (_, request) in found {
        if is_relative_request(request) && seen.insert(request) {
            requests.push(request.to_string());
        }
    }
    requests
}

pub fn is_relative_request(request: &str) -> bool {
    request.starts_with("./") || request.starts_with("../") || request.starts_with('/')
}

fn strip_comments(source: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(source, "");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Locate the file an `@import` refers to, trying the stylesheet extensions
/// and the `_partial` convention when the request has none.
fn resolve_style_import(dir: &Path, request: &str, fs: &dyn FileSystem) -> Option<PathBuf> {
    let base = resolve_path(dir, request);
    if base.extension().is_some() && fs.exists(&base) {
        return Some(base);
    }

    let file_name = base.file_name()?.to_string_lossy().into_owned();
    let parent = base.parent()?.to_path_buf();
    STYLE_EXTENSIONS
        .iter()
        .flat_map(|ext| {
            [
                parent.join(format!("{}.{}", file_name, ext)),
                parent.join(format!("_{}.{}", file_name, ext)),
            ]
        })
        .find(|candidate| fs.exists(candidate))
}

/// Replace every `@import` with the imported file's content, recursively.
pub fn inline_imports(source: &str, dir: &Path, fs: &dyn FileSystem) -> Result<String> {
    inline_imports_tracked(source, dir, fs, &mut Vec::new())
}

/// [`inline_imports`], also collecting every file that was inlined
pub fn inline_imports_tracked(
    source: &str,
    dir: &Path,
    fs: &dyn FileSystem,
    files: &mut Vec<PathBuf>,
) -> Result<String> {
    let mut stack = Vec::new();
    inline_imports_inner(source, dir, fs, &mut stack, files)
}

fn inline_imports_inner(
    source: &str,
    dir: &Path,
    fs: &dyn FileSystem,
    stack: &mut Vec<PathBuf>,
    files: &mut Vec<PathBuf>,
) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in STYLE_IMPORT.captures_iter(source) {
        let whole = caps.get(0).expect("group 0 always matches");
        let request = &caps[1];

        // Plain CSS imports of remote stylesheets stay as they are
        if request.starts_with("http://") || request.starts_with("https://") {
            continue;
        }

        let path = resolve_style_import(dir, request, fs).ok_or_else(|| BuildError::Unresolved {
            request: request.to_string(),
            context: dir.to_path_buf(),
        })?;

        out.push_str(&source[last..whole.start()]);
        last = whole.end();

        // Import cycles inline once
        if stack.contains(&path) {
            continue;
        }

        let imported = fs.read_to_string(&path).map_err(|source| BuildError::Read {
            path: path.clone(),
            source,
        })?;
        let imported_dir = path.parent().unwrap_or(dir).to_path_buf();

        if !files.contains(&path) {
            files.push(path.clone());
        }
        stack.push(path);
        let inlined = inline_imports_inner(&imported, &imported_dir, fs, stack, files)?;
        stack.pop();

        out.push_str(inlined.trim_end());
        out.push('\n');
    }

    out.push_str(&source[last..]);
    Ok(out)
}

/// Substitute `$name` references with the value of their last top-level
/// definition and drop the definitions.
pub fn substitute_variables(source: &str) -> String {
    let mut values: IndexMap<String, String> = IndexMap::new();
    for caps in VARIABLE_DEF.captures_iter(source) {
        let value = VARIABLE_REF
            .replace_all(&caps[2], |r: &regex::Captures<'_>| {
                values.get(&r[1]).cloned().unwrap_or_else(|| r[0].to_string())
            })
            .into_owned();
        values.insert(caps[1].to_string(), value);
    }

    let body = VARIABLE_DEF.replace_all(source, "");
    VARIABLE_REF
        .replace_all(&body, |r: &regex::Captures<'_>| {
            values.get(&r[1]).cloned().unwrap_or_else(|| r[0].to_string())
        })
        .into_owned()
}

/// Last class selector in the rule prelude enclosing byte offset `at`
fn enclosing_class(source: &str, at: usize) -> Option<String> {
    let open = source[..at].rfind('{')?;
    let prelude_start = source[..open]
        .rfind(|c| c == '}' || c == ';' || c == '{')
        .map(|i| i + 1)
        .unwrap_or(0);
    CLASS_SELECTOR
        .captures_iter(&source[prelude_start..open])
        .last()
        .map(|caps| caps[1].to_string())
}

/// Lift `composes` declarations out of `source`.
pub fn extract_compositions(source: &str) -> (String, Vec<Composition>) {
    let mut compositions = Vec::new();
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in COMPOSES.captures_iter(source) {
        let whole = caps.get(0).expect("group 0 always matches");
        let Some(local) = enclosing_class(source, whole.start()) else {
            continue;
        };

        compositions.push(Composition {
            local,
            names: caps[1].split_whitespace().map(str::to_string).collect(),
            request: caps.get(2).map(|m| m.as_str().to_string()),
        });

        out.push_str(source[last..whole.start()].trim_end_matches([' ', '\t']));
        last = whole.end();
    }

    out.push_str(&source[last..]);
    (out, compositions)
}

/// Rename class selectors in rule preludes. At-rule preludes and
/// declarations are copied unchanged. Returns the rewritten source and the
/// local names in order of first appearance.
pub fn scope_classes(source: &str, mut rename: impl FnMut(&str) -> String) -> (String, IndexMap<String, String>) {
    let mut exports = IndexMap::new();
    let mut out = String::with_capacity(source.len());
    let mut segment_start = 0;

    for (i, ch) in source.char_indices() {
        match ch {
            '{' => {
                let prelude = &source[segment_start..i];
                if prelude.trim_start().starts_with('@') {
                    out.push_str(prelude);
                } else {
                    let scoped = CLASS_SELECTOR.replace_all(prelude, |caps: &regex::Captures<'_>| {
                        let local = &caps[1];
                        let ident = exports
                            .entry(local.to_string())
                            .or_insert_with(|| rename(local))
                            .clone();
                        format!(".{}", ident)
                    });
                    out.push_str(&scoped);
                }
                out.push('{');
                segment_start = i + 1;
            }
            '}' | ';' => {
                out.push_str(&source[segment_start..=i]);
                segment_start = i + 1;
            }
            _ => {}
        }
    }
    out.push_str(&source[segment_start..]);

    (out, exports)
}

/// Everything a compiled stylesheet module needs
#[derive(Debug, Clone, Default)]
pub struct CompiledStylesheet {
    pub css: String,
    pub exports: IndexMap<String, String>,
    pub compositions: Vec<Composition>,
    /// Files inlined through `@import`
    pub file_dependencies: Vec<PathBuf>,
}

/// Compile loader output of a stylesheet into scoped CSS
pub fn compile_stylesheet(
    source: &str,
    dir: &Path,
    fs: &dyn FileSystem,
    rename: impl FnMut(&str) -> String,
) -> Result<CompiledStylesheet> {
    let mut file_dependencies = Vec::new();
    let inlined = inline_imports_tracked(&strip_comments(source), dir, fs, &mut file_dependencies)?;
    let substituted = substitute_variables(&strip_comments(&inlined));
    let (without_composes, compositions) = extract_compositions(&substituted);
    let (css, mut exports) = scope_classes(&without_composes, rename);

    // A class that only composes others still needs an export
    for composition in &compositions {
        if !exports.contains_key(&composition.local) {
            exports.insert(composition.local.clone(), String::new());
        }
    }

    Ok(CompiledStylesheet {
        css: tidy(&css),
        exports,
        compositions,
        file_dependencies,
    })
}

/// Drop blank lines and trailing whitespace
fn tidy(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for line in css.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
