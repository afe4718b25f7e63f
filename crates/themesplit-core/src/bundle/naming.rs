use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::hooks::{IdentContext, LocalIdentGenerator};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(name|local|hash)(?::(base64|hex))?(?::(\d+))?\]").expect("valid placeholder pattern")
});

const DEFAULT_HASH_LENGTH: usize = 8;

/// Scoped class names from a `[name]` / `[local]` / `[hash:base64:N]` pattern.
///
/// The hash covers the resource path relative to the root context and the
/// local name, so the same class in two different files never collides.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashedIdentGenerator;

impl HashedIdentGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl LocalIdentGenerator for HashedIdentGenerator {
    fn generate(&self, ctx: &IdentContext<'_>, local: &str) -> String {
        let relative = pathdiff::diff_paths(ctx.resource, ctx.root_context)
            .unwrap_or_else(|| ctx.resource.to_path_buf());
        let relative = relative.to_string_lossy().replace('\\', "/");
        let name = ctx
            .resource
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(relative.as_bytes());
        hasher.update(b"\x00");
        hasher.update(local.as_bytes());
        let digest = hasher.finalize();

        let ident = PLACEHOLDER.replace_all(ctx.pattern, |caps: &Captures<'_>| {
            match &caps[1] {
                "name" => name.clone(),
                "local" => local.to_string(),
                _ => {
                    let len = caps
                        .get(3)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(DEFAULT_HASH_LENGTH);
                    let encoded = match caps.get(2).map(|m| m.as_str()) {
                        Some("base64") => URL_SAFE_NO_PAD.encode(digest.as_bytes()),
                        _ => digest.to_hex().to_string(),
                    };
                    encoded.chars().take(len).collect()
                }
            }
        });

        escape_ident(&ident)
    }
}

/// Class names can't start with a digit (or `-` followed by one)
fn escape_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let starts_with_digit = match (chars.next(), chars.next()) {
        (Some(c), _) if c.is_ascii_digit() => true,
        (Some('-'), Some(c)) if c.is_ascii_digit() => true,
        _ => false,
    };
    if starts_with_digit {
        format!("_{}", ident)
    } else {
        ident.to_string()
    }
}
