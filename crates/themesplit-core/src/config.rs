use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;

/// Default prefix for per-theme output chunks
pub const DEFAULT_CHUNK_PREFIX: &str = "theme__";

/// Default scoped class name pattern
pub const DEFAULT_LOCAL_IDENT_NAME: &str = "[name]__[local]___[hash:base64:5]";

/// A theme's declared entry: one stylesheet, or a mapping of slot name to
/// stylesheet for multi-file themes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeEntry {
    Single(String),
    Multi(IndexMap<String, String>),
}

impl From<&str> for ThemeEntry {
    fn from(path: &str) -> Self {
        ThemeEntry::Single(path.to_string())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ThemeEntry {
    fn from(slots: [(&str, &str); N]) -> Self {
        ThemeEntry::Multi(
            slots
                .into_iter()
                .map(|(slot, path)| (slot.to_string(), path.to_string()))
                .collect(),
        )
    }
}

/// Theme declaration consumed by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemesConfig {
    /// Theme key to entry file(s), in declaration order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<IndexMap<String, ThemeEntry>>,

    /// Key of the theme the sources are authored against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_theme: Option<String>,

    /// Prefix for per-theme chunk names (default: "theme__")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_prefix: Option<String>,
}

impl ThemesConfig {
    pub fn new(default_theme: impl Into<String>) -> Self {
        Self {
            themes: Some(IndexMap::new()),
            default_theme: Some(default_theme.into()),
            chunk_prefix: None,
        }
    }

    /// Declare a theme. Declaration order is preserved.
    pub fn theme(mut self, key: impl Into<String>, entry: impl Into<ThemeEntry>) -> Self {
        self.themes
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), entry.into());
        self
    }

    pub fn with_chunk_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.chunk_prefix = Some(prefix.into());
        self
    }

    pub fn chunk_prefix(&self) -> &str {
        self.chunk_prefix.as_deref().unwrap_or(DEFAULT_CHUNK_PREFIX)
    }
}

/// Project configuration file (`themesplit.yaml` or `themesplit.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(flatten)]
    pub themes: ThemesConfig,

    /// Entry name to source path, relative to the project root
    #[serde(default)]
    pub entry: IndexMap<String, String>,

    /// Output directory for emitted assets
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Scoped class name pattern
    #[serde(default = "default_local_ident_name")]
    pub local_ident_name: String,
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_local_ident_name() -> String {
    DEFAULT_LOCAL_IDENT_NAME.to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            themes: ThemesConfig::default(),
            entry: IndexMap::new(),
            out_dir: default_out_dir(),
            local_ident_name: default_local_ident_name(),
        }
    }
}

/// Values given on the command line, applied over the file configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub default_theme: Option<String>,
    pub chunk_prefix: Option<String>,
    pub out_dir: Option<String>,
    pub entries: Vec<(String, String)>,
}

impl BuildConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Write a starter configuration file
    pub fn init_file(path: &Path) -> Result<(), ConfigError> {
        let mut config = BuildConfig {
            themes: ThemesConfig::new("default")
                .theme("default", "src/themes/default.scss")
                .theme("dark", "src/themes/dark.scss"),
            ..Default::default()
        };
        config
            .entry
            .insert("main".to_string(), "src/index.jsx".to_string());

        let text = serde_yaml::to_string(&config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Merge CLI overrides into this configuration
    pub fn merge(&mut self, overrides: &CliOverrides) {
        if let Some(ref key) = overrides.default_theme {
            self.themes.default_theme = Some(key.clone());
        }
        if let Some(ref prefix) = overrides.chunk_prefix {
            self.themes.chunk_prefix = Some(prefix.clone());
        }
        if let Some(ref out_dir) = overrides.out_dir {
            self.out_dir = out_dir.clone();
        }
        for (name, path) in &overrides.entries {
            self.entry.insert(name.clone(), path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert_eq!(config.out_dir, "dist");
        assert_eq!(config.local_ident_name, DEFAULT_LOCAL_IDENT_NAME);
        assert_eq!(config.themes.chunk_prefix(), "theme__");
    }

    #[test]
    fn test_deserialize_single_entry_themes() {
        let json = r#"{
            "themes": { "default": "themes/default.scss", "dark": "themes/dark.scss" },
            "defaultTheme": "default",
            "entry": { "main": "src/index.jsx" }
        }"#;
        let config: BuildConfig = serde_json::from_str(json).unwrap();
        let themes = config.themes.themes.unwrap();

        assert_eq!(config.themes.default_theme.as_deref(), Some("default"));
        assert_eq!(
            themes.keys().collect::<Vec<_>>(),
            vec!["default", "dark"],
            "declaration order must survive deserialization"
        );
        assert_eq!(themes["dark"], ThemeEntry::from("themes/dark.scss"));
    }

    #[test]
    fn test_deserialize_multi_entry_themes_from_yaml() {
        let yaml = r#"
themes:
  default:
    main: themes/default.scss
    composers: themes/default_composers.scss
  dark:
    main: themes/dark.scss
    composers: themes/dark_composers.scss
defaultTheme: default
chunkPrefix: "skin-"
"#;
        let config: BuildConfig = serde_yaml::from_str(yaml).unwrap();
        let themes = config.themes.themes.as_ref().unwrap();

        assert!(matches!(themes["dark"], ThemeEntry::Multi(ref m) if m.len() == 2));
        assert_eq!(config.themes.chunk_prefix(), "skin-");
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = BuildConfig::default();
        let overrides = CliOverrides {
            default_theme: Some("light".to_string()),
            out_dir: Some("build".to_string()),
            entries: vec![("app".to_string(), "src/app.js".to_string())],
            ..Default::default()
        };

        config.merge(&overrides);

        assert_eq!(config.themes.default_theme.as_deref(), Some("light"));
        assert_eq!(config.out_dir, "build");
        assert_eq!(config.entry["app"], "src/app.js");
    }

    #[test]
    fn test_init_file_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("themesplit.yaml");

        BuildConfig::init_file(&path).unwrap();
        let config = BuildConfig::from_file(&path).unwrap();

        assert_eq!(config.themes.default_theme.as_deref(), Some("default"));
        assert_eq!(config.entry["main"], "src/index.jsx");
    }
}
