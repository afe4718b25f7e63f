//! Validated, normalized view of the configured theme set.
//!
//! Every theme declares the same entry slots as the default theme. Slots are
//! ordered by name, so slot index `i` refers to the same logical entry in
//! every theme. Single-entry themes use the implicit slot
//! [`SINGLE_ENTRY_SLOT`].

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ThemeEntry, ThemesConfig};
use crate::errors::ConfigError;
use crate::fs::{resolve_path, FileSystem};

/// Slot name used by single-entry themes
pub const SINGLE_ENTRY_SLOT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSlot {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub key: String,
    /// Entries sorted by slot name
    pub entries: Vec<ThemeSlot>,
}

impl Theme {
    pub fn entry_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|slot| slot.path.as_path())
    }

    pub fn entry(&self, slot: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|s| s.name == slot)
            .map(|s| s.path.as_path())
    }
}

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    default_theme_key: String,
    themes: IndexMap<String, Theme>,
    non_default_theme_keys: Vec<String>,
    default_entry_basenames: Vec<String>,
    chunk_prefix: String,
    multi_entry: bool,
    slot_by_file: FxHashMap<PathBuf, String>,
}

fn required_parts(config: &ThemesConfig) -> Result<(&IndexMap<String, ThemeEntry>, &str), ConfigError> {
    let themes = config
        .themes
        .as_ref()
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingThemes)?;
    let default_theme = config
        .default_theme
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingDefaultTheme)?;

    if !themes.contains_key(default_theme) {
        return Err(ConfigError::DefaultThemeNotDeclared(
            default_theme.to_string(),
        ));
    }

    Ok((themes, default_theme))
}

/// Slot name to declared path, sorted by slot name
fn sorted_slots(entry: &ThemeEntry) -> Vec<(&str, &str)> {
    match entry {
        ThemeEntry::Single(path) => vec![(SINGLE_ENTRY_SLOT, path.as_str())],
        ThemeEntry::Multi(slots) => {
            let mut slots: Vec<_> = slots
                .iter()
                .map(|(name, path)| (name.as_str(), path.as_str()))
                .collect();
            slots.sort_by(|a, b| a.0.cmp(b.0));
            slots
        }
    }
}

fn check_schema(key: &str, entry: &ThemeEntry, default_key: &str, default_entry: &ThemeEntry) -> Result<(), ConfigError> {
    match (default_entry, entry) {
        (ThemeEntry::Single(_), ThemeEntry::Multi(_)) => {
            return Err(ConfigError::EntryShape {
                theme: key.to_string(),
                expected: "a file path string",
            });
        }
        (ThemeEntry::Multi(_), ThemeEntry::Single(_)) => {
            return Err(ConfigError::EntryShape {
                theme: key.to_string(),
                expected: "a mapping of entry names to file paths",
            });
        }
        (ThemeEntry::Single(_), ThemeEntry::Single(_)) => return Ok(()),
        (ThemeEntry::Multi(expected), ThemeEntry::Multi(found)) => {
            if expected.len() != found.len() {
                return Err(ConfigError::SlotCountMismatch {
                    theme: key.to_string(),
                    default_theme: default_key.to_string(),
                    expected: expected.len(),
                    found: found.len(),
                });
            }
            if let Some(slot) = expected.keys().find(|slot| !found.contains_key(*slot)) {
                return Err(ConfigError::SlotMissing {
                    theme: key.to_string(),
                    slot: slot.clone(),
                    default_theme: default_key.to_string(),
                });
            }
        }
    }
    Ok(())
}

impl ThemeRegistry {
    /// Validate and normalize in one step
    pub fn from_config(
        config: &ThemesConfig,
        project_root: &Path,
        fs: &dyn FileSystem,
    ) -> Result<Self, ConfigError> {
        Self::validate(config, project_root, fs)?;
        Self::normalize(config, project_root)
    }

    /// Check the configuration eagerly, including that every theme file exists.
    pub fn validate(
        config: &ThemesConfig,
        project_root: &Path,
        fs: &dyn FileSystem,
    ) -> Result<(), ConfigError> {
        let (themes, default_key) = required_parts(config)?;
        let default_entry = &themes[default_key];

        for (key, entry) in themes {
            check_schema(key, entry, default_key, default_entry)?;

            for (slot, declared) in sorted_slots(entry) {
                let path = resolve_path(project_root, declared);
                if fs.exists(&path) {
                    continue;
                }
                return Err(match entry {
                    ThemeEntry::Single(_) => ConfigError::FileNotFound {
                        theme: key.clone(),
                        path,
                    },
                    ThemeEntry::Multi(_) => ConfigError::SlotFileNotFound {
                        theme: key.clone(),
                        slot: slot.to_string(),
                        path,
                    },
                });
            }
        }

        Ok(())
    }

    /// Build the registry. Paths are made absolute against `project_root`
    /// and every theme's entries are ordered by slot name.
    pub fn normalize(config: &ThemesConfig, project_root: &Path) -> Result<Self, ConfigError> {
        let (declared, default_key) = required_parts(config)?;

        let mut themes = IndexMap::with_capacity(declared.len());
        let mut slot_by_file = FxHashMap::default();

        for (key, entry) in declared {
            let entries: Vec<ThemeSlot> = sorted_slots(entry)
                .into_iter()
                .map(|(slot, path)| ThemeSlot {
                    name: slot.to_string(),
                    path: resolve_path(project_root, path),
                })
                .collect();

            for slot in &entries {
                slot_by_file.insert(slot.path.clone(), slot.name.clone());
            }

            themes.insert(
                key.clone(),
                Theme {
                    key: key.clone(),
                    entries,
                },
            );
        }

        let default_entry_basenames = themes[default_key]
            .entry_paths()
            .map(|path| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect();

        let non_default_theme_keys: Vec<String> = themes
            .keys()
            .filter(|key| key.as_str() != default_key)
            .cloned()
            .collect();

        let registry = Self {
            default_theme_key: default_key.to_string(),
            multi_entry: matches!(declared[default_key], ThemeEntry::Multi(_)),
            themes,
            non_default_theme_keys,
            default_entry_basenames,
            chunk_prefix: config.chunk_prefix().to_string(),
            slot_by_file,
        };

        info!(
            "Theme registry: default '{}', {} alternate theme(s), {} slot(s)",
            registry.default_theme_key,
            registry.non_default_theme_keys.len(),
            registry.slot_count()
        );
        debug!("Alternate themes: {:?}", registry.non_default_theme_keys);

        Ok(registry)
    }

    pub fn default_theme_key(&self) -> &str {
        &self.default_theme_key
    }

    pub fn default_theme(&self) -> &Theme {
        &self.themes[self.default_theme_key.as_str()]
    }

    /// All keys except the default, in declaration order
    pub fn non_default_theme_keys(&self) -> &[String] {
        &self.non_default_theme_keys
    }

    pub fn theme(&self, key: &str) -> Option<&Theme> {
        self.themes.get(key)
    }

    pub fn themes(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }

    /// Default theme entry file names without extension, by slot index
    pub fn default_entry_basenames(&self) -> &[String] {
        &self.default_entry_basenames
    }

    pub fn slot_count(&self) -> usize {
        self.default_entry_basenames.len()
    }

    pub fn is_multi_entry(&self) -> bool {
        self.multi_entry
    }

    pub fn chunk_prefix(&self) -> &str {
        &self.chunk_prefix
    }

    /// Name of the output chunk holding `key`'s styles
    pub fn theme_chunk_name(&self, key: &str) -> String {
        format!("{}{}", self.chunk_prefix, key)
    }

    pub fn theme_chunk_names(&self) -> Vec<String> {
        self.non_default_theme_keys
            .iter()
            .map(|key| self.theme_chunk_name(key))
            .collect()
    }

    /// Slot filled by `file` in any theme, if it is a theme entry
    pub fn slot_for_file(&self, file: &Path) -> Option<&str> {
        self.slot_by_file.get(file).map(String::as_str)
    }
}
