use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems. All of these are raised while the engine is
/// constructed, before any build phase runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You must provide the list of themes.")]
    MissingThemes,

    #[error("You must provide the default theme key.")]
    MissingDefaultTheme,

    #[error("Default theme '{0}' missing from themes definition.")]
    DefaultThemeNotDeclared(String),

    #[error("Theme '{theme}' entry must be {expected}")]
    EntryShape {
        theme: String,
        expected: &'static str,
    },

    #[error("Theme '{theme}' declares {found} entries, default theme '{default_theme}' declares {expected}")]
    SlotCountMismatch {
        theme: String,
        default_theme: String,
        expected: usize,
        found: usize,
    },

    #[error("Theme '{theme}' is missing entry '{slot}' declared by default theme '{default_theme}'")]
    SlotMissing {
        theme: String,
        slot: String,
        default_theme: String,
    },

    #[error("Theme '{theme}' file not found: {}", path.display())]
    FileNotFound { theme: String, path: PathBuf },

    #[error("Theme '{theme}' entry '{slot}' file not found: {}", path.display())]
    SlotFileNotFound {
        theme: String,
        slot: String,
        path: PathBuf,
    },

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// A loader failed to transform a module's content.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Loader '{loader}' failed on {}: {message}", resource.display())]
    Failed {
        loader: String,
        resource: PathBuf,
        message: String,
    },
}

/// Failures raised by the reference host while building a module graph.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("Module not found: can't resolve '{request}' in {}", context.display())]
    Unresolved { request: String, context: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No entry points configured")]
    NoEntries,
}

pub type Result<T> = std::result::Result<T, BuildError>;
