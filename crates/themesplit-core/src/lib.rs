pub mod bundle;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod registry;

pub use bundle::{BuildHooks, BundleOptions, Bundler, HashedIdentGenerator, NoopHooks};
pub use config::{BuildConfig, CliOverrides, ThemeEntry, ThemesConfig};
pub use engine::ThemeEngine;
pub use errors::{BuildError, ConfigError, LoaderError};
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use registry::{Theme, ThemeRegistry, ThemeSlot};
