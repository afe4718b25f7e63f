//! Fixture projects - small themed applications on an in-memory file system

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use themesplit_core::fs::MockFileSystem;
use themesplit_core::ThemesConfig;

/// Root every fixture project lives under
pub const ROOT: &str = "/project";

pub struct Fixture {
    pub fs: Arc<MockFileSystem>,
    pub root: PathBuf,
    pub themes: ThemesConfig,
    pub entries: IndexMap<String, PathBuf>,
}

impl Fixture {
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Overwrite a project file, as an editor would
    pub fn edit(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        self.fs.write(path.clone(), content);
        path
    }
}

fn project(files: &[(&str, &str)]) -> Arc<MockFileSystem> {
    let root = Path::new(ROOT);
    let fs = files
        .iter()
        .fold(MockFileSystem::new(), |fs, (path, content)| fs.with_file(root.join(path), *content));
    Arc::new(fs)
}

pub fn default_theme() -> &'static str {
    "$primary: #ffffff;\n$text: #111111;\n"
}

pub fn dark_theme() -> &'static str {
    "$primary: #000000;\n$text: #eeeeee;\n"
}

pub fn component_stylesheet() -> &'static str {
    r#"@import '../themes/default';

.title {
  color: $text;
  background: $primary;
}
"#
}

/// One theme file per theme, one component importing the default theme
pub fn single_entry() -> Fixture {
    let fs = project(&[
        ("themes/default.scss", default_theme()),
        ("themes/dark.scss", dark_theme()),
        (
            "src/index.jsx",
            "import styles from './Component.scss';\n\nexport const className = styles.title;\n",
        ),
        ("src/Component.scss", component_stylesheet()),
    ]);

    Fixture {
        fs,
        root: PathBuf::from(ROOT),
        themes: ThemesConfig::new("default")
            .theme("default", "themes/default.scss")
            .theme("dark", "themes/dark.scss"),
        entries: IndexMap::from([("main".to_string(), PathBuf::from("src/index.jsx"))]),
    }
}

pub fn multi_component_stylesheet() -> &'static str {
    r#"@import '../themes/default_main';

.title {
  composes: heading from '../themes/default_composers.scss';
  background: $primary;
}

.body {
  composes: reset from './base.scss';
}
"#
}

/// Themes with `main` and `composers` slots; the component both imports
/// and composes from the default theme.
pub fn multi_entry() -> Fixture {
    let fs = project(&[
        ("themes/default_main.scss", "$primary: white;\n"),
        ("themes/dark_main.scss", "$primary: black;\n"),
        (
            "themes/default_composers.scss",
            ".heading {\n  font-weight: bold;\n  color: black;\n}\n",
        ),
        (
            "themes/dark_composers.scss",
            ".heading {\n  font-weight: bold;\n  color: white;\n}\n",
        ),
        ("src/index.jsx", "import styles from './Component.scss';\n"),
        ("src/Component.scss", multi_component_stylesheet()),
        ("src/base.scss", ".reset {\n  margin: 0;\n}\n"),
    ]);

    Fixture {
        fs,
        root: PathBuf::from(ROOT),
        themes: ThemesConfig::new("default")
            .theme(
                "default",
                [
                    ("main", "themes/default_main.scss"),
                    ("composers", "themes/default_composers.scss"),
                ],
            )
            .theme(
                "dark",
                [
                    ("main", "themes/dark_main.scss"),
                    ("composers", "themes/dark_composers.scss"),
                ],
            ),
        entries: IndexMap::from([("main".to_string(), PathBuf::from("src/index.jsx"))]),
    }
}

/// Component imports a plain stylesheet that in turn composes from the
/// theme, so the theme reference sits two levels below the themed edge.
pub fn nested_chain() -> Fixture {
    let fs = project(&[
        ("themes/default.scss", ".tone {\n  color: black;\n}\n"),
        ("themes/dark.scss", ".tone {\n  color: white;\n}\n"),
        ("src/index.jsx", "import styles from './Card.scss';\n"),
        (
            "src/Card.scss",
            ".card {\n  composes: label from './Label.scss';\n  padding: 4px;\n}\n",
        ),
        (
            "src/Label.scss",
            ".label {\n  composes: tone from '../themes/default.scss';\n}\n",
        ),
    ]);

    Fixture {
        fs,
        root: PathBuf::from(ROOT),
        themes: ThemesConfig::new("default")
            .theme("default", "themes/default.scss")
            .theme("dark", "themes/dark.scss"),
        entries: IndexMap::from([("main".to_string(), PathBuf::from("src/index.jsx"))]),
    }
}
