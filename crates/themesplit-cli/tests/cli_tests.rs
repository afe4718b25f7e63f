use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn themesplit_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("themesplit"))
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Project with themes under `themes/` and no config file
fn bare_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "themes/default.scss", "$ink: #000;\n");
    write(root, "themes/dark.scss", "$ink: #fff;\n");
    write(root, "src/index.js", "import styles from './Note.scss';\n");
    write(root, "src/Note.scss", "@import '../themes/default';\n.note {\n  color: $ink;\n}\n");
    temp_dir
}

const BARE_CONFIG: &str = r#"{
  "themes": { "default": "themes/default.scss", "dark": "themes/dark.scss" },
  "defaultTheme": "default",
  "entry": { "app": "src/index.js" }
}"#;

// ============================================================================
// PROJECT INITIALIZATION TESTS
// ============================================================================

#[test]
fn test_init_creates_project() {
    let temp_dir = TempDir::new().unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created themesplit.yaml"));

    let config = fs::read_to_string(temp_dir.path().join("themesplit.yaml")).unwrap();
    assert!(config.contains("defaultTheme: default"));
    assert!(config.contains("src/themes/dark.scss"));
    assert!(temp_dir.path().join("src/index.jsx").exists());
    assert!(temp_dir.path().join("src/themes/default.scss").exists());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("themesplit.yaml"), "themes: {}\n").unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_then_build() {
    let temp_dir = TempDir::new().unwrap();
    themesplit_cmd().current_dir(&temp_dir).arg("--init").assert().success();

    themesplit_cmd().current_dir(&temp_dir).assert().success();

    let dist = temp_dir.path().join("dist");
    assert!(dist.join("main.js").exists());
    assert!(dist.join("main.css").exists());
    assert!(!dist.join("theme__dark.js").exists());

    let main = fs::read_to_string(dist.join("main.css")).unwrap();
    let dark = fs::read_to_string(dist.join("theme__dark.css")).unwrap();
    assert!(main.contains("background: #ffffff;"));
    assert!(dark.contains("background: #121212;"));
}

// ============================================================================
// CONFIGURATION TESTS
// ============================================================================

#[test]
fn test_json_config_with_cli_overrides() {
    let temp_dir = bare_project();
    fs::write(temp_dir.path().join("themesplit.json"), BARE_CONFIG).unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .args(["--out-dir", "public", "--chunk-prefix", "skin-"])
        .assert()
        .success();

    let public = temp_dir.path().join("public");
    assert!(public.join("app.js").exists());
    assert!(public.join("app.css").exists());
    let dark = fs::read_to_string(public.join("skin-dark.css")).unwrap();
    assert!(dark.contains("color: #fff;"));
}

#[test]
fn test_entries_from_command_line() {
    let temp_dir = bare_project();
    let config = r#"{
  "themes": { "default": "themes/default.scss", "dark": "themes/dark.scss" },
  "defaultTheme": "default"
}"#;
    fs::write(temp_dir.path().join("build.json"), config).unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .args(["--config", "build.json", "--entry", "web=src/index.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web.css"));

    assert!(temp_dir.path().join("dist/theme__dark.css").exists());
}

#[test]
fn test_missing_theme_file_is_reported() {
    let temp_dir = bare_project();
    fs::remove_file(temp_dir.path().join("themes/dark.scss")).unwrap();
    fs::write(temp_dir.path().join("themesplit.json"), BARE_CONFIG).unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid theme configuration"))
        .stderr(predicate::str::contains("Theme 'dark' file not found"));

    assert!(!temp_dir.path().join("dist").exists());
}

#[test]
fn test_unknown_default_theme_is_reported() {
    let temp_dir = bare_project();
    fs::write(temp_dir.path().join("themesplit.json"), BARE_CONFIG).unwrap();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .args(["--default-theme", "sepia"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Default theme 'sepia' missing from themes definition.",
        ));
}

#[test]
fn test_no_entries_is_an_error() {
    let temp_dir = bare_project();

    themesplit_cmd()
        .current_dir(&temp_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No entry points configured"));
}

#[test]
fn test_malformed_entry_flag() {
    themesplit_cmd()
        .args(["--entry", "no-equals-sign"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected NAME=PATH"));
}
