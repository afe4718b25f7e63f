//! Full compilations of the fixture projects with the theme engine installed.

use std::path::Path;
use themesplit_core::bundle::{DependencyKind, ModuleKind};
use themesplit_core::engine::ReconcileState;
use themesplit_test_helpers::compile::{compile_plain, compile_themed, ThemedBuild};
use themesplit_test_helpers::fixtures::{self, Fixture};

fn module_deps(build: &ThemedBuild, fixture: &Fixture, path: &str, tag: Option<&str>) -> Vec<(String, Option<String>)> {
    build
        .bundler
        .graph()
        .find(&fixture.path(path), tag)
        .unwrap_or_else(|| panic!("module {path} ({tag:?}) not built"))
        .dependencies
        .iter()
        .filter(|d| d.kind != DependencyKind::Extracted)
        .map(|d| (d.request.clone(), d.theme_tag.clone()))
        .collect()
}

// =============================================================================
// Single-entry themes
// =============================================================================

#[test]
fn test_single_entry_emits_theme_css_only() {
    let fixture = fixtures::single_entry();
    let assets = compile_themed(&fixture).unwrap();

    assert_eq!(
        assets.keys().collect::<Vec<_>>(),
        vec!["main.js", "main.css", "theme__dark.css"]
    );

    let main = &assets["main.css"];
    assert!(main.contains("color: #111111;"), "{main}");
    assert!(main.contains("background: #ffffff;"), "{main}");
    assert!(!main.contains("#eeeeee"));

    let dark = &assets["theme__dark.css"];
    assert!(dark.contains("color: #eeeeee;"), "{dark}");
    assert!(dark.contains("background: #000000;"), "{dark}");
    assert!(dark.contains(".Component__title"));
}

#[test]
fn test_entry_does_not_load_theme_chunk() {
    let fixture = fixtures::single_entry();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    let assets = build.compile().unwrap();

    let js = &assets["main.js"];
    assert!(js.contains("/* entry main: main */"), "{js}");
    assert!(!js.contains("theme__dark"));
    assert!(js.contains(r#"module.exports = {"title":"Component__title"};"#), "{js}");

    let group = build.bundler.chunks().group_by_name("main").unwrap();
    assert_eq!(group.chunks.len(), 1);
    let theme = build.bundler.chunks().chunk_by_name("theme__dark").unwrap();
    assert!(theme.groups.is_empty());
    assert_eq!(theme.files, vec!["theme__dark.css"]);
}

#[test]
fn test_main_output_matches_plain_build() {
    let fixture = fixtures::single_entry();
    let themed = compile_themed(&fixture).unwrap();
    let plain = compile_plain(&fixture).unwrap();

    assert_eq!(themed["main.css"], plain["main.css"]);
    assert_eq!(themed["main.js"], plain["main.js"]);
}

#[test]
fn test_theme_variant_modules_are_distinct() {
    let fixture = fixtures::single_entry();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    build.compile().unwrap();

    let graph = build.bundler.graph();
    let component = fixture.path("src/Component.scss");
    let plain = graph.find(&component, None).unwrap();
    let dark = graph.find(&component, Some("dark")).unwrap();

    assert_ne!(plain.id, dark.id);
    assert_eq!(dark.identifier, format!("{}??theme:dark", component.display()));
    assert_eq!(dark.loaders.len(), 1);
    assert!(plain.loaders.is_empty());
}

// =============================================================================
// Multi-entry themes
// =============================================================================

#[test]
fn test_multi_entry_retargets_every_slot() {
    let fixture = fixtures::multi_entry();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    let assets = build.compile().unwrap();

    assert!(!assets.contains_key("theme__dark.js"));

    let main = &assets["main.css"];
    assert!(main.contains("background: white;"), "{main}");
    assert!(main.contains("color: black;"), "{main}");
    assert!(!main.contains("color: white;"));

    let dark = &assets["theme__dark.css"];
    assert!(dark.contains("background: black;"), "{dark}");
    assert!(dark.contains("color: white;"), "{dark}");

    let component = build
        .bundler
        .graph()
        .find(&fixture.path("src/Component.scss"), Some("dark"))
        .unwrap();
    let requests: Vec<_> = component
        .compositions
        .iter()
        .filter_map(|c| c.request.as_deref())
        .collect();
    assert_eq!(requests, vec!["../themes/dark_composers.scss", "./base.scss"]);
}

#[test]
fn test_multi_entry_identifiers_are_canonical() {
    let fixture = fixtures::multi_entry();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    let assets = build.compile().unwrap();

    let graph = build.bundler.graph();
    let default = graph
        .find(&fixture.path("themes/default_composers.scss"), None)
        .unwrap();
    let dark = graph
        .find(&fixture.path("themes/dark_composers.scss"), Some("dark"))
        .unwrap();

    assert_eq!(default.exports["heading"], "default_composers__heading");
    assert_eq!(dark.exports["heading"], default.exports["heading"]);
    assert_eq!(
        build.engine.identifier_cache().get("composers", "heading"),
        Some("default_composers__heading")
    );

    let js = &assets["main.js"];
    assert!(js.contains(r#""title":"Component__title default_composers__heading""#), "{js}");
    assert!(js.contains(r#""body":"Component__body base__reset""#), "{js}");
}

#[test]
fn test_theme_css_excludes_default_theme_rules() {
    for fixture in [fixtures::multi_entry(), fixtures::nested_chain()] {
        let assets = compile_themed(&fixture).unwrap();

        let dark = &assets["theme__dark.css"];
        assert!(dark.contains("color: white;"), "{dark}");
        assert!(!dark.contains("color: black;"), "{dark}");
        assert!(!dark.contains("/* themes/default"), "{dark}");
        assert!(assets["main.css"].contains("color: black;"));
    }
}

// =============================================================================
// Fan-out and propagation
// =============================================================================

#[test]
fn test_fanout_state_is_restored_after_compilation() {
    let fixture = fixtures::single_entry();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    build.compile().unwrap();

    assert_eq!(
        module_deps(&build, &fixture, "src/index.jsx", None),
        vec![
            ("./Component.scss".to_string(), None),
            ("./Component.scss".to_string(), Some("dark".to_string())),
        ]
    );
    assert_eq!(build.engine.reconciler().state(), ReconcileState::Clean);

    let main = build.bundler.chunks().chunk_by_name("main").unwrap();
    let dark = build
        .bundler
        .graph()
        .find(&fixture.path("src/Component.scss"), Some("dark"))
        .unwrap();
    assert!(main.contains_module(dark.id));
}

#[test]
fn test_nested_chain_carries_single_tag() {
    let fixture = fixtures::nested_chain();
    let mut build = ThemedBuild::new(&fixture).unwrap();
    let assets = build.compile().unwrap();

    assert_eq!(
        module_deps(&build, &fixture, "src/Label.scss", Some("dark")),
        vec![("../themes/dark.scss".to_string(), Some("dark".to_string()))]
    );

    let graph = build.bundler.graph();
    for module in graph.iter().filter(|m| m.kind != ModuleKind::ExtractedCss) {
        assert!(
            module.identifier.matches("??").count() <= 1,
            "{} carries more than one tag",
            module.identifier
        );
    }
    let theme = graph
        .find(&fixture.path("themes/dark.scss"), Some("dark"))
        .unwrap();
    assert!(build.engine.fanout().is_in_themed_subtree(graph, theme.id));
    assert!(graph.find(&fixture.path("themes/dark.scss"), None).is_none());

    let dark = &assets["theme__dark.css"];
    assert!(dark.contains("color: white;"), "{dark}");
    assert!(!assets["main.css"].contains("color: white;"));
}

#[test]
fn test_invalid_config_fails_before_build() {
    let fixture = fixtures::single_entry();
    fixture.fs.remove(Path::new("/project/themes/dark.scss"));

    let err = ThemedBuild::new(&fixture).err().unwrap();

    assert_eq!(
        err.to_string(),
        "Theme 'dark' file not found: /project/themes/dark.scss"
    );
}
