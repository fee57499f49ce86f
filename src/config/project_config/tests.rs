use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_project_config(dir.path());
    assert!(config.languages.is_empty());
    assert!(config.exclude.paths.is_empty());
    assert_eq!(
        config.state_path(dir.path()),
        dir.path().join(".healthledger/state.json")
    );
}

#[test]
fn test_parse_full_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
state_path = "build/ledger.json"

[exclude]
paths = ["node_modules", "dist"]

[languages.python]
manifest = "graphs/py.json"
entry_patterns = ["__main__", "conftest", "manage.py"]

[[languages.python.boundaries]]
protected = "shared/"
forbidden_from = "tools/"
label = "shared→tools"

[[languages.python.zones]]
zone = "script"
patterns = ["tasks/"]
"#,
    )
    .unwrap();

    let config = load_project_config(dir.path());
    assert_eq!(config.state_path(dir.path()), dir.path().join("build/ledger.json"));
    assert_eq!(config.exclude.paths, vec!["node_modules", "dist"]);

    let python = config.language("python").unwrap();
    // Unset fields keep the built-in defaults
    assert_eq!(python.extensions, vec!["py"]);
    assert_eq!(python.barrel_names, vec!["__init__.py"]);
    assert_eq!(python.entry_patterns, vec!["__main__", "conftest", "manage.py"]);
    assert_eq!(python.manifest_path("python"), PathBuf::from("graphs/py.json"));
    assert_eq!(python.boundaries.len(), 1);
    assert_eq!(python.boundaries[0].label, "shared→tools");
    // Configured zone rules come first
    assert_eq!(python.zones[0].zone, Zone::Script);
    assert!(python.zones.len() > 1);
}

#[test]
fn test_invalid_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE), "[languages.python\nextensions = 3").unwrap();
    let config = load_project_config(dir.path());
    assert!(config.languages.is_empty());
}

#[test]
fn test_unknown_zone_in_config_is_rejected() {
    let parsed: Result<ProjectConfig, _> = toml::from_str(
        r#"
[[languages.python.zones]]
zone = "museum"
patterns = ["old/"]
"#,
    );
    assert!(parsed.is_err());
}

#[test]
fn test_builtin_and_custom_languages() {
    assert!(LanguageConfig::builtin("typescript").is_some());
    assert!(LanguageConfig::builtin("cobol").is_none());

    let config: ProjectConfig = toml::from_str(
        r#"
[languages.rust]
extensions = ["rs"]
markers = ["Cargo.toml"]
barrel_names = ["mod.rs"]
"#,
    )
    .unwrap();
    let rust = config.language("rust").unwrap();
    assert_eq!(rust.manifest_path("rust"), PathBuf::from(".healthledger/imports.rust.json"));
    assert!(rust.graph_policy().is_barrel("src/graph/mod.rs"));
    assert_eq!(config.language_names(), vec!["typescript", "python", "go", "rust"]);
    assert!(config.language("cobol").is_none());
}

#[test]
fn test_auto_detect_lang() {
    let config = ProjectConfig::default();

    let empty = TempDir::new().unwrap();
    assert_eq!(auto_detect_lang(empty.path(), &config), None);

    let py = TempDir::new().unwrap();
    fs::write(py.path().join("setup.cfg"), "").unwrap();
    assert_eq!(auto_detect_lang(py.path(), &config).as_deref(), Some("python"));

    // package.json wins over Python markers
    let mixed = TempDir::new().unwrap();
    fs::write(mixed.path().join("pyproject.toml"), "").unwrap();
    fs::write(mixed.path().join("package.json"), "{}").unwrap();
    assert_eq!(auto_detect_lang(mixed.path(), &config).as_deref(), Some("typescript"));

    let go = TempDir::new().unwrap();
    fs::write(go.path().join("go.mod"), "module x").unwrap();
    assert_eq!(auto_detect_lang(go.path(), &config).as_deref(), Some("go"));
}
