use markdownreveal::config::{ConfigLoader, ConverterKind, MirrorKind, ReloadMode, Scalar, CONFIG_FILE_NAME};
use markdownreveal::{merge_config, RevealError};
use serde_yml::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn yaml(text: &str) -> Value {
    serde_yml::from_str(text).expect("Failed to parse YAML")
}

fn write_local(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join(CONFIG_FILE_NAME);
    fs::write(&path, content).expect("Failed to write local config");
    path
}

#[test]
fn test_merge_is_recursive_and_right_biased() {
    let template = yaml("a: 1\nb: 2\nc:\n  x: 3\n  y: 4\n");
    let overrides = yaml("b: 8\nc:\n  y: 0\n  z: 2\n");

    let merged = merge_config(template, overrides);

    assert_eq!(merged, yaml("a: 1\nb: 8\nc:\n  x: 3\n  y: 0\n  z: 2\n"));
}

#[test]
fn test_merge_is_idempotent() {
    let template = yaml("a: 1\nb: 2\nc:\n  x: 3\n  y: 4\n");
    let overrides = yaml("b: 8\nc:\n  y: 0\n  z: 2\n");

    let once = merge_config(template, overrides.clone());
    let twice = merge_config(once.clone(), overrides);

    assert_eq!(once, twice);
}

#[test]
fn test_merge_scalar_replaces_mapping_wholesale() {
    let merged = merge_config(yaml("c:\n  x: 1\n"), yaml("c: 5\n"));
    assert_eq!(merged, yaml("c: 5\n"));

    let merged = merge_config(yaml("c: 5\n"), yaml("c:\n  x: 1\n"));
    assert_eq!(merged, yaml("c:\n  x: 1\n"));
}

#[test]
fn test_merge_with_empty_layer_keeps_template() {
    let template = yaml("a: 1\nb:\n  c: 2\n");
    assert_eq!(merge_config(template.clone(), Value::Null), template);
}

#[test]
fn test_defaults_without_local_file() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let loader = ConfigLoader::new(home.path(), home.path().join(CONFIG_FILE_NAME));

    let config = loader.load().expect("Failed to load config");

    assert_eq!(config.local_path, home.path().join(".markdownreveal"));
    assert_eq!(config.output_path, config.local_path.join("out"));
    assert_eq!(config.theme, "black");
    assert_eq!(config.reveal_version, "latest");
    assert!(config.katex);
    assert!(!config.emoji_codes);
    assert!(!config.no_warmup);
    assert_eq!(config.converter, ConverterKind::Builtin);
    assert_eq!(config.mirror, MirrorKind::Builtin);
    assert_eq!(config.reload, ReloadMode::Push);
    assert_eq!(
        config.template_variables.get("theme"),
        Some(&Scalar::Text("black".to_string()))
    );
    assert_eq!(
        config.template_variables.get("controls"),
        Some(&Scalar::Bool(true))
    );
    assert!(config.converter_flags.is_empty());
}

#[test]
fn test_local_file_overrides_defaults() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(
        talk.path(),
        "theme: white\nfooter: My talk\nreveal_extra:\n  transition: fade\n  width: 1280\npandoc_extra:\n  toc: true\n",
    );

    let config = ConfigLoader::new(home.path(), local)
        .load()
        .expect("Failed to load config");

    assert_eq!(config.theme, "white");
    assert_eq!(config.footer, "My talk");
    assert_eq!(
        config.template_variables.get("transition"),
        Some(&Scalar::Text("fade".to_string()))
    );
    assert_eq!(
        config.template_variables.get("width"),
        Some(&Scalar::Integer(1280))
    );
    // Untouched keys of a merged mapping survive
    assert_eq!(
        config.template_variables.get("progress"),
        Some(&Scalar::Bool(true))
    );
    // The theme variable follows the merged theme
    assert_eq!(
        config.template_variables.get("theme"),
        Some(&Scalar::Text("white".to_string()))
    );
    assert_eq!(config.converter_flags.get("toc"), Some(&Scalar::Bool(true)));
}

#[test]
fn test_style_layer_sits_between_defaults_and_local() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let style_dir = home
        .path()
        .join(".markdownreveal")
        .join("out")
        .join("markdownrevealstyle");
    fs::create_dir_all(&style_dir).expect("Failed to create style dir");
    fs::write(
        style_dir.join(CONFIG_FILE_NAME),
        "theme: league\nfooter: styled footer\n",
    )
    .expect("Failed to write style config");

    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "footer: my footer\n");

    let config = ConfigLoader::new(home.path(), local)
        .load()
        .expect("Failed to load config");

    assert_eq!(config.theme, "league");
    assert_eq!(config.footer, "my footer");
}

#[test]
fn test_local_path_is_resolved_against_home() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "local_path: cache/slides\n");

    let config = ConfigLoader::new(home.path(), local)
        .load()
        .expect("Failed to load config");

    assert_eq!(config.local_path, home.path().join("cache").join("slides"));
    assert_eq!(config.output_path, home.path().join("cache").join("slides").join("out"));
}

#[test]
fn test_empty_local_file_is_an_empty_layer() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "");

    let config = ConfigLoader::new(home.path(), local)
        .load()
        .expect("Failed to load config");
    assert_eq!(config.theme, "black");
}

#[test]
fn test_increment_key_enables_incremental_lists() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "increment: true\n");

    let config = ConfigLoader::new(home.path(), local)
        .load()
        .expect("Failed to load config");
    assert!(config.incremental);
}

#[test]
fn test_unknown_key_is_rejected() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "colour: red\n");

    let result = ConfigLoader::new(home.path(), local).load();
    assert!(matches!(result, Err(RevealError::ConfigParseError(_))));
}

#[test]
fn test_nested_extra_value_is_rejected() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "pandoc_extra:\n  metadata:\n    lang: en\n");

    let result = ConfigLoader::new(home.path(), local).load();
    assert!(result.is_err());
}

#[test]
fn test_non_mapping_local_file_is_rejected() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "- theme\n- white\n");

    let result = ConfigLoader::new(home.path(), local).load();
    assert!(matches!(result, Err(RevealError::ConfigError(_))));
}

#[test]
fn test_required_local_file_missing() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let missing = home.path().join("nowhere.yaml");

    let result = ConfigLoader::new(home.path(), &missing)
        .require_local_file()
        .load();

    match result {
        Err(RevealError::ConfigurationMissing(path)) => assert_eq!(path, missing),
        other => panic!("Expected ConfigurationMissing, got {:?}", other),
    }
}

#[test]
fn test_reload_is_fresh_on_every_load() {
    let home = TempDir::new().expect("Failed to create temp dir");
    let talk = TempDir::new().expect("Failed to create temp dir");
    let local = write_local(talk.path(), "theme: white\n");
    let loader = ConfigLoader::new(home.path(), &local);

    assert_eq!(loader.load().expect("first load").theme, "white");
    fs::write(&local, "theme: night\n").expect("Failed to rewrite config");
    assert_eq!(loader.load().expect("second load").theme, "night");
}
