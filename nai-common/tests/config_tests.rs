//! Tests for sidecar root and interpreter resolution
//!
//! Uses serial_test to prevent environment variable races. Tests that touch
//! NAI_ROOT or NAI_PYTHON are marked with #[serial].

use nai_common::config::{SidecarResolver, TomlConfig, PYTHON_ENV, ROOT_ENV};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ROOT_ENV);
    env::remove_var(PYTHON_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    clear_env();
    env::set_var(ROOT_ENV, "/tmp/nai-env-root");

    let resolver = SidecarResolver::new(TomlConfig {
        root: Some(PathBuf::from("/tmp/nai-toml-root")),
        ..Default::default()
    });
    let root = resolver.resolve_root(None).expect("root should resolve");
    assert_eq!(root, PathBuf::from("/tmp/nai-env-root"));

    clear_env();
}

#[test]
#[serial]
fn test_toml_root_used_without_env() {
    clear_env();

    let resolver = SidecarResolver::new(TomlConfig {
        root: Some(PathBuf::from("/tmp/nai-toml-root")),
        ..Default::default()
    });
    assert_eq!(
        resolver.resolve_root(None).unwrap(),
        PathBuf::from("/tmp/nai-toml-root")
    );
}

#[test]
#[serial]
fn test_search_finds_sidecar_in_ancestor() {
    clear_env();
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sidecar")).unwrap();
    let nested = temp.path().join("ui").join("src-tauri");
    fs::create_dir_all(&nested).unwrap();

    let resolver = SidecarResolver::new(TomlConfig::default()).with_start_dir(&nested);
    assert_eq!(resolver.resolve_root(None).unwrap(), temp.path());
}

#[test]
#[serial]
fn test_search_gives_up_without_sidecar() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("a").join("b").join("c").join("d").join("e").join("f");
    fs::create_dir_all(&nested).unwrap();
    // Sidecar sits above the search window
    fs::create_dir_all(temp.path().join("sidecar")).unwrap();

    let resolver = SidecarResolver::new(TomlConfig::default()).with_start_dir(&nested);
    let err = resolver.resolve_root(None).unwrap_err();
    assert!(err.to_string().contains(ROOT_ENV));
}

#[test]
#[serial]
fn test_python_env_var() {
    clear_env();
    env::set_var(PYTHON_ENV, "/opt/python/bin/python3");

    let resolver = SidecarResolver::new(TomlConfig::default());
    assert_eq!(
        resolver.resolve_python(Path::new("/nowhere"), None),
        PathBuf::from("/opt/python/bin/python3")
    );

    clear_env();
}

#[test]
#[serial]
fn test_python_prefers_project_venv() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("venv").join("bin");
    fs::create_dir_all(&bin).unwrap();
    fs::write(bin.join("python"), "").unwrap();

    let resolver = SidecarResolver::new(TomlConfig::default());
    assert_eq!(resolver.resolve_python(temp.path(), None), bin.join("python"));
}

#[test]
#[serial]
fn test_python_falls_back_to_path() {
    clear_env();
    let temp = TempDir::new().unwrap();

    let resolver = SidecarResolver::new(TomlConfig::default());
    assert_eq!(resolver.resolve_python(temp.path(), None), PathBuf::from("python"));
}

#[test]
fn test_config_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "root = \"/srv/nai\"\n[logging]\nlevel = \"warn\"\n").unwrap();

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.root, Some(PathBuf::from("/srv/nai")));
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_config_from_invalid_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "root = [unterminated").unwrap();

    assert!(matches!(
        TomlConfig::from_file(&path),
        Err(nai_common::Error::Toml(_))
    ));
}
