//! Loading `kiln.toml` end to end.

use std::fs;
use std::path::PathBuf;

use kiln_config::{describe, BuildMode, ConfigDiscovery, StageKind};
use serial_test::serial;
use tempfile::TempDir;

fn clear_env() {
    for key in ["HOST", "PORT", "KILN_DEV__PORT", "KILN_BUILD__PRODUCTION_GZIP"] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn toml_file_overrides_defaults() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("kiln.toml"),
        r#"
[base]
entry = { main = "src/index.js" }
use_eslint = false

[dev]
port = 4000

[build]
production_gzip = true
production_gzip_extensions = ["js", "css", "svg"]
"#,
    )
    .expect("write config");

    let project = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(project.dev.port, 4000);
    assert!(!project.base.use_eslint);
    assert_eq!(project.base.entry["main"], PathBuf::from("src/index.js"));
    // Unspecified fields keep their defaults.
    assert_eq!(project.dev.host, "localhost");
    assert_eq!(project.build.assets_subdir, "static");

    let descriptor = describe(&project, dir.path(), BuildMode::Production).expect("describe");
    assert!(descriptor.flags.gzip);
    assert!(descriptor
        .optimization_stages()
        .iter()
        .any(|s| s.kind() == StageKind::Compress && s.enabled(&descriptor.flags)));
}

#[test]
#[serial]
fn environment_beats_file() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("kiln.toml"), "[dev]\nport = 4000\n").expect("write config");

    std::env::set_var("KILN_DEV__PORT", "4100");
    let project = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(project.dev.port, 4100);

    std::env::set_var("PORT", "4200");
    let project = ConfigDiscovery::new(dir.path()).load().expect("load");
    assert_eq!(project.dev.port, 4200);

    clear_env();
}

#[test]
#[serial]
fn invalid_field_type_is_an_error() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("kiln.toml"), "[dev]\nport = \"eighty\"\n").expect("write config");
    assert!(ConfigDiscovery::new(dir.path()).load().is_err());
}

#[test]
#[serial]
fn template_file_is_picked_up_when_present() {
    clear_env();
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("index.html"), "<html><body></body></html>").expect("write");
    let project = ConfigDiscovery::new(dir.path()).load().expect("load");
    let descriptor = describe(&project, dir.path(), BuildMode::Development).expect("describe");
    assert_eq!(descriptor.html_template, Some(dir.path().join("index.html")));
}
