//! Configuration file loading tests.

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;
use vidforge::config::{load_config, Config};

fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn empty_file_yields_defaults() {
    let (_dir, path) = write_config("");
    let config = load_config(&path).unwrap();

    let defaults = Config::default();
    assert_eq!(config.server.host, defaults.server.host);
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
    assert_eq!(config.server.max_upload_mb, 2048);
    assert!(!config.auth.enabled());
    assert_eq!(config.storage.input_dir, PathBuf::from("uploads"));
    assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
    assert!(!config.storage.keep_inputs);
    assert_eq!(config.tools.timeout_secs, 300);
}

#[test]
fn full_file_is_parsed() {
    let (_dir, path) = write_config(
        r#"
[server]
host = "127.0.0.1"
port = 9100
cors_origins = ["https://editor.example"]
max_upload_mb = 512

[auth]
api_key = "k3y"

[storage]
input_dir = "/var/lib/vidforge/in"
output_dir = "/var/lib/vidforge/out"
keep_inputs = true
allow_absolute_output = true

[tools]
ffmpeg_path = "/usr/bin/ffmpeg"
ffprobe_path = "/usr/bin/ffprobe"
timeout_secs = 120
"#,
    );
    let config = load_config(&path).unwrap();

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.cors_origins, vec!["https://editor.example"]);
    assert_eq!(config.server.max_upload_bytes(), 512 * 1024 * 1024);
    assert_eq!(config.auth.api_key.as_deref(), Some("k3y"));
    assert!(config.storage.keep_inputs);
    assert!(config.storage.allow_absolute_output);
    assert_eq!(
        config.storage.output_dir,
        PathBuf::from("/var/lib/vidforge/out")
    );
    assert_eq!(
        config.tools.ffprobe_path,
        Some(PathBuf::from("/usr/bin/ffprobe"))
    );
    assert_eq!(config.tools.timeout().as_secs(), 120);
}

#[test]
fn invalid_values_are_rejected() {
    let (_dir, path) = write_config("[server]\nport = 0\n");
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("port"));

    let (_dir, path) = write_config("[tools]\ntimeout_secs = 0\n");
    assert!(load_config(&path).is_err());

    let (_dir, path) = write_config("[auth]\napi_key = \"\"\n");
    assert!(load_config(&path).is_err());
}

#[test]
fn malformed_toml_reports_the_file() {
    let (_dir, path) = write_config("[server\nport = 1");
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn missing_tool_paths_only_warn() {
    let (_dir, path) = write_config("[tools]\nffmpeg_path = \"/definitely/not/here/ffmpeg\"\n");
    let config = load_config(&path).unwrap();
    assert_eq!(
        config.tools.ffmpeg_path,
        Some(PathBuf::from("/definitely/not/here/ffmpeg"))
    );
}
