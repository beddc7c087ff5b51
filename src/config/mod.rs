mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config.
///
/// Environment variables are applied on top of whatever was loaded, and the
/// storage directories are made absolute.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    let mut config = match custom_path {
        Some(path) => load_config(path)?,
        None => find_default_config()?.unwrap_or_default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    resolve_dirs(&mut config)?;

    Ok(config)
}

fn find_default_config() -> Result<Option<Config>> {
    let default_paths = [
        "./vidforge.toml",
        "./config.toml",
        "~/.config/vidforge/config.toml",
        "/etc/vidforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path).map(Some);
        }
    }

    Ok(None)
}

/// Apply environment-style overrides from `lookup`.
///
/// Recognised keys: `API_KEY`, `INPUT_DIR`, `OUTPUT_DIR`, `HOST`, `PORT`,
/// `CORS_ORIGINS` (comma separated), `FFMPEG_PATH`, `FFPROBE_PATH` and
/// `FFMPEG_TIMEOUT` (seconds). Empty values are ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("API_KEY") {
        config.auth.api_key = Some(key);
    }
    if let Some(dir) = get("INPUT_DIR") {
        config.storage.input_dir = PathBuf::from(dir);
    }
    if let Some(dir) = get("OUTPUT_DIR") {
        config.storage.output_dir = PathBuf::from(dir);
    }
    if let Some(host) = get("HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("PORT is not a valid port number: {port}"))?;
    }
    if let Some(origins) = get("CORS_ORIGINS") {
        config.server.cors_origins = origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }
    if let Some(path) = get("FFMPEG_PATH") {
        config.tools.ffmpeg_path = Some(PathBuf::from(path));
    }
    if let Some(path) = get("FFPROBE_PATH") {
        config.tools.ffprobe_path = Some(PathBuf::from(path));
    }
    if let Some(secs) = get("FFMPEG_TIMEOUT") {
        config.tools.timeout_secs = secs
            .trim()
            .parse()
            .with_context(|| format!("FFMPEG_TIMEOUT is not a number of seconds: {secs}"))?;
    }

    Ok(())
}

fn resolve_dirs(config: &mut Config) -> Result<()> {
    config.storage.input_dir = std::path::absolute(&config.storage.input_dir)
        .with_context(|| format!("Invalid input_dir: {:?}", config.storage.input_dir))?;
    config.storage.output_dir = std::path::absolute(&config.storage.output_dir)
        .with_context(|| format!("Invalid output_dir: {:?}", config.storage.output_dir))?;
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_mb == 0 {
        anyhow::bail!("server.max_upload_mb cannot be 0");
    }

    if let Some(ref key) = config.auth.api_key {
        if key.trim().is_empty() {
            anyhow::bail!("auth.api_key is set but empty; remove it to disable authentication");
        }
    }

    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs cannot be 0");
    }

    for (name, path) in [
        ("ffmpeg_path", &config.tools.ffmpeg_path),
        ("ffprobe_path", &config.tools.ffprobe_path),
    ] {
        if let Some(p) = path {
            if !p.exists() {
                tracing::warn!("tools.{name} does not exist: {:?}", p);
            }
        }
    }

    Ok(())
}
