//! External tool detection and management.
//!
//! The [`ToolRegistry`] resolves the locations of `ffmpeg` and `ffprobe`
//! once at startup and hands out ready-to-run [`ToolCommand`]s carrying the
//! configured timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};
use crate::{Error, Result};

/// The transcoding tool.
pub const FFMPEG: &str = "ffmpeg";
/// The metadata inspection tool.
pub const FFPROBE: &str = "ffprobe";

/// Information about an external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Where to look for the tools before falling back to `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    /// An ffmpeg executable, or a directory containing one.
    pub ffmpeg: Option<PathBuf>,
    /// An ffprobe executable, or a directory containing one.
    pub ffprobe: Option<PathBuf>,
}

/// Registry holding the resolved tool locations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Discover tools from the configured overrides, falling back to `PATH`.
    ///
    /// An override may name the executable itself or the directory holding
    /// it. When only ffmpeg is configured, ffprobe is looked for next to it
    /// before `PATH` is searched. Tools that cannot be found are left
    /// unresolved; [`ToolRegistry::require`] reports them.
    pub fn discover(paths: &ToolPaths) -> Self {
        let ffmpeg = resolve(FFMPEG, paths.ffmpeg.as_deref(), None);
        let sibling_dir = ffmpeg.as_deref().and_then(Path::parent);
        let ffprobe = resolve(FFPROBE, paths.ffprobe.as_deref(), sibling_dir);

        Self {
            ffmpeg,
            ffprobe,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a registry from explicit executable paths, without any lookup.
    pub fn with_paths(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the ceiling applied to every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolved path for a tool, if it was found.
    pub fn path(&self, name: &str) -> Option<&Path> {
        match name {
            FFMPEG => self.ffmpeg.as_deref(),
            FFPROBE => self.ffprobe.as_deref(),
            _ => None,
        }
    }

    /// Require that a tool is available, returning its path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if the tool was not found.
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.path(name).ok_or_else(|| Error::tool_not_found(name))
    }

    /// Start an ffmpeg invocation with the configured timeout.
    pub fn ffmpeg(&self) -> Result<ToolCommand> {
        self.command(FFMPEG)
    }

    /// Start an ffprobe invocation with the configured timeout.
    pub fn ffprobe(&self) -> Result<ToolCommand> {
        self.command(FFPROBE)
    }

    fn command(&self, name: &str) -> Result<ToolCommand> {
        let mut cmd = ToolCommand::new(self.require(name)?.to_path_buf());
        cmd.timeout(self.timeout);
        Ok(cmd)
    }

    /// Check both tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        [FFMPEG, FFPROBE]
            .into_iter()
            .map(|name| match self.path(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.to_path_buf()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Platform file name of a tool.
fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Resolve a tool: configured file, configured directory, sibling
/// directory, then `PATH`.
fn resolve(name: &str, configured: Option<&Path>, sibling_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_dir() {
            let candidate = path.join(executable_name(name));
            if candidate.is_file() {
                return Some(candidate);
            }
        } else if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {name} path {} does not exist; searching PATH",
            path.display()
        );
    }

    if let Some(dir) = sibling_dir {
        let candidate = dir.join(executable_name(name));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    which::which(name).ok()
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discover_with_default_paths() {
        let registry = ToolRegistry::discover(&ToolPaths::default());
        // We cannot guarantee any tool is installed in CI,
        // but the call itself must not panic.
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
    }

    #[test]
    fn require_unknown_tool_returns_error() {
        let registry = ToolRegistry::with_paths(None, None);
        let err = registry.require(FFMPEG).unwrap_err();
        assert!(err.is_tool_missing());
        assert!(registry.require("mkvmerge").is_err());
    }

    #[test]
    fn configured_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("my-ffmpeg");
        fs::write(&ffmpeg, b"").unwrap();

        let registry = ToolRegistry::discover(&ToolPaths {
            ffmpeg: Some(ffmpeg.clone()),
            ffprobe: None,
        });
        assert_eq!(registry.path(FFMPEG), Some(ffmpeg.as_path()));
    }

    #[test]
    fn configured_directory_and_sibling_probe() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join(executable_name(FFMPEG));
        let ffprobe = dir.path().join(executable_name(FFPROBE));
        fs::write(&ffmpeg, b"").unwrap();
        fs::write(&ffprobe, b"").unwrap();

        let registry = ToolRegistry::discover(&ToolPaths {
            ffmpeg: Some(dir.path().to_path_buf()),
            ffprobe: None,
        });
        assert_eq!(registry.path(FFMPEG), Some(ffmpeg.as_path()));
        assert_eq!(registry.path(FFPROBE), Some(ffprobe.as_path()));
    }

    #[test]
    fn commands_carry_timeout() {
        let registry = ToolRegistry::with_paths(Some(PathBuf::from("/opt/ffmpeg")), None)
            .with_timeout(Duration::from_secs(7));
        assert_eq!(registry.timeout(), Duration::from_secs(7));
        let cmd = registry.ffmpeg().unwrap();
        assert_eq!(cmd.program(), Path::new("/opt/ffmpeg"));
        assert!(registry.ffprobe().is_err());
    }

    #[test]
    fn tool_info_serialization() {
        let info = ToolInfo {
            name: "ffmpeg".to_string(),
            available: true,
            version: Some("ffmpeg version 6.1".to_string()),
            path: Some(PathBuf::from("/usr/bin/ffmpeg")),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("ffmpeg version 6.1"));
        let back: ToolInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "ffmpeg");
    }
}
