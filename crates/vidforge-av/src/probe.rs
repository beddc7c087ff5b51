//! ffprobe queries: audio presence and container duration.
//!
//! Probing is side-effect free and never cached; every call asks ffprobe
//! about the file as it is on disk right now.

use std::path::Path;

use crate::tools::{ToolRegistry, FFPROBE};
use crate::Result;

/// Asks ffprobe questions about media files.
#[derive(Debug, Clone)]
pub struct AudioProber {
    tools: ToolRegistry,
}

impl AudioProber {
    /// Create a prober using the registry's ffprobe.
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Whether `path` currently has an audio stream.
    ///
    /// Reports `true` when ffprobe itself is unavailable: without the tool
    /// the answer is unknown, and a missing probe must not raise false
    /// "audio lost" alarms. Any other probe failure (unreadable file,
    /// timeout) reports `false`.
    pub async fn has_audio(&self, path: &Path) -> bool {
        match self.first_audio_codec(path).await {
            Ok(codec) => codec.is_some(),
            Err(e) if e.is_tool_missing() => {
                tracing::warn!(
                    "ffprobe not available, assuming {} has audio: {e}",
                    path.display()
                );
                true
            }
            Err(e) => {
                tracing::debug!("Audio probe failed for {}: {e}", path.display());
                false
            }
        }
    }

    /// Codec name of the first audio stream, `None` when there is none.
    ///
    /// # Errors
    ///
    /// [`crate::Error::ToolNotFound`] when ffprobe is unavailable,
    /// [`crate::Error::ToolFailed`] when it rejects the file.
    pub async fn first_audio_codec(&self, path: &Path) -> Result<Option<String>> {
        let mut cmd = self.tools.ffprobe()?;
        cmd.args(["-v", "quiet"])
            .args(["-select_streams", "a:0"])
            .args(["-show_entries", "stream=codec_name"])
            .args(["-of", "csv=p=0"])
            .path_arg(path);

        let output = cmd.execute().await?;
        Ok(parse_codec_line(&output.stdout))
    }

    /// Container duration in seconds, `None` if it cannot be determined.
    pub async fn duration(&self, path: &Path) -> Option<f64> {
        let mut cmd = match self.tools.ffprobe() {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!("Cannot read duration of {}: {e}", path.display());
                return None;
            }
        };
        cmd.args(["-v", "quiet"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .path_arg(path);

        match cmd.execute().await {
            Ok(output) => parse_duration(&output.stdout),
            Err(e) => {
                tracing::debug!("Duration probe failed for {}: {e}", path.display());
                None
            }
        }
    }

    /// Whether ffprobe was found at all.
    pub fn is_available(&self) -> bool {
        self.tools.path(FFPROBE).is_some()
    }
}

fn parse_codec_line(stdout: &str) -> Option<String> {
    let codec = stdout.lines().next().unwrap_or("").trim().trim_end_matches(',');
    if codec.is_empty() {
        None
    } else {
        Some(codec.to_string())
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn codec_line_parsing() {
        assert_eq!(parse_codec_line("aac\n"), Some("aac".to_string()));
        assert_eq!(parse_codec_line("opus,\n"), Some("opus".to_string()));
        assert_eq!(parse_codec_line("\n"), None);
        assert_eq!(parse_codec_line(""), None);
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("30.021000\n"), Some(30.021));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[tokio::test]
    async fn missing_ffprobe_assumes_audio() {
        let prober = AudioProber::new(ToolRegistry::with_paths(None, None));
        assert!(!prober.is_available());
        assert!(prober.has_audio(&PathBuf::from("/nonexistent.mp4")).await);
        assert_eq!(prober.duration(&PathBuf::from("/nonexistent.mp4")).await, None);
    }

    #[tokio::test]
    async fn unspawnable_ffprobe_assumes_audio() {
        let prober = AudioProber::new(ToolRegistry::with_paths(
            None,
            Some(PathBuf::from("/nonexistent/bin/ffprobe")),
        ));
        assert!(prober.has_audio(&PathBuf::from("/nonexistent.mp4")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_ffprobe_reports_no_audio() {
        // `false` runs and exits non-zero, like ffprobe on an unreadable file.
        let Ok(false_bin) = which::which("false") else {
            return;
        };
        let prober = AudioProber::new(ToolRegistry::with_paths(None, Some(false_bin)));
        assert!(!prober.has_audio(&PathBuf::from("/nonexistent.mp4")).await);
    }
}
