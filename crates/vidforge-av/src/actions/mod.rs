//! Media editing actions, one ffmpeg invocation each.
//!
//! Every action reads `input`, writes `output` and returns the output path.
//! The input is never modified; any file already at `output` is replaced.
//! Time-domain edits ([`trim`], [`cut_section`]) stream-copy, pixel filters
//! re-encode video and copy audio, [`volume`] re-encodes audio and copies
//! video, and [`speed`] re-encodes both.

mod audio;
mod speed;
mod time;
mod video;

pub use audio::{volume, volume_filter};
pub use speed::{atempo_chain, clamp_speed, speed, speed_filter};
pub use time::{concat_manifest, cut_section, trim};
pub use video::{
    adjust_eq, blur, blur_filter, crop, flip, hue, hue_filter, rotate, rotate_filter, scale,
    scale_filter, sharpen, sharpen_filter, CropRect, EqAdjustment, FlipDirection,
};

use std::path::{Path, PathBuf};

use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Video encoder used whenever pixels change.
pub(crate) const VIDEO_CODEC: &str = "libx264";

/// Audio encoder used whenever samples change.
pub(crate) const AUDIO_CODEC: &str = "aac";

/// Make `output` ready to be written: reject writing over the source,
/// create its directory and remove whatever is already there.
pub(crate) fn prepare_destination(input: &Path, output: &Path) -> Result<()> {
    if input == output {
        return Err(Error::InvalidInput(format!(
            "refusing to overwrite the source {}",
            input.display()
        )));
    }
    if !input.exists() {
        return Err(Error::file_not_found(input));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match std::fs::remove_file(output) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Re-encode the video stream through a single `-vf` filter, copying audio.
pub(crate) async fn filter_video(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    filter: &str,
) -> Result<PathBuf> {
    prepare_destination(input, output)?;

    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .arg("-i")
        .path_arg(input)
        .args(["-vf", filter])
        .args(["-c:a", "copy"])
        .args(["-c:v", VIDEO_CODEC])
        .path_arg(output);
    cmd.execute().await?;

    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prepare_rejects_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"x").unwrap();
        let err = prepare_destination(&input, &input).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
        assert!(input.exists());
    }

    #[test]
    fn prepare_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            prepare_destination(&dir.path().join("nope.mp4"), &dir.path().join("out.mp4"))
                .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn prepare_replaces_existing_output_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"x").unwrap();

        let stale = dir.path().join("out.mp4");
        fs::write(&stale, b"stale").unwrap();
        prepare_destination(&input, &stale).unwrap();
        assert!(!stale.exists());

        let nested = dir.path().join("a/b/out.mp4");
        prepare_destination(&input, &nested).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}
