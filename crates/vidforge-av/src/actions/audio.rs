use std::path::{Path, PathBuf};

use super::{prepare_destination, AUDIO_CODEC};
use crate::tools::ToolRegistry;
use crate::Result;

/// `volume=<db>dB`.
pub fn volume_filter(db: f64) -> String {
    format!("volume={db}dB")
}

/// Change loudness by `db` decibels. Video is copied untouched.
pub async fn volume(tools: &ToolRegistry, input: &Path, output: &Path, db: f64) -> Result<PathBuf> {
    prepare_destination(input, output)?;

    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .arg("-i")
        .path_arg(input)
        .arg("-af")
        .arg(volume_filter(db))
        .args(["-c:v", "copy"])
        .args(["-c:a", AUDIO_CODEC])
        .path_arg(output);
    cmd.execute().await?;

    tracing::info!("adjusted volume of {:?} by {db}dB", input);
    Ok(output.to_path_buf())
}
