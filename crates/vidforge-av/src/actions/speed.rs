//! Playback speed change with pitch-preserving audio tempo.

use std::path::{Path, PathBuf};

use super::{prepare_destination, AUDIO_CODEC, VIDEO_CODEC};
use crate::tools::ToolRegistry;
use crate::Result;

/// Accepted speed range.
const MIN_SPEED: f64 = 0.1;
const MAX_SPEED: f64 = 4.0;

/// Range a single `atempo` stage accepts on every ffmpeg version.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Clamp a requested factor to `[0.1, 4.0]`.
pub fn clamp_speed(factor: f64) -> f64 {
    factor.clamp(MIN_SPEED, MAX_SPEED)
}

/// `atempo` stages whose product is `factor`, each within `[0.5, 2.0]`.
pub fn atempo_chain(factor: f64) -> String {
    let mut stages = Vec::new();
    let mut remaining = factor;
    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);

    stages
        .iter()
        .map(|s| format!("atempo={s}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// The `-filter_complex` graph for a clamped `factor`.
///
/// Video timestamps are scaled by `1/factor`; audio tempo by `factor`. The
/// audio branch is left out for inputs without an audio stream.
pub fn speed_filter(factor: f64, with_audio: bool) -> String {
    let factor = clamp_speed(factor);
    let video = format!("[0:v]setpts={}*PTS[v]", 1.0 / factor);
    if with_audio {
        format!("{video};[0:a]{}[a]", atempo_chain(factor))
    } else {
        video
    }
}

/// Change playback speed, re-encoding both streams.
pub async fn speed(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    factor: f64,
    with_audio: bool,
) -> Result<PathBuf> {
    prepare_destination(input, output)?;

    let clamped = clamp_speed(factor);
    if clamped != factor {
        tracing::warn!("speed {factor} out of range, using {clamped}");
    }

    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .arg("-i")
        .path_arg(input)
        .arg("-filter_complex")
        .arg(speed_filter(clamped, with_audio))
        .args(["-map", "[v]"]);
    if with_audio {
        cmd.args(["-map", "[a]"]);
    }
    cmd.args(["-c:v", VIDEO_CODEC]);
    if with_audio {
        cmd.args(["-c:a", AUDIO_CODEC]);
    }
    cmd.path_arg(output);
    cmd.execute().await?;

    tracing::info!("applied {clamped}x speed to {:?}", input);
    Ok(output.to_path_buf())
}
