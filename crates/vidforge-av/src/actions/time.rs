//! Time-domain edits. Both stream-copy, so cuts land on keyframes.

use std::path::{Path, PathBuf};

use super::prepare_destination;
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Drop the first `seconds` of the input.
pub async fn trim(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    seconds: f64,
) -> Result<PathBuf> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::InvalidInput(format!(
            "trim start must be a non-negative number of seconds, got {seconds}"
        )));
    }
    prepare_destination(input, output)?;

    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .arg("-ss")
        .arg(seconds.to_string())
        .arg("-i")
        .path_arg(input)
        .args(["-c", "copy"])
        .path_arg(output);
    cmd.execute().await?;

    tracing::info!("trimmed first {seconds}s of {:?}", input);
    Ok(output.to_path_buf())
}

/// Body of an ffmpeg concat-demuxer list for `parts`, in order.
///
/// Single quotes in paths are closed, escaped and reopened (`'\''`).
pub fn concat_manifest(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let escaped = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// Remove `[start, end)` seconds and join what remains.
///
/// The head (`0..start`) and tail (`end..`) are extracted into a private
/// scratch directory next to `output`, then joined with the concat demuxer.
/// The head is skipped when `start` is zero. The scratch directory is
/// removed on every path out of this function.
pub async fn cut_section(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    start: f64,
    end: f64,
) -> Result<PathBuf> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 {
        return Err(Error::InvalidInput(format!(
            "cut bounds must be non-negative numbers, got {start}..{end}"
        )));
    }
    if end <= start {
        return Err(Error::InvalidInput(format!(
            "cut end ({end}) must be greater than start ({start})"
        )));
    }
    prepare_destination(input, output)?;

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let scratch = tempfile::Builder::new()
        .prefix(".vidforge-cut-")
        .tempdir_in(&parent)
        .map_err(|e| Error::Workspace(e.to_string()))?;
    // The concat demuxer resolves relative entries against the list file.
    let scratch_dir = std::fs::canonicalize(scratch.path())?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());

    let mut parts = Vec::with_capacity(2);

    if start > 0.0 {
        let head = scratch_dir.join(format!("part1_{stem}.{ext}"));
        let mut cmd = tools.ffmpeg()?;
        cmd.arg("-y")
            .arg("-i")
            .path_arg(input)
            .arg("-t")
            .arg(start.to_string())
            .args(["-c", "copy"])
            .path_arg(&head);
        cmd.execute().await?;
        parts.push(head);
    }

    let tail = scratch_dir.join(format!("part2_{stem}.{ext}"));
    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .arg("-i")
        .path_arg(input)
        .arg("-ss")
        .arg(end.to_string())
        .args(["-c", "copy"])
        .path_arg(&tail);
    cmd.execute().await?;
    parts.push(tail);

    let list = scratch_dir.join("concat_list.txt");
    tokio::fs::write(&list, concat_manifest(&parts)).await?;

    let mut cmd = tools.ffmpeg()?;
    cmd.arg("-y")
        .args(["-f", "concat"])
        .args(["-safe", "0"])
        .arg("-i")
        .path_arg(&list)
        .args(["-c", "copy"])
        .path_arg(output);
    cmd.execute().await?;

    if let Err(e) = scratch.close() {
        tracing::warn!("Failed to remove cut scratch directory: {e}");
    }

    tracing::info!("cut {start}s..{end}s from {:?}", input);
    Ok(output.to_path_buf())
}
