//! Workspace management for pipeline execution.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of the per-run scratch directory.
const WORKSPACE_PREFIX: &str = ".vidforge-";

/// Extension used for intermediates when the output has none.
const DEFAULT_EXTENSION: &str = "mp4";

/// Workspace for pipeline execution.
///
/// Owns a scratch directory created next to the final output (same
/// filesystem, so no cross-device copies) that holds every intermediate
/// artifact of one run. The directory and everything in it is removed when
/// the workspace is dropped, whichever way the run ends. The final output
/// lives outside the scratch directory and is never touched by cleanup.
///
/// # Example
///
/// ```no_run
/// use vidforge_av::Workspace;
///
/// let workspace = Workspace::new("/uploads/input_ab12.mp4", "/outputs/edited_ab12.mp4")?;
/// let first = workspace.destination(0, false); // intermediate
/// let last = workspace.destination(1, true);   // the final output
/// workspace.cleanup();
/// # Ok::<(), vidforge_av::Error>(())
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    output_path: PathBuf,
    stem: String,
    extension: String,
}

impl Workspace {
    /// Create a new workspace for turning `input` into `output`.
    ///
    /// The output's parent directory is created if needed.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Self> {
        let input = input.as_ref();
        let output = output.as_ref();

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidInput("Invalid input file path".to_string()))?;
        let extension = output
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| Error::Workspace(format!("Failed to create {}: {e}", parent.display())))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| Error::Workspace(e.to_string()))?;

        Ok(Self {
            temp_dir,
            output_path: output.to_path_buf(),
            stem,
            extension,
        })
    }

    /// Get the final output file path.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the intermediate artifact produced by step `index`.
    pub fn step_path(&self, index: usize) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("step_{index}_{}.{}", self.stem, self.extension))
    }

    /// Where step `index` writes: the final output for the last step, an
    /// intermediate otherwise.
    pub fn destination(&self, index: usize, is_last: bool) -> PathBuf {
        if is_last {
            self.output_path.clone()
        } else {
            self.step_path(index)
        }
    }

    /// Remove the scratch directory now, logging instead of failing.
    pub fn cleanup(self) {
        let dir = self.temp_dir.path().to_path_buf();
        if let Err(e) = self.temp_dir.close() {
            tracing::warn!("Failed to remove workspace {}: {e}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_workspace_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("uploads/clip.mov");
        let output = dir.path().join("outputs/edited.mp4");
        let workspace = Workspace::new(&input, &output).unwrap();

        assert_eq!(workspace.output(), output);
        assert!(workspace.temp_dir().starts_with(dir.path().join("outputs")));
        assert!(dir.path().join("outputs").is_dir());
    }

    #[test]
    fn test_step_naming() {
        let dir = tempfile::tempdir().unwrap();
        let workspace =
            Workspace::new(dir.path().join("clip.mov"), dir.path().join("out.mkv")).unwrap();

        let step = workspace.step_path(2);
        assert!(step.starts_with(workspace.temp_dir()));
        assert_eq!(step.file_name().unwrap(), "step_2_clip.mkv");
        assert_eq!(workspace.destination(2, false), step);
        assert_eq!(workspace.destination(3, true), dir.path().join("out.mkv"));
    }

    #[test]
    fn test_extension_defaults_to_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let workspace =
            Workspace::new(dir.path().join("clip"), dir.path().join("out")).unwrap();
        assert_eq!(workspace.step_path(0).file_name().unwrap(), "step_0_clip.mp4");
    }

    #[test]
    fn test_concurrent_workspaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        let a = Workspace::new(&input, dir.path().join("a.mp4")).unwrap();
        let b = Workspace::new(&input, dir.path().join("b.mp4")).unwrap();
        assert_ne!(a.temp_dir(), b.temp_dir());
        assert_ne!(a.step_path(0), b.step_path(0));
    }

    #[test]
    fn test_drop_removes_intermediates_but_not_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let workspace = Workspace::new(dir.path().join("clip.mp4"), &output).unwrap();

        let scratch = workspace.temp_dir().to_path_buf();
        fs::write(workspace.step_path(0), b"intermediate").unwrap();
        fs::write(&output, b"final").unwrap();
        drop(workspace);

        assert!(!scratch.exists());
        assert_eq!(fs::read(&output).unwrap(), b"final");
    }

    #[test]
    fn test_cleanup_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let workspace =
            Workspace::new(dir.path().join("clip.mp4"), dir.path().join("out.mp4")).unwrap();
        let scratch = workspace.temp_dir().to_path_buf();
        fs::write(workspace.step_path(0), b"x").unwrap();
        workspace.cleanup();
        assert!(!scratch.exists());
    }
}
