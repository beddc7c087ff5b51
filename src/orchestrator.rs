//! Request orchestration: stage the upload, decide where the result goes,
//! run the pipeline and clean up after it.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use vidforge_av::{AudioProber, ToolRegistry};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::pipeline::{ActionList, AudioStatus, PipelineExecutor, StepReport};

/// Extension assumed when the client sent no filename.
const DEFAULT_EXTENSION: &str = "mp4";

/// Short request identifier: the first 8 hex digits of a v4 UUID.
pub fn new_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Reduce a client-supplied filename to its last path component with every
/// character outside `[A-Za-z0-9_.-]` replaced by `_`.
///
/// Returns `None` when nothing usable is left.
pub fn safe_filename(name: &str) -> Option<String> {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_.-]").expect("valid regex"));

    // Client filenames may use either separator.
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(unsafe_chars.replace_all(base, "_").into_owned())
}

/// An uploaded file staged under the input directory.
///
/// The file is deleted when this value is dropped unless [`StagedInput::keep`]
/// was called, so errors and cancelled requests do not leave uploads behind.
#[derive(Debug)]
pub struct StagedInput {
    path: PathBuf,
    request_id: String,
    safe_name: Option<String>,
    keep: bool,
}

impl StagedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Leave the staged file on disk.
    pub fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for StagedInput {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed staged input {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staged input {:?}: {}", self.path, e),
        }
    }
}

/// Result of a processed request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcessResponse {
    /// Always `"success"`.
    pub status: String,
    /// Absolute path of the edited file.
    pub output: String,
    pub audio_status: AudioStatus,
    pub input_had_audio: bool,
    pub output_has_audio: bool,
    /// Path of the edited file relative to the output directory, usable
    /// with `/download/{filename}` and `/info/{filename}`. Bare file name
    /// for absolute outputs elsewhere.
    pub filename: String,
    pub request_id: String,
    pub steps: Vec<StepReport>,
    pub skipped_actions: Vec<String>,
}

/// What `/info` reports about a finished file.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MediaInfo {
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Container duration in seconds.
    pub duration: Option<f64>,
    /// Average bitrate in bits per second, from size and duration.
    pub bitrate: Option<u64>,
    pub has_audio: bool,
    pub audio_codec: Option<String>,
}

/// Turns uploads plus action lists into edited files.
pub struct Orchestrator {
    storage: StorageConfig,
    tools: ToolRegistry,
    executor: PipelineExecutor,
    prober: AudioProber,
}

impl Orchestrator {
    pub fn new(storage: StorageConfig, tools: ToolRegistry) -> Self {
        let executor = PipelineExecutor::new(tools.clone());
        let prober = AudioProber::new(tools.clone());
        Self {
            storage,
            tools,
            executor,
            prober,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Create the input and output directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage.input_dir).await?;
        tokio::fs::create_dir_all(&self.storage.output_dir).await?;
        Ok(())
    }

    /// Reserve a staging path for an upload and open it for writing.
    ///
    /// The staged name is `input_{id}_{safe_name}`, or `input_{id}.mp4`
    /// without a usable client filename.
    pub async fn stage(
        &self,
        request_id: &str,
        filename: Option<&str>,
    ) -> Result<(StagedInput, tokio::fs::File)> {
        tokio::fs::create_dir_all(&self.storage.input_dir).await?;

        let safe_name = filename.and_then(safe_filename);
        let name = match safe_name {
            Some(ref n) => format!("input_{request_id}_{n}"),
            None => format!("input_{request_id}.{DEFAULT_EXTENSION}"),
        };
        let path = self.storage.input_dir.join(name);

        let file = tokio::fs::File::create(&path).await?;
        tracing::debug!("Staging upload at {:?}", path);

        Ok((
            StagedInput {
                path,
                request_id: request_id.to_string(),
                safe_name,
                keep: false,
            },
            file,
        ))
    }

    /// Where the edited file for `staged` goes.
    ///
    /// Relative `output_path` values are resolved inside the output
    /// directory and may not climb out of it. Absolute values are accepted
    /// only when `storage.allow_absolute_output` is set.
    pub fn resolve_output(&self, staged: &StagedInput, output_path: Option<&str>) -> Result<PathBuf> {
        let requested = output_path.map(str::trim).filter(|p| !p.is_empty());

        let Some(requested) = requested else {
            let name = match staged.safe_name {
                Some(ref n) => format!("edited_{}_{}", staged.request_id, n),
                None => format!("edited_{}.{}", staged.request_id, DEFAULT_EXTENSION),
            };
            return Ok(self.storage.output_dir.join(name));
        };

        let path = Path::new(requested);
        if path.file_name().is_none() {
            return Err(Error::BadRequest(format!(
                "output_path must name a file: {requested}"
            )));
        }

        if path.is_absolute() {
            if !self.storage.allow_absolute_output {
                return Err(Error::BadRequest(
                    "absolute output_path values are not allowed".to_string(),
                ));
            }
            return Ok(path.to_path_buf());
        }

        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::BadRequest(format!(
                "output_path must stay inside the output directory: {requested}"
            )));
        }
        // Dot-prefixed names are where pipeline scratch space lives.
        if path.components().any(|c| is_hidden(&c)) {
            return Err(Error::BadRequest(format!(
                "output_path components may not start with '.': {requested}"
            )));
        }

        Ok(self.storage.output_dir.join(path))
    }

    /// Parse `actions`, run them over the staged upload and report.
    ///
    /// The staged input is removed on every error path, and on success
    /// unless `storage.keep_inputs` is set.
    pub async fn process(
        &self,
        staged: StagedInput,
        actions: &str,
        output_path: Option<&str>,
    ) -> Result<ProcessResponse> {
        let list: ActionList = actions.parse()?;
        let output = self.resolve_output(&staged, output_path)?;

        tracing::info!(
            "Request {}: {} action(s) on {:?} -> {:?}",
            staged.request_id,
            list.len(),
            staged.path,
            output
        );

        let report = self.executor.execute(&staged.path, &output, &list).await?;

        let request_id = staged.request_id.clone();
        if self.storage.keep_inputs {
            staged.keep();
        }

        let filename = self.download_name(&report.output);

        Ok(ProcessResponse {
            status: "success".to_string(),
            output: report.output.display().to_string(),
            audio_status: report.audio_status,
            input_had_audio: report.input_had_audio,
            output_has_audio: report.output_has_audio,
            filename,
            request_id,
            steps: report.steps,
            skipped_actions: report.skipped_actions,
        })
    }

    /// `output` relative to the output directory, `/`-separated.
    fn download_name(&self, output: &Path) -> String {
        match output.strip_prefix(&self.storage.output_dir) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }

    /// Locate a finished file in the output directory.
    ///
    /// `filename` is a relative path of plain components. Parent references,
    /// absolute paths, backslashes and dot-prefixed components are rejected.
    pub fn output_file(&self, filename: &str) -> Result<PathBuf> {
        let path = Path::new(filename);
        let plain = !filename.is_empty()
            && !filename.contains('\\')
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)) && !is_hidden(&c));
        if !plain {
            return Err(Error::BadRequest(format!("invalid file name: {filename}")));
        }

        let path = self.storage.output_dir.join(path);
        if !path.is_file() {
            return Err(Error::not_found("file", filename));
        }
        Ok(path)
    }

    /// Size, duration, bitrate and audio of a finished file.
    pub async fn info(&self, filename: &str) -> Result<MediaInfo> {
        let path = self.output_file(filename)?;
        let size = tokio::fs::metadata(&path).await?.len();

        let audio_codec = self.prober.first_audio_codec(&path).await?;
        let duration = self.prober.duration(&path).await;
        let bitrate = duration
            .filter(|d| *d > 0.0)
            .map(|d| (size as f64 * 8.0 / d).round() as u64);

        Ok(MediaInfo {
            filename: filename.to_string(),
            size,
            duration,
            bitrate,
            has_audio: audio_codec.is_some(),
            audio_codec,
        })
    }
}

fn is_hidden(component: &Component<'_>) -> bool {
    matches!(component, Component::Normal(name) if name.to_string_lossy().starts_with('.'))
}
