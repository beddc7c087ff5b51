//! Sequential execution of an action list.
//!
//! Each recognised action becomes one ffmpeg invocation. Audio presence is
//! tracked across steps so the final report can say whether it survived.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use utoipa::ToSchema;
use vidforge_av::{actions, AudioProber, ToolRegistry, Workspace};

use super::action::{Action, ActionList};
use crate::error::{Error, Result};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&PipelineState) + Send + Sync>;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running {
        index: usize,
        total: usize,
        action: String,
    },
    Completed,
    Failed {
        message: String,
    },
}

/// Audio of the final artifact relative to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AudioStatus {
    /// Input and output both have audio.
    Preserved,
    /// Input had audio, output does not.
    Lost,
    /// Input had no audio.
    None,
}

impl AudioStatus {
    pub fn derive(input_had_audio: bool, output_has_audio: bool) -> Self {
        match (input_had_audio, output_has_audio) {
            (false, _) => AudioStatus::None,
            (true, true) => AudioStatus::Preserved,
            (true, false) => AudioStatus::Lost,
        }
    }
}

/// What happened at one step.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepReport {
    /// Position of the action in the submitted list.
    pub index: usize,
    pub action: String,
    /// Audio presence after this step; absent when the input had no audio.
    pub audio_present: Option<bool>,
    pub elapsed_ms: u64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PipelineReport {
    #[schema(value_type = String)]
    pub output: PathBuf,
    pub input_had_audio: bool,
    pub output_has_audio: bool,
    pub audio_status: AudioStatus,
    pub steps: Vec<StepReport>,
    pub skipped_actions: Vec<String>,
}

/// Runs an action list over ffmpeg, one step at a time.
///
/// Intermediates live in a [`Workspace`] next to the output and are gone
/// when `execute` returns, whichever way it returns. If the run fails or is
/// cancelled while the last step is writing, the partial output is removed.
pub struct PipelineExecutor {
    tools: ToolRegistry,
    prober: AudioProber,
    progress_callback: Option<ProgressCallback>,
}

impl PipelineExecutor {
    pub fn new(tools: ToolRegistry) -> Self {
        let prober = AudioProber::new(tools.clone());
        Self {
            tools,
            prober,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn transition(&self, state: PipelineState) {
        match &state {
            PipelineState::Pending => tracing::debug!("Pipeline pending"),
            PipelineState::Running {
                index,
                total,
                action,
            } => tracing::info!("[{}/{}] {}", index + 1, total, action),
            PipelineState::Completed => tracing::info!("Pipeline completed"),
            PipelineState::Failed { message } => tracing::error!("Pipeline failed: {}", message),
        }
        if let Some(ref cb) = self.progress_callback {
            cb(&state);
        }
    }

    fn fail(&self, err: Error) -> Error {
        self.transition(PipelineState::Failed {
            message: err.to_string(),
        });
        err
    }

    /// Apply `list` to `input`, leaving the result at `output`.
    pub async fn execute(
        &self,
        input: &Path,
        output: &Path,
        list: &ActionList,
    ) -> Result<PipelineReport> {
        self.transition(PipelineState::Pending);

        if !input.is_file() {
            return Err(self.fail(Error::not_found("input file", input.display())));
        }
        if same_file(input, output) {
            return Err(self.fail(Error::SameInputOutput {
                path: input.to_path_buf(),
            }));
        }

        let skipped_actions = list.skipped();
        for kind in &skipped_actions {
            tracing::warn!("Skipping unknown action '{}'", kind);
        }
        let effective: Vec<(usize, &Action)> = list
            .actions
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_unknown())
            .collect();

        let input_had_audio = self.prober.has_audio(input).await;
        tracing::info!(
            "Input {:?} audio: {}",
            input,
            if input_had_audio { "present" } else { "absent" }
        );

        let result = if effective.is_empty() {
            self.pass_through(input, output).await.map(|()| Vec::new())
        } else {
            self.run_steps(input, output, &effective, input_had_audio)
                .await
        };

        let steps = result.map_err(|e| self.fail(e))?;

        let output_has_audio = self.prober.has_audio(output).await;
        let audio_status = AudioStatus::derive(input_had_audio, output_has_audio);
        if audio_status == AudioStatus::Lost {
            tracing::warn!("Audio was lost while processing {:?}", input);
        }

        self.transition(PipelineState::Completed);

        Ok(PipelineReport {
            output: output.to_path_buf(),
            input_had_audio,
            output_has_audio,
            audio_status,
            steps,
            skipped_actions,
        })
    }

    async fn pass_through(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::info!("No actions to apply, copying {:?} to {:?}", input, output);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn run_steps(
        &self,
        input: &Path,
        output: &Path,
        effective: &[(usize, &Action)],
        input_had_audio: bool,
    ) -> Result<Vec<StepReport>> {
        let workspace = Workspace::new(input, output)?;
        let mut guard = PartialOutput::new(output);

        let total = effective.len();
        let mut current = input.to_path_buf();
        let mut current_has_audio = input_had_audio;
        let mut steps = Vec::with_capacity(total);

        for (n, (index, action)) in effective.iter().enumerate() {
            let is_last = n + 1 == total;
            let destination = workspace.destination(*index, is_last);

            self.transition(PipelineState::Running {
                index: n,
                total,
                action: action.to_string(),
            });
            if is_last {
                guard.arm();
            }

            let started = Instant::now();
            current = self
                .dispatch(action, &current, &destination, current_has_audio)
                .await
                .map_err(|e| Error::step(*index, action.kind(), e))?;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let audio_present = if input_had_audio {
                let present = self.prober.has_audio(&current).await;
                if present {
                    tracing::info!("Audio present after {}", action.kind());
                } else {
                    tracing::warn!("Audio missing after {}", action.kind());
                }
                current_has_audio = present;
                Some(present)
            } else {
                None
            };

            steps.push(StepReport {
                index: *index,
                action: action.kind().to_string(),
                audio_present,
                elapsed_ms,
            });
        }

        guard.disarm();
        workspace.cleanup();
        Ok(steps)
    }

    async fn dispatch(
        &self,
        action: &Action,
        input: &Path,
        output: &Path,
        has_audio: bool,
    ) -> vidforge_av::Result<PathBuf> {
        let tools = &self.tools;
        match action {
            Action::Trim { seconds } => actions::trim(tools, input, output, *seconds).await,
            Action::Eq(adjustment) => actions::adjust_eq(tools, input, output, *adjustment).await,
            Action::Hue { degrees } => actions::hue(tools, input, output, *degrees).await,
            Action::Blur { value } => actions::blur(tools, input, output, *value).await,
            Action::Sharpen { value } => actions::sharpen(tools, input, output, *value).await,
            Action::Speed { factor } => {
                actions::speed(tools, input, output, *factor, has_audio).await
            }
            Action::Rotate { degrees } => actions::rotate(tools, input, output, *degrees).await,
            Action::Flip { direction } => actions::flip(tools, input, output, *direction).await,
            Action::Crop(rect) => actions::crop(tools, input, output, *rect).await,
            Action::Scale { width, height } => {
                actions::scale(tools, input, output, *width, *height).await
            }
            Action::Volume { db } => actions::volume(tools, input, output, *db).await,
            Action::CutSection { start, end } => {
                actions::cut_section(tools, input, output, *start, *end).await
            }
            Action::Unknown { kind } => Err(vidforge_av::Error::InvalidInput(format!(
                "unknown action '{kind}'"
            ))),
        }
    }
}

/// Removes the final output on drop while armed, so a failed or cancelled
/// last step leaves nothing behind.
struct PartialOutput {
    path: PathBuf,
    armed: bool,
}

impl PartialOutput {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed partial output {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", self.path, e),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
