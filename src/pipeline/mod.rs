pub mod action;
pub mod executor;

pub use action::{Action, ActionList};
pub use executor::{
    AudioStatus, PipelineExecutor, PipelineReport, PipelineState, ProgressCallback, StepReport,
};
