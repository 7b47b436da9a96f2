//! Failure taxonomy shared by every layer of the pipeline.
//!
//! Lower components only ever return a [`Failure`]; turning one into a
//! persisted `FAILED` status is the job of the pipeline coordinator.

use crate::domain::video::ProcessingStatus;
use std::fmt;
use std::time::Duration;

pub type Result<T, E = Failure> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The external tool ran but exited unsuccessfully. `exit_code` is `None`
    /// when it was killed by a signal or never started.
    #[error("{tool} failed with exit code {}", display_code(.exit_code))]
    ExternalProcess {
        tool: String,
        exit_code: Option<i32>,
    },

    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    /// The prober exited cleanly but its output is not a usable duration.
    #[error("could not parse a duration from prober output {output:?}")]
    DurationParse { output: String },

    #[error("storage error: {cause}")]
    Storage { cause: String },

    #[error("repository error: {cause}")]
    Repository { cause: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("video {id} is not ready (status {status})")]
    NotReady { id: String, status: ProcessingStatus },

    #[error("video {id} is already being processed")]
    Busy { id: String },

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    /// A requested byte range of a stored original cannot be served.
    #[error("range {start}-{end} not satisfiable for {size} bytes")]
    Range { start: u64, end: u64, size: u64 },

    /// At least one file of a publish fan-out could not be uploaded.
    #[error("publish failed for {failed} of {total} files")]
    Publish { failed: usize, total: usize },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl Failure {
    pub fn storage(cause: impl fmt::Display) -> Self {
        Failure::Storage {
            cause: cause.to_string(),
        }
    }

    pub fn repository(cause: impl fmt::Display) -> Self {
        Failure::Repository {
            cause: cause.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Failure::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn process(tool: impl Into<String>, exit_code: Option<i32>) -> Self {
        Failure::ExternalProcess {
            tool: tool.into(),
            exit_code,
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::storage(err)
    }
}
