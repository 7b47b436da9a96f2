use crate::error::{Failure, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs an external tool to completion and captures its output.
///
/// A non-zero exit is *not* an error at this level; callers inspect
/// `Output::status` themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> Result<Output>;
}

/// Spawns real processes. The child is killed if the call is dropped or the
/// optional timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

pub(crate) fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned())
}

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<Output> {
        let tool = tool_name(program);
        tracing::debug!(tool = %tool, command = %args.join(" "), "running external tool");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match self.timeout {
            Some(after) => match tokio::time::timeout(after, command.output()).await {
                Ok(result) => result,
                Err(_) => return Err(Failure::TimedOut { tool, after }),
            },
            None => command.output().await,
        };

        result.map_err(|e| {
            tracing::error!(tool = %tool, "failed to run external tool: {}", e);
            Failure::process(tool.clone(), None)
        })
    }
}
