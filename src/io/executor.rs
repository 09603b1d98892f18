//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples the session loop from the actual agent
//! backend. Success is judged purely by exit status: whatever the agent did
//! to the store or the ledger is discovered afterwards through
//! reconciliation and verification, never trusted from its output. Tests use
//! scripted executors that return predetermined statuses without spawning
//! processes.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::io::config::QaMode;
use crate::io::process::run_with_timeout;
use crate::item::{Complexity, WorkItem};

/// Parameters for one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Working directory for the agent process (the project root).
    pub workdir: PathBuf,
    /// The item to work on, passed through verbatim.
    pub item: WorkItem,
    /// Detected verification command, if the project has one.
    pub verification_command: Option<Vec<String>>,
    /// Classifier tier controlling how strict the agent's own verification
    /// ceremony must be.
    pub tier: Complexity,
    pub qa_mode: QaMode,
    /// Session number, for the agent's own bookkeeping.
    pub session: u32,
    /// Path to write the captured executor output.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Process exited zero.
    Completed,
    /// Process exited non-zero.
    Failed { code: Option<i32> },
    /// Process was killed at the timeout.
    TimedOut,
}

impl ExecStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Abstraction over agent execution backends.
pub trait Executor {
    fn dispatch(&self, request: &DispatchRequest) -> Result<ExecStatus>;
}

/// JSON document fed to the agent process on stdin.
#[derive(Debug, Serialize)]
struct DispatchPayload<'a> {
    session: u32,
    item: &'a WorkItem,
    tier: &'a str,
    qa_mode: QaMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_command: Option<&'a Vec<String>>,
}

/// Executor that spawns the configured agent command.
pub struct ProcessExecutor {
    command: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Executor for ProcessExecutor {
    #[instrument(skip_all, fields(item = %request.item.id, timeout_secs = request.timeout.as_secs()))]
    fn dispatch(&self, request: &DispatchRequest) -> Result<ExecStatus> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("executor command is empty"))?;
        info!(program = %program, workdir = %request.workdir.display(), "dispatching agent");

        let payload = DispatchPayload {
            session: request.session,
            item: &request.item,
            tier: request.tier.as_str(),
            qa_mode: request.qa_mode,
            verification_command: request.verification_command.as_ref(),
        };
        let mut stdin = serde_json::to_string_pretty(&payload).context("serialize dispatch payload")?;
        stdin.push('\n');

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);

        let output = run_with_timeout(
            cmd,
            Some(stdin.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run agent command")?;

        if let Some(parent) = request.log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create executor log dir {}", parent.display()))?;
        }
        fs::write(&request.log_path, output.render_log("executor"))
            .with_context(|| format!("write executor log {}", request.log_path.display()))?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
            return Ok(ExecStatus::TimedOut);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent exited non-zero");
            return Ok(ExecStatus::Failed {
                code: output.status.code(),
            });
        }
        debug!("agent completed");
        Ok(ExecStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::item;

    fn request(root: &std::path::Path) -> DispatchRequest {
        DispatchRequest {
            workdir: root.to_path_buf(),
            item: item("feat-1", 10),
            verification_command: Some(vec!["cargo".to_string(), "test".to_string()]),
            tier: Complexity::Medium,
            qa_mode: QaMode::Full,
            session: 1,
            log_path: root.join("executor.log"),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn dispatch_reports_success_from_exit_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ProcessExecutor::new(vec!["true".to_string()]);
        let status = executor.dispatch(&request(temp.path())).expect("dispatch");
        assert_eq!(status, ExecStatus::Completed);
        assert!(temp.path().join("executor.log").exists());
    }

    #[test]
    fn dispatch_reports_non_zero_exit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ProcessExecutor::new(vec!["false".to_string()]);
        let status = executor.dispatch(&request(temp.path())).expect("dispatch");
        assert_eq!(status, ExecStatus::Failed { code: Some(1) });
    }

    #[test]
    fn dispatch_feeds_item_payload_on_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ProcessExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat > received.json".to_string(),
        ]);
        executor.dispatch(&request(temp.path())).expect("dispatch");

        let received =
            std::fs::read_to_string(temp.path().join("received.json")).expect("payload");
        let value: serde_json::Value = serde_json::from_str(&received).expect("json");
        assert_eq!(value["item"]["id"], "feat-1");
        assert_eq!(value["tier"], "medium");
        assert_eq!(value["verification_command"][0], "cargo");
    }

    #[test]
    fn dispatch_times_out_and_reports_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = ProcessExecutor::new(vec!["sleep".to_string(), "30".to_string()]);
        let mut req = request(temp.path());
        req.timeout = Duration::from_millis(100);
        let status = executor.dispatch(&req).expect("dispatch");
        assert_eq!(status, ExecStatus::TimedOut);
    }
}
