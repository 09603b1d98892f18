//! Independent verification through the project's own test command.
//!
//! Verification never trusts the executor: the loop runs the detected test
//! command itself, bounded by a short timeout, and uses only the exit status.
//! A project with no recognizable test setup passes automatically: there is
//! nothing to verify.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::io::process::run_with_timeout;

/// Project markers and the test command each one implies; first match wins.
pub const PROJECT_MARKERS: &[(&str, &[&str])] = &[
    ("Cargo.toml", &["cargo", "test"]),
    ("package.json", &["npm", "test"]),
    ("go.mod", &["go", "test", "./..."]),
    ("pyproject.toml", &["pytest"]),
    ("requirements.txt", &["pytest"]),
    ("Makefile", &["make", "test"]),
];

/// Detect the verification command for a project root.
pub fn detect_command(root: &Path) -> Option<Vec<String>> {
    PROJECT_MARKERS
        .iter()
        .find(|(marker, _)| root.join(marker).exists())
        .map(|(_, command)| command.iter().map(|s| (*s).to_string()).collect())
}

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub workdir: PathBuf,
    /// Command to run; `None` means nothing to verify (automatic pass).
    pub command: Option<Vec<String>>,
    /// Path to write the captured verification output.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub passed: bool,
    /// Captured output, bounded by the request's byte limit.
    pub output: String,
    /// Bytes dropped beyond the limit.
    pub truncated_bytes: usize,
}

/// Abstraction over verification backends; tests substitute scripted fakes.
pub trait TestRunner {
    fn run(&self, request: &VerifyRequest) -> Result<VerifyOutcome>;
}

/// Runs the detected command as a subprocess.
pub struct CommandTestRunner;

impl TestRunner for CommandTestRunner {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &VerifyRequest) -> Result<VerifyOutcome> {
        let Some(command) = &request.command else {
            debug!("no test command detected, treating as pass");
            return Ok(VerifyOutcome {
                passed: true,
                output: "no test command detected, nothing to verify".to_string(),
                truncated_bytes: 0,
            });
        };
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("verification command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);
        let output = run_with_timeout(cmd, None, request.timeout, request.output_limit_bytes)
            .context("run verification command")?;

        let rendered = output.render_log("verify");
        if let Some(parent) = request.log_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create verify log dir {}", parent.display()))?;
        }
        fs::write(&request.log_path, &rendered)
            .with_context(|| format!("write verify log {}", request.log_path.display()))?;

        let passed = !output.timed_out && output.status.success();
        if !passed {
            warn!(timed_out = output.timed_out, exit_code = ?output.status.code(), "verification failed");
        }
        Ok(VerifyOutcome {
            passed,
            output: rendered,
            truncated_bytes: output.stdout_dropped + output.stderr_dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(root: &Path, command: Option<Vec<String>>) -> VerifyRequest {
        VerifyRequest {
            workdir: root.to_path_buf(),
            command,
            log_path: root.join("verify.log"),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn detect_prefers_cargo_over_later_markers() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("Makefile"), "test:\n").expect("write");
        fs::write(temp.path().join("Cargo.toml"), "[package]\n").expect("write");

        assert_eq!(
            detect_command(temp.path()),
            Some(vec!["cargo".to_string(), "test".to_string()])
        );
    }

    #[test]
    fn detect_returns_none_without_markers() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(detect_command(temp.path()), None);
    }

    #[test]
    fn missing_command_is_an_automatic_pass() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = CommandTestRunner
            .run(&request(temp.path(), None))
            .expect("run");
        assert!(outcome.passed);
        assert!(!temp.path().join("verify.log").exists());
    }

    #[test]
    fn passing_command_reports_pass_and_writes_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = CommandTestRunner
            .run(&request(
                temp.path(),
                Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "echo all green".to_string(),
                ]),
            ))
            .expect("run");
        assert!(outcome.passed);
        assert!(outcome.output.contains("all green"));
        assert!(temp.path().join("verify.log").exists());
    }

    #[test]
    fn failing_command_reports_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = CommandTestRunner
            .run(&request(temp.path(), Some(vec!["false".to_string()])))
            .expect("run");
        assert!(!outcome.passed);
    }

    #[test]
    fn timeout_counts_as_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request(
            temp.path(),
            Some(vec!["sleep".to_string(), "30".to_string()]),
        );
        req.timeout = Duration::from_millis(100);
        let outcome = CommandTestRunner.run(&req).expect("run");
        assert!(!outcome.passed);
        assert!(outcome.output.contains("timed out"));
    }
}
