//! Loop configuration stored in `conductor.toml` at the project root.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Config file name at the project root.
pub const CONFIG_FILE: &str = "conductor.toml";

/// Verification stringency for review-gate dispatches.
///
/// This is an explicit value threaded through the loop and into dispatch,
/// never ambient state: `Full` forces the high tier for review-gate items,
/// `Lite` keeps whatever the classifier decided. Neither mode affects
/// auto-completion; review-gate items are always exempt.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum QaMode {
    #[default]
    Full,
    Lite,
}

/// Loop configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Hard cap on loop iterations per invocation.
    pub max_sessions: u32,

    /// Wall-clock budget for one executor dispatch, in seconds.
    pub session_timeout_secs: u64,

    /// Wall-clock budget for the independent verification run, in seconds.
    pub verify_timeout_secs: u64,

    /// Truncate executor stdout/stderr logs beyond this many bytes.
    pub executor_output_limit_bytes: usize,

    /// Truncate verification output beyond this many bytes.
    pub verify_output_limit_bytes: usize,

    /// Consecutive no-progress iterations before the loop pauses for an
    /// explicit continue/abort decision.
    pub failure_threshold: u32,

    /// Idle delay between iterations, in seconds.
    pub pause_between_sessions_secs: u64,

    /// Withhold `needs_review` items from selection.
    pub skip_review: bool,

    pub qa_mode: QaMode,

    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Agent command to spawn per dispatch; the dispatch payload arrives on
    /// its stdin as JSON.
    pub command: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "claude".to_string(),
                "--permission-mode".to_string(),
                "bypassPermissions".to_string(),
                "--print".to_string(),
            ],
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            session_timeout_secs: 3600,
            verify_timeout_secs: 300,
            executor_output_limit_bytes: 100_000,
            verify_output_limit_bytes: 100_000,
            failure_threshold: 3,
            pause_between_sessions_secs: 3,
            skip_review: false,
            qa_mode: QaMode::Full,
            executor: ExecutorConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(anyhow!("max_sessions must be > 0"));
        }
        if self.session_timeout_secs == 0 {
            return Err(anyhow!("session_timeout_secs must be > 0"));
        }
        if self.verify_timeout_secs == 0 {
            return Err(anyhow!("verify_timeout_secs must be > 0"));
        }
        if self.executor_output_limit_bytes == 0 {
            return Err(anyhow!("executor_output_limit_bytes must be > 0"));
        }
        if self.verify_output_limit_bytes == 0 {
            return Err(anyhow!("verify_output_limit_bytes must be > 0"));
        }
        if self.failure_threshold == 0 {
            return Err(anyhow!("failure_threshold must be > 0"));
        }
        if self.executor.command.is_empty() || self.executor.command[0].trim().is_empty() {
            return Err(anyhow!("executor.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LoopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
