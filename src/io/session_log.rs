//! Session artifact logging under `.conductor/`.
//!
//! These files are product output, written for every session regardless of
//! `RUST_LOG`: a per-session directory with structured metadata plus the
//! captured executor/verification output, and an append-only one-line-per-
//! session progress log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::io::executor::ExecStatus;

/// State directory name at the project root.
pub const STATE_DIR: &str = ".conductor";

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

/// Canonical paths for one session's artifacts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub executor_log_path: PathBuf,
    pub verify_log_path: PathBuf,
}

impl SessionPaths {
    pub fn new(root: &Path, session: u32) -> Self {
        let dir = state_dir(root).join("sessions").join(session.to_string());
        Self {
            meta_path: dir.join("meta.json"),
            executor_log_path: dir.join("executor.log"),
            verify_log_path: dir.join("verify.log"),
            dir,
        }
    }
}

/// Structured record of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub session: u32,
    pub item_id: String,
    pub tier: String,
    /// Absent when dispatch failed before producing a status.
    pub exec_status: Option<ExecStatus>,
    /// Absent when verification did not run.
    pub verify_passed: Option<bool>,
    pub completed_before: usize,
    pub completed_after: usize,
    pub items_added: usize,
    pub progressed: bool,
    pub auto_completed: bool,
    pub duration_ms: u64,
}

/// Write the session's metadata file, creating the directory.
pub fn write_session(root: &Path, meta: &SessionMeta) -> Result<SessionPaths> {
    let paths = SessionPaths::new(root, meta.session);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create session dir {}", paths.dir.display()))?;

    let mut buf = serde_json::to_string_pretty(meta)?;
    buf.push('\n');
    fs::write(&paths.meta_path, buf)
        .with_context(|| format!("write {}", paths.meta_path.display()))?;
    Ok(paths)
}

/// Append a one-line summary to `.conductor/progress.log`.
pub fn append_progress(root: &Path, meta: &SessionMeta) -> Result<()> {
    let dir = state_dir(root);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join("progress.log");

    let status = meta
        .exec_status
        .map_or("error", ExecStatus::as_str);
    let verify = match meta.verify_passed {
        Some(true) => "pass",
        Some(false) => "fail",
        None => "skipped",
    };
    let line = format!(
        "session={} item={} tier={} exec={} verify={} progressed={} completed={} added={}\n",
        meta.session,
        meta.item_id,
        meta.tier,
        status,
        verify,
        meta.progressed,
        meta.completed_after,
        meta.items_added,
    );

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(session: u32) -> SessionMeta {
        SessionMeta {
            session,
            item_id: "feat-1".to_string(),
            tier: "medium".to_string(),
            exec_status: Some(ExecStatus::Completed),
            verify_passed: Some(true),
            completed_before: 1,
            completed_after: 2,
            items_added: 0,
            progressed: true,
            auto_completed: false,
            duration_ms: 12,
        }
    }

    #[test]
    fn session_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = SessionPaths::new(temp.path(), 3);
        assert!(paths.dir.ends_with(Path::new(".conductor/sessions/3")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.executor_log_path.ends_with("executor.log"));
        assert!(paths.verify_log_path.ends_with("verify.log"));
    }

    #[test]
    fn write_session_creates_meta_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = write_session(temp.path(), &meta(1)).expect("write");
        let contents = fs::read_to_string(&paths.meta_path).expect("read");
        assert!(contents.contains("\"item_id\": \"feat-1\""));
        assert!(contents.contains("\"exec_status\": \"completed\""));
    }

    #[test]
    fn append_progress_accumulates_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        append_progress(temp.path(), &meta(1)).expect("append");
        append_progress(temp.path(), &meta(2)).expect("append");

        let log = fs::read_to_string(state_dir(temp.path()).join("progress.log")).expect("read");
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().next().expect("line").contains("session=1"));
    }
}
