//! Completion evidence lookup in the project's git history.
//!
//! The executor records finished items by committing a fixed marker; the
//! reconciliation pass reads it back. Queries are best-effort and read-only.
//! The only write path is [`Ledger::record_completion`], used when the loop
//! itself completes an item.

use anyhow::{Context, Result};
use regex::Regex;

use crate::io::git::Git;

/// Fixed marker prefix committed when an item completes.
pub const COMPLETION_MARKER: &str = "session: completed";

/// Full marker text for an item id.
pub fn completion_marker(id: &str) -> String {
    format!("{COMPLETION_MARKER} {id}")
}

/// View of the external completion record.
///
/// Queries are read-only. The single write path, [`Ledger::record_completion`],
/// exists because completing an item must leave the same evidence the
/// executor would have left.
pub trait Ledger {
    /// Whether any ledger entry names `id` as completed. Errors are treated
    /// by callers as absence of evidence, never as fatal.
    fn has_completion(&self, id: &str) -> Result<bool>;

    /// Record completion evidence for `id`. Returns false when there was
    /// nothing to record.
    fn record_completion(&self, id: &str) -> Result<bool>;
}

/// Ledger backed by `git log` commit subjects.
pub struct GitLedger {
    git: Git,
}

impl GitLedger {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            git: Git::new(workdir),
        }
    }
}

impl Ledger for GitLedger {
    fn has_completion(&self, id: &str) -> Result<bool> {
        let subjects = self
            .git
            .log_subjects_matching(&completion_marker(id))
            .context("query git log for completion marker")?;
        let pattern = token_pattern(id)?;
        Ok(subjects.iter().any(|subject| pattern.is_match(subject)))
    }

    /// Commits everything pending under the completion marker for `id`.
    fn record_completion(&self, id: &str) -> Result<bool> {
        let message = format!("{} (auto-completed by harness)", completion_marker(id));
        self.git.add_all()?;
        self.git.commit_staged(&message)
    }
}

/// Matcher requiring the id as a whole token: the marker must not continue
/// into further id characters, so `core-1` never claims the marker written
/// for `core-10`.
fn token_pattern(id: &str) -> Result<Regex> {
    let escaped = regex::escape(&completion_marker(id));
    Regex::new(&format!("{escaped}($|[^A-Za-z0-9._-])"))
        .context("compile completion marker pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;

    fn matches(subject: &str, id: &str) -> bool {
        token_pattern(id).expect("pattern").is_match(subject)
    }

    #[test]
    fn marker_matches_exact_id() {
        assert!(matches("session: completed core-1", "core-1"));
        assert!(matches(
            "session: completed core-1 (auto-completed by harness)",
            "core-1"
        ));
    }

    #[test]
    fn marker_does_not_match_id_prefix() {
        assert!(!matches("session: completed core-10", "core-1"));
        assert!(!matches("session: completed core-1b", "core-1"));
        assert!(!matches("session: completed core-1.fix", "core-1"));
    }

    #[test]
    fn marker_requires_the_fixed_prefix() {
        assert!(!matches("completed core-1", "core-1"));
        assert!(!matches("session: started core-1", "core-1"));
    }

    #[test]
    fn git_ledger_finds_recorded_completion() {
        let project = TestProject::new().expect("project");
        let ledger = GitLedger::new(project.root());

        std::fs::write(project.root().join("work.txt"), "done\n").expect("write");
        assert!(ledger.record_completion("feat-9").expect("record"));

        assert!(ledger.has_completion("feat-9").expect("query"));
        assert!(!ledger.has_completion("feat-90").expect("query"));
        assert!(!ledger.has_completion("feat").expect("query"));
    }

    #[test]
    fn git_ledger_errors_outside_a_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = GitLedger::new(temp.path());
        assert!(ledger.has_completion("feat-1").is_err());
    }
}
