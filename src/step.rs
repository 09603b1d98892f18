//! Orchestration for a single session: select, dispatch, verify, reconcile,
//! evaluate progress.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::classifier::classify;
use crate::core::graph::execution_order;
use crate::core::progress::ProgressDelta;
use crate::core::selector::{SelectionOutcome, counts, evaluate};
use crate::io::config::{LoopConfig, QaMode};
use crate::io::executor::{DispatchRequest, ExecStatus, Executor};
use crate::io::ledger::Ledger;
use crate::io::session_log::{SessionMeta, SessionPaths, append_progress, write_session};
use crate::io::store::Store;
use crate::io::test_runner::{TestRunner, VerifyOutcome, VerifyRequest, detect_command};
use crate::item::Complexity;
use crate::reconcile::reconcile;

/// Result of a single session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session: u32,
    pub item_id: String,
    pub tier: Complexity,
    /// Absent when dispatch failed before producing an exit status; such a
    /// session counts as a failed attempt, never as fatal.
    pub exec_status: Option<ExecStatus>,
    pub verify_passed: bool,
    pub delta: ProgressDelta,
    pub progressed: bool,
    pub auto_completed: bool,
}

/// Run one session against the next eligible item.
///
/// The caller is responsible for the top-of-pass reconcile and terminal
/// checks; this function errors if nothing is eligible.
pub fn run_session<E: Executor, T: TestRunner, L: Ledger>(
    root: &Path,
    store: &Store,
    executor: &E,
    test_runner: &T,
    ledger: &L,
    config: &LoopConfig,
    session: u32,
) -> Result<SessionOutcome> {
    let start = Instant::now();

    let list = store.load()?;
    let order = execution_order(&list);
    let item = match evaluate(&list, &order, config.skip_review) {
        SelectionOutcome::Eligible(item) => item.clone(),
        other => return Err(anyhow!("no eligible item to dispatch ({other:?})")),
    };
    let before = counts(&list);

    // Review-gate items under full QA mode always get the strictest
    // verification ceremony; lite mode trusts the classifier.
    let mut tier = classify(&item);
    if config.qa_mode == QaMode::Full && item.is_review_gate() {
        tier = Complexity::High;
    }

    let verification_command = detect_command(root);
    let paths = SessionPaths::new(root, session);
    info!(item = %item.id, tier = tier.as_str(), session, "dispatching item");

    let exec_status = match executor.dispatch(&DispatchRequest {
        workdir: root.to_path_buf(),
        item: item.clone(),
        verification_command: verification_command.clone(),
        tier,
        qa_mode: config.qa_mode,
        session,
        log_path: paths.executor_log_path.clone(),
        timeout: config.session_timeout(),
        output_limit_bytes: config.executor_output_limit_bytes,
    }) {
        Ok(status) => Some(status),
        Err(err) => {
            // An error out of dispatch is recorded like any failed attempt.
            warn!(item = %item.id, err = %err, "dispatch failed");
            write_dispatch_error(&paths, &err)?;
            None
        }
    };

    let verify = match test_runner.run(&VerifyRequest {
        workdir: root.to_path_buf(),
        command: verification_command,
        log_path: paths.verify_log_path.clone(),
        timeout: config.verify_timeout(),
        output_limit_bytes: config.verify_output_limit_bytes,
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(err = %err, "verification run failed");
            VerifyOutcome {
                passed: false,
                output: format!("verification run failed: {err}"),
                truncated_bytes: 0,
            }
        }
    };

    // The executor may have recorded completions it never wrote back.
    reconcile(store, ledger)?;

    let after = counts(&store.load()?);
    let mut delta = ProgressDelta {
        completed_before: before.completed,
        completed_after: after.completed,
        items_added: after.total.saturating_sub(before.total),
    };
    let mut progressed = delta.made_progress();
    let mut auto_completed = false;

    // Stalled session with a clean independent verification: complete the
    // item directly. Review-gate items are exempt; they require an explicit
    // pass signal.
    if !progressed && verify.passed && !item.is_review_gate() {
        let flipped = store.update(|list| {
            list.get_mut(&item.id).is_some_and(|it| {
                if it.passes {
                    false
                } else {
                    it.passes = true;
                    true
                }
            })
        })?;
        if flipped {
            info!(item = %item.id, "verification passed, auto-completing");
            if let Err(err) = ledger.record_completion(&item.id) {
                // The store already carries the pass; the ledger catches up
                // on a future completion commit.
                warn!(item = %item.id, err = %err, "could not record completion");
            }
            delta.completed_after += 1;
            progressed = true;
            auto_completed = true;
        }
    }

    let outcome = SessionOutcome {
        session,
        item_id: item.id.clone(),
        tier,
        exec_status,
        verify_passed: verify.passed,
        delta,
        progressed,
        auto_completed,
    };

    let meta = SessionMeta {
        session,
        item_id: outcome.item_id.clone(),
        tier: tier.as_str().to_string(),
        exec_status,
        verify_passed: Some(verify.passed),
        completed_before: delta.completed_before,
        completed_after: delta.completed_after,
        items_added: delta.items_added,
        progressed,
        auto_completed,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    write_session(root, &meta)?;
    append_progress(root, &meta)?;

    Ok(outcome)
}

fn write_dispatch_error(paths: &SessionPaths, err: &anyhow::Error) -> Result<()> {
    std::fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create session dir {}", paths.dir.display()))?;
    let path = paths.dir.join("dispatch_error.log");
    std::fs::write(&path, format!("dispatch error: {err:#}\n"))
        .with_context(|| format!("write {}", path.display()))
}
