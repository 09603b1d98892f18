//! Loop-level tests for full session-loop lifecycle scenarios.
//!
//! These drive `run_loop` through multiple sessions to verify end-to-end
//! behavior: ordering, reconciliation against a real git ledger, remediation
//! discovery, escalation, and terminal conditions.

use std::fs;

use anyhow::Result;

use conductor::io::executor::{DispatchRequest, ExecStatus, Executor};
use conductor::io::config::LoopConfig;
use conductor::io::ledger::GitLedger;
use conductor::io::store::Store;
use conductor::looping::{LoopStop, run_loop};
use conductor::test_support::{
    ScriptedEscalation, ScriptedExecutor, ScriptedLedger, ScriptedTestRunner, TestProject, item,
    item_with_deps, list_of, qa_item,
};

fn quick_config() -> LoopConfig {
    LoopConfig {
        pause_between_sessions_secs: 0,
        ..LoopConfig::default()
    }
}

/// Dependency precedence beats priority across the whole run: `b` carries the
/// lowest priority number but depends on `a`, so the loop dispatches `a`
/// first and completes both through auto-completion.
#[test]
fn loop_dispatches_in_dependency_order_and_completes() {
    let project = TestProject::new().expect("project");
    let store = project.seed(list_of(vec![
        item("a", 10),
        item_with_deps("b", 1, &["a"]),
        item("c", 5),
    ]));

    let executor = ScriptedExecutor::always(ExecStatus::Completed);
    let outcome = run_loop(
        project.root(),
        &store,
        &executor,
        &ScriptedTestRunner::always(true),
        &ScriptedLedger::empty(),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect("loop");

    assert_eq!(outcome.stop, LoopStop::Complete);
    assert_eq!(
        executor.dispatched(),
        vec!["c".to_string(), "a".to_string(), "b".to_string()]
    );

    let list = store.load().expect("load");
    assert!(list.items.iter().all(|item| item.passes));
}

/// Drift repair against the real git ledger: markers committed by a "crashed"
/// agent flip the store on the next run, and the match is exact-token (the
/// marker for `core-10` must not complete `core-1`).
#[test]
fn git_ledger_markers_repair_store_with_exact_token_match() {
    let project = TestProject::new().expect("project");
    let store = project.seed(list_of(vec![item("core-1", 1), item("core-10", 2)]));

    project.commit_completion("core-10").expect("commit marker");

    let executor = ScriptedExecutor::always(ExecStatus::Failed { code: Some(1) });
    let outcome = run_loop(
        project.root(),
        &store,
        &executor,
        &ScriptedTestRunner::always(false),
        &GitLedger::new(project.root()),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect("loop");

    // core-10 healed from the ledger; core-1 kept stalling until escalation.
    assert_eq!(outcome.stop, LoopStop::Aborted { stalls: 3 });
    let list = store.load().expect("load");
    assert!(list.get("core-10").expect("core-10").passes);
    assert!(!list.get("core-1").expect("core-1").passes);
    assert_eq!(executor.dispatched(), vec!["core-1"; 3]);
}

/// Review-gate items stall without explicit evidence, then complete once the
/// ledger carries their marker.
#[test]
fn review_gate_item_waits_for_explicit_completion() {
    let project = TestProject::new().expect("project");
    let store = project.seed(list_of(vec![qa_item("qa-checkout-001")]));

    // Green tests are not enough for a review-gate item.
    let outcome = run_loop(
        project.root(),
        &store,
        &ScriptedExecutor::always(ExecStatus::Completed),
        &ScriptedTestRunner::always(true),
        &GitLedger::new(project.root()),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect("loop");
    assert_eq!(outcome.stop, LoopStop::Aborted { stalls: 3 });
    assert!(!store.load().expect("load").items[0].passes);

    // An explicit completion in the ledger finishes the backlog untouched.
    project
        .commit_completion("qa-checkout-001")
        .expect("commit marker");
    let outcome = run_loop(
        project.root(),
        &store,
        &ScriptedExecutor::always(ExecStatus::Completed),
        &ScriptedTestRunner::always(true),
        &GitLedger::new(project.root()),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect("loop");
    assert_eq!(outcome.stop, LoopStop::Complete);
    assert_eq!(outcome.sessions_run, 0);
}

/// Executor that appends a remediation item to the store on its first
/// dispatch, as a verification session discovering new work would.
struct DiscoveringExecutor {
    inner: ScriptedExecutor,
}

impl Executor for DiscoveringExecutor {
    fn dispatch(&self, request: &DispatchRequest) -> Result<ExecStatus> {
        let store = Store::for_root(&request.workdir);
        let first = self.inner.dispatched().is_empty();
        if first {
            store.update(|list| {
                let mut fix = item("fix-layout-001", 50);
                fix.qa_origin = Some(request.item.id.clone());
                list.items.push(fix);
            })?;
        }
        self.inner.dispatch(request)
    }
}

/// Newly appended remediation items count as progress and reset the stall
/// counter even when nothing completed.
#[test]
fn discovered_items_count_as_progress() {
    let project = TestProject::new().expect("project");
    let store = project.seed(list_of(vec![item("feat-1", 10)]));

    let executor = DiscoveringExecutor {
        inner: ScriptedExecutor::always(ExecStatus::Completed),
    };
    let escalation = ScriptedEscalation::always_abort();
    let outcome = run_loop(
        project.root(),
        &store,
        &executor,
        &ScriptedTestRunner::always(false),
        &ScriptedLedger::empty(),
        &escalation,
        &quick_config(),
        |_| {},
    )
    .expect("loop");

    // Session 1 discovers work (progress); sessions 2-4 stall to escalation.
    assert_eq!(outcome.stop, LoopStop::Aborted { stalls: 3 });
    assert_eq!(outcome.sessions_run, 4);
    assert_eq!(escalation.calls(), 1);
    assert!(store.load().expect("load").contains("fix-layout-001"));
}

/// Session artifacts accumulate under `.conductor/` for every session.
#[test]
fn sessions_leave_artifacts_and_progress_log() {
    let project = TestProject::new().expect("project");
    let store = project.seed(list_of(vec![item("a", 1), item_with_deps("b", 2, &["a"])]));

    run_loop(
        project.root(),
        &store,
        &ScriptedExecutor::always(ExecStatus::Completed),
        &ScriptedTestRunner::always(true),
        &ScriptedLedger::empty(),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect("loop");

    for session in ["1", "2"] {
        let meta = project
            .root()
            .join(".conductor/sessions")
            .join(session)
            .join("meta.json");
        assert!(meta.exists(), "missing meta for session {session}");
    }
    let progress =
        fs::read_to_string(project.root().join(".conductor/progress.log")).expect("progress log");
    assert_eq!(progress.lines().count(), 2);
    assert!(progress.contains("item=a"));
    assert!(progress.contains("item=b"));
}

/// A corrupt store is fatal for the run and leaves the file untouched.
#[test]
fn corrupt_store_refuses_to_run_and_preserves_the_file() {
    let project = TestProject::new().expect("project");
    let path = project.root().join("work_list.json");
    fs::write(&path, "{ definitely not json").expect("write");

    let store = Store::for_root(project.root());
    let err = run_loop(
        project.root(),
        &store,
        &ScriptedExecutor::always(ExecStatus::Completed),
        &ScriptedTestRunner::always(true),
        &ScriptedLedger::empty(),
        &ScriptedEscalation::always_abort(),
        &quick_config(),
        |_| {},
    )
    .expect_err("corrupt store");
    assert!(err.to_string().contains("load work list"));

    let on_disk = fs::read_to_string(&path).expect("read");
    assert_eq!(on_disk, "{ definitely not json");
}
