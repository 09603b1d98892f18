//! Bounded multi-session loop with terminal conditions and escalation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::core::graph::execution_order;
use crate::core::progress::StallCounter;
use crate::core::selector::{SelectionOutcome, evaluate, pending_review};
use crate::core::validate::validate;
use crate::io::config::LoopConfig;
use crate::io::executor::Executor;
use crate::io::ledger::Ledger;
use crate::io::store::Store;
use crate::io::test_runner::TestRunner;
use crate::reconcile::reconcile;
use crate::step::{SessionOutcome, run_session};

/// Reason why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every item has passed.
    Complete,
    /// Every unfinished item is blocked; external intervention required.
    AllBlocked { blocked: usize },
    /// Unfinished, unblocked items exist but none is selectable; they are
    /// awaiting review.
    AwaitingReview { pending: usize },
    /// The session counter exceeded the configured maximum.
    SessionsExhausted { max_sessions: u32 },
    /// The escalation decision was to abort after repeated stalls.
    Aborted { stalls: u32 },
}

/// Summary of one loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub sessions_run: u32,
    pub stop: LoopStop,
}

/// Decision requested after repeated no-progress sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationDecision {
    /// Keep going; the stall counter resets.
    Continue,
    /// Stop the loop.
    Abort,
}

/// External decision point consulted when the stall threshold is reached.
///
/// Production prompts a human; tests script the answers.
pub trait EscalationHandler {
    fn on_stall(&self, stalls: u32) -> Result<EscalationDecision>;
}

/// Asks on the terminal: abort unless the answer starts with `y`.
pub struct ConsoleEscalation;

impl EscalationHandler for ConsoleEscalation {
    fn on_stall(&self, stalls: u32) -> Result<EscalationDecision> {
        eprintln!("{stalls} consecutive sessions without progress.");
        eprint!("Continue anyway? [y/N]: ");
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("read escalation decision")?;
        if answer.trim().to_lowercase().starts_with('y') {
            Ok(EscalationDecision::Continue)
        } else {
            Ok(EscalationDecision::Abort)
        }
    }
}

/// Run sessions until a terminal condition is reached.
///
/// Fatal validation refuses to start; warnings are logged and allowed.
/// Reconciliation runs unconditionally at the top of every pass, so drift
/// left by a previous interrupt heals before any terminal decision is made.
pub fn run_loop<E, T, L, H, F>(
    root: &Path,
    store: &Store,
    executor: &E,
    test_runner: &T,
    ledger: &L,
    escalation: &H,
    config: &LoopConfig,
    mut on_session: F,
) -> Result<LoopOutcome>
where
    E: Executor,
    T: TestRunner,
    L: Ledger,
    H: EscalationHandler,
    F: FnMut(&SessionOutcome),
{
    config.validate()?;
    let list = store.load().context("load work list")?;
    let report = validate(&list);
    for warning in &report.warnings {
        warn!(%warning, "validation warning");
    }
    if !report.is_valid() {
        let messages: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        bail!("work list is invalid:\n- {}", messages.join("\n- "));
    }

    let mut counter = StallCounter::new(config.failure_threshold);
    let mut sessions_run = 0u32;
    let mut session = 1u32;

    loop {
        reconcile(store, ledger)?;

        let list = store.load()?;
        let order = execution_order(&list);
        match evaluate(&list, &order, config.skip_review) {
            SelectionOutcome::Complete => {
                info!(sessions_run, "all items complete");
                return Ok(LoopOutcome {
                    sessions_run,
                    stop: LoopStop::Complete,
                });
            }
            SelectionOutcome::AllBlocked { blocked } => {
                warn!(blocked, "all remaining items are blocked");
                return Ok(LoopOutcome {
                    sessions_run,
                    stop: LoopStop::AllBlocked { blocked },
                });
            }
            SelectionOutcome::AwaitingReview { .. } => {
                let pending = pending_review(&list).len();
                info!(pending, "remaining items await review");
                return Ok(LoopOutcome {
                    sessions_run,
                    stop: LoopStop::AwaitingReview { pending },
                });
            }
            SelectionOutcome::Eligible(_) => {}
        }

        if session > config.max_sessions {
            warn!(max_sessions = config.max_sessions, "session budget exhausted");
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::SessionsExhausted {
                    max_sessions: config.max_sessions,
                },
            });
        }

        let outcome = run_session(root, store, executor, test_runner, ledger, config, session)?;
        sessions_run += 1;
        on_session(&outcome);

        if counter.record(outcome.progressed) {
            let stalls = counter.consecutive();
            match escalation.on_stall(stalls)? {
                EscalationDecision::Continue => counter.reset(),
                EscalationDecision::Abort => {
                    return Ok(LoopOutcome {
                        sessions_run,
                        stop: LoopStop::Aborted { stalls },
                    });
                }
            }
        }

        session += 1;
        if config.pause_between_sessions_secs > 0 {
            std::thread::sleep(Duration::from_secs(config.pause_between_sessions_secs));
        }
    }
}
