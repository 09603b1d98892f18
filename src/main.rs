//! Session-loop runner for an agent-driven work backlog.
//!
//! Maintains `work_list.json`, validates its dependency graph, and drives an
//! external coding agent through the backlog one item per session, repairing
//! its bookkeeping against the git completion ledger between sessions.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use conductor::core::graph::execution_order;
use conductor::core::selector::{SelectionOutcome, counts, evaluate};
use conductor::core::validate::validate;
use conductor::exit_codes;
use conductor::io::config::{CONFIG_FILE, LoopConfig, QaMode, load_config};
use conductor::io::executor::ProcessExecutor;
use conductor::io::ledger::GitLedger;
use conductor::io::store::Store;
use conductor::io::test_runner::CommandTestRunner;
use conductor::logging;
use conductor::looping::{ConsoleEscalation, LoopStop, run_loop};

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Deterministic session-loop runner for an agent-driven work backlog"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check work_list.json against schema and invariants; exit non-zero if invalid.
    Validate,
    /// Print the id of the next eligible item.
    Select {
        /// Skip items withheld for review.
        #[arg(long)]
        skip_review: bool,
    },
    /// Print completion counts.
    Status,
    /// List blocked items with their reasons.
    Blocked,
    /// Clear the blocked flag on an item.
    Unblock { id: String },
    /// Run sessions until the backlog completes or a terminal condition stops the loop.
    Run {
        /// Override the configured session budget.
        #[arg(long)]
        max_sessions: Option<u32>,
        /// Skip items withheld for review.
        #[arg(long)]
        skip_review: bool,
        /// Verification stringency for review-gate items.
        #[arg(long, value_enum)]
        qa_mode: Option<QaMode>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    match cli.command {
        Command::Validate => cmd_validate(&root),
        Command::Select { skip_review } => cmd_select(&root, skip_review),
        Command::Status => cmd_status(&root),
        Command::Blocked => cmd_blocked(&root),
        Command::Unblock { id } => cmd_unblock(&root, &id),
        Command::Run {
            max_sessions,
            skip_review,
            qa_mode,
        } => cmd_run(&root, max_sessions, skip_review, qa_mode),
    }
}

fn cmd_validate(root: &Path) -> Result<i32> {
    let list = match Store::for_root(root).load() {
        Ok(list) => list,
        Err(err) => {
            eprintln!("{err}");
            return Ok(exit_codes::INVALID);
        }
    };

    let report = validate(&list);
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if !report.is_valid() {
        for error in &report.errors {
            eprintln!("error: {error}");
        }
        return Ok(exit_codes::INVALID);
    }
    println!("work list is valid ({} items)", list.items.len());
    Ok(exit_codes::OK)
}

fn cmd_select(root: &Path, skip_review: bool) -> Result<i32> {
    let list = Store::for_root(root).load()?;
    let order = execution_order(&list);
    match evaluate(&list, &order, skip_review) {
        SelectionOutcome::Eligible(item) => {
            println!("{}", item.id);
            Ok(exit_codes::OK)
        }
        SelectionOutcome::Complete => {
            eprintln!("all items complete");
            Ok(exit_codes::COMPLETE)
        }
        SelectionOutcome::AllBlocked { blocked } => {
            eprintln!("all {blocked} remaining item(s) are blocked");
            Ok(exit_codes::ALL_BLOCKED)
        }
        SelectionOutcome::AwaitingReview { pending } => {
            eprintln!("{pending} item(s) awaiting review");
            Ok(exit_codes::AWAITING_REVIEW)
        }
    }
}

fn cmd_status(root: &Path) -> Result<i32> {
    let list = Store::for_root(root).load()?;
    let counts = counts(&list);
    println!(
        "completed {}/{} (remaining {}, blocked {})",
        counts.completed, counts.total, counts.remaining, counts.blocked
    );
    Ok(exit_codes::OK)
}

fn cmd_blocked(root: &Path) -> Result<i32> {
    let list = Store::for_root(root).load()?;
    let blocked: Vec<_> = list
        .items
        .iter()
        .filter(|item| item.effectively_blocked())
        .collect();
    if blocked.is_empty() {
        println!("no blocked items");
        return Ok(exit_codes::OK);
    }
    for item in blocked {
        let reason = item.blocked_reason.as_deref().unwrap_or("no reason recorded");
        println!("{}: {}", item.id, reason);
        if let Some(blocked_by) = &item.blocked_by {
            println!("  blocked by: {blocked_by}");
        }
        if let Some(fix) = &item.suggested_fix {
            println!("  suggested fix: {fix}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_unblock(root: &Path, id: &str) -> Result<i32> {
    let store = Store::for_root(root);
    let cleared = store.update(|list| {
        list.get_mut(id).is_some_and(|item| {
            item.blocked = false;
            item.blocked_reason = None;
            item.blocked_by = None;
            item.suggested_fix = None;
            item.blocked_at = None;
            true
        })
    })?;
    if !cleared {
        eprintln!("no item with id '{id}'");
        return Ok(exit_codes::INVALID);
    }
    println!("unblocked {id}");
    Ok(exit_codes::OK)
}

fn cmd_run(
    root: &Path,
    max_sessions: Option<u32>,
    skip_review: bool,
    qa_mode: Option<QaMode>,
) -> Result<i32> {
    let mut config: LoopConfig = load_config(&root.join(CONFIG_FILE))?;
    if let Some(max) = max_sessions {
        config.max_sessions = max;
    }
    if skip_review {
        config.skip_review = true;
    }
    if let Some(mode) = qa_mode {
        config.qa_mode = mode;
    }

    let store = Store::for_root(root);
    let executor = ProcessExecutor::new(config.executor.command.clone());
    let ledger = GitLedger::new(root);

    let outcome = run_loop(
        root,
        &store,
        &executor,
        &CommandTestRunner,
        &ledger,
        &ConsoleEscalation,
        &config,
        |session| {
            let exec = session
                .exec_status
                .map_or("error", |status| status.as_str());
            println!(
                "session {}: {} [{}] exec={} verify={} progressed={}{}",
                session.session,
                session.item_id,
                session.tier.as_str(),
                exec,
                if session.verify_passed { "pass" } else { "fail" },
                session.progressed,
                if session.auto_completed {
                    " (auto-completed)"
                } else {
                    ""
                },
            );
        },
    )?;

    let counts = counts(&store.load()?);
    println!(
        "sessions run: {}; completed {}/{} (blocked {})",
        outcome.sessions_run, counts.completed, counts.total, counts.blocked
    );

    let code = match outcome.stop {
        LoopStop::Complete => {
            println!("all items complete");
            exit_codes::OK
        }
        LoopStop::AllBlocked { blocked } => {
            eprintln!("all {blocked} remaining item(s) are blocked; manual intervention required");
            exit_codes::ALL_BLOCKED
        }
        LoopStop::AwaitingReview { pending } => {
            eprintln!("{pending} item(s) awaiting review");
            exit_codes::AWAITING_REVIEW
        }
        LoopStop::SessionsExhausted { max_sessions } => {
            eprintln!("stopped after reaching the {max_sessions}-session budget");
            exit_codes::SESSIONS_EXHAUSTED
        }
        LoopStop::Aborted { stalls } => {
            eprintln!("aborted after {stalls} session(s) without progress");
            exit_codes::ABORTED
        }
    };
    Ok(code)
}
