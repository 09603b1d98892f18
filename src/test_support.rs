//! Test-only helpers: deterministic items, scripted collaborators, and a
//! project fixture with a real git repository.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};

use crate::io::executor::{DispatchRequest, ExecStatus, Executor};
use crate::io::ledger::Ledger;
use crate::io::store::Store;
use crate::io::test_runner::{TestRunner, VerifyOutcome, VerifyRequest};
use crate::item::{Priority, WorkItem, WorkList};
use crate::looping::{EscalationDecision, EscalationHandler};

/// Create a deterministic item with default fields.
pub fn item(id: &str, priority: i64) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        name: format!("{id} name"),
        description: format!("work on {id}"),
        category: "core".to_string(),
        priority: Some(Priority::Number(priority)),
        dependencies: Vec::new(),
        passes: false,
        blocked: false,
        blocked_reason: None,
        blocked_by: None,
        suggested_fix: None,
        blocked_at: None,
        needs_review: false,
        complexity: None,
        tests: Vec::new(),
        severity: None,
        qa_origin: None,
    }
}

/// Create a deterministic item with explicit dependencies.
pub fn item_with_deps(id: &str, priority: i64, deps: &[&str]) -> WorkItem {
    let mut item = item(id, priority);
    item.dependencies = deps.iter().map(|d| (*d).to_string()).collect();
    item
}

/// Create a review-gate item (`qa` category).
pub fn qa_item(id: &str) -> WorkItem {
    let mut item = item(id, 100);
    item.category = "qa".to_string();
    item.name = format!("QA {id}");
    item
}

pub fn list_of(items: Vec<WorkItem>) -> WorkList {
    WorkList { items }
}

/// Executor returning scripted statuses without spawning processes.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<ExecStatus>>,
    fallback: ExecStatus,
    dispatched: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn always(status: ExecStatus) -> Self {
        Self::sequence(Vec::new(), status)
    }

    /// Consume `script` first, then keep answering with `fallback`.
    pub fn sequence(script: Vec<ExecStatus>, fallback: ExecStatus) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// Item ids in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().expect("lock").clone()
    }
}

impl Executor for ScriptedExecutor {
    fn dispatch(&self, request: &DispatchRequest) -> Result<ExecStatus> {
        self.dispatched
            .lock()
            .expect("lock")
            .push(request.item.id.clone());
        Ok(self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(self.fallback))
    }
}

/// Executor whose dispatch call itself errors.
pub struct FailingExecutor;

impl Executor for FailingExecutor {
    fn dispatch(&self, _request: &DispatchRequest) -> Result<ExecStatus> {
        Err(anyhow!("executor backend unavailable"))
    }
}

/// Test runner returning scripted pass/fail results.
pub struct ScriptedTestRunner {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedTestRunner {
    pub fn always(passes: bool) -> Self {
        Self::sequence(Vec::new(), passes)
    }

    pub fn sequence(script: Vec<bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
        }
    }
}

impl TestRunner for ScriptedTestRunner {
    fn run(&self, _request: &VerifyRequest) -> Result<VerifyOutcome> {
        let passed = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(self.fallback);
        Ok(VerifyOutcome {
            passed,
            output: "scripted verification".to_string(),
            truncated_bytes: 0,
        })
    }
}

/// In-memory ledger recording every query and completion.
pub struct ScriptedLedger {
    completions: Mutex<HashSet<String>>,
    fail_queries: bool,
    queried: Mutex<Vec<String>>,
    recorded: Mutex<Vec<String>>,
}

impl ScriptedLedger {
    pub fn empty() -> Self {
        Self::with_completions(&[])
    }

    pub fn with_completions(ids: &[&str]) -> Self {
        Self {
            completions: Mutex::new(ids.iter().map(|id| (*id).to_string()).collect()),
            fail_queries: false,
            queried: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Ledger whose queries always error (unavailable history).
    pub fn failing() -> Self {
        Self {
            fail_queries: true,
            ..Self::empty()
        }
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().expect("lock").clone()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.recorded.lock().expect("lock").clone()
    }
}

impl Ledger for ScriptedLedger {
    fn has_completion(&self, id: &str) -> Result<bool> {
        self.queried.lock().expect("lock").push(id.to_string());
        if self.fail_queries {
            return Err(anyhow!("ledger unavailable"));
        }
        Ok(self.completions.lock().expect("lock").contains(id))
    }

    fn record_completion(&self, id: &str) -> Result<bool> {
        self.recorded.lock().expect("lock").push(id.to_string());
        self.completions.lock().expect("lock").insert(id.to_string());
        Ok(true)
    }
}

/// Escalation handler answering from a script (default answer: abort).
pub struct ScriptedEscalation {
    script: Mutex<VecDeque<EscalationDecision>>,
    calls: Mutex<u32>,
}

impl ScriptedEscalation {
    pub fn always_abort() -> Self {
        Self::decisions(Vec::new())
    }

    pub fn decisions(script: Vec<EscalationDecision>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().expect("lock")
    }
}

impl EscalationHandler for ScriptedEscalation {
    fn on_stall(&self, _stalls: u32) -> Result<EscalationDecision> {
        *self.calls.lock().expect("lock") += 1;
        Ok(self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(EscalationDecision::Abort))
    }
}

/// Temp project with an initialized git repository and an initial commit.
pub struct TestProject {
    temp: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp.path();

        run_git(root, &["init"])?;
        run_git(root, &["config", "user.email", "test@example.com"])?;
        run_git(root, &["config", "user.name", "test"])?;

        std::fs::write(root.join("README.md"), "test project\n").context("write README")?;
        run_git(root, &["add", "README.md"])?;
        run_git(root, &["commit", "-m", "chore: init"])?;

        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write the list to `work_list.json` and return a store handle for it.
    pub fn seed(&self, list: WorkList) -> Store {
        let store = Store::for_root(self.root());
        store.save(&list).expect("seed work list");
        store
    }

    /// Commit a completion marker into the git ledger.
    pub fn commit_completion(&self, id: &str) -> Result<()> {
        let marker_file = self.root().join(format!("{id}.done"));
        std::fs::write(&marker_file, "done\n").context("write marker file")?;
        run_git(self.root(), &["add", "-A"])?;
        run_git(
            self.root(),
            &["commit", "-m", &format!("session: completed {id}")],
        )?;
        Ok(())
    }
}

fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("spawn git {args:?}"))?;
    if !status.status.success() {
        return Err(anyhow!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&status.stderr)
        ));
    }
    Ok(())
}
