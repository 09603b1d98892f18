//! Deterministic selection logic over the work list.

use crate::item::{WorkItem, WorkList};

/// Completion/blocked tallies used by terminal checks and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub blocked: usize,
}

/// Count completion state. Blocked counts only unfinished items: `passes`
/// takes precedence over a stale `blocked` flag.
pub fn counts(list: &WorkList) -> StatusCounts {
    let total = list.items.len();
    let completed = list.items.iter().filter(|item| item.passes).count();
    let blocked = list
        .items
        .iter()
        .filter(|item| item.effectively_blocked())
        .count();
    StatusCounts {
        total,
        completed,
        remaining: total - completed,
        blocked,
    }
}

/// Scan the execution order and return the first eligible item.
///
/// Eligible means: not passed, not blocked, every dependency exists and has
/// passed, and (when `skip_review` is set) not withheld for review.
pub fn next_eligible<'a>(
    list: &'a WorkList,
    order: &[String],
    skip_review: bool,
) -> Option<&'a WorkItem> {
    order
        .iter()
        .filter_map(|id| list.get(id))
        .find(|item| is_eligible(list, item, skip_review))
}

fn is_eligible(list: &WorkList, item: &WorkItem, skip_review: bool) -> bool {
    if item.passes || item.effectively_blocked() {
        return false;
    }
    if skip_review && item.needs_review {
        return false;
    }
    list.dependencies_met(item)
}

/// Review-withheld items whose dependencies are already satisfied; these are
/// what an unattended `skip_review` run walks past.
pub fn pending_review(list: &WorkList) -> Vec<&WorkItem> {
    list.items
        .iter()
        .filter(|item| {
            item.needs_review
                && !item.passes
                && !item.effectively_blocked()
                && list.dependencies_met(item)
        })
        .collect()
}

/// Terminal-state evaluation for one loop pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome<'a> {
    /// No unfinished items remain.
    Complete,
    /// Every unfinished item is blocked; external intervention required.
    AllBlocked { blocked: usize },
    /// Unfinished, unblocked items exist but none passes the selection
    /// filter (withheld for review, or waiting on unresolvable references).
    AwaitingReview { pending: usize },
    Eligible(&'a WorkItem),
}

/// Evaluate terminal conditions, then select.
pub fn evaluate<'a>(
    list: &'a WorkList,
    order: &[String],
    skip_review: bool,
) -> SelectionOutcome<'a> {
    let counts = counts(list);
    if counts.remaining == 0 {
        return SelectionOutcome::Complete;
    }
    if counts.remaining == counts.blocked {
        return SelectionOutcome::AllBlocked {
            blocked: counts.blocked,
        };
    }
    match next_eligible(list, order, skip_review) {
        Some(item) => SelectionOutcome::Eligible(item),
        None => SelectionOutcome::AwaitingReview {
            pending: pending_review(list).len(),
        },
    }
}
