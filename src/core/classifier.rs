//! Heuristic complexity classification for work items.
//!
//! The score decides how strict post-execution verification must be, so the
//! keyword sets and weights are data, not control flow: tests assert against
//! the tables directly and tuning the policy never touches the scorer.

use crate::item::{Complexity, WorkItem};

/// Item text fields a keyword rule scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Name,
    Description,
    Category,
}

/// A keyword set with a weight, applied at most once per item (first match
/// only).
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub weight: i32,
    pub fields: &'static [TextField],
    pub keywords: &'static [&'static str],
}

/// Security/credential-adjacent terms that demand the full verification
/// ceremony.
pub const HIGH_RISK: KeywordRule = KeywordRule {
    weight: 2,
    fields: &[TextField::Description, TextField::Category, TextField::Name],
    keywords: &[
        "security",
        "crypto",
        "encrypt",
        "auth",
        "credential",
        "password",
        "ssh",
        "certificate",
        "token",
        "session",
        "permission",
        "rbac",
        "injection",
        "sanitize",
        "validate",
        "vulnerability",
    ],
};

/// API/persistence/system-surface terms.
pub const MEDIUM_RISK: KeywordRule = KeywordRule {
    weight: 1,
    fields: &[TextField::Description, TextField::Category],
    keywords: &[
        "api",
        "endpoint",
        "database",
        "repository",
        "migration",
        "schema",
        "patch",
        "system",
        "service",
        "handler",
        "execute",
        "command",
    ],
};

/// Janitorial terms that rarely need review.
pub const LOW_RISK: KeywordRule = KeywordRule {
    weight: -2,
    fields: &[TextField::Description, TextField::Category, TextField::Name],
    keywords: &[
        "refactor", "rename", "cleanup", "format", "typo", "comment", "docs",
    ],
};

pub const KEYWORD_RULES: &[KeywordRule] = &[HIGH_RISK, MEDIUM_RISK, LOW_RISK];

/// Structural signal thresholds and weights.
pub const MANY_DEPENDENCIES: usize = 3;
pub const MANY_DEPENDENCIES_WEIGHT: i32 = 1;
pub const MANY_TESTS: usize = 5;
pub const MANY_TESTS_WEIGHT: i32 = 1;
pub const TRIVIAL_NAME_MARKERS: &[&str] = &["simple", "minor"];
pub const TRIVIAL_NAME_WEIGHT: i32 = -1;
pub const SHORT_DESCRIPTION_LEN: usize = 40;
pub const SHORT_DESCRIPTION_WEIGHT: i32 = -1;

/// Final tier cutoffs: `score >= HIGH_THRESHOLD` is High,
/// `score <= LOW_THRESHOLD` is Low, anything between is Medium.
pub const HIGH_THRESHOLD: i32 = 3;
pub const LOW_THRESHOLD: i32 = 0;

/// Classify an item into a verification tier.
///
/// A recognized manual `complexity` override wins outright; no scoring runs.
pub fn classify(item: &WorkItem) -> Complexity {
    if let Some(tier) = item.complexity_override() {
        return tier;
    }
    tier_for_score(score(item))
}

/// Accumulate the raw score from the rule tables.
pub fn score(item: &WorkItem) -> i32 {
    let name = item.name.to_lowercase();
    let description = item.description.to_lowercase();
    let category = item.category.to_lowercase();

    let mut score = 0;
    for rule in KEYWORD_RULES {
        if rule_matches(rule, &name, &description, &category) {
            score += rule.weight;
        }
    }

    if item.dependencies.len() > MANY_DEPENDENCIES {
        score += MANY_DEPENDENCIES_WEIGHT;
    }
    if item.tests.len() > MANY_TESTS {
        score += MANY_TESTS_WEIGHT;
    }
    if TRIVIAL_NAME_MARKERS.iter().any(|m| name.contains(m)) {
        score += TRIVIAL_NAME_WEIGHT;
    }
    if item.description.len() < SHORT_DESCRIPTION_LEN {
        score += SHORT_DESCRIPTION_WEIGHT;
    }

    score
}

fn rule_matches(rule: &KeywordRule, name: &str, description: &str, category: &str) -> bool {
    rule.keywords.iter().any(|keyword| {
        rule.fields.iter().any(|field| match field {
            TextField::Name => name.contains(keyword),
            TextField::Description => description.contains(keyword),
            TextField::Category => category.contains(keyword),
        })
    })
}

fn tier_for_score(score: i32) -> Complexity {
    if score >= HIGH_THRESHOLD {
        Complexity::High
    } else if score <= LOW_THRESHOLD {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}
