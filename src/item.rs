//! Work item data model persisted in `work_list.json`.

use serde::{Deserialize, Serialize};

/// Priority used when an item has no usable `priority` value.
pub const DEFAULT_PRIORITY: i64 = 99;

/// Persisted priority value.
///
/// The store tolerates non-numeric priorities (they round-trip unchanged and
/// surface as validation warnings); ordering always goes through
/// [`WorkItem::effective_priority`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Priority {
    Number(i64),
    Other(serde_json::Value),
}

impl Priority {
    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::Other(value) => value.is_number(),
        }
    }
}

/// Verification-strictness tier produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    High,
    Medium,
    Low,
}

impl Complexity {
    /// Parse a manual override value. Unrecognized strings return `None` and
    /// are reported as a validation warning, never an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A single schedulable unit of backlog work.
///
/// `id`, `name` and `description` are required by validation but default at
/// parse time so a partially-synced store still loads and can be diagnosed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Ids that must be completed before this item is eligible.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// True once the item is verified complete. A passed item is never
    /// treated as blocked, regardless of the `blocked` flag.
    #[serde(default)]
    pub passes: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<String>,
    /// Withheld from unattended selection when the loop runs with
    /// `skip_review`.
    #[serde(default)]
    pub needs_review: bool,
    /// Manual classifier override; only `high`/`medium`/`low` are honored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_origin: Option<String>,
}

impl WorkItem {
    /// Numeric priority used for ordering; lower sorts first.
    pub fn effective_priority(&self) -> i64 {
        match &self.priority {
            Some(Priority::Number(n)) => *n,
            Some(Priority::Other(value)) => value
                .as_f64()
                .map_or(DEFAULT_PRIORITY, |f| f.trunc() as i64),
            None => DEFAULT_PRIORITY,
        }
    }

    /// Manual complexity override, if set to a recognized value.
    pub fn complexity_override(&self) -> Option<Complexity> {
        self.complexity.as_deref().and_then(Complexity::parse)
    }

    /// Review-gate items require an explicit completion signal and are never
    /// auto-completed.
    pub fn is_review_gate(&self) -> bool {
        self.category.eq_ignore_ascii_case("qa") || self.id.starts_with("qa-")
    }

    /// `passes` takes precedence: a passed item is never considered blocked.
    pub fn effectively_blocked(&self) -> bool {
        self.blocked && !self.passes
    }
}

/// The whole persisted collection. Items are only ever appended or mutated
/// in place; nothing deletes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkList {
    #[serde(default)]
    pub items: Vec<WorkItem>,
}

impl WorkList {
    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut WorkItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// True when every dependency of `item` exists and has passed.
    pub fn dependencies_met(&self, item: &WorkItem) -> bool {
        item.dependencies
            .iter()
            .all(|dep| self.get(dep).is_some_and(|d| d.passes))
    }
}
