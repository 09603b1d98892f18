//! Semantic validation of the work list.
//!
//! Shape/type conformance is checked against the JSON Schema at load time
//! (see `io::store`); this module covers the invariants a schema cannot
//! express and splits them into fatal errors and non-blocking warnings.

use std::collections::HashSet;

use thiserror::Error;

use crate::core::graph::find_cycle;
use crate::item::WorkList;

/// Fatal problems; the session loop must refuse to start while any exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("work list contains no items")]
    EmptyCollection,
    #[error("item #{index}: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Non-fatal problems; surfaced but never block the loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("item '{id}': dependency '{dependency}' does not exist")]
    DanglingDependency { id: String, dependency: String },
    #[error("item '{id}': priority is not numeric, treating as default")]
    NonNumericPriority { id: String },
    #[error("item '{id}': unrecognized complexity override '{value}'")]
    UnknownComplexity { id: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check the collection invariants and return the full report.
pub fn validate(list: &WorkList) -> ValidationReport {
    let mut report = ValidationReport::default();

    if list.items.is_empty() {
        report.errors.push(ValidationError::EmptyCollection);
        return report;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (index, item) in list.items.iter().enumerate() {
        for (field, value) in [
            ("id", &item.id),
            ("name", &item.name),
            ("description", &item.description),
        ] {
            if value.trim().is_empty() {
                report
                    .errors
                    .push(ValidationError::MissingField { index, field });
            }
        }

        if !item.id.is_empty() && !seen.insert(item.id.as_str()) {
            report.errors.push(ValidationError::DuplicateId {
                id: item.id.clone(),
            });
        }

        for dep in &item.dependencies {
            if !list.contains(dep) {
                report.warnings.push(ValidationWarning::DanglingDependency {
                    id: item.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        if let Some(priority) = &item.priority {
            if !priority.is_numeric() {
                report.warnings.push(ValidationWarning::NonNumericPriority {
                    id: item.id.clone(),
                });
            }
        }

        if let Some(value) = &item.complexity {
            if item.complexity_override().is_none() {
                report.warnings.push(ValidationWarning::UnknownComplexity {
                    id: item.id.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(list) {
        report.errors.push(ValidationError::Cycle { path });
    }

    report
}
