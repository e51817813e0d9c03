//! # Diff Classifier
//!
//! Labels how a displayed value changed between two snapshots. Empty strings and
//! missing values are both treated as "absent".

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Visual diff marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Deleted,
    Updated,
}

/// Classify the change from `before` to `after`; `None` means no marker
pub fn classify(before: Option<&str>, after: Option<&str>) -> Option<DiffKind> {
    let before = before.filter(|v| !v.is_empty());
    let after = after.filter(|v| !v.is_empty());

    match (before, after) {
        (None, Some(_)) => Some(DiffKind::Added),
        (Some(_), None) => Some(DiffKind::Deleted),
        (Some(b), Some(a)) if b != a => Some(DiffKind::Updated),
        _ => None,
    }
}

/// One row of a compared table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffKind>,
}

/// Compare two tables row by row, over the sorted union of their keys
pub fn diff_rows(
    input: &BTreeMap<String, String>,
    output: &BTreeMap<String, String>,
) -> Vec<TableRow> {
    let keys: BTreeSet<&String> = input.keys().chain(output.keys()).collect();

    keys.into_iter()
        .map(|key| {
            let before = input.get(key).cloned();
            let after = output.get(key).cloned();
            TableRow {
                key: key.clone(),
                diff: classify(before.as_deref(), after.as_deref()),
                input: before,
                output: after,
            }
        })
        .collect()
}
