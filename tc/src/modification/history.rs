//! Linear undo/redo history
//!
//! Every entry holds a full plan snapshot. Snapshots share unchanged stage
//! outputs through `Arc`, so keeping many of them is cheap. Undo and redo
//! only move the cursor; they never re-execute stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Modification, Plan};

/// Label of the baseline entry recorded after the first planning run
pub const INITIAL_PLAN_LABEL: &str = "Initial plan";

/// A batch of modifications and the plan after applying it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Empty for the baseline entry
    pub modifications: Vec<Modification>,
    pub plan: Plan,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for an applied batch; label joins the batch descriptions
    pub fn batch(modifications: Vec<Modification>, plan: Plan) -> Self {
        let label = modifications
            .iter()
            .map(|m| m.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            modifications,
            plan,
            label,
            timestamp: Utc::now(),
        }
    }

    /// Baseline entry holding the initial plan
    pub fn baseline(plan: Plan) -> Self {
        Self {
            modifications: Vec::new(),
            plan,
            label: INITIAL_PLAN_LABEL.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<HistoryEntry>,
    /// -1 when empty, otherwise in [0, len-1]
    cursor: i64,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: -1,
        }
    }

    /// Truncate everything after the cursor, append, and advance
    pub fn push(&mut self, entry: HistoryEntry) {
        let keep = usize::try_from(self.cursor + 1).unwrap_or(0);
        self.entries.truncate(keep);
        self.entries.push(entry);
        self.cursor = self.entries.len() as i64 - 1;
        debug!(cursor = self.cursor, len = self.entries.len(), "HistoryStack::push: called");
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len() as i64 - 1
    }

    /// Step back; returns the entry now pointed to
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        debug!(cursor = self.cursor, "HistoryStack::undo: called");
        self.current()
    }

    /// Step forward; returns the entry now pointed to
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        debug!(cursor = self.cursor, "HistoryStack::redo: called");
        self.current()
    }

    /// Entry at the cursor
    pub fn current(&self) -> Option<&HistoryEntry> {
        usize::try_from(self.cursor).ok().and_then(|i| self.entries.get(i))
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entry labels, the cursor entry marked with `→ `
    pub fn summary(&self) -> Vec<String> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let marker = if i as i64 == self.cursor { "→ " } else { "  " };
                format!("{}{}", marker, entry.label)
            })
            .collect()
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}
