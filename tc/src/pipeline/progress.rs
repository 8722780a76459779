//! Run progress tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StageName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Started,
    Completed,
    Failed,
    /// Informational note attached to a stage (e.g. over-budget estimate)
    Note,
}

/// One entry of a run's progress log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: StageName,
    /// 1-based position in execution order
    pub ordinal: usize,
    pub total: usize,
    pub kind: ProgressKind,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: StageName, ordinal: usize, total: usize, kind: ProgressKind, summary: impl Into<String>) -> Self {
        Self {
            stage,
            ordinal,
            total,
            kind,
            summary: summary.into(),
            timestamp: Utc::now(),
        }
    }

    /// Display form, e.g. `[2/7] Starting flight...`
    pub fn message(&self) -> String {
        let prefix = format!("[{}/{}]", self.ordinal, self.total);
        match self.kind {
            ProgressKind::Started => format!("{} Starting {}...", prefix, self.stage),
            ProgressKind::Completed => format!("{} {} complete: {}", prefix, self.stage, self.summary),
            ProgressKind::Failed => format!("{} {} failed: {}", prefix, self.stage, self.summary),
            ProgressKind::Note => format!("{} {}", prefix, self.summary),
        }
    }
}

/// Progress log of a single run or batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub total: usize,
    pub events: Vec<ProgressEvent>,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }

    /// Number of stages that completed
    pub fn completed(&self) -> usize {
        self.events.iter().filter(|e| e.kind == ProgressKind::Completed).count()
    }

    /// Completion percentage in [0, 100]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed() as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// Stage that failed, if any
    pub fn failed_stage(&self) -> Option<StageName> {
        self.events.iter().find(|e| e.kind == ProgressKind::Failed).map(|e| e.stage)
    }

    /// Display lines for every event
    pub fn messages(&self) -> Vec<String> {
        self.events.iter().map(ProgressEvent::message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut progress = RunProgress::new(4);
        assert_eq!(progress.percentage(), 0.0);

        progress.record(ProgressEvent::new(StageName::Destination, 1, 4, ProgressKind::Started, ""));
        progress.record(ProgressEvent::new(StageName::Destination, 1, 4, ProgressKind::Completed, "ok"));
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.percentage(), 25.0);
    }

    #[test]
    fn test_messages() {
        let mut progress = RunProgress::new(7);
        progress.record(ProgressEvent::new(StageName::Flight, 2, 7, ProgressKind::Started, ""));
        progress.record(ProgressEvent::new(StageName::Flight, 2, 7, ProgressKind::Failed, "timeout"));

        assert_eq!(
            progress.messages(),
            vec!["[2/7] Starting flight...", "[2/7] flight failed: timeout"]
        );
        assert_eq!(progress.failed_stage(), Some(StageName::Flight));
    }

    #[test]
    fn test_empty_progress_is_complete() {
        assert_eq!(RunProgress::new(0).percentage(), 100.0);
    }
}
