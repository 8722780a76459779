//! Pending modification queue

use serde::{Deserialize, Serialize};

use crate::domain::Modification;

/// Modifications accepted but not yet applied, in queue order
///
/// Queueing never re-runs stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModificationQueue {
    modifications: Vec<Modification>,
}

impl ModificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a modification; returns the new pending count
    pub fn add(&mut self, modification: Modification) -> usize {
        self.modifications.push(modification);
        self.modifications.len()
    }

    /// Discard everything pending; returns what was discarded
    pub fn clear(&mut self) -> Vec<Modification> {
        std::mem::take(&mut self.modifications)
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    pub fn pending(&self) -> &[Modification] {
        &self.modifications
    }

    /// Descriptions of pending modifications, in queue order
    pub fn summary(&self) -> Vec<String> {
        self.modifications.iter().map(|m| m.description.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModificationAction, RemoveActivityParams, StageName};

    fn removal(name: &str) -> Modification {
        Modification::new(
            ModificationAction::RemoveActivity(RemoveActivityParams {
                activity_name: name.to_string(),
            }),
            vec![StageName::Budget, StageName::Itinerary],
        )
    }

    #[test]
    fn test_add_and_summary() {
        let mut queue = ModificationQueue::new();
        assert!(queue.is_empty());

        assert_eq!(queue.add(removal("Monkey Forest")), 1);
        assert_eq!(queue.add(removal("Tanah Lot")), 2);
        assert_eq!(queue.summary(), vec!["Remove Monkey Forest", "Remove Tanah Lot"]);
    }

    #[test]
    fn test_clear_returns_pending() {
        let mut queue = ModificationQueue::new();
        queue.add(removal("Monkey Forest"));

        let cleared = queue.clear();
        assert_eq!(cleared.len(), 1);
        assert!(queue.is_empty());
        assert!(queue.summary().is_empty());
    }
}
