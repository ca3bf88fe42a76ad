use std::collections::BTreeSet;

use tracing::warn;

use crate::error::StorageResult;
use crate::storage::{completed_exercises_key, encode_json, skipped_exercises_key, KeyValueStore};

/// How an exercise of the plan has been dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseMark {
    Pending,
    Completed,
    Skipped,
}

/// Completed and skipped exercise indices of one training
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseProgress {
    completed: BTreeSet<usize>,
    skipped: BTreeSet<usize>,
}

impl ExerciseProgress {
    /// Load both index lists; unreadable or missing entries count as empty.
    ///
    /// An index found in both lists is treated as completed.
    pub fn load<S: KeyValueStore>(store: &S, training_id: &str) -> Self {
        let completed = load_indices(store, &completed_exercises_key(training_id));
        let mut skipped = load_indices(store, &skipped_exercises_key(training_id));
        skipped.retain(|i| !completed.contains(i));
        Self { completed, skipped }
    }

    /// Persist both lists in one all-or-nothing write
    pub fn save<S: KeyValueStore>(&self, store: &S, training_id: &str) -> StorageResult<()> {
        let completed_key = completed_exercises_key(training_id);
        let skipped_key = skipped_exercises_key(training_id);
        let completed: Vec<usize> = self.completed.iter().copied().collect();
        let skipped: Vec<usize> = self.skipped.iter().copied().collect();

        let entries = [
            (completed_key.clone(), encode_json(&completed_key, &completed)?),
            (skipped_key.clone(), encode_json(&skipped_key, &skipped)?),
        ];
        store.set_many(&entries)
    }

    pub fn mark(&self, index: usize) -> ExerciseMark {
        if self.completed.contains(&index) {
            ExerciseMark::Completed
        } else if self.skipped.contains(&index) {
            ExerciseMark::Skipped
        } else {
            ExerciseMark::Pending
        }
    }

    pub fn mark_completed(&mut self, index: usize) {
        self.skipped.remove(&index);
        self.completed.insert(index);
    }

    pub fn mark_skipped(&mut self, index: usize) {
        self.completed.remove(&index);
        self.skipped.insert(index);
    }

    pub fn clear_mark(&mut self, index: usize) {
        self.completed.remove(&index);
        self.skipped.remove(&index);
    }

    pub fn completed(&self) -> impl Iterator<Item = usize> + '_ {
        self.completed.iter().copied()
    }

    pub fn skipped(&self) -> impl Iterator<Item = usize> + '_ {
        self.skipped.iter().copied()
    }

    /// Lowest index below `total` that is neither completed nor skipped
    pub fn next_pending(&self, total: usize) -> Option<usize> {
        (0..total).find(|i| self.mark(*i) == ExerciseMark::Pending)
    }

    pub fn is_finished(&self, total: usize) -> bool {
        self.next_pending(total).is_none()
    }

    pub fn completed_count(&self, total: usize) -> usize {
        self.completed.range(..total).count()
    }
}

fn load_indices<S: KeyValueStore>(store: &S, key: &str) -> BTreeSet<usize> {
    match store.get_json::<Vec<usize>>(key) {
        Ok(Some(indices)) => indices.into_iter().collect(),
        Ok(None) => BTreeSet::new(),
        Err(e) => {
            warn!(key, error = %e, "failed to read exercise progress, starting empty");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn marks_are_mutually_exclusive() {
        let mut p = ExerciseProgress::default();
        p.mark_completed(2);
        assert_eq!(p.mark(2), ExerciseMark::Completed);

        p.mark_skipped(2);
        assert_eq!(p.mark(2), ExerciseMark::Skipped);
        assert_eq!(p.completed().count(), 0);

        p.clear_mark(2);
        assert_eq!(p.mark(2), ExerciseMark::Pending);
    }

    #[test]
    fn next_pending_skips_marked_indices() {
        let mut p = ExerciseProgress::default();
        assert_eq!(p.next_pending(3), Some(0));

        p.mark_completed(0);
        p.mark_skipped(1);
        assert_eq!(p.next_pending(3), Some(2));
        assert!(!p.is_finished(3));

        p.mark_completed(2);
        assert_eq!(p.next_pending(3), None);
        assert!(p.is_finished(3));
        assert!(ExerciseProgress::default().is_finished(0));
    }

    #[test]
    fn completed_count_ignores_out_of_range_indices() {
        let mut p = ExerciseProgress::default();
        p.mark_completed(0);
        p.mark_completed(9);
        assert_eq!(p.completed_count(3), 1);
    }

    #[test]
    fn save_and_load_through_store() {
        let store = MemoryStore::new();
        let mut p = ExerciseProgress::default();
        p.mark_completed(3);
        p.mark_completed(1);
        p.mark_skipped(2);
        p.save(&store, "t1").unwrap();

        assert_eq!(
            store.get(&completed_exercises_key("t1")).unwrap().as_deref(),
            Some("[1,3]")
        );
        assert_eq!(ExerciseProgress::load(&store, "t1"), p);
        assert_eq!(ExerciseProgress::load(&store, "t2"), ExerciseProgress::default());
    }

    #[test]
    fn corrupt_entries_load_as_empty() {
        let store = MemoryStore::new();
        store.set(&completed_exercises_key("t1"), "{oops").unwrap();
        store.set(&skipped_exercises_key("t1"), "[4]").unwrap();

        let p = ExerciseProgress::load(&store, "t1");
        assert_eq!(p.completed().count(), 0);
        assert_eq!(p.skipped().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn index_in_both_lists_loads_as_completed() {
        let store = MemoryStore::new();
        store.set(&completed_exercises_key("t1"), "[0,2]").unwrap();
        store.set(&skipped_exercises_key("t1"), "[0,1]").unwrap();

        let p = ExerciseProgress::load(&store, "t1");
        assert_eq!(p.mark(0), ExerciseMark::Completed);
        assert_eq!(p.mark(1), ExerciseMark::Skipped);
        assert_eq!(p.skipped().collect::<Vec<_>>(), vec![1]);
    }
}
