//! Snapshot-based undo/redo

use std::collections::VecDeque;
use std::mem;

/// Maximum undo depth kept per page
pub const DEFAULT_UNDO_DEPTH: usize = 50;

/// Bounded undo stack plus unbounded redo stack of whole-state snapshots
///
/// Callers record a deep copy of the state *before* mutating it. When the
/// undo stack is full the oldest snapshot is discarded.
#[derive(Debug, Clone)]
pub struct History<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    max_depth: usize,
}

impl<T> History<T> {
    pub fn new(max_depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), max_depth: max_depth.max(1) }
    }

    /// Push a pre-mutation snapshot and invalidate redo
    pub fn record(&mut self, snapshot: T) {
        self.push_undo(snapshot);
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: T) {
        if self.undo.len() == self.max_depth {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }

    /// Restore the most recent snapshot into `current`
    ///
    /// Returns `false` and leaves `current` untouched when there is nothing
    /// to undo.
    pub fn undo(&mut self, current: &mut T) -> bool {
        match self.undo.pop_back() {
            Some(previous) => {
                self.redo.push(mem::replace(current, previous));
                true
            }
            None => false,
        }
    }

    /// Mirror of [`undo`](Self::undo)
    pub fn redo(&mut self, current: &mut T) -> bool {
        match self.redo.pop() {
            Some(next) => {
                let replaced = mem::replace(current, next);
                self.push_undo(replaced);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn commit(history: &mut History<Vec<u32>>, state: &mut Vec<u32>, value: u32) {
        history.record(state.clone());
        state.push(value);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut history = History::default();
        let mut state = Vec::new();

        commit(&mut history, &mut state, 1);
        commit(&mut history, &mut state, 2);

        assert!(history.undo(&mut state));
        assert_eq!(state, vec![1]);
        assert!(history.redo(&mut state));
        assert_eq!(state, vec![1, 2]);
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history: History<Vec<u32>> = History::default();
        let mut state = vec![7];

        assert!(!history.undo(&mut state));
        assert!(!history.redo(&mut state));
        assert_eq!(state, vec![7]);
    }

    #[test]
    fn test_new_mutation_clears_redo() {
        let mut history = History::default();
        let mut state = Vec::new();

        commit(&mut history, &mut state, 1);
        history.undo(&mut state);
        assert!(history.can_redo());

        commit(&mut history, &mut state, 9);
        assert!(!history.can_redo());
        assert_eq!(state, vec![9]);
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::new(3);
        let mut state = Vec::new();

        for value in 0..10 {
            commit(&mut history, &mut state, value);
        }
        assert_eq!(history.undo_len(), 3);

        while history.undo(&mut state) {}
        assert_eq!(state, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_depth_keeps_one_snapshot() {
        let history: History<()> = History::new(0);
        assert_eq!(history.max_depth(), 1);
    }

    proptest! {
        #[test]
        fn test_n_undos_then_n_redos(values in proptest::collection::vec(any::<u32>(), 0..50)) {
            let mut history = History::default();
            let mut state = Vec::new();
            for value in &values {
                commit(&mut history, &mut state, *value);
            }
            let final_state = state.clone();

            for _ in 0..values.len() {
                prop_assert!(history.undo(&mut state));
            }
            prop_assert!(state.is_empty());

            for _ in 0..values.len() {
                prop_assert!(history.redo(&mut state));
            }
            prop_assert_eq!(state, final_state);
        }
    }
}
