//! Pending entries ordered by descending priority.

use std::collections::VecDeque;

#[derive(Debug)]
struct Prioritized<T> {
    priority: i32,
    item: T,
}

/// Sequence of pending items, highest priority first.
///
/// Items with equal priority keep submission order (FIFO). Insertion appends
/// directly when the new item does not outrank the current tail, which is the
/// common case for FIFO-heavy workloads; otherwise the slot is found by binary
/// search.
#[derive(Debug)]
pub struct PriorityList<T> {
    entries: VecDeque<Prioritized<T>>,
}

impl<T> PriorityList<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, priority: i32, item: T) {
        let entry = Prioritized { priority, item };
        if self
            .entries
            .back()
            .is_none_or(|last| last.priority >= priority)
        {
            self.entries.push_back(entry);
            return;
        }

        // First slot holding a strictly lower priority: lands after all equals.
        let index = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(index, entry);
    }

    /// Remove the highest-priority, oldest item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.entries.pop_front().map(|e| e.item)
    }

    /// Drop every item without running it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of items queued at exactly `priority`.
    pub fn count_priority(&self, priority: i32) -> usize {
        self.entries
            .iter()
            .filter(|e| e.priority == priority)
            .count()
    }
}

impl<T> Default for PriorityList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn drain(list: &mut PriorityList<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| list.pop_front()).collect()
    }

    #[test]
    fn higher_priority_comes_first() {
        let mut list = PriorityList::new();
        list.insert(0, "low");
        list.insert(5, "high");
        list.insert(1, "mid");
        assert_eq!(drain(&mut list), vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut list = PriorityList::new();
        list.insert(1, "a");
        list.insert(3, "x");
        list.insert(1, "b");
        list.insert(3, "y");
        list.insert(1, "c");
        assert_eq!(drain(&mut list), vec!["x", "y", "a", "b", "c"]);
    }

    #[rstest]
    #[case(&[10, 10, -1, 0, 5], &[0, 1, 4, 3, 2])]
    #[case(&[0, 0, 0], &[0, 1, 2])]
    #[case(&[-3, -2, -1], &[2, 1, 0])]
    #[case(&[2, 1, 2, 1], &[0, 2, 1, 3])]
    fn pops_in_priority_then_fifo_order(#[case] priorities: &[i32], #[case] expected: &[usize]) {
        let mut list = PriorityList::new();
        for (index, &priority) in priorities.iter().enumerate() {
            list.insert(priority, index);
        }
        let order: Vec<usize> = std::iter::from_fn(|| list.pop_front()).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn clear_discards_everything() {
        let mut list = PriorityList::new();
        list.insert(1, "a");
        list.insert(2, "b");
        assert_eq!(list.len(), 2);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn counts_by_priority() {
        let mut list = PriorityList::new();
        list.insert(1, "a");
        list.insert(2, "b");
        list.insert(1, "c");
        assert_eq!(list.count_priority(1), 2);
        assert_eq!(list.count_priority(2), 1);
        assert_eq!(list.count_priority(7), 0);
    }
}
