//! Min-heap of upcoming reminder checks.
//!
//! Entries can go stale when a reminder changes under it; that is harmless since
//! every popped id is re-read from the store before anything happens to it.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use chrono::{DateTime, Utc};

use nb_protocol::ReminderId;

#[derive(Debug, Default)]
pub struct DueQueue {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, ReminderId)>>,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: DateTime<Utc>, id: ReminderId) {
        self.heap.push(Reverse((at, id)));
    }

    /// Remove and return every id due at or before `now`, deduplicated.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> BTreeSet<ReminderId> {
        let mut due = BTreeSet::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            due.insert(id);
        }
        due
    }

    /// Earliest queued instant.
    pub fn next_at(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn pops_only_due_entries_in_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let (a, b, c) = (ReminderId::new(), ReminderId::new(), ReminderId::new());
        let mut queue = DueQueue::new();
        queue.push(t0 + Duration::minutes(10), c);
        queue.push(t0, a);
        queue.push(t0 + Duration::minutes(5), b);
        assert_eq!(queue.next_at(), Some(t0));

        let due = queue.pop_due(t0 + Duration::minutes(5));
        assert_eq!(due, BTreeSet::from([a, b]));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_at(), Some(t0 + Duration::minutes(10)));
    }

    #[test]
    fn duplicate_entries_collapse() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let id = ReminderId::new();
        let mut queue = DueQueue::new();
        queue.push(t0, id);
        queue.push(t0 - Duration::minutes(1), id);
        assert_eq!(queue.pop_due(t0).len(), 1);
        assert!(queue.is_empty());
    }
}
