use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Deferred task with an absolute deadline. Ties on the deadline are broken
/// by insertion order: the task scheduled first fires first.
struct Entry<T> {
    deadline_us: i64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_us == other.deadline_us && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline_us, self.seq).cmp(&(other.deadline_us, other.seq))
    }
}

/// Per-program deferred task queue, a min-heap on (deadline, insertion).
///
/// Tasks are a program-defined value type; `pop_ready` hands the ready ones
/// back to the owning program for execution, so the heap never holds
/// callbacks that could outlive a program restart.
pub struct Scheduler<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to become ready `delay_ms` after `now_us`.
    pub fn after_ms(&mut self, now_us: i64, delay_ms: u64, task: T) {
        self.after_us(now_us, (delay_ms as i64) * 1_000, task);
    }

    pub fn after_us(&mut self, now_us: i64, delay_us: i64, task: T) {
        debug_assert!(delay_us >= 0);
        self.heap.push(Reverse(Entry {
            deadline_us: now_us + delay_us,
            seq: self.next_seq,
            task,
        }));
        self.next_seq += 1;
    }

    /// Pop every task whose deadline has passed, in (deadline, insertion)
    /// order. Stops at the first not-ready entry: the heap guarantees no
    /// later entry has an earlier deadline. Never yields a task early.
    pub fn pop_ready(&mut self, now_us: i64) -> Vec<T> {
        let mut ready = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline_us > now_us {
                break;
            }
            let Reverse(entry) = self.heap.pop().expect("peeked entry");
            ready.push(entry.task);
        }
        ready
    }

    /// Drop all pending tasks. Called when the owning program restarts so
    /// tasks from a previous activation cannot fire into fresh state.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut sched = Scheduler::new();
        sched.after_ms(0, 300, "c");
        sched.after_ms(0, 100, "a");
        sched.after_ms(0, 200, "b");
        assert_eq!(sched.pop_ready(1_000_000), vec!["a", "b", "c"]);
        assert!(sched.is_empty());
    }

    #[test]
    fn equal_deadlines_fire_in_insertion_order() {
        let mut sched = Scheduler::new();
        sched.after_ms(0, 50, "first");
        sched.after_ms(0, 50, "second");
        sched.after_ms(0, 50, "third");
        assert_eq!(sched.pop_ready(50_000), vec!["first", "second", "third"]);
    }

    #[test]
    fn never_fires_before_deadline() {
        let mut sched = Scheduler::new();
        sched.after_ms(0, 100, "late");
        assert!(sched.pop_ready(99_999).is_empty());
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.pop_ready(100_000), vec!["late"]);
    }

    #[test]
    fn stops_at_first_not_ready_entry() {
        let mut sched = Scheduler::new();
        sched.after_ms(0, 10, "ready");
        sched.after_ms(0, 500, "not yet");
        assert_eq!(sched.pop_ready(20_000), vec!["ready"]);
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn order_holds_across_multiple_sweeps() {
        let mut sched = Scheduler::new();
        for (ms, name) in [(40u64, "d"), (10, "a"), (30, "c"), (20, "b")] {
            sched.after_ms(0, ms, name);
        }
        let mut fired = Vec::new();
        for tick_us in (0..=50_000).step_by(5_000) {
            fired.extend(sched.pop_ready(tick_us));
        }
        assert_eq!(fired, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn clear_drops_pending_tasks() {
        let mut sched = Scheduler::new();
        sched.after_ms(0, 1, "stale");
        sched.clear();
        assert!(sched.pop_ready(i64::MAX).is_empty());
    }
}
