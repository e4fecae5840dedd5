use crate::time::EngineTime;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

/// Per-graph parallel array mapping each non-push node to its next
/// scheduled engine time, plus a min-heap mirror for `proposed_next_engine_time`
/// so the engine doesn't need to scan every slot on every tick to find the
/// next wake-up. `slots` stays the source of truth: `evaluate_graph` reads
/// it directly, one index at a time, rather than draining the heap.
#[derive(Debug)]
pub struct Scheduler {
    slots: Vec<EngineTime>,
    queue: PriorityQueue<usize, Reverse<EngineTime>>,
}

impl Scheduler {
    pub fn new(node_count: usize) -> Self {
        Self {
            slots: vec![EngineTime::MAX_DT; node_count],
            queue: PriorityQueue::new(),
        }
    }

    pub fn slot(&self, index: usize) -> EngineTime {
        self.slots[index]
    }

    /// Schedules `index` for `at`, overwriting whatever it was previously
    /// scheduled for. A node that's both explicitly timer-scheduled and
    /// triggered this tick by an active input keeps only the earlier (or
    /// most recent explicit) request; its own `eval` is free to call
    /// `set` again to arrange a future wake-up.
    pub fn set(&mut self, index: usize, at: EngineTime) {
        self.slots[index] = at;
        if at == EngineTime::MAX_DT {
            self.queue.remove(&index);
        } else {
            self.queue.push(index, Reverse(at));
        }
    }

    pub fn clear(&mut self, index: usize) {
        self.set(index, EngineTime::MAX_DT);
    }

    /// The earliest engine time at which any node has something
    /// scheduled, or `None` if nothing is pending.
    pub fn proposed_next_engine_time(&self) -> Option<EngineTime> {
        self.queue.peek().map(|(_, Reverse(t))| *t)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposed_time_tracks_earliest_slot() {
        let mut s = Scheduler::new(3);
        assert_eq!(s.proposed_next_engine_time(), None);
        s.set(0, 100.into());
        s.set(1, 50.into());
        s.set(2, 200.into());
        assert_eq!(s.proposed_next_engine_time(), Some(50.into()));
        s.clear(1);
        assert_eq!(s.proposed_next_engine_time(), Some(100.into()));
    }

    #[test]
    fn rescheduling_overwrites_previous_slot() {
        let mut s = Scheduler::new(1);
        s.set(0, 10.into());
        s.set(0, 20.into());
        assert_eq!(s.slot(0), 20.into());
        assert_eq!(s.proposed_next_engine_time(), Some(20.into()));
    }

    #[test]
    fn clearing_all_leaves_nothing_proposed() {
        let mut s = Scheduler::new(2);
        s.set(0, 10.into());
        s.set(1, 20.into());
        s.clear(0);
        s.clear(1);
        assert_eq!(s.proposed_next_engine_time(), None);
    }
}
