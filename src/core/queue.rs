use keyed_priority_queue::KeyedPriorityQueue;
use std::cmp::Ordering;

use crate::core::state::{JobId, Registry, Timestamp, IMPORTANCE_LEVELS};
use crate::index::history::HistoryIndex;

// KeyedPriorityQueue is a max-heap, so both key Ords are flipped to pop
// the earliest-arrived, shortest job first. Importance never appears in a
// key; each heap holds a single level.
#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
struct RankKey {
    timestamp: Timestamp,
    duration: u64,
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.duration.cmp(&self.duration))
    }
}

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
struct DurationKey(u64);

impl PartialOrd for DurationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DurationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

#[derive(Debug)]
pub struct ReadyQueue {
    ready: Vec<KeyedPriorityQueue<JobId, RankKey>>,
    // Min-duration heaps holding jobs admitted at the currently-open
    // timestamp; draining appends to the history index duration-first.
    staging: Vec<KeyedPriorityQueue<JobId, DurationKey>>,
    // Timestamp currently open in each staging bucket.
    staged_epoch: Vec<Timestamp>,
    // Total staged entries; lets flush_all skip the bucket scan when zero.
    staged_total: usize,
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self {
            ready: (0..=IMPORTANCE_LEVELS)
                .map(|_| KeyedPriorityQueue::new())
                .collect(),
            staging: (0..=IMPORTANCE_LEVELS)
                .map(|_| KeyedPriorityQueue::new())
                .collect(),
            staged_epoch: vec![0; IMPORTANCE_LEVELS + 1],
            staged_total: 0,
        }
    }
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_staged(&self) -> bool {
        self.staged_total > 0
    }

    pub fn len(&self) -> usize {
        self.ready.iter().map(KeyedPriorityQueue::len).sum::<usize>() + self.staged_total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stage(&mut self, registry: &Registry, history: &mut HistoryIndex, id: JobId) {
        let job = registry.job(id);
        let slot = job.importance as usize;
        // A bucket still holding an older timestamp drains before the new
        // epoch opens.
        if !self.staging[slot].is_empty() && self.staged_epoch[slot] != job.timestamp {
            self.flush_bucket(registry, history, slot);
        }
        self.staged_epoch[slot] = job.timestamp;
        self.staging[slot].push(id, DurationKey(job.duration));
        self.staged_total += 1;
    }

    pub fn flush_all(&mut self, registry: &Registry, history: &mut HistoryIndex) {
        if self.staged_total == 0 {
            return;
        }
        for slot in 1..=IMPORTANCE_LEVELS {
            self.flush_bucket(registry, history, slot);
        }
    }

    fn flush_bucket(&mut self, registry: &Registry, history: &mut HistoryIndex, slot: usize) {
        while let Some((id, _)) = self.staging[slot].pop() {
            self.staged_total -= 1;
            history.append(slot as u64, id);
            let job = registry.job(id);
            self.ready[slot].push(
                id,
                RankKey {
                    timestamp: job.timestamp,
                    duration: job.duration,
                },
            );
        }
    }

    pub fn drain_highest(&mut self, quota: usize) -> Vec<JobId> {
        debug_assert_eq!(self.staged_total, 0, "drain with staged jobs pending");
        let mut out = Vec::with_capacity(quota);
        let mut slot = IMPORTANCE_LEVELS;
        while out.len() < quota && slot >= 1 {
            match self.ready[slot].pop() {
                Some((id, _)) => out.push(id),
                None => slot -= 1,
            }
        }
        out
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        let ready = self.ready.iter().flat_map(|heap| heap.iter().map(|(id, _)| *id));
        let staged = self
            .staging
            .iter()
            .flat_map(|heap| heap.iter().map(|(id, _)| *id));
        ready.chain(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::ReadyQueue;
    use crate::core::state::{JobId, JobSpec, Registry};
    use crate::index::history::HistoryIndex;

    struct Fixture {
        registry: Registry,
        history: HistoryIndex,
        queue: ReadyQueue,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Registry::default(),
                history: HistoryIndex::new(),
                queue: ReadyQueue::new(),
            }
        }

        fn admit(&mut self, timestamp: u64, importance: u64, duration: u64) -> JobId {
            let id = self.registry.insert(JobSpec {
                timestamp,
                process_id: 0,
                origin: "sys".into(),
                instruction: "run".into(),
                importance,
                duration,
            });
            self.queue.stage(&self.registry, &mut self.history, id);
            id
        }

        fn flush(&mut self) {
            self.queue.flush_all(&self.registry, &mut self.history);
        }
    }

    #[test]
    fn flush_orders_equal_timestamps_by_duration() {
        let mut fx = Fixture::new();
        let slow = fx.admit(5, 10, 7);
        let fast = fx.admit(5, 10, 3);
        let mid = fx.admit(5, 10, 5);
        fx.flush();

        assert_eq!(fx.history.bucket(10), &[fast, mid, slow]);
        assert_eq!(fx.queue.drain_highest(3), vec![fast, mid, slow]);
    }

    #[test]
    fn new_timestamp_drains_the_stale_bucket() {
        let mut fx = Fixture::new();
        let first = fx.admit(1, 10, 9);
        assert!(fx.queue.has_staged());

        let second = fx.admit(2, 10, 1);
        // The ts=1 epoch was flushed by the ts=2 admission; only the new
        // job is still staged.
        assert_eq!(fx.history.bucket(10), &[first]);
        assert!(fx.queue.has_staged());

        fx.flush();
        assert_eq!(fx.history.bucket(10), &[first, second]);
        assert!(!fx.queue.has_staged());
        assert_eq!(fx.queue.drain_highest(9), vec![first, second]);
    }

    #[test]
    fn drain_walks_importance_downwards() {
        let mut fx = Fixture::new();
        let low = fx.admit(1, 3, 1);
        let high = fx.admit(1, 90, 8);
        let mid = fx.admit(1, 47, 2);
        fx.flush();

        assert_eq!(fx.queue.len(), 3);
        assert_eq!(fx.queue.drain_highest(2), vec![high, mid]);
        assert_eq!(fx.queue.drain_highest(5), vec![low]);
        assert!(fx.queue.is_empty());
    }

    #[test]
    fn earlier_arrival_outranks_shorter_duration() {
        let mut fx = Fixture::new();
        let early_long = fx.admit(1, 10, 50);
        let late_short = fx.admit(2, 10, 1);
        fx.flush();

        assert_eq!(fx.queue.drain_highest(2), vec![early_long, late_short]);
    }

    #[test]
    fn iter_ids_spans_ready_and_staging() {
        let mut fx = Fixture::new();
        let a = fx.admit(1, 10, 1);
        let b = fx.admit(2, 20, 1);
        // Different buckets: b's stage does not drain a's epoch.
        let mut ids: Vec<_> = fx.queue.iter_ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a, b]);
    }
}
