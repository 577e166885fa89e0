use crate::core::state::{JobId, Registry, Timestamp, IMPORTANCE_LEVELS};

// Append-only per-importance job IDs in staging-drain order. Entries
// survive assignment (readers filter on queue_exit), and arrival
// timestamps within a bucket are non-decreasing.
#[derive(Debug)]
pub struct HistoryIndex {
    // Indexed by importance; slot 0 stays unused.
    buckets: Vec<Vec<JobId>>,
}

impl Default for HistoryIndex {
    fn default() -> Self {
        Self {
            buckets: vec![Vec::new(); IMPORTANCE_LEVELS + 1],
        }
    }
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, importance: u64, id: JobId) {
        self.buckets[importance as usize].push(id);
    }

    pub fn bucket(&self, importance: u64) -> &[JobId] {
        &self.buckets[importance as usize]
    }

    // Subslice of the bucket whose arrival timestamps fall inside
    // [min, max].
    pub fn window(
        &self,
        registry: &Registry,
        importance: u64,
        min: Timestamp,
        max: Timestamp,
    ) -> &[JobId] {
        debug_assert!(min <= max, "window edges inverted");
        let bucket = self.bucket(importance);
        let (Some(&first), Some(&last)) = (bucket.first(), bucket.last()) else {
            return &[];
        };
        if max < registry.job(first).timestamp || min > registry.job(last).timestamp {
            return &[];
        }
        let lo = bucket.partition_point(|&id| registry.job(id).timestamp < min);
        let hi = bucket.partition_point(|&id| registry.job(id).timestamp <= max);
        &bucket[lo..hi]
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryIndex;
    use crate::core::state::{JobId, JobSpec, Registry};

    fn admit(registry: &mut Registry, timestamp: u64) -> JobId {
        registry.insert(JobSpec {
            timestamp,
            process_id: 0,
            origin: "sys".into(),
            instruction: "run".into(),
            importance: 10,
            duration: 1,
        })
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut registry = Registry::default();
        let mut index = HistoryIndex::new();
        for ts in [1, 3, 3, 7, 9] {
            let id = admit(&mut registry, ts);
            index.append(10, id);
        }

        assert_eq!(index.window(&registry, 10, 3, 7), &[1, 2, 3]);
        assert_eq!(index.window(&registry, 10, 0, 100), &[0, 1, 2, 3, 4]);
        assert_eq!(index.window(&registry, 10, 9, 9), &[4]);
    }

    #[test]
    fn window_outside_the_bucket_is_empty() {
        let mut registry = Registry::default();
        let mut index = HistoryIndex::new();
        for ts in [5, 6] {
            let id = admit(&mut registry, ts);
            index.append(10, id);
        }

        assert!(index.window(&registry, 10, 0, 4).is_empty());
        assert!(index.window(&registry, 10, 7, 20).is_empty());
        assert!(index.window(&registry, 99, 0, 100).is_empty());
    }

    #[test]
    fn gap_inside_the_bucket_yields_an_empty_window() {
        let mut registry = Registry::default();
        let mut index = HistoryIndex::new();
        for ts in [1, 9] {
            let id = admit(&mut registry, ts);
            index.append(10, id);
        }

        // Both edge checks pass, but no timestamp lies inside [3, 5].
        assert!(index.window(&registry, 10, 3, 5).is_empty());
    }
}
