use super::state::{JobId, SchedState, Timestamp, MAX_IMPORTANCE, MIN_IMPORTANCE};

// Mirrors the registry against every index after each operation; all
// checks disappear in release builds.
#[derive(Debug)]
pub struct Observer {
    cpu_slots: u64,
    step: u64,
}

impl Observer {
    pub fn new(cpu_slots: u64) -> Self {
        Self { cpu_slots, step: 0 }
    }

    pub fn observe(&mut self, state: &SchedState) {
        self.step += 1;
        if !cfg!(debug_assertions) {
            return;
        }

        debug_assert_eq!(
            state.cpu_pool.len(),
            self.cpu_slots,
            "step {}: CPU pool multiplicity drifted",
            self.step
        );

        let mut queued: Vec<JobId> = state
            .registry
            .jobs()
            .iter()
            .filter(|job| job.is_queued())
            .map(|job| job.id)
            .collect();
        let mut held: Vec<JobId> = state.queue.iter_ids().collect();
        queued.sort_unstable();
        held.sort_unstable();
        debug_assert_eq!(
            queued, held,
            "step {}: queue membership drifted from registry",
            self.step
        );

        let mut arrivals: Vec<Timestamp> = queued
            .iter()
            .map(|&id| state.registry.job(id).timestamp)
            .collect();
        arrivals.sort_unstable();
        let mut mirrored: Vec<Timestamp> = Vec::with_capacity(arrivals.len());
        for (value, freq) in state.arrivals.counts() {
            mirrored.extend(std::iter::repeat(value).take(freq as usize));
        }
        debug_assert_eq!(
            arrivals, mirrored,
            "step {}: arrival tree out of sync",
            self.step
        );

        let entries = state.summary.entries();
        for pair in entries.windows(2) {
            debug_assert!(
                pair[0].ts < pair[1].ts,
                "step {}: summary log not strictly increasing",
                self.step
            );
        }
        if let Some(last) = entries.last() {
            debug_assert_eq!(
                last.ts, state.prev_timestamp,
                "step {}: summary log lags the last operation",
                self.step
            );
        }

        // History buckets stay sorted by timestamp. Duration order within
        // one timestamp is only per flush batch: a flush at an unchanged
        // timestamp (assign, or query at the open timestamp) followed by
        // further admissions there appends a second batch.
        for importance in MIN_IMPORTANCE..=MAX_IMPORTANCE {
            let bucket = state.history.bucket(importance);
            for pair in bucket.windows(2) {
                let a = state.registry.job(pair[0]);
                let b = state.registry.job(pair[1]);
                debug_assert!(
                    a.timestamp <= b.timestamp,
                    "step {}: bucket {} breaks timestamp order at jobs {}/{}",
                    self.step,
                    importance,
                    a.id,
                    b.id
                );
            }
        }
    }
}
