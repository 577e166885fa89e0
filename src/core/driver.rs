use tracing::debug;

use super::observer::Observer;
use super::state::{JobId, JobSpec, Registry, SchedState, Timestamp, MAX_IMPORTANCE, MIN_IMPORTANCE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    TopK(u64),
    Origin(String),
}

#[derive(Debug)]
pub struct SchedCore {
    state: SchedState,
    observer: Observer,
}

impl SchedCore {
    pub fn new(num_cpus: u64) -> Self {
        Self {
            state: SchedState::new(num_cpus),
            observer: Observer::new(num_cpus),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    pub fn admit(&mut self, spec: JobSpec) -> JobId {
        let state = &mut self.state;
        let ts = spec.timestamp;
        debug_assert!(ts >= state.prev_timestamp, "admission timestamps regress");
        if ts > state.prev_timestamp {
            state.flush_staging();
        }
        state.prev_timestamp = ts;

        let id = state.registry.insert(spec);
        state.queue.stage(&state.registry, &mut state.history, id);
        state.arrivals.insert(ts);
        state.record_summary(ts);

        debug!(job = id, ts, "admitted");
        self.observer.observe(&self.state);
        id
    }

    pub fn assign(&mut self, ts: Timestamp, slots: u64) -> Vec<JobId> {
        let state = &mut self.state;
        state.flush_staging();
        state.prev_timestamp = ts;

        let free = state.cpu_pool.count_at_most(ts);
        let quota = slots.min(free);
        let picked = state.queue.drain_highest(quota as usize);
        for &id in &picked {
            let (arrival, duration) = {
                let job = state.registry.job(id);
                (job.timestamp, job.duration)
            };
            state.registry.mark_assigned(id, ts);
            state.cpu_pool.consume_at_most(ts);
            state.cpu_pool.insert(ts.saturating_add(duration));
            state.arrivals.remove(arrival);
        }
        state.record_summary(ts);

        debug!(ts, requested = slots, free, assigned = picked.len(), "assign");
        self.observer.observe(&self.state);
        picked
    }

    pub fn query(&mut self, at: Timestamp, selector: &Selector) -> Vec<JobId> {
        // A query at or past the open timestamp must see jobs still
        // sitting in staging. Queries never advance prev_timestamp.
        if at >= self.state.prev_timestamp {
            self.state.flush_staging();
        }
        self.observer.observe(&self.state);

        let state = &self.state;
        let mut out = Vec::new();
        // Membership only changes at command timestamps, so `at` collapses
        // to the summary entry at or before it.
        let Some(entry) = state.summary.floor(at) else {
            return out;
        };
        if entry.is_empty_window() {
            return out;
        }
        let (min, max) = (entry.min_arrival, entry.max_arrival);

        match selector {
            Selector::TopK(k) => {
                let quota = *k as usize;
                if quota == 0 {
                    return out;
                }
                'levels: for importance in (MIN_IMPORTANCE..=MAX_IMPORTANCE).rev() {
                    for &id in state.history.window(&state.registry, importance, min, max) {
                        let job = state.registry.job(id);
                        if job.timestamp > at {
                            break;
                        }
                        if job.waiting_at(at) {
                            out.push(id);
                            if out.len() == quota {
                                break 'levels;
                            }
                        }
                    }
                }
            }
            Selector::Origin(name) => {
                let Some(origin) = state.registry.origins().lookup(name) else {
                    return out;
                };
                for importance in (MIN_IMPORTANCE..=MAX_IMPORTANCE).rev() {
                    for &id in state.history.window(&state.registry, importance, min, max) {
                        let job = state.registry.job(id);
                        if job.timestamp > at {
                            break;
                        }
                        if job.origin == origin && job.waiting_at(at) {
                            out.push(id);
                        }
                    }
                }
            }
        }

        debug!(at, matched = out.len(), "query");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{SchedCore, Selector};
    use crate::core::state::JobSpec;

    fn spec(timestamp: u64, importance: u64, duration: u64) -> JobSpec {
        JobSpec {
            timestamp,
            process_id: 1,
            origin: "sys".into(),
            instruction: "run".into(),
            importance,
            duration,
        }
    }

    #[test]
    fn assign_caps_at_free_cpus() {
        let mut core = SchedCore::new(1);
        let a = core.admit(spec(1, 50, 100));
        let b = core.admit(spec(2, 80, 1));

        // One CPU, so only the more important job goes out.
        assert_eq!(core.assign(3, 5), vec![b]);
        // The lone CPU is busy until t=4; nothing else fits at t=3.
        assert_eq!(core.assign(3, 5), Vec::new());
        assert_eq!(core.assign(4, 5), vec![a]);
    }

    #[test]
    fn assign_on_empty_queue_still_records_the_summary() {
        let mut core = SchedCore::new(2);
        assert_eq!(core.assign(7, 3), Vec::new());
        assert_eq!(core.state.summary.entries().len(), 1);
        assert!(core.state.summary.entries()[0].is_empty_window());
    }

    #[test]
    fn query_at_the_open_timestamp_flushes_staging() {
        let mut core = SchedCore::new(1);
        let id = core.admit(spec(5, 10, 2));
        assert!(core.state.queue.has_staged());

        // Earlier than the open timestamp: stragglers stay staged.
        assert_eq!(core.query(4, &Selector::TopK(5)), Vec::new());
        assert!(core.state.queue.has_staged());

        assert_eq!(core.query(5, &Selector::TopK(5)), vec![id]);
        assert!(!core.state.queue.has_staged());
    }

    #[test]
    fn query_before_any_admission_is_empty() {
        let mut core = SchedCore::new(2);
        assert_eq!(core.query(0, &Selector::TopK(3)), Vec::new());

        core.admit(spec(5, 10, 2));
        assert_eq!(core.query(4, &Selector::TopK(3)), Vec::new());
    }

    #[test]
    fn query_top_zero_is_empty() {
        let mut core = SchedCore::new(1);
        core.admit(spec(1, 10, 2));
        assert_eq!(core.query(1, &Selector::TopK(0)), Vec::new());
    }

    #[test]
    fn query_sees_assigned_jobs_before_their_exit() {
        let mut core = SchedCore::new(1);
        let id = core.admit(spec(1, 50, 10));
        assert_eq!(core.assign(2, 1), vec![id]);

        assert_eq!(core.query(1, &Selector::TopK(5)), vec![id]);
        assert_eq!(core.query(2, &Selector::TopK(5)), Vec::new());
    }

    #[test]
    fn unknown_origin_matches_nothing() {
        let mut core = SchedCore::new(1);
        core.admit(spec(1, 10, 1));
        assert_eq!(
            core.query(1, &Selector::Origin("nowhere".into())),
            Vec::new()
        );
    }
}
