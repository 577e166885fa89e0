use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::queue::ReadyQueue;
use crate::index::history::HistoryIndex;
use crate::index::summary::SummaryLog;
use crate::index::tree::TimeTree;

// Index into the registry's job Vec
pub type JobId = usize;
pub type Timestamp = u64;

// Importance is bounded, which is what lets the ready heaps and history
// buckets live in a flat per-level array.
pub const MIN_IMPORTANCE: u64 = 1;
pub const MAX_IMPORTANCE: u64 = 100;
pub const IMPORTANCE_LEVELS: usize = MAX_IMPORTANCE as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginId(u32);

// Jobs store an OriginId so filter queries compare ids instead of strings.
#[derive(Debug, Default)]
pub struct OriginTable {
    names: Vec<Arc<str>>,
    ids: FxHashMap<Arc<str>, OriginId>,
}

impl OriginTable {
    pub fn intern(&mut self, name: &str) -> OriginId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = OriginId(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.ids.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<OriginId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: OriginId) -> &str {
        &self.names[id.0 as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub timestamp: Timestamp,
    pub process_id: u64,
    pub origin: String,
    pub instruction: String,
    pub importance: u64,
    pub duration: u64,
}

// Immutable except queue_exit, which is set once when a CPU is allotted.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub timestamp: Timestamp,
    pub process_id: u64,
    pub origin: OriginId,
    pub instruction: String,
    pub importance: u64,
    pub duration: u64,
    pub queue_exit: Option<Timestamp>,
}

impl Job {
    pub fn is_queued(&self) -> bool {
        self.queue_exit.is_none()
    }

    pub fn waiting_at(&self, at: Timestamp) -> bool {
        self.timestamp <= at && self.queue_exit.map_or(true, |exit| at < exit)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    jobs: Vec<Job>,
    origins: OriginTable,
}

impl Registry {
    pub fn insert(&mut self, spec: JobSpec) -> JobId {
        let id = self.jobs.len();
        let origin = self.origins.intern(&spec.origin);
        self.jobs.push(Job {
            id,
            timestamp: spec.timestamp,
            process_id: spec.process_id,
            origin,
            instruction: spec.instruction,
            importance: spec.importance,
            duration: spec.duration,
            queue_exit: None,
        });
        id
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id]
    }

    pub fn mark_assigned(&mut self, id: JobId, at: Timestamp) {
        let job = &mut self.jobs[id];
        debug_assert!(job.queue_exit.is_none(), "job {id} assigned twice");
        job.queue_exit = Some(at);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn origins(&self) -> &OriginTable {
        &self.origins
    }

    pub fn line(&self, id: JobId) -> JobLine<'_> {
        JobLine { registry: self, id }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JobLine<'a> {
    registry: &'a Registry,
    id: JobId,
}

impl fmt::Display for JobLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let job = self.registry.job(self.id);
        write!(
            f,
            "job {} {} {} {} {} {}",
            job.timestamp,
            job.process_id,
            self.registry.origins.name(job.origin),
            job.instruction,
            job.importance,
            job.duration
        )
    }
}

#[derive(Debug)]
pub struct SchedState {
    pub registry: Registry,
    pub queue: ReadyQueue,
    // Free-after times; total multiplicity stays at the configured CPU count.
    pub cpu_pool: TimeTree,
    // Arrival timestamps of currently-waiting jobs.
    pub arrivals: TimeTree,
    pub summary: SummaryLog,
    pub history: HistoryIndex,
    pub prev_timestamp: Timestamp,
}

impl SchedState {
    pub fn new(num_cpus: u64) -> Self {
        let mut cpu_pool = TimeTree::new();
        cpu_pool.insert_count(0, num_cpus);
        Self {
            registry: Registry::default(),
            queue: ReadyQueue::new(),
            cpu_pool,
            arrivals: TimeTree::new(),
            summary: SummaryLog::new(),
            history: HistoryIndex::new(),
            prev_timestamp: 0,
        }
    }

    pub fn flush_staging(&mut self) {
        self.queue.flush_all(&self.registry, &mut self.history);
    }

    pub fn record_summary(&mut self, ts: Timestamp) {
        let window = self.arrivals.min().zip(self.arrivals.max());
        self.summary.record(ts, window);
    }
}

#[cfg(test)]
mod tests {
    use super::{JobSpec, Registry};

    fn spec(timestamp: u64, origin: &str) -> JobSpec {
        JobSpec {
            timestamp,
            process_id: 42,
            origin: origin.into(),
            instruction: "compile".into(),
            importance: 7,
            duration: 3,
        }
    }

    #[test]
    fn origins_are_interned_once() {
        let mut registry = Registry::default();
        let a = registry.insert(spec(1, "sysA"));
        let b = registry.insert(spec(2, "sysB"));
        let c = registry.insert(spec(3, "sysA"));

        assert_eq!(registry.job(a).origin, registry.job(c).origin);
        assert_ne!(registry.job(a).origin, registry.job(b).origin);
        assert_eq!(
            registry.origins().lookup("sysB"),
            Some(registry.job(b).origin)
        );
        assert_eq!(registry.origins().lookup("sysC"), None);
    }

    #[test]
    fn waiting_window_is_half_open_on_exit() {
        let mut registry = Registry::default();
        let id = registry.insert(spec(5, "sysA"));
        assert!(!registry.job(id).waiting_at(4));
        assert!(registry.job(id).waiting_at(5));
        assert!(registry.job(id).waiting_at(9));

        registry.mark_assigned(id, 8);
        assert!(registry.job(id).waiting_at(7));
        assert!(!registry.job(id).waiting_at(8));
        assert!(!registry.job(id).is_queued());
    }

    #[test]
    fn line_preserves_submission_fields() {
        let mut registry = Registry::default();
        let id = registry.insert(spec(9, "sysA"));
        assert_eq!(registry.line(id).to_string(), "job 9 42 sysA compile 7 3");
    }
}
