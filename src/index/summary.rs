use crate::core::state::Timestamp;

// Min/max arrival time among jobs still waiting after the operations at
// `ts` completed; min > max encodes an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryEntry {
    pub ts: Timestamp,
    pub min_arrival: Timestamp,
    pub max_arrival: Timestamp,
}

impl SummaryEntry {
    pub fn is_empty_window(&self) -> bool {
        self.max_arrival < self.min_arrival
    }
}

// One entry per distinct event timestamp, strictly increasing in `ts`.
#[derive(Debug, Default)]
pub struct SummaryLog {
    entries: Vec<SummaryEntry>,
}

// Sentinel window recorded while no job is waiting.
const EMPTY_WINDOW: (Timestamp, Timestamp) = (1, 0);

impl SummaryLog {
    pub fn new() -> Self {
        Self::default()
    }

    // Overwrites the last entry when the timestamp repeats, appends
    // otherwise. `window` is None when no job is waiting.
    pub fn record(&mut self, ts: Timestamp, window: Option<(Timestamp, Timestamp)>) {
        let (min_arrival, max_arrival) = window.unwrap_or(EMPTY_WINDOW);
        match self.entries.last_mut() {
            Some(last) if last.ts == ts => {
                last.min_arrival = min_arrival;
                last.max_arrival = max_arrival;
            }
            _ => self.entries.push(SummaryEntry {
                ts,
                min_arrival,
                max_arrival,
            }),
        }
    }

    pub fn floor(&self, at: Timestamp) -> Option<&SummaryEntry> {
        let idx = self.entries.partition_point(|e| e.ts <= at);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }
}
