pub mod history;
pub mod summary;
pub mod tree;

pub use history::HistoryIndex;
pub use summary::{SummaryEntry, SummaryLog};
pub use tree::TimeTree;
