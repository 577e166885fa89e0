pub mod driver;
pub mod observer;
pub mod queue;
pub mod state;

pub use driver::{SchedCore, Selector};
pub use state::{Job, JobId, JobSpec, Registry, SchedState, Timestamp};
