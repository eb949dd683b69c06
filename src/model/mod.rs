pub mod job;
pub mod schedule;
pub mod stats;

pub use job::{derive_state, JobKind, JobRecord, JobState, RawJob};
pub use schedule::Schedule;
pub use stats::{Rank, RawStat, StatsIndex};
