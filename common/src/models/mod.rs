// Domain models shared by templates, indexes, the pool and the scheduler

pub mod bounded;
pub mod interval;
pub mod interval_map;
pub mod serde_ext;

use chrono::{DateTime, FixedOffset};

pub use bounded::BoundedInterval;
pub use interval::{ActualInterval, ScheduleInterval};
pub use interval_map::IntervalMap;

/// Timezone-aware instant used throughout the engine
pub type Timestamp = DateTime<FixedOffset>;
