mod ingest;
mod scheduler;

use chrono::{DateTime, Utc};

pub use ingest::{parse_pub_date, Ingestor};
pub use scheduler::{CycleReport, Scheduler};

/// Source of "now" for fetch timestamps and post creation times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
