//! Background scheduling for periodic sync passes.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig};
