pub mod protocol;
pub mod scheduler;
pub mod worker;

pub use scheduler::{ScheduleOutcome, Scheduler};
pub use worker::{spawn_pool, ThreadWorker, WorkerLink};
