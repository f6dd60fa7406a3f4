mod parallel_scheduler;

pub use parallel_scheduler::{ParallelScheduler, ScheduleReport};
