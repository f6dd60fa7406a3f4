use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use jiff::Timestamp;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{engine_params::Threads, error::JobError};

/// Outcome of one scheduling round. `results` follows the order of the submitted
/// subproblems and only holds the ones that were dispatched.
#[derive(Debug)]
pub struct ScheduleReport<T> {
    pub results: Vec<(usize, T)>,
    pub dispatched: usize,
    pub skipped: usize,
}

/// Runs independent subproblems on a fixed-size worker pool.
pub struct ParallelScheduler {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl ParallelScheduler {
    pub fn new(threads: &Threads) -> Result<Self, JobError> {
        let threads = threads.number_of_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("courier-worker-{index}"))
            .build()?;

        info!(threads, "Worker pool ready");
        Ok(ParallelScheduler { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `op` inside the pool so nested rayon work uses its threads.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Solves every subproblem unless `deadline` passes first. The deadline is checked
    /// before each dispatch; subproblems already running are never interrupted.
    pub fn run<S, T, F>(
        &self,
        subproblems: &[S],
        deadline: Option<Timestamp>,
        solve: F,
    ) -> ScheduleReport<T>
    where
        S: Sync,
        T: Send,
        F: Fn(&S) -> T + Sync,
    {
        let slots: Vec<Mutex<Option<T>>> = subproblems.iter().map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);
        let dispatched = AtomicUsize::new(0);
        let expired = AtomicBool::new(false);
        let workers = self.threads.min(subproblems.len());

        self.pool.scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|_| {
                    loop {
                        if expired.load(Ordering::Relaxed) {
                            break;
                        }

                        if deadline.is_some_and(|deadline| Timestamp::now() >= deadline) {
                            expired.store(true, Ordering::Relaxed);
                            break;
                        }

                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= subproblems.len() {
                            break;
                        }

                        dispatched.fetch_add(1, Ordering::Relaxed);
                        let result = solve(&subproblems[index]);
                        *slots[index].lock() = Some(result);
                    }
                });
            }
        });

        let results: Vec<(usize, T)> = slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.into_inner().map(|result| (index, result)))
            .collect();

        let dispatched = dispatched.into_inner();
        let skipped = subproblems.len() - dispatched;

        if skipped > 0 {
            warn!(dispatched, skipped, "Deadline exceeded, subproblems skipped");
        } else {
            debug!(dispatched, "All subproblems dispatched");
        }

        ScheduleReport {
            results,
            dispatched,
            skipped,
        }
    }
}

impl std::fmt::Debug for ParallelScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelScheduler")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;

    #[test]
    fn test_results_follow_submission_order() {
        let scheduler = ParallelScheduler::new(&Threads::Multi(4)).unwrap();
        let subproblems: Vec<u64> = (0..50).collect();

        let report = scheduler.run(&subproblems, None, |&n| {
            // uneven work so completion order differs from submission order
            std::thread::sleep(std::time::Duration::from_micros((50 - n) * 20));
            n * n
        });

        assert_eq!(report.dispatched, 50);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            report.results,
            (0..50u64).map(|n| (n as usize, n * n)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_expired_deadline_dispatches_nothing() {
        let scheduler = ParallelScheduler::new(&Threads::Multi(2)).unwrap();
        let calls = AtomicUsize::new(0);
        let past = Timestamp::now() - SignedDuration::from_secs(60);

        let report = scheduler.run(&[1, 2, 3], Some(past), |n: &i32| {
            calls.fetch_add(1, Ordering::Relaxed);
            *n
        });

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.skipped, 3);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_deadline_reached_midway() {
        let scheduler = ParallelScheduler::new(&Threads::Single).unwrap();
        let deadline = Timestamp::now() + SignedDuration::from_millis(100);

        let report = scheduler.run(&[0u64; 20], Some(deadline), |_| {
            std::thread::sleep(std::time::Duration::from_millis(30));
        });

        assert!(report.dispatched >= 1 && report.dispatched < 20);
        assert_eq!(report.dispatched + report.skipped, 20);
        assert_eq!(report.results.len(), report.dispatched);
        // a single worker dispatches in order
        assert!(report.results.iter().enumerate().all(|(i, (index, _))| i == *index));
    }
}
