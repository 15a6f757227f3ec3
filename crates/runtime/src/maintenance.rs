//! Background maintenance worker
//!
//! Snapshot persistence, pruning, and log trimming run off the write
//! path on a dedicated worker. The queue is bounded; under sustained
//! pressure the oldest pending task is dropped, which is safe because
//! every task is a superseded-by-newer housekeeping step.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

/// A queued unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    shutting_down: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    depth: usize,
}

/// Single-worker task scheduler with a bounded drop-oldest queue.
pub struct MaintenanceScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    /// Spawns the worker thread. `depth` bounds the pending queue; it
    /// must be at least 1.
    pub fn new(depth: usize) -> MaintenanceScheduler {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                shutting_down: false,
            }),
            available: Condvar::new(),
            depth: depth.max(1),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("fabriclog-maintenance".into())
            .spawn(move || run_worker(worker_shared))
            .ok();
        if worker.is_none() {
            error!("failed to spawn maintenance worker; tasks will be dropped");
        }

        MaintenanceScheduler { shared, worker }
    }

    /// Enqueues `task`, evicting the oldest pending task if the queue is
    /// full. Tasks submitted after shutdown began are discarded.
    pub fn submit(&self, task: Task) {
        let mut queue = self.shared.queue.lock();
        if queue.shutting_down || self.worker.is_none() {
            return;
        }
        if queue.tasks.len() >= self.shared.depth {
            queue.tasks.pop_front();
            warn!(depth = self.shared.depth, "maintenance queue full, dropped oldest task");
        }
        queue.tasks.push_back(task);
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Pending tasks not yet picked up by the worker.
    pub fn backlog(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutting_down = true;
        }
        self.shared.available.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("maintenance worker terminated abnormally");
            }
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.shutting_down {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        // A panicking task must not take the worker down with it.
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("maintenance task panicked");
        } else {
            debug!("maintenance task completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn await_backlog_drained(scheduler: &MaintenanceScheduler) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.backlog() > 0 {
            assert!(Instant::now() < deadline, "worker stalled");
            std::thread::sleep(Duration::from_millis(1));
        }
        // backlog hits zero when the last task is picked up, not when it
        // finishes; give the in-flight task a moment
        std::thread::sleep(Duration::from_millis(50));
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let scheduler = MaintenanceScheduler::new(16);
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..8 {
            let log = Arc::clone(&log);
            scheduler.submit(Box::new(move || log.lock().push(i)));
        }
        await_backlog_drained(&scheduler);
        drop(scheduler);
        assert_eq!(log.lock().clone(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_drop_waits_for_queued_work() {
        let scheduler = MaintenanceScheduler::new(16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            scheduler.submit(Box::new(move || {
                std::thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(scheduler);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let scheduler = MaintenanceScheduler::new(2);
        let executed = Arc::new(Mutex::new(Vec::new()));

        // jam the worker so submissions pile up
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        {
            let gate = Arc::clone(&gate);
            scheduler.submit(Box::new(move || {
                let (lock, cvar) = &*gate;
                let mut open = lock.lock();
                while !*open {
                    cvar.wait(&mut open);
                }
            }));
        }
        // wait until the worker holds the blocker and the queue is empty
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.backlog() > 0 {
            assert!(Instant::now() < deadline, "worker never picked up blocker");
            std::thread::sleep(Duration::from_millis(1));
        }

        for i in 0..5 {
            let executed = Arc::clone(&executed);
            scheduler.submit(Box::new(move || executed.lock().push(i)));
        }
        assert_eq!(scheduler.backlog(), 2);

        let (lock, cvar) = &*gate;
        *lock.lock() = true;
        cvar.notify_all();
        drop(scheduler);

        // only the two newest survived
        assert_eq!(executed.lock().clone(), vec![3, 4]);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let scheduler = MaintenanceScheduler::new(16);
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler.submit(Box::new(|| panic!("task bug")));
        let c = Arc::clone(&counter);
        scheduler.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        drop(scheduler);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
