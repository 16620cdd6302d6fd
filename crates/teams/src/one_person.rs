use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, warn};

use teamwork_core::{Job, JobQueue, Team, TeamControl, TeamError, TeamMetrics, ThreadPriority};

use crate::worker::spawn_worker;

/// Tuning for [`OnePersonTeam`].
#[derive(Debug, Clone)]
pub struct OnePersonOptions {
    /// How long the worker blocks on its queue before re-checking the stop flag.
    pub wait_time: Duration,
    pub thread_priority: ThreadPriority,
    /// Sleep between checks while `stop_working` waits for the worker.
    pub poll_interval: Duration,
}

impl Default for OnePersonOptions {
    fn default() -> Self {
        Self {
            wait_time: Duration::from_millis(100),
            thread_priority: ThreadPriority::Normal,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A single dedicated worker thread draining its own queue.
pub struct OnePersonTeam {
    control: Arc<TeamControl>,
    queue: Arc<JobQueue>,
    options: OnePersonOptions,
    finished: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Marks the worker finished however its loop exits.
struct FinishedOnDrop(Arc<AtomicBool>);

impl Drop for FinishedOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl OnePersonTeam {
    pub fn new(name: impl Into<String>, options: OnePersonOptions) -> Self {
        Self {
            control: Arc::new(TeamControl::new(name)),
            queue: Arc::new(JobQueue::new()),
            options,
            finished: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Jobs waiting for the worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn work(control: &TeamControl, queue: &JobQueue, wait_time: Duration) {
        loop {
            match queue.dequeue_timeout(wait_time) {
                Some(job) => {
                    control.execute(job);
                }
                // Only leave once stopped and nothing is left to run.
                None if !control.is_working() => break,
                None => {}
            }
        }
    }
}

impl Team for OnePersonTeam {
    fn name(&self) -> &str {
        self.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        if let Err(e) = self.control.begin() {
            warn!(team = %self.control.name(), error = %e, "one person team cannot start twice");
            return Err(e);
        }
        self.options.thread_priority.note_unsupported(self.control.name());

        let control = Arc::clone(&self.control);
        let queue = Arc::clone(&self.queue);
        let finished = Arc::clone(&self.finished);
        let wait_time = self.options.wait_time;
        let spawned = spawn_worker(
            self.control.name(),
            format!("{}-worker", self.control.name()),
            move || {
                let _finished = FinishedOnDrop(finished);
                Self::work(&control, &queue, wait_time);
            },
        );

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.control.request_stop();
                Err(e)
            }
        }
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        if let Some(job) = self.control.accept(job) {
            self.queue.enqueue(job);
        }
    }

    fn stop_working(&self) {
        if !self.control.request_stop() {
            return;
        }
        self.queue.wake_up();

        if let Some(handle) = self.worker.lock().take() {
            while !self.finished.load(Ordering::SeqCst) {
                thread::sleep(self.options.poll_interval);
            }
            if handle.join().is_err() {
                error!(team = %self.control.name(), "worker thread terminated abnormally");
            }
        }

        // Anything assigned while the worker was leaving.
        for job in self.queue.drain() {
            self.control.abandon(job);
        }
    }

    fn metrics(&self) -> TeamMetrics {
        self.control.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Instant;

    use teamwork_core::FnJob;

    fn fast_options() -> OnePersonOptions {
        OnePersonOptions {
            wait_time: Duration::from_millis(10),
            poll_interval: Duration::from_millis(5),
            ..OnePersonOptions::default()
        }
    }

    #[test]
    fn runs_jobs_in_order_on_one_thread() {
        let team = OnePersonTeam::new("solo", fast_options());
        team.start_working().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let log = Arc::clone(&log);
            team.assign_job(
                FnJob::new(move |_| log.lock().push((i, thread::current().id()))).boxed(),
            );
        }
        team.stop_working();

        let log = log.lock();
        assert_eq!(log.len(), 50);
        assert!(log.windows(2).all(|w| w[0].0 < w[1].0));
        let threads: HashSet<_> = log.iter().map(|(_, t)| *t).collect();
        assert_eq!(threads.len(), 1);
        assert!(!threads.contains(&thread::current().id()));
    }

    #[test]
    fn second_start_is_an_error() {
        let team = OnePersonTeam::new("solo-twice", fast_options());
        team.start_working().unwrap();
        assert!(matches!(team.start_working(), Err(TeamError::AlreadyStarted(_))));
        team.stop_working();
    }

    #[test]
    fn stop_waits_for_in_flight_job() {
        let team = OnePersonTeam::new("solo-slow", fast_options());
        team.start_working().unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        team.assign_job(
            FnJob::new(move |_| {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
            .boxed(),
        );
        // Let the worker pick the job up.
        thread::sleep(Duration::from_millis(10));

        let started = Instant::now();
        team.stop_working();
        assert!(done.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn worker_survives_panicking_job() {
        let team = OnePersonTeam::new("solo-panic", fast_options());
        team.start_working().unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        team.assign_job(FnJob::new(|_| panic!("bad job")).boxed());
        team.assign_job(FnJob::new(move |_| flag.store(true, Ordering::SeqCst)).boxed());
        team.stop_working();

        assert!(ran.load(Ordering::SeqCst));
        let metrics = team.metrics();
        assert_eq!(metrics.jobs_executed, 2);
        assert_eq!(metrics.jobs_panicked, 1);
    }

    #[test]
    fn stop_is_idempotent_and_safe_before_start() {
        let never_started = OnePersonTeam::new("solo-idle", fast_options());
        never_started.stop_working();
        never_started.stop_working();

        let team = OnePersonTeam::new("solo-stop", fast_options());
        team.start_working().unwrap();
        team.stop_working();
        team.stop_working();
        assert_eq!(team.queued(), 0);
    }
}
