//! Fixed pool where one member at a time polls the shared queue.
//!
//! The leader hands leadership to a parked follower as soon as it has a
//! job, then runs that job itself. Followers never poll, so an enqueue
//! wakes at most one thread.

mod stack;

pub use stack::{Occupancy, TeamMemberStack};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use teamwork_core::{Job, JobQueue, Team, TeamControl, TeamError, TeamMetrics, ThreadPriority};

use crate::worker::spawn_worker;

#[derive(Debug, Clone)]
pub struct LeaderFollowerOptions {
    pub team_size: usize,
    /// How long the leader blocks on the queue before re-checking state.
    pub wait_time: Duration,
    pub thread_priority: ThreadPriority,
}

impl LeaderFollowerOptions {
    pub fn new(team_size: usize) -> Self {
        Self {
            team_size,
            wait_time: Duration::from_millis(100),
            thread_priority: ThreadPriority::Normal,
        }
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }
}

/// Marks a member finished however its loop exits.
struct MemberFinished {
    stack: Arc<TeamMemberStack>,
    index: usize,
}

impl Drop for MemberFinished {
    fn drop(&mut self) {
        self.stack.mark_finished(self.index);
    }
}

pub struct LeaderFollowerTeam {
    control: Arc<TeamControl>,
    queue: Arc<JobQueue>,
    stack: Arc<TeamMemberStack>,
    options: LeaderFollowerOptions,
    members: Mutex<Vec<JoinHandle<()>>>,
}

impl LeaderFollowerTeam {
    pub fn new(name: impl Into<String>, options: LeaderFollowerOptions) -> Self {
        Self {
            control: Arc::new(TeamControl::new(name)),
            queue: Arc::new(JobQueue::new()),
            stack: Arc::new(TeamMemberStack::new(options.team_size)),
            options,
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn occupancy(&self) -> Occupancy {
        self.stack.occupancy()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn work(
        index: usize,
        control: &TeamControl,
        queue: &JobQueue,
        stack: &TeamMemberStack,
        wait_time: Duration,
    ) {
        let mut leading = false;
        loop {
            if !leading {
                leading = stack.wait_to_be_leader(index);
                if !leading {
                    if !control.is_working() {
                        break;
                    }
                    thread::yield_now();
                    continue;
                }
            }

            match queue.dequeue_timeout(wait_time) {
                Some(job) => {
                    leading = false;
                    stack.promote_leader();
                    control.execute(job);
                }
                None if !control.is_working() => {
                    stack.promote_leader();
                    break;
                }
                None => {}
            }
        }
        debug!(team = %control.name(), member = index, "team member finished");
    }

    /// Wake every member until it reports finished, then join them.
    fn dismiss_members(&self) {
        self.stack.close();
        let handles: Vec<JoinHandle<()>> = self.members.lock().drain(..).collect();

        for index in 0..handles.len() {
            while !self.stack.is_finished(index) {
                self.stack.notify(index);
                self.queue.wake_up();
                thread::yield_now();
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                error!(team = %self.control.name(), "team member terminated abnormally");
            }
        }

        for job in self.queue.drain() {
            self.control.abandon(job);
        }
    }
}

impl Team for LeaderFollowerTeam {
    fn name(&self) -> &str {
        self.control.name()
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.control.begin()?;
        self.options.thread_priority.note_unsupported(self.control.name());

        for index in 0..self.options.team_size {
            let control = Arc::clone(&self.control);
            let queue = Arc::clone(&self.queue);
            let stack = Arc::clone(&self.stack);
            let wait_time = self.options.wait_time;
            let spawned = spawn_worker(
                self.control.name(),
                format!("{}-member-{}", self.control.name(), index),
                move || {
                    let _finished = MemberFinished {
                        stack: Arc::clone(&stack),
                        index,
                    };
                    Self::work(index, &control, &queue, &stack, wait_time);
                },
            );

            match spawned {
                Ok(handle) => self.members.lock().push(handle),
                Err(e) => {
                    self.control.request_stop();
                    self.dismiss_members();
                    return Err(e);
                }
            }
        }

        info!(
            team = %self.control.name(),
            team_size = self.options.team_size,
            "leader/follower team started"
        );
        Ok(())
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        if let Some(job) = self.control.accept(job) {
            self.queue.enqueue(job);
        }
    }

    fn stop_working(&self) {
        if self.control.request_stop() {
            self.dismiss_members();
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
    use std::sync::atomic::{AtomicBool, Ordering};

    use teamwork_core::FnJob;

    fn options(team_size: usize) -> LeaderFollowerOptions {
        LeaderFollowerOptions::new(team_size).with_wait_time(Duration::from_millis(10))
    }

    #[test]
    fn runs_every_job_once_on_at_most_k_threads() {
        let team = LeaderFollowerTeam::new("lf", options(4));
        team.start_working().unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..200 {
            let log = Arc::clone(&log);
            team.assign_job(
                FnJob::new(move |_| log.lock().push((id, thread::current().id()))).boxed(),
            );
        }
        team.stop_working();

        let log = log.lock();
        let ids: HashSet<_> = log.iter().map(|(id, _)| *id).collect();
        assert_eq!(log.len(), 200);
        assert_eq!(ids.len(), 200);
        let threads: HashSet<_> = log.iter().map(|(_, t)| *t).collect();
        assert!(threads.len() <= 4, "{} threads", threads.len());

        let occupancy = team.occupancy();
        assert!(occupancy.peak_parked <= 3);
        assert_eq!(occupancy.peak_polling, 1);
    }

    #[test]
    fn single_member_team_makes_progress() {
        let team = LeaderFollowerTeam::new("lf-one", options(1));
        team.start_working().unwrap();

        let ran = Arc::new(Mutex::new(0));
        for _ in 0..20 {
            let ran = Arc::clone(&ran);
            team.assign_job(FnJob::new(move |_| *ran.lock() += 1).boxed());
        }
        team.stop_working();
        assert_eq!(*ran.lock(), 20);
        assert_eq!(team.occupancy().peak_parked, 0);
    }

    #[test]
    fn member_survives_panicking_job() {
        let team = LeaderFollowerTeam::new("lf-panic", options(2));
        team.start_working().unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        team.assign_job(FnJob::new(|_| panic!("bad job")).boxed());
        team.assign_job(FnJob::new(move |_| flag.store(true, Ordering::SeqCst)).boxed());
        team.stop_working();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(team.metrics().jobs_panicked, 1);
    }

    #[test]
    fn stop_twice_and_assign_after_stop() {
        let team = LeaderFollowerTeam::new("lf-stop", options(3));
        team.start_working().unwrap();
        team.stop_working();
        team.stop_working();

        team.assign_job(FnJob::new(|_| {}).boxed());
        assert_eq!(team.metrics().jobs_cancelled_not_working, 1);
        assert_eq!(team.queued(), 0);
    }
}
