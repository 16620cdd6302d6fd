//! Bounded graceful shutdown of executor-backed teams.
//!
//! Log output is captured with a scoped tracing subscriber so the shutdown
//! warning can be asserted on directly.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use teamwork_core::{FnJob, Job, Team};
use teamwork_teams::{ExecutorOptions, ExecutorTeam};

const JOB_MS: u64 = 50;

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with WARN-and-above events on this thread captured.
fn capture_warnings(f: impl FnOnce()) -> String {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    log.contents()
}

fn sleeping_job(ms: u64, done: &Arc<AtomicUsize>) -> Box<dyn Job> {
    let done = Arc::clone(done);
    FnJob::new(move |_| {
        thread::sleep(Duration::from_millis(ms));
        done.fetch_add(1, Ordering::SeqCst);
    })
    .boxed()
}

fn run_shutdown(options: ExecutorOptions, jobs: usize, job_ms: u64) -> (ExecutorTeam, Arc<AtomicUsize>, Duration, String) {
    let team = ExecutorTeam::new("exec-shutdown", options);
    team.start_working().unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..jobs {
        team.assign_job(sleeping_job(job_ms, &done));
    }

    let mut elapsed = Duration::ZERO;
    let log = capture_warnings(|| {
        let started = Instant::now();
        team.stop_working();
        elapsed = started.elapsed();
    });
    (team, done, elapsed, log)
}

#[test]
fn fixed_pool_finishes_within_wait_without_warning() {
    let options = ExecutorOptions::fixed(4).with_max_shutdown_wait(Duration::from_millis(JOB_MS * 2 * 10));
    let (team, done, _, log) = run_shutdown(options, 4, JOB_MS);

    assert_eq!(done.load(Ordering::SeqCst), 4);
    assert!(!log.contains("did not terminate"), "unexpected warning: {log}");
    assert_eq!(team.metrics().shutdown_timeouts, 0);
}

#[test]
fn cached_pool_finishes_within_wait_without_warning() {
    let options = ExecutorOptions::cached(0, 4, Duration::from_millis(20))
        .with_max_shutdown_wait(Duration::from_millis(JOB_MS * 2 * 10));
    let (team, done, _, log) = run_shutdown(options, 4, JOB_MS);

    assert_eq!(done.load(Ordering::SeqCst), 4);
    assert!(!log.contains("did not terminate"), "unexpected warning: {log}");
    assert_eq!(team.metrics().shutdown_timeouts, 0);
}

#[test]
fn one_wave_of_jobs_fits_twice_the_job_time() {
    let wait = Duration::from_millis(JOB_MS * 2);
    for options in [
        ExecutorOptions::fixed(4),
        ExecutorOptions::cached(0, 4, Duration::from_secs(1)),
    ] {
        let (team, done, elapsed, log) = run_shutdown(options.with_max_shutdown_wait(wait), 4, JOB_MS);

        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert!(elapsed < wait, "returned after {elapsed:?}");
        assert!(!log.contains("did not terminate"), "unexpected warning: {log}");
        let metrics = team.metrics();
        assert_eq!(metrics.shutdown_timeouts, 0);
        assert_eq!(metrics.jobs_abandoned, 0);
    }
}

#[test]
fn slow_jobs_hit_the_bound_and_warn() {
    let wait = Duration::from_millis(JOB_MS * 2);
    let options = ExecutorOptions::cached(0, 2, Duration::from_secs(1)).with_max_shutdown_wait(wait);
    let (team, _, elapsed, log) = run_shutdown(options, 4, JOB_MS * 10);

    assert!(elapsed >= wait, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(JOB_MS * 10), "returned after {elapsed:?}");
    assert!(log.contains("did not terminate"), "missing warning in: {log}");
    assert!(log.contains("exec-shutdown"));

    let metrics = team.metrics();
    assert_eq!(metrics.shutdown_timeouts, 1);
    // Two jobs were running; the two still queued are abandoned.
    assert_eq!(metrics.jobs_abandoned, 2);
}
