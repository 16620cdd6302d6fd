//! Thread affinity of process-context teams across several concurrent processes.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use teamwork_core::{FnJob, Job, ProcessIdentifier, Team};
use teamwork_teams::{ProcessCompletion, ProcessContextOptions, ProcessContextTeam};

const TIMEOUT: Duration = Duration::from_secs(5);

fn options() -> ProcessContextOptions {
    ProcessContextOptions {
        wait_time: Duration::from_millis(10),
        shutdown_poll: Duration::from_millis(5),
        max_shutdown_wait: Duration::from_secs(5),
    }
}

fn reporting_job(process: ProcessIdentifier, tx: &mpsc::Sender<(ProcessIdentifier, ThreadId)>) -> Box<dyn Job> {
    let tx = tx.clone();
    FnJob::new(move |_| tx.send((process, thread::current().id())).unwrap())
        .with_process(process)
        .boxed()
}

/// Spawn a thread that creates `process` inside `do_process` and hands
/// back its completion handle.
fn start_process(
    team: &Arc<ProcessContextTeam>,
    process: ProcessIdentifier,
) -> (thread::JoinHandle<ThreadId>, ProcessCompletion) {
    let (ready_tx, ready_rx) = mpsc::channel();
    let origin_team = Arc::clone(team);
    let handle = thread::spawn(move || {
        let listener = origin_team.process_listener().expect("listener");
        origin_team
            .do_process(|completion| {
                listener.process_created(process);
                ready_tx.send(completion).unwrap();
            })
            .unwrap();
        thread::current().id()
    });
    let completion = ready_rx.recv_timeout(TIMEOUT).unwrap();
    (handle, completion)
}

#[test]
fn each_process_runs_on_its_own_origin_thread() {
    let team = Arc::new(ProcessContextTeam::new("pc-many", options()));
    team.start_working().unwrap();

    let processes: Vec<ProcessIdentifier> = (0..3).map(|_| ProcessIdentifier::new()).collect();
    let origins: Vec<_> = processes.iter().map(|p| start_process(&team, *p)).collect();

    let (tx, rx) = mpsc::channel();
    let assigners: Vec<_> = (0..2)
        .map(|_| {
            let team = Arc::clone(&team);
            let tx = tx.clone();
            let processes = processes.clone();
            thread::spawn(move || {
                for process in processes.iter().cycle().take(30) {
                    team.assign_job(reporting_job(*process, &tx));
                }
            })
        })
        .collect();
    for assigner in assigners {
        assigner.join().unwrap();
    }
    drop(tx);

    let mut seen = Vec::new();
    let deadline = Instant::now() + TIMEOUT;
    while seen.len() < 60 && Instant::now() < deadline {
        if let Ok(entry) = rx.recv_timeout(Duration::from_millis(50)) {
            seen.push(entry);
        }
    }
    assert_eq!(seen.len(), 60);

    let mut origin_threads = Vec::new();
    for (handle, completion) in origins {
        completion.complete();
        origin_threads.push(handle.join().unwrap());
    }
    for (process, ran_on) in seen {
        let index = processes.iter().position(|p| *p == process).unwrap();
        assert_eq!(ran_on, origin_threads[index]);
    }
    assert_eq!(team.metrics().passive_fallbacks, 0);
    team.stop_working();
}

#[test]
fn completed_process_falls_back_to_assigning_thread() {
    let team = Arc::new(ProcessContextTeam::new("pc-fallback", options()));
    team.start_working().unwrap();
    let process = ProcessIdentifier::new();
    let (origin, completion) = start_process(&team, process);

    completion.complete();
    origin.join().unwrap();
    team.process_listener().unwrap().process_completed(process);

    let (tx, rx) = mpsc::channel();
    team.assign_job(reporting_job(process, &tx));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (process, thread::current().id()));
    assert_eq!(team.metrics().passive_fallbacks, 1);
    team.stop_working();
}

#[test]
fn stop_gives_up_on_pending_routed_jobs_after_the_bound() {
    let team = Arc::new(ProcessContextTeam::new(
        "pc-stuck",
        ProcessContextOptions {
            max_shutdown_wait: Duration::from_millis(80),
            ..options()
        },
    ));
    team.start_working().unwrap();
    let process = ProcessIdentifier::new();
    let (origin, completion) = start_process(&team, process);

    // Occupy the origin thread, then queue a second job behind it.
    let (tx, rx) = mpsc::channel();
    let busy = tx.clone();
    team.assign_job(
        FnJob::new(move |_| {
            thread::sleep(Duration::from_millis(300));
            busy.send((process, thread::current().id())).unwrap();
        })
        .with_process(process)
        .boxed(),
    );
    thread::sleep(Duration::from_millis(30));
    team.assign_job(reporting_job(process, &tx));

    let started = Instant::now();
    team.stop_working();
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(team.metrics().shutdown_timeouts, 1);

    // The origin thread still services what was routed to it.
    assert!(rx.recv_timeout(TIMEOUT).is_ok());
    assert!(rx.recv_timeout(TIMEOUT).is_ok());
    completion.complete();
    origin.join().unwrap();
}
