//! Lifecycle contract shared by every team kind built through `TeamSource`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use teamwork_core::{FnJob, JobError, Team, TeamError, TeamsConfig};
use teamwork_teams::{TeamSource, ThreadLocalPropagator};

const CONFIG: &str = r#"
[teams.passive]
kind = "passive"

[teams.one-person]
kind = "one_person"
wait_time_ms = 10
shutdown_poll_ms = 5

[teams.per-job]
kind = "worker_per_job"
thread_priority = "max"

[teams.per-task]
kind = "worker_per_task"

[teams.fixed]
kind = "executor"
max_size = 2
queue_capacity = 16

[teams.cached]
kind = "executor"
pool = "cached"
max_size = 3
keep_alive_ms = 100

[teams.leader-follower]
kind = "leader_follower"
team_size = 2
wait_time_ms = 10

[teams.carrier]
kind = "thread_local_aware"
delegate = "leader-follower"

[teams.affinity]
kind = "process_context"
wait_time_ms = 10
shutdown_poll_ms = 5
"#;

thread_local! {
    static REQUEST_ID: RefCell<u64> = const { RefCell::new(0) };
}

fn build() -> BTreeMap<String, Arc<dyn Team>> {
    let config = TeamsConfig::from_toml(CONFIG).unwrap();
    TeamSource::new()
        .with_propagator(Arc::new(ThreadLocalPropagator::new(&REQUEST_ID)))
        .create_all(&config)
        .unwrap()
}

#[test]
fn stop_is_idempotent_for_every_kind() {
    for (name, team) in build() {
        team.start_working().unwrap_or_else(|e| panic!("{name}: {e}"));
        team.stop_working();
        team.stop_working();
    }
}

#[test]
fn stop_before_start_is_safe_and_terminal() {
    for (name, team) in build() {
        team.stop_working();
        team.stop_working();
        assert!(
            matches!(team.start_working(), Err(TeamError::Stopped(_))),
            "{name} restarted after stop"
        );
    }
}

#[test]
fn second_start_is_rejected() {
    for (name, team) in build() {
        team.start_working().unwrap();
        assert!(
            matches!(team.start_working(), Err(TeamError::AlreadyStarted(_))),
            "{name} started twice"
        );
        team.stop_working();
    }
}

#[test]
fn jobs_assigned_after_stop_are_cancelled_not_run() {
    for (name, team) in build() {
        team.start_working().unwrap();
        team.stop_working();

        let cause = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&cause);
        team.assign_job(
            FnJob::new(|_| panic!("must not run"))
                .on_cancel(move |c| *sink.lock() = Some(c))
                .boxed(),
        );
        assert!(
            matches!(*cause.lock(), Some(JobError::NotWorking { .. })),
            "{name}: {:?}",
            cause.lock()
        );
        assert_eq!(team.metrics().jobs_executed, 0, "{name}");
    }
}

#[test]
fn thread_local_values_reach_the_delegate_workers() {
    let teams = build();
    let carrier = &teams["carrier"];
    carrier.start_working().unwrap();

    let (tx, rx) = mpsc::channel();
    for request in 1..=5u64 {
        REQUEST_ID.with(|id| *id.borrow_mut() = request);
        let tx = tx.clone();
        carrier.assign_job(
            FnJob::new(move |_| tx.send((request, REQUEST_ID.with(|id| *id.borrow()))).unwrap())
                .boxed(),
        );
    }

    for _ in 0..5 {
        let (sent, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(sent, seen);
    }
    carrier.stop_working();
}

#[test]
fn huge_shutdown_wait_from_config_stops_cleanly() {
    let config = TeamsConfig::from_toml(
        r#"
[teams.fixed]
kind = "executor"
max_size = 2
max_shutdown_wait_seconds = 9223372036854775807

[teams.cached]
kind = "executor"
pool = "cached"
max_size = 2
max_shutdown_wait_seconds = 9223372036854775807

[teams.affinity]
kind = "process_context"
shutdown_poll_ms = 5
max_shutdown_wait_seconds = 9223372036854775807
"#,
    )
    .unwrap();
    let teams = TeamSource::new().create_all(&config).unwrap();

    for (name, team) in teams {
        team.start_working().unwrap();
        let (tx, rx) = mpsc::channel();
        team.assign_job(FnJob::new(move |_| tx.send(()).unwrap()).boxed());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        team.stop_working();
        assert_eq!(team.metrics().shutdown_timeouts, 0, "{name}");
    }
}
