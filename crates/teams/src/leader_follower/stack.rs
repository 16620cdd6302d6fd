use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// One worker of a leader/follower team, addressed by its index in the
/// stack's arena.
#[derive(Default)]
struct TeamMember {
    wake: Condvar,
    finished: AtomicBool,
}

struct StackState {
    /// Indices of parked members, most recently parked last.
    parked: Vec<usize>,
    /// Members currently holding leadership. Never above one.
    polling: usize,
    peak_parked: usize,
    peak_polling: usize,
    open: bool,
}

/// Point-in-time view of how members are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub parked: usize,
    pub peak_parked: usize,
    pub polling: usize,
    pub peak_polling: usize,
}

/// Followers waiting to be promoted to leader, in LIFO order.
///
/// Leadership is a single token: only its holder polls the job queue. At
/// most `team_size - 1` members are parked at once; a member that would
/// exceed that bound returns instead of blocking.
pub struct TeamMemberStack {
    members: Vec<TeamMember>,
    state: Mutex<StackState>,
    wait_limit: usize,
}

impl TeamMemberStack {
    pub fn new(team_size: usize) -> Self {
        Self {
            members: (0..team_size).map(|_| TeamMember::default()).collect(),
            state: Mutex::new(StackState {
                parked: Vec::with_capacity(team_size),
                polling: 0,
                peak_parked: 0,
                peak_polling: 0,
                open: true,
            }),
            wait_limit: team_size.saturating_sub(1),
        }
    }

    pub fn team_size(&self) -> usize {
        self.members.len()
    }

    /// Take leadership if it is free, otherwise park until promoted.
    ///
    /// Returns `true` once the member leads. Returns `false` without
    /// leading when the stack is closed, when parking would exceed the
    /// wait limit, or when another member took leadership first after a
    /// wake-up. The caller re-checks its stop flag and tries again.
    pub fn wait_to_be_leader(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        if state.polling == 0 {
            Self::lead(&mut state);
            return true;
        }
        if !state.open || state.parked.len() >= self.wait_limit {
            return false;
        }

        state.parked.push(index);
        state.peak_parked = state.peak_parked.max(state.parked.len());
        while state.open && state.parked.contains(&index) {
            self.members[index].wake.wait(&mut state);
        }
        state.parked.retain(|&i| i != index);

        if state.polling == 0 {
            Self::lead(&mut state);
            return true;
        }
        false
    }

    /// Give up leadership and wake the most recently parked follower.
    pub fn promote_leader(&self) {
        let mut state = self.state.lock();
        state.polling = state.polling.saturating_sub(1);
        if let Some(next) = state.parked.pop() {
            self.members[next].wake.notify_one();
        }
    }

    /// Stop parking members and wake everyone already parked.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        state.parked.clear();
        for member in &self.members {
            member.wake.notify_one();
        }
    }

    /// Wake one member, whether or not it is parked.
    pub fn notify(&self, index: usize) {
        let _state = self.state.lock();
        self.members[index].wake.notify_one();
    }

    pub fn mark_finished(&self, index: usize) {
        self.members[index].finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self, index: usize) -> bool {
        self.members[index].finished.load(Ordering::SeqCst)
    }

    pub fn occupancy(&self) -> Occupancy {
        let state = self.state.lock();
        Occupancy {
            parked: state.parked.len(),
            peak_parked: state.peak_parked,
            polling: state.polling,
            peak_polling: state.peak_polling,
        }
    }

    fn lead(state: &mut StackState) {
        state.polling += 1;
        state.peak_polling = state.peak_polling.max(state.polling);
    }
}
