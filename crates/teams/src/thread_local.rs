//! Carries thread-local values from the assigning thread to the worker.
//!
//! At `assign_job` time every registered [`ContextPropagator`] captures the
//! caller's value. The worker installs the captured values around the job
//! and restores its own afterwards, in reverse order, even if the job panics.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::LocalKey;

use teamwork_core::{
    Job, JobContext, JobError, ProcessContextListener, ProcessIdentifier, Team, TeamError,
    TeamMetrics,
};

/// A value captured on the assigning thread, ready to install elsewhere.
pub trait CapturedContext: Send {
    /// Install on the current thread. The returned closure puts back
    /// whatever was there before.
    fn attach(self: Box<Self>) -> Box<dyn FnOnce()>;
}

pub trait ContextPropagator: Send + Sync {
    fn capture(&self) -> Box<dyn CapturedContext>;
}

/// Propagates one `thread_local!` cell by cloning its value.
pub struct ThreadLocalPropagator<T: 'static> {
    key: &'static LocalKey<RefCell<T>>,
}

impl<T: Clone + Send + 'static> ThreadLocalPropagator<T> {
    pub fn new(key: &'static LocalKey<RefCell<T>>) -> Self {
        Self { key }
    }
}

impl<T: Clone + Send + 'static> ContextPropagator for ThreadLocalPropagator<T> {
    fn capture(&self) -> Box<dyn CapturedContext> {
        Box::new(CapturedValue {
            key: self.key,
            value: self.key.with(|cell| cell.borrow().clone()),
        })
    }
}

struct CapturedValue<T: 'static> {
    key: &'static LocalKey<RefCell<T>>,
    value: T,
}

impl<T: Send + 'static> CapturedContext for CapturedValue<T> {
    fn attach(self: Box<Self>) -> Box<dyn FnOnce()> {
        let key = self.key;
        let previous = key.with(|cell| cell.replace(self.value));
        Box::new(move || {
            key.with(|cell| {
                cell.replace(previous);
            })
        })
    }
}

/// Runs restore closures last-in first-out when dropped.
struct Restore(Vec<Box<dyn FnOnce()>>);

impl Drop for Restore {
    fn drop(&mut self) {
        while let Some(restore) = self.0.pop() {
            restore();
        }
    }
}

/// A job bundled with the context captured when it was assigned.
struct ContextualJob {
    job: Box<dyn Job>,
    captured: Vec<Box<dyn CapturedContext>>,
}

impl Job for ContextualJob {
    fn run(self: Box<Self>, context: &JobContext<'_>) {
        let ContextualJob { job, captured } = *self;
        let _restore = Restore(captured.into_iter().map(|c| c.attach()).collect());
        job.run(context);
    }

    fn cancel(self: Box<Self>, cause: JobError) {
        self.job.cancel(cause);
    }

    fn process_identifier(&self) -> Option<ProcessIdentifier> {
        self.job.process_identifier()
    }

    fn name(&self) -> &str {
        self.job.name()
    }
}

/// Wraps another team so jobs see the assigning thread's context.
pub struct ThreadLocalAwareTeam {
    name: String,
    delegate: Arc<dyn Team>,
    propagators: Vec<Arc<dyn ContextPropagator>>,
}

impl ThreadLocalAwareTeam {
    pub fn new(
        name: impl Into<String>,
        delegate: Arc<dyn Team>,
        propagators: Vec<Arc<dyn ContextPropagator>>,
    ) -> Self {
        Self {
            name: name.into(),
            delegate,
            propagators,
        }
    }

    pub fn delegate(&self) -> &Arc<dyn Team> {
        &self.delegate
    }
}

impl Team for ThreadLocalAwareTeam {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_working(&self) -> Result<(), TeamError> {
        self.delegate.start_working()
    }

    fn assign_job(&self, job: Box<dyn Job>) {
        let captured = self.propagators.iter().map(|p| p.capture()).collect();
        self.delegate.assign_job(Box::new(ContextualJob { job, captured }));
    }

    fn stop_working(&self) {
        self.delegate.stop_working();
    }

    fn metrics(&self) -> TeamMetrics {
        self.delegate.metrics()
    }

    fn process_listener(&self) -> Option<&dyn ProcessContextListener> {
        self.delegate.process_listener()
    }
}
