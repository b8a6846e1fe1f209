//! Process-wide background runtime: the expiration scheduler, the listener
//! dispatch pool, and the thread factory they are built with.
//!
//! Both workers are lazily initialized on first use and torn down by
//! [`shutdown`]. Background threads never block process exit; `shutdown`
//! exists for orderly teardown and for test isolation.

use crate::error::Error;
use crate::task::pool::DispatchPool;
use crate::task::scheduler::Scheduler;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// A unit of work handed to a [`ThreadFactory`] or a background worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Creates the threads backing the scheduler and the dispatch pool.
///
/// Replaceable via [`set_thread_factory`] for hosted environments where
/// threads need specific privileges or attributes; the replacement must
/// happen before any map schedules work.
pub trait ThreadFactory: Send + Sync {
  fn spawn(&self, name: &str, job: Job) -> JoinHandle<()>;
}

/// The default factory: named threads with the standard library defaults.
struct NamedThreadFactory;

impl ThreadFactory for NamedThreadFactory {
  fn spawn(&self, name: &str, job: Job) -> JoinHandle<()> {
    thread::Builder::new()
      .name(name.to_owned())
      .spawn(job)
      .expect("failed to spawn thread")
  }
}

struct Runtime {
  factory: Arc<dyn ThreadFactory>,
  scheduler: Option<Arc<Scheduler>>,
  pool: Option<Arc<DispatchPool>>,
  started: bool,
}

static RUNTIME: Lazy<Mutex<Runtime>> = Lazy::new(|| {
  Mutex::new(Runtime {
    factory: Arc::new(NamedThreadFactory),
    scheduler: None,
    pool: None,
    started: false,
  })
});

pub(crate) fn scheduler() -> Arc<Scheduler> {
  let mut runtime = RUNTIME.lock();
  if let Some(scheduler) = &runtime.scheduler {
    return scheduler.clone();
  }
  let scheduler = Arc::new(Scheduler::start(runtime.factory.as_ref()));
  runtime.scheduler = Some(scheduler.clone());
  runtime.started = true;
  scheduler
}

pub(crate) fn pool() -> Arc<DispatchPool> {
  let mut runtime = RUNTIME.lock();
  if let Some(pool) = &runtime.pool {
    return pool.clone();
  }
  let pool = Arc::new(DispatchPool::start(runtime.factory.as_ref(), num_cpus::get()));
  runtime.pool = Some(pool.clone());
  runtime.started = true;
  pool
}

/// Replaces the thread factory used for all subsequently created background
/// threads. Fails with [`Error::RuntimeInitialized`] once the scheduler or
/// the pool has been started; call it before building any map.
pub fn set_thread_factory(factory: Arc<dyn ThreadFactory>) -> Result<(), Error> {
  let mut runtime = RUNTIME.lock();
  if runtime.started {
    return Err(Error::RuntimeInitialized);
  }
  runtime.factory = factory;
  Ok(())
}

/// Stops the expiration worker and the listener pool.
///
/// Pending expiration tasks are discarded, not fired early. The runtime is
/// re-initialized lazily on the next use, at which point the thread factory
/// may be replaced again.
pub fn shutdown() {
  let mut runtime = RUNTIME.lock();
  if let Some(scheduler) = runtime.scheduler.take() {
    scheduler.shutdown();
  }
  // Dropping the pool drops its channel sender, ending the workers.
  runtime.pool = None;
  runtime.started = false;
}
