use crate::runtime::{Job, ThreadFactory};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::trace;
use parking_lot::{Condvar, Mutex};

/// The single background worker that fires expiration tasks.
///
/// Tasks are filed into a min-heap of due times; the worker sleeps until
/// the earliest one and runs tasks serially. One worker is enough because
/// each fired task re-arms only the next-due entry of its map.
pub(crate) struct Scheduler {
  shared: Arc<SchedulerShared>,
}

struct SchedulerShared {
  state: Mutex<SchedulerState>,
  wakeup: Condvar,
}

struct SchedulerState {
  queue: BinaryHeap<Reverse<(Instant, u64)>>,
  jobs: HashMap<u64, Job>,
  next_id: u64,
  shutdown: bool,
}

/// Cancellation handle for a pending task. Dropping the handle cancels the
/// task; a task cancelled before the worker picks it up never runs.
pub(crate) struct TaskHandle {
  id: u64,
  shared: Weak<SchedulerShared>,
}

impl TaskHandle {
  pub(crate) fn cancel(&self) {
    if let Some(shared) = self.shared.upgrade() {
      shared.state.lock().jobs.remove(&self.id);
    }
  }
}

impl Drop for TaskHandle {
  fn drop(&mut self) {
    self.cancel();
  }
}

impl Scheduler {
  pub(crate) fn start(factory: &dyn ThreadFactory) -> Self {
    let shared = Arc::new(SchedulerShared {
      state: Mutex::new(SchedulerState {
        queue: BinaryHeap::new(),
        jobs: HashMap::new(),
        next_id: 0,
        shutdown: false,
      }),
      wakeup: Condvar::new(),
    });

    let worker = shared.clone();
    let _ = factory.spawn("expiremap-expirer", Box::new(move || Scheduler::run(worker)));

    Scheduler { shared }
  }

  /// Files `job` to run after `delay`.
  pub(crate) fn schedule_after(&self, delay: Duration, job: Job) -> TaskHandle {
    let due = Instant::now() + delay;
    let mut state = self.shared.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    state.jobs.insert(id, job);
    let is_earliest = state.queue.peek().map_or(true, |Reverse((head, _))| due < *head);
    state.queue.push(Reverse((due, id)));
    drop(state);

    if is_earliest {
      self.shared.wakeup.notify_one();
    }
    TaskHandle { id, shared: Arc::downgrade(&self.shared) }
  }

  /// Stops the worker. Pending tasks are discarded without being fired.
  pub(crate) fn shutdown(&self) {
    let mut state = self.shared.state.lock();
    state.shutdown = true;
    state.queue.clear();
    state.jobs.clear();
    drop(state);
    self.shared.wakeup.notify_one();
  }

  fn run(shared: Arc<SchedulerShared>) {
    trace!("expiration worker started");
    let mut state = shared.state.lock();
    loop {
      if state.shutdown {
        break;
      }
      match state.queue.peek().copied() {
        None => {
          shared.wakeup.wait(&mut state);
        }
        Some(Reverse((due, id))) => {
          let now = Instant::now();
          if due <= now {
            let _ = state.queue.pop();
            if let Some(job) = state.jobs.remove(&id) {
              drop(state);
              // A panicking task must not take the worker down with it.
              let _ = panic::catch_unwind(AssertUnwindSafe(job));
              state = shared.state.lock();
            }
          } else {
            let _ = shared.wakeup.wait_for(&mut state, due - now);
          }
        }
      }
    }
    trace!("expiration worker stopped");
  }
}
