use crate::runtime::{Job, ThreadFactory};

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{unbounded, Sender};
use log::trace;

/// The shared pool that runs asynchronous and offloaded listener
/// notifications, so slow or blocking listeners never stall the
/// expiration worker.
pub(crate) struct DispatchPool {
  sender: Sender<Job>,
}

impl DispatchPool {
  /// Spawns `workers` threads draining a shared unbounded channel.
  /// The workers end once every sender is dropped.
  pub(crate) fn start(factory: &dyn ThreadFactory, workers: usize) -> Self {
    let (sender, receiver) = unbounded::<Job>();

    for n in 0..workers.max(1) {
      let receiver = receiver.clone();
      let name = format!("expiremap-listener-{}", n + 1);
      let _ = factory.spawn(
        &name,
        Box::new(move || {
          trace!("listener worker started");
          while let Ok(job) = receiver.recv() {
            // User listener panics are swallowed here.
            let _ = panic::catch_unwind(AssertUnwindSafe(job));
          }
          trace!("listener worker stopped");
        }),
      );
    }

    DispatchPool { sender }
  }

  pub(crate) fn execute(&self, job: Job) {
    let _ = self.sender.send(job);
  }
}
