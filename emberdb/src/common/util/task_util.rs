use crate::errors::{EmberError, EmberResult, ErrorKind};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads fed through a bounded queue.
///
/// Index rebuilds requested asynchronously are handed to this pool and run
/// concurrently with reads and writes on the collection. The pool is owned by
/// the engine configuration and shared by every collection opened with it.
///
/// A task that panics is logged and does not take its worker down.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolInner>,
}

impl WorkerPool {
    /// Creates a pool of `size` threads whose queue holds at most `capacity`
    /// pending tasks. Submitting to a full queue blocks until a slot frees up.
    pub fn new(name: &str, size: usize, capacity: usize) -> Self {
        WorkerPool {
            inner: Arc::new(WorkerPoolInner::new(name, size.max(1), capacity.max(1))),
        }
    }

    pub fn submit<F>(&self, task: F) -> EmberResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.submit(Box::new(task))
    }

    pub fn size(&self) -> usize {
        self.inner.workers.lock().len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    /// Stops accepting tasks, lets queued tasks drain and joins the workers.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

struct WorkerPoolInner {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPoolInner {
    fn new(name: &str, size: usize, capacity: usize) -> Self {
        let (sender, receiver) = bounded::<Task>(capacity);
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || Self::run_worker(receiver));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn worker {} for pool {}: {}", index, name, e),
            }
        }

        WorkerPoolInner {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    fn run_worker(receiver: Receiver<Task>) {
        while let Ok(task) = receiver.recv() {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                log::error!("A task panicked in worker {:?}", std::thread::current().name());
            }
        }
    }

    fn submit(&self, task: Task) -> EmberResult<()> {
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => sender.send(task).map_err(|_| {
                log::error!("Worker pool {} has no live workers", self.name);
                EmberError::new(
                    &format!("Worker pool {} has no live workers", self.name),
                    ErrorKind::InvalidOperation,
                )
            }),
            None => {
                log::error!("Worker pool {} is shut down", self.name);
                Err(EmberError::new(
                    &format!("Worker pool {} is shut down", self.name),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    fn shutdown(&self) {
        // dropping the last sender ends every worker loop once the queue drains
        self.sender.lock().take();

        let current = std::thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::warn!("Worker of pool {} terminated abnormally", self.name);
            }
        }
    }
}

impl Drop for WorkerPoolInner {
    fn drop(&mut self) {
        self.sender.lock().take();
    }
}
