//! Fixed-size pool of long-lived worker threads draining a bounded job channel.
//!
//! The pool is fork-join: the caller queues a batch of jobs, then blocks in
//! [`WorkerPool::wait_for_completion`] until every job queued so far has finished.
//! Each queued job carries a clone of the current batch's [`WaitGroup`], released
//! once the job has run.
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use log::{debug, warn};

use crate::utils::SimulationError;

/// A unit of work run exactly once on some worker thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Task {
    job: Job,
    batch: WaitGroup,
}

/// Fixed set of worker threads with a bounded queue and a join barrier.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use rs_nbody::concurrency::WorkerPool;
///
/// let mut pool = WorkerPool::new(4).expect("pool starts");
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..16 {
///     let counter = Arc::clone(&counter);
///     pool.queue_job(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }).unwrap();
/// }
/// pool.wait_for_completion().unwrap();
/// assert_eq!(counter.load(Ordering::SeqCst), 16);
/// pool.stop();
/// ```
pub struct WorkerPool {
    /// `None` once [`WorkerPool::stop`] has run; dropping it lets the workers drain and exit.
    sender: Option<Sender<Task>>,
    /// Barrier for the jobs queued since the last [`WorkerPool::wait_for_completion`].
    batch: Mutex<WaitGroup>,
    panicked: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Starts `size` workers with a queue bounded to four jobs per worker.
    pub fn new(size: usize) -> Result<Self, SimulationError> {
        Self::with_capacity(size, size.saturating_mul(4))
    }

    /// Starts `size` workers; `queue_job` blocks while `capacity` jobs are waiting.
    pub fn with_capacity(size: usize, capacity: usize) -> Result<Self, SimulationError> {
        if size == 0 {
            return Err(SimulationError::InvalidConfig("worker pool needs at least one thread".to_string()));
        }
        if capacity == 0 {
            return Err(SimulationError::InvalidConfig("job queue capacity must be at least 1".to_string()));
        }

        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let mut pool = WorkerPool {
            sender: Some(sender),
            batch: Mutex::new(WaitGroup::new()),
            panicked: Arc::new(AtomicBool::new(false)),
            threads: Vec::with_capacity(size),
            size,
        };
        for id in 0..size {
            let receiver = receiver.clone();
            let panicked = Arc::clone(&pool.panicked);
            let spawned = thread::Builder::new()
                .name(format!("nbody-worker-{}", id))
                .spawn(move || worker_loop(receiver, &panicked));
            match spawned {
                Ok(handle) => pool.threads.push(handle),
                Err(e) => {
                    pool.stop();
                    return Err(SimulationError::WorkerSpawn(e.to_string()));
                }
            }
        }
        debug!("Started worker pool with {} threads", size);
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.is_none()
    }

    /// Queues a job, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::WorkerPoolStopped` once [`WorkerPool::stop`] has run;
    /// the job is dropped without running.
    pub fn queue_job<F>(&self, job: F) -> Result<(), SimulationError>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = self.sender.as_ref() else {
            warn!("Rejected job queued after worker pool shutdown");
            return Err(SimulationError::WorkerPoolStopped);
        };
        let batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let task = Task {
            job: Box::new(job),
            batch,
        };
        // Workers only hang up after the sender is gone, so this cannot fail while we hold it.
        sender.send(task).map_err(|_| SimulationError::WorkerPoolStopped)
    }

    /// Blocks until every job queued before this call has finished.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::WorkerPanicked` if any job finished by panicking since
    /// the previous barrier. The flag is cleared, so the next batch starts clean.
    pub fn wait_for_completion(&self) -> Result<(), SimulationError> {
        let finished = {
            let mut batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *batch, WaitGroup::new())
        };
        finished.wait();
        if self.panicked.swap(false, Ordering::SeqCst) {
            return Err(SimulationError::WorkerPanicked);
        }
        Ok(())
    }

    /// Stops accepting jobs, lets the workers drain what is already queued, and joins them.
    ///
    /// Calling `stop` more than once is a no-op.
    pub fn stop(&mut self) {
        if self.sender.take().is_none() && self.threads.is_empty() {
            return;
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
        debug!("Stopped worker pool");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs tasks until the channel is empty and every sender is gone.
fn worker_loop(receiver: Receiver<Task>, panicked: &AtomicBool) {
    for Task { job, batch } in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            panicked.store(true, Ordering::SeqCst);
        }
        drop(batch);
    }
}
