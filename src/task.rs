//! Deferred FFT work and the executors that run it.
//!
//! The engine does not own threads. Its asynchronous entry points package the transform as an
//! [`FftTask`], hand it to any [`Executor`] the caller provides, and return an [`FftHandle`] that
//! resolves once the task has run. The handle is a [`Future`], and can also be waited on from
//! synchronous code.
//!
//! ### Example:
//! ```rust
//! use buffered_fft::task::{FftTask, WorkerPool};
//!
//! let pool = WorkerPool::new(2).unwrap();
//! let (task, handle) = FftTask::new(|| Ok(6 * 7));
//! task.submit(&pool);
//! assert_eq!(handle.wait().unwrap(), 42);
//! ```
use std::any::Any;
use std::future::Future;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use futures::channel::oneshot;
use futures::FutureExt;
use log::debug;
use log::error;
use log::warn;

use crate::error::FftError;
use crate::error::Result;

/// A zero-argument unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs submitted jobs, typically on a pool of threads.
pub trait Executor {
    /// Runs `job` at some point. Dropping it without running it is allowed; the handle of the
    /// task it carries then resolves to [`FftError::Cancelled`].
    fn execute(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }
}

/// Runs every job immediately on the submitting thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job();
    }
}

#[cfg(feature = "rayon")]
impl Executor for rayon::ThreadPool {
    fn execute(&self, job: Job) {
        self.spawn(job);
    }
}

/// One deferred computation whose outcome is delivered through an [`FftHandle`].
pub struct FftTask<T> {
    work: Box<dyn FnOnce() -> Result<T> + Send>,
    sender: oneshot::Sender<Result<T>>,
}

impl<T: Send + 'static> FftTask<T> {
    /// Wraps `work` and returns it together with the handle its outcome will be sent to.
    pub fn new<F>(work: F) -> (Self, FftHandle<T>)
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let task = Self {
            work: Box::new(work),
            sender,
        };
        (task, FftHandle { receiver })
    }

    /// Runs the work on the current thread and fulfills the handle.
    ///
    /// A panic inside the work does not unwind out of this call; it reaches the handle as
    /// [`FftError::TaskPanicked`].
    pub fn run(self) {
        let Self { work, sender } = self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("FFT task panicked: {message}");
                Err(FftError::TaskPanicked(message))
            }
        };
        // The receiver is gone if the caller dropped the handle, nobody is waiting then.
        let _ = sender.send(outcome);
    }

    /// Hands the task to `executor`.
    pub fn submit<E: Executor + ?Sized>(self, executor: &E) {
        executor.execute(Box::new(move || self.run()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The eventual outcome of an [`FftTask`].
#[must_use = "the transform result is only reachable through the handle"]
pub struct FftHandle<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> FftHandle<T> {
    /// Blocks the current thread until the task has run.
    ///
    /// # Errors
    /// Returns the task's own error, [`FftError::TaskPanicked`] if it panicked, or
    /// [`FftError::Cancelled`] if it was dropped without running.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }

    /// Returns the outcome if the task has already run, without blocking.
    ///
    /// The outcome is handed out once; later calls report [`FftError::Cancelled`].
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(Some(outcome)) => Some(outcome),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(FftError::Cancelled)),
        }
    }
}

impl<T> Future for FftHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(FftError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A fixed number of worker threads pulling jobs from a shared queue.
///
/// Dropping the pool lets queued jobs finish, then joins the workers.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads. Zero is treated as one.
    ///
    /// # Errors
    /// Returns the OS error if a thread cannot be spawned.
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let count = workers.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("fft-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("Job panicked on fft-worker-{id}");
                        }
                    }
                })?;
            handles.push(handle);
        }
        debug!("Started worker pool with {count} threads");

        Ok(Self {
            sender: Some(sender),
            workers: handles,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            warn!("Worker pool queue is closed, dropping job");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread exited with a panic");
            }
        }
        debug!("Worker pool shut down");
    }
}
