#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]
//! Background jobs on bevy's async compute pool.
//!
//! A [`Job`] is spawned onto the pool and its outcome is sent back over a
//! channel, so the thread that owns the [`JobQueue`] decides when results are
//! applied. Jobs can be cancelled on a best-effort basis through their
//! [`JobHandle`]; a job observes cancellation through its [`Context`].
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};
use std::{
    future, pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

#[cfg(not(target_arch = "wasm32"))]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + Send + 'static>>;
#[cfg(target_arch = "wasm32")]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + 'static>>;

pub trait Job: Sized + Send + 'static {
    type Outcome: Send + 'static;

    fn name(&self) -> String;

    fn perform(self, context: Context) -> AsyncReturn<Self::Outcome>;

    fn spawn(self, queue: &JobQueue<Self::Outcome>) -> JobHandle {
        spawn_into(self, queue.sender())
    }
}

/// Spawn `job` and send its outcome on `outcome_tx` when it finishes.
pub fn spawn_into<J: Job>(job: J, outcome_tx: async_channel::Sender<J::Outcome>) -> JobHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let job_name = job.name();
    let handle = JobHandle {
        name: job_name.clone(),
        cancelled: cancelled.clone(),
    };
    let context = Context { cancelled };

    AsyncComputeTaskPool::init(TaskPool::new)
        .spawn(async move {
            let instant = instant::Instant::now();
            bevy::log::trace!("Starting job '{}'", job_name);
            let outcome = job.perform(context).await;
            bevy::log::trace!("Completed job '{}' in {:?}", job_name, instant.elapsed());
            if let Err(e) = outcome_tx.send(outcome).await {
                // the queue was dropped, nobody is waiting for this result
                bevy::log::debug!(
                    "Failed to send result from job {} back to its queue: {}",
                    job_name,
                    e
                );
            }
        })
        .detach();

    handle
}

/// Handed to a running job.
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct JobHandle {
    name: String,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the job to stop. A job that already finished, or never checks its
    /// context, still delivers its outcome.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Collects the outcomes of the jobs spawned into it.
pub struct JobQueue<O> {
    outcome_tx: async_channel::Sender<O>,
    outcome_recv: async_channel::Receiver<O>,
}

impl<O: Send + 'static> Default for JobQueue<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Send + 'static> JobQueue<O> {
    pub fn new() -> Self {
        let (outcome_tx, outcome_recv) = async_channel::unbounded::<O>();
        Self {
            outcome_tx,
            outcome_recv,
        }
    }

    pub fn sender(&self) -> async_channel::Sender<O> {
        self.outcome_tx.clone()
    }

    pub fn spawn<J: Job<Outcome = O>>(&self, job: J) -> JobHandle {
        job.spawn(self)
    }

    #[inline]
    pub fn try_next(&self) -> Option<O> {
        self.outcome_recv.try_recv().ok()
    }

    /// Every outcome that has arrived so far, oldest first.
    pub fn drain(&self) -> Vec<O> {
        let mut outcomes = Vec::with_capacity(self.outcome_recv.len());
        while let Ok(outcome) = self.outcome_recv.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn len(&self) -> usize {
        self.outcome_recv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome_recv.is_empty()
    }
}
