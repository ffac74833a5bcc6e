//! The dispatcher: listener registry, bounded job queue and worker pool.
//!
//! Producers call [`Dispatcher::dispatch`], which validates the event name,
//! pushes a [`Job`] onto the shared queue and returns. A fixed number of
//! workers pop jobs in FIFO order and spawn one task per delivery, so two jobs
//! (even for the same name) can be in flight at once and may finish in any
//! order.

use crate::error::MediatorError;
use crate::event::{EventName, Job};
use crate::listener::Listener;
use futures::FutureExt;
use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default number of worker tasks.
pub const DEFAULT_WORKERS: usize = 5;

/// Default capacity of the job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Sizing for the worker pool and job queue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatcherConfig {
    /// Number of worker tasks popping jobs off the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of queued jobs before producers wait.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

struct Registry<P: Send + 'static> {
    listeners: HashMap<EventName, Arc<dyn Listener<P>>>,
    after_events: HashMap<EventName, EventName>,
}

impl<P: Send + 'static> Registry<P> {
    fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            after_events: HashMap::new(),
        }
    }
}

type SharedRegistry<P> = Arc<RwLock<Registry<P>>>;
type SharedQueue<P> = Arc<Mutex<mpsc::Receiver<Job<P>>>>;

/// Central publish/dispatch bus with exactly one listener per event name.
///
/// The payload type `P` is opaque to the dispatcher. It is cloned only when an
/// after-event mapping requires a second job for the same payload.
pub struct Dispatcher<P: Send + 'static> {
    registry: SharedRegistry<P>,
    /// `None` once [`shutdown`](Self::shutdown) has been requested.
    jobs: RwLock<Option<mpsc::Sender<Job<P>>>>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<P: Clone + Send + 'static> Dispatcher<P> {
    /// Creates the dispatcher and starts its worker pool.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let registry: SharedRegistry<P> = Arc::new(RwLock::new(Registry::new()));
        let queue: SharedQueue<P> = Arc::new(Mutex::new(receiver));

        let workers = (0..config.workers)
            .map(|worker| {
                tokio::spawn(consume(worker, Arc::clone(&queue), Arc::clone(&registry)))
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = capacity,
            "dispatcher started"
        );

        Self {
            registry,
            jobs: RwLock::new(Some(sender)),
            workers: std::sync::Mutex::new(workers),
        }
    }

    /// Binds `listener` to each of `names`.
    ///
    /// Names are checked one at a time, in order. The first name that already
    /// has a listener aborts the call with
    /// [`MediatorError::DuplicateRegistration`]; names earlier in the same call
    /// remain bound and the existing binding for the conflicting name is kept.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRegistration` for the first conflicting name.
    pub fn register(
        &self,
        listener: Arc<dyn Listener<P>>,
        names: impl IntoIterator<Item = EventName>,
    ) -> Result<(), MediatorError> {
        let mut registry = self.write_registry();
        for name in names {
            if registry.listeners.contains_key(&name) {
                return Err(MediatorError::DuplicateRegistration { name });
            }
            debug!(event = %name, "listener registered");
            registry.listeners.insert(name, Arc::clone(&listener));
        }
        Ok(())
    }

    /// Chains `follow_up` after `name`: every successful dispatch of `name`
    /// enqueues a second job for `follow_up` with the same payload.
    ///
    /// Replaces any previous mapping for `name`.
    pub fn set_after_event(&self, name: EventName, follow_up: EventName) {
        debug!(event = %name, follow_up = %follow_up, "after-event configured");
        self.write_registry().after_events.insert(name, follow_up);
    }

    /// Returns true if a listener is bound to `name`.
    #[must_use]
    pub fn is_registered(&self, name: &EventName) -> bool {
        self.read_registry().listeners.contains_key(name)
    }

    /// Returns the number of bound event names.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.read_registry().listeners.len()
    }

    /// Returns the number of jobs waiting in the queue.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.read_jobs()
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    /// Enqueues a job for `name`, followed by its after-event job if one is
    /// configured.
    ///
    /// Waits while the queue is full; jobs are never dropped.
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredEvent` (and enqueues nothing) if no listener is
    /// bound to `name`, or `Closed` after [`shutdown`](Self::shutdown).
    pub async fn dispatch(
        &self,
        name: impl Into<EventName>,
        payload: P,
    ) -> Result<(), MediatorError> {
        let name = name.into();
        let follow_up = {
            let registry = self.read_registry();
            if !registry.listeners.contains_key(&name) {
                return Err(MediatorError::UnregisteredEvent { name });
            }
            registry.after_events.get(&name).cloned()
        };

        let sender = self.read_jobs().clone().ok_or(MediatorError::Closed)?;
        match follow_up {
            Some(follow_up) => {
                enqueue(&sender, Job::new(name, payload.clone())).await?;
                enqueue(&sender, Job::new(follow_up, payload)).await
            }
            None => enqueue(&sender, Job::new(name, payload)).await,
        }
    }

    /// Stops accepting jobs, lets the workers drain what is already queued,
    /// and waits for them to exit.
    ///
    /// Deliveries already spawned by a worker are not awaited.
    pub async fn shutdown(&self) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "dispatcher worker ended abnormally");
            }
        }
        info!("dispatcher stopped");
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry<P>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry<P>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, Option<mpsc::Sender<Job<P>>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn enqueue<P: Send + 'static>(
    sender: &mpsc::Sender<Job<P>>,
    job: Job<P>,
) -> Result<(), MediatorError> {
    sender.send(job).await.map_err(|_| MediatorError::Closed)
}

/// Worker loop: pop the next job and hand it to its listener on a new task.
async fn consume<P: Send + 'static>(
    worker: usize,
    queue: SharedQueue<P>,
    registry: SharedRegistry<P>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            debug!(worker, "job queue closed, worker stopping");
            return;
        };

        let listener = registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .get(&job.name)
            .cloned();

        match listener {
            Some(listener) => {
                tokio::spawn(deliver(listener, job));
            }
            // Only reachable through an after-event whose target was never bound.
            None => warn!(worker, event = %job.name, "dropping job without listener"),
        }
    }
}

/// Runs one delivery, containing any panic raised by the listener.
async fn deliver<P: Send + 'static>(listener: Arc<dyn Listener<P>>, job: Job<P>) {
    let name = job.name.clone();
    let outcome = AssertUnwindSafe(listener.listen(job.name, job.payload))
        .catch_unwind()
        .await;
    if let Err(panic) = outcome {
        error!(
            event = %name,
            panic = panic_message(panic.as_ref()),
            "listener panicked while handling event"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
