//! Supervised background loops.
//!
//! A [`Task`] owns one loop factory and runs it on a tokio task:
//!
//! ```text
//!   Uninitialized ──set_loop──► Idle ──start──► Running
//!                                ▲                 │
//!                                └──stop / exit────┘
//! ```
//!
//! The loop runs in its own spawned task so a panic surfaces as a
//! `JoinError` instead of unwinding through the supervisor. Failures (typed
//! or panics) are logged with their trace and handed to the fatal hook.

use crate::error::{Result, TaskError, TaskFailure};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info};

pub type LoopFuture = Pin<Box<dyn Future<Output = std::result::Result<(), TaskFailure>> + Send>>;
type LoopFn = Arc<dyn Fn(StopSignal) -> LoopFuture + Send + Sync>;

/// Receives the formatted `Task '<name>' panic: <cause>` message.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Logs the failure and terminates the process.
pub fn default_fatal_hook(message: &str) {
    error!("Fatal: {}", message);
    std::process::exit(1);
}

/// Advisory stop request handed to a running loop. The loop has to poll it.
#[derive(Debug)]
pub struct StopSignal {
    rx: mpsc::Receiver<()>,
}

impl StopSignal {
    /// Resolves once stop was requested or the owning [`Task`] was dropped.
    pub async fn stopped(&mut self) {
        let _ = self.rx.recv().await;
    }

    pub fn is_stopped(&mut self) -> bool {
        match self.rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Uninitialized,
    Idle,
    Running,
}

struct Inner {
    state: TaskState,
    run_loop: Option<LoopFn>,
    stop_tx: Option<mpsc::Sender<()>>,
    generation: u64,
    fatal_hook: FatalHook,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Task {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: TaskState::Uninitialized,
                run_loop: None,
                stop_tx: None,
                generation: 0,
                fatal_hook: Arc::new(default_fatal_hook),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    /// Register the loop run by [`start`](Self::start). Takes effect on the next start.
    pub fn set_loop<F, Fut>(&self, f: F)
    where
        F: Fn(StopSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), TaskFailure>> + Send + 'static,
    {
        let run_loop: LoopFn = Arc::new(move |stop| Box::pin(f(stop)) as LoopFuture);
        let mut inner = lock(&self.inner);
        inner.run_loop = Some(run_loop);
        if inner.state == TaskState::Uninitialized {
            inner.state = TaskState::Idle;
        }
    }

    /// Replace the hook called when the loop fails or panics.
    pub fn set_fatal_hook<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        lock(&self.inner).fatal_hook = Arc::new(hook);
    }

    pub fn start(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        match inner.state {
            TaskState::Running => return Err(TaskError::AlreadyRunning),
            TaskState::Uninitialized => return Err(TaskError::NotInitialized),
            TaskState::Idle => {}
        }
        let run_loop = inner.run_loop.clone().ok_or(TaskError::NotInitialized)?;
        let handle = Handle::try_current().map_err(|_| TaskError::NoRuntime)?;

        let (stop_tx, stop_rx) = mpsc::channel(1);
        inner.generation += 1;
        inner.stop_tx = Some(stop_tx);
        inner.state = TaskState::Running;
        let generation = inner.generation;
        // The factory may call back into this task
        drop(inner);

        let future = run_loop(StopSignal { rx: stop_rx });
        handle.spawn(supervise(
            self.name.clone(),
            Arc::clone(&self.inner),
            generation,
            future,
        ));
        info!("Task '{}' started", self.name);
        Ok(())
    }

    /// Signal the loop to stop. Does not wait for it to exit.
    pub fn stop(&self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.state != TaskState::Running {
            return Err(TaskError::NotRunning);
        }
        if let Some(stop_tx) = inner.stop_tx.take() {
            // Capacity 1 and a fresh channel per run, so this never blocks
            let _ = stop_tx.try_send(());
        }
        inner.state = TaskState::Idle;
        info!("Task '{}' stopping", self.name);
        Ok(())
    }
}

async fn supervise(name: String, shared: Arc<Mutex<Inner>>, generation: u64, future: LoopFuture) {
    let failure = match tokio::spawn(future).await {
        Ok(Ok(())) => None,
        Ok(Err(failure)) => Some(failure),
        Err(e) if e.is_panic() => Some(TaskFailure::from_panic(e.into_panic())),
        Err(e) => {
            debug!("Task '{}' cancelled: {}", name, e);
            None
        }
    };

    let hook = {
        let mut inner = lock(&shared);
        // A later start owns the state now
        if inner.generation == generation && inner.state == TaskState::Running {
            inner.state = TaskState::Idle;
            inner.stop_tx = None;
        }
        Arc::clone(&inner.fatal_hook)
    };

    match failure {
        Some(failure) => {
            let message = format!("Task '{}' panic: {}", name, failure.cause());
            error!("{}\n{}", message, failure.trace());
            hook(&message);
        }
        None => debug!("Task '{}' exited", name),
    }
}
