use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use thiserror::Error;

/// Lifecycle errors returned by [`Task::start`](crate::Task::start) and
/// [`Task::stop`](crate::Task::stop).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    #[error("task is already running")]
    AlreadyRunning,

    #[error("task is not initialized")]
    NotInitialized,

    #[error("task is not running")]
    NotRunning,

    #[error("no tokio runtime available to run the task")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Why a supervised loop ended abnormally, with the trace captured at the
/// point the failure was built.
pub struct TaskFailure {
    cause: String,
    trace: Backtrace,
}

impl TaskFailure {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            trace: Backtrace::force_capture(),
        }
    }

    pub fn from_error(err: impl fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    /// Builds a failure from a panic payload caught by the supervisor.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let cause = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_owned()
        };
        Self::new(cause)
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFailure")
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cause)
    }
}

impl std::error::Error for TaskFailure {}
