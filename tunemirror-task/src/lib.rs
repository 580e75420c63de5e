// Supervised background tasks
pub mod error;
pub mod supervisor;

pub use error::{Result, TaskError, TaskFailure};
pub use supervisor::{default_fatal_hook, FatalHook, LoopFuture, StopSignal, Task, TaskState};
